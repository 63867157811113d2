//! Library configuration, loadable from JSON.

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaprootError};
use crate::flags::sighash::SighashFlag;
use crate::utils::parse_network;

/// Script parsing/serialization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Reject pushes that are not encoded minimally
    #[serde(default)]
    pub strict_minimal_push: bool,
}

/// Signing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Verify every signature against the expected public key before it is
    /// returned
    #[serde(default = "default_verify")]
    pub verify_signatures: bool,
    #[serde(default)]
    pub sighash_flag: SighashFlag,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            sighash_flag: SighashFlag::Default,
        }
    }
}

fn default_verify() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub signer: SignerConfig,
}

fn default_network() -> String {
    "regtest".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: default_network(),
            script: ScriptConfig::default(),
            signer: SignerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| TaprootError::InvalidConfig(e.to_string()))?;
        config.network()?;
        if !config.signer.sighash_flag.is_valid_for_taproot() {
            return Err(TaprootError::InvalidConfig(format!(
                "sighash flag {:?} is not valid for taproot",
                config.signer.sighash_flag
            )));
        }
        Ok(config)
    }

    pub fn network(&self) -> Result<Network> {
        parse_network(&self.network)
    }
}
