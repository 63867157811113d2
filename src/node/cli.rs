//! `bitcoin-cli` backed node client

use std::process::Command;

use bitcoin::amount::Denomination;
use bitcoin::{Amount, Network};
use serde::Deserialize;

use crate::error::{Result, TaprootError};
use crate::node::{NodeClient, OutputDetail, TransactionDetails};

/// Talks to a local node by running `bitcoin-cli`
#[derive(Debug, Clone)]
pub struct BitcoinCli {
    binary: String,
    network: Network,
    extra_args: Vec<String>,
    wallet: Option<String>,
    /// Hashes from the last `generatetoaddress`, newest last
    recent_blocks: Vec<String>,
}

#[derive(Deserialize)]
struct WalletTransaction {
    #[serde(default)]
    confirmations: i64,
    #[serde(default)]
    details: Vec<WalletDetail>,
}

#[derive(Deserialize)]
struct WalletDetail {
    address: Option<String>,
    amount: f64,
    vout: u32,
}

#[derive(Deserialize)]
struct RawTransaction {
    #[serde(default)]
    confirmations: i64,
    vout: Vec<RawOutput>,
}

#[derive(Deserialize)]
struct RawOutput {
    value: f64,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pubkey: RawScriptPubKey,
}

#[derive(Deserialize)]
struct RawScriptPubKey {
    address: Option<String>,
}

impl BitcoinCli {
    pub fn new(network: Network) -> Self {
        Self {
            binary: "bitcoin-cli".to_string(),
            network,
            extra_args: Vec::new(),
            wallet: None,
            recent_blocks: Vec::new(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Extra arguments such as `-rpcuser=...` or `-datadir=...`
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn chain_arg(&self) -> Option<&'static str> {
        match self.network {
            Network::Regtest => Some("-regtest"),
            Network::Testnet => Some("-testnet"),
            Network::Signet => Some("-signet"),
            _ => None,
        }
    }

    /// Run a command, returning trimmed stdout
    fn call(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.chain_arg()).args(&self.extra_args);
        if let Some(wallet) = &self.wallet {
            cmd.arg(format!("-rpcwallet={}", wallet));
        }
        cmd.args(args);

        log::debug!("{} {}", self.binary, args.join(" "));
        let output = cmd
            .output()
            .map_err(|e| TaprootError::Node(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(TaprootError::Node(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|e| TaprootError::Node(e.to_string()))
    }

    fn call_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str]) -> Result<T> {
        let out = self.call(args)?;
        serde_json::from_str(&out).map_err(|e| TaprootError::Node(e.to_string()))
    }

    /// `getrawtransaction` from the mempool or txindex, then from each
    /// block this client mined most recently. Nodes without `-txindex`
    /// only find confirmed non-wallet transactions through the block hash.
    fn raw_transaction(&self, txid: &str) -> Result<RawTransaction> {
        let err = match self.call_json(&["getrawtransaction", txid, "true"]) {
            Ok(tx) => return Ok(tx),
            Err(e) => e,
        };
        for block in self.recent_blocks.iter().rev() {
            if let Ok(tx) = self.call_json(&["getrawtransaction", txid, "true", block]) {
                return Ok(tx);
            }
        }
        Err(err)
    }
}

fn btc_to_sat(value: f64) -> Result<u64> {
    Amount::from_btc(value.abs())
        .map(|amount| amount.to_sat())
        .map_err(|e| TaprootError::Node(e.to_string()))
}

fn confirmations(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl NodeClient for BitcoinCli {
    fn send_raw_transaction(&mut self, raw_tx: &[u8]) -> Result<String> {
        self.call(&["sendrawtransaction", &hex::encode(raw_tx)])
    }

    /// Wallet view first (`gettransaction`), then the raw transaction for
    /// transactions the wallet does not know (see `raw_transaction`)
    fn get_transaction_details(&mut self, txid: &str) -> Result<TransactionDetails> {
        if let Ok(tx) = self.call_json::<WalletTransaction>(&["gettransaction", txid]) {
            let outputs = tx
                .details
                .iter()
                .map(|detail| {
                    Ok(OutputDetail {
                        address: detail.address.clone(),
                        amount: btc_to_sat(detail.amount)?,
                        vout: detail.vout,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(TransactionDetails {
                outputs,
                confirmations: confirmations(tx.confirmations),
            });
        }

        let tx = self.raw_transaction(txid)?;
        let outputs = tx
            .vout
            .iter()
            .map(|out| {
                Ok(OutputDetail {
                    address: out.script_pubkey.address.clone(),
                    amount: btc_to_sat(out.value)?,
                    vout: out.n,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TransactionDetails {
            outputs,
            confirmations: confirmations(tx.confirmations),
        })
    }

    fn generate_blocks(&mut self, count: u32, address: &str) -> Result<Vec<String>> {
        let blocks: Vec<String> =
            self.call_json(&["generatetoaddress", &count.to_string(), address])?;
        self.recent_blocks = blocks.clone();
        Ok(blocks)
    }

    fn get_new_address(&mut self) -> Result<String> {
        self.call(&["getnewaddress", "", "bech32"])
    }

    fn send_to_address(&mut self, address: &str, amount: u64) -> Result<String> {
        let amount = Amount::from_sat(amount).to_string_in(Denomination::Bitcoin);
        self.call(&["sendtoaddress", address, &amount])
    }

    fn load_or_create_wallet(&mut self, name: &str) -> Result<()> {
        self.wallet = None;
        if let Err(load_err) = self.call(&["loadwallet", name]) {
            log::debug!("loadwallet {}: {}", name, load_err);
            if let Err(create_err) = self.call(&["createwallet", name]) {
                // Already loaded wallets fail both calls
                log::warn!("createwallet {}: {}", name, create_err);
            }
        }
        self.wallet = Some(name.to_string());
        Ok(())
    }

    fn unload_wallet(&mut self, name: &str) -> Result<()> {
        self.wallet = None;
        self.call(&["unloadwallet", name]).map(|_| ())
    }
}
