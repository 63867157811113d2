//! Taproot P2TR signing
//!
//! Key-path and script-path signing over the BIP341 sighash, and assembly of
//! the resulting witness stacks.

use crate::config::SignerConfig;
use crate::error::{Result, TaprootError};
use crate::flags::sighash::{Prevouts, SighashFlag, SpendType, TaprootSighash};
use crate::script::{Script, ScriptElement};
use crate::taproot::control_block::ControlBlock;
use crate::taproot::schnorr::{output_key, output_private_key, schnorr_sign, schnorr_verify};
use crate::taproot::taptree::TapLeaf;
use crate::transaction::{Transaction, Witness};
use crate::utils::*;

/// Schnorr signature plus the sighash type it commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    sig: [u8; 64],
    flag: SighashFlag,
}

impl Signature {
    pub fn new(sig: [u8; 64], flag: SighashFlag) -> Self {
        Self { sig, flag }
    }

    pub fn schnorr_bytes(&self) -> &[u8; 64] {
        &self.sig
    }

    pub fn sighash_flag(&self) -> SighashFlag {
        self.flag
    }

    /// 64 bytes for the default sighash, otherwise 65 with the flag appended
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.sig.to_vec();
        if self.flag != SighashFlag::Default {
            bytes.push(self.flag.to_u8());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut sig = [0u8; 64];
        match bytes.len() {
            64 => {
                sig.copy_from_slice(bytes);
                Ok(Self::new(sig, SighashFlag::Default))
            }
            // An explicit 0x00 byte is not allowed (BIP341)
            65 if bytes[64] == 0x00 => Err(TaprootError::InvalidTransaction(
                "explicit SIGHASH_DEFAULT byte".into(),
            )),
            65 => {
                sig.copy_from_slice(&bytes[..64]);
                Ok(Self::new(sig, SighashFlag::from_u8(bytes[64])?))
            }
            len => Err(TaprootError::InvalidTransaction(format!(
                "invalid schnorr signature length {}",
                len
            ))),
        }
    }
}

// Spend Path Enum for Taproot
#[derive(Debug, Clone)]
pub enum SpendPath {
    KeyPath {
        merkle_root: Option<[u8; 32]>,
    },
    ScriptPath {
        leaf: TapLeaf,
        control_block: ControlBlock,
    },
}

/// One input to sign: the key and the branch it spends through
#[derive(Debug, Clone)]
pub struct InputSpend {
    pub input_index: usize,
    /// Internal key for the key path, leaf key for the script path
    pub privkey: PrivateKey,
    pub path: SpendPath,
}

/// Signs Taproot inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct TaprootSigner {
    config: SignerConfig,
}

impl TaprootSigner {
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Sign with the tweaked internal key
    pub fn sign_key_path(
        &self,
        internal_privkey: &PrivateKey,
        tx: &Transaction,
        input_index: usize,
        prevouts: &Prevouts,
        merkle_root: Option<&[u8; 32]>,
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<Signature> {
        let tweaked = output_private_key(internal_privkey, merkle_root)?;
        let sighash = TaprootSighash::compute(
            tx,
            input_index,
            prevouts,
            self.config.sighash_flag,
            SpendType::KeyPath,
            None,
        )?;
        log::debug!("key path sighash for input {}: {}", input_index, hex::encode(sighash));

        let sig = schnorr_sign(&tweaked, &sighash, aux_rand)?;

        if self.config.verify_signatures {
            let (expected, _) = output_key(&internal_privkey.public_key(), merkle_root)?;
            if !schnorr_verify(&expected.x_only(), &sighash, &sig)? {
                return Err(TaprootError::SigningKeyMismatch);
            }
        }

        Ok(Signature::new(sig, self.config.sighash_flag))
    }

    /// Sign a tapscript leaf with an untweaked key
    #[allow(clippy::too_many_arguments)]
    pub fn sign_script_path(
        &self,
        script_privkey: &PrivateKey,
        tx: &Transaction,
        input_index: usize,
        prevouts: &Prevouts,
        leaf_script: &Script,
        leaf_version: u8,
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<Signature> {
        let pubkey = script_privkey.public_key().x_only();
        if self.config.verify_signatures && !references_key(leaf_script, &pubkey) {
            return Err(TaprootError::SigningKeyMismatch);
        }

        let leaf_hash = leaf_script.leaf_hash(leaf_version);
        let sighash = TaprootSighash::compute(
            tx,
            input_index,
            prevouts,
            self.config.sighash_flag,
            SpendType::script_path(leaf_hash),
            None,
        )?;
        log::debug!(
            "script path sighash for input {} (leaf {}): {}",
            input_index,
            hex::encode(leaf_hash),
            hex::encode(sighash)
        );

        let sig = schnorr_sign(script_privkey, &sighash, aux_rand)?;

        if self.config.verify_signatures && !schnorr_verify(&pubkey, &sighash, &sig)? {
            return Err(TaprootError::SigningKeyMismatch);
        }

        Ok(Signature::new(sig, self.config.sighash_flag))
    }

    /// Sign one input and attach its witness. The transaction is left
    /// untouched on failure.
    pub fn sign_input(
        &self,
        tx: &mut Transaction,
        prevouts: &Prevouts,
        spend: &InputSpend,
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<()> {
        let witness = self.witness_for(tx, prevouts, spend, aux_rand)?;
        tx.set_witness(spend.input_index, witness)?;
        log::info!("attached witness to input {}", spend.input_index);
        Ok(())
    }

    /// Sign several inputs; witnesses are attached only if every input signs
    pub fn sign_inputs(
        &self,
        tx: &mut Transaction,
        prevouts: &Prevouts,
        spends: &[InputSpend],
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<()> {
        let witnesses = spends
            .iter()
            .map(|spend| {
                self.witness_for(tx, prevouts, spend, aux_rand)
                    .map(|witness| (spend.input_index, witness))
            })
            .collect::<Result<Vec<_>>>()?;

        for (input_index, witness) in witnesses {
            tx.set_witness(input_index, witness)?;
        }
        log::info!("attached {} witnesses", spends.len());
        Ok(())
    }

    fn witness_for(
        &self,
        tx: &Transaction,
        prevouts: &Prevouts,
        spend: &InputSpend,
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<Witness> {
        if spend.input_index >= tx.inputs().len() {
            return Err(TaprootError::InputIndexOutOfRange {
                index: spend.input_index,
                inputs: tx.inputs().len(),
            });
        }

        match &spend.path {
            SpendPath::KeyPath { merkle_root } => {
                let sig = self.sign_key_path(
                    &spend.privkey,
                    tx,
                    spend.input_index,
                    prevouts,
                    merkle_root.as_ref(),
                    aux_rand,
                )?;
                Ok(key_path_witness(&sig))
            }
            SpendPath::ScriptPath {
                leaf,
                control_block,
            } => {
                let sig = self.sign_script_path(
                    &spend.privkey,
                    tx,
                    spend.input_index,
                    prevouts,
                    &leaf.script,
                    leaf.version,
                    aux_rand,
                )?;
                Ok(script_path_witness(&sig, &leaf.script, control_block))
            }
        }
    }
}

/// Whether the leaf pushes this key; leaves without any 32-byte push
/// (hash locks and the like) are accepted
fn references_key(script: &Script, x_only: &[u8; 32]) -> bool {
    let keys: Vec<&[u8]> = script
        .elements()
        .iter()
        .filter_map(|element| match element {
            ScriptElement::Push(data) if data.len() == 32 => Some(data.as_slice()),
            _ => None,
        })
        .collect();
    keys.is_empty() || keys.iter().any(|key| *key == x_only)
}

/// Key path witness: `[signature]`
pub fn key_path_witness(sig: &Signature) -> Witness {
    Witness::from_items(vec![sig.to_bytes()])
}

/// Script path witness: `[signature, script, control block]`
pub fn script_path_witness(
    sig: &Signature,
    script: &Script,
    control_block: &ControlBlock,
) -> Witness {
    script_path_witness_from_stack(vec![sig.to_bytes()], script, control_block)
}

/// Script path witness with an arbitrary script input stack, e.g. one
/// signature (or empty item) per key of a `multi_a` leaf, last key first
pub fn script_path_witness_from_stack(
    stack: Vec<Vec<u8>>,
    script: &Script,
    control_block: &ControlBlock,
) -> Witness {
    let mut witness = Witness::from_items(stack);
    witness.push(script.to_bytes());
    witness.push(control_block.encode());
    witness
}
