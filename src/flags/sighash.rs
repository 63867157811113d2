//! Taproot Signature Hash (BIP341)
//!
//! Every Taproot signature commits to the amounts and scriptPubKeys of *all*
//! inputs being spent, so the sighash is computed from the unsigned
//! transaction together with the full prevout set.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaprootError};
use crate::transaction::{Transaction, TxOutput};
use crate::utils::*;

/// Sighash flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SighashFlag {
    #[default]
    Default = 0x00, // Taproot only
    All = 0x01,
    None = 0x02,
    Single = 0x03,
    AllAnyoneCanPay = 0x81,
    NoneAnyoneCanPay = 0x82,
    SingleAnyoneCanPay = 0x83,
}

impl SighashFlag {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn has_anyonecanpay(self) -> bool {
        matches!(
            self,
            SighashFlag::AllAnyoneCanPay
                | SighashFlag::NoneAnyoneCanPay
                | SighashFlag::SingleAnyoneCanPay
        )
    }

    pub fn base_type(self) -> u8 {
        self.to_u8() & 0x03
    }

    fn commits_to_outputs(self) -> bool {
        self.base_type() != 0x02 && self.base_type() != 0x03
    }

    /// Parse sighash flag from byte
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(SighashFlag::Default),
            0x01 => Ok(SighashFlag::All),
            0x02 => Ok(SighashFlag::None),
            0x03 => Ok(SighashFlag::Single),
            0x81 => Ok(SighashFlag::AllAnyoneCanPay),
            0x82 => Ok(SighashFlag::NoneAnyoneCanPay),
            0x83 => Ok(SighashFlag::SingleAnyoneCanPay),
            _ => Err(TaprootError::SighashComputationError(format!(
                "invalid sighash flag: 0x{:02x}",
                byte
            ))),
        }
    }

    /// Every variant is a valid BIP341 hash type; unknown bytes never
    /// reach this type.
    pub fn is_valid_for_taproot(&self) -> bool {
        matches!(self.to_u8(), 0x00..=0x03 | 0x81..=0x83)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            SighashFlag::Default => "DEFAULT: Taproot default (same as ALL, 64-byte signature)",
            SighashFlag::All => "ALL: Signs all inputs and outputs",
            SighashFlag::None => "NONE: Signs all inputs, no outputs",
            SighashFlag::Single => "SINGLE: Signs all inputs, only corresponding output",
            SighashFlag::AllAnyoneCanPay => "ALL|ANYONECANPAY: Signs one input, all outputs",
            SighashFlag::NoneAnyoneCanPay => "NONE|ANYONECANPAY: Signs one input, no outputs",
            SighashFlag::SingleAnyoneCanPay => {
                "SINGLE|ANYONECANPAY: Signs one input, corresponding output"
            }
        }
    }
}

/// Default position when no OP_CODESEPARATOR was executed
pub const NO_CODESEPARATOR: u32 = 0xffffffff;

/// Which branch of the output is being spent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendType {
    KeyPath,
    ScriptPath {
        leaf_hash: [u8; 32],
        code_separator_pos: u32,
    },
}

impl SpendType {
    pub fn script_path(leaf_hash: [u8; 32]) -> Self {
        SpendType::ScriptPath {
            leaf_hash,
            code_separator_pos: NO_CODESEPARATOR,
        }
    }

    fn ext_flag(&self) -> u8 {
        match self {
            SpendType::KeyPath => 0,
            SpendType::ScriptPath { .. } => 1,
        }
    }
}

/// Amounts and scriptPubKeys of every output spent by a transaction, in
/// input order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prevouts {
    pub script_pubkeys: Vec<Vec<u8>>,
    pub amounts: Vec<u64>,
}

impl Prevouts {
    pub fn new(script_pubkeys: Vec<Vec<u8>>, amounts: Vec<u64>) -> Self {
        Self {
            script_pubkeys,
            amounts,
        }
    }

    pub fn from_outputs(outputs: &[TxOutput]) -> Self {
        Self {
            script_pubkeys: outputs.iter().map(|o| o.script_pubkey.clone()).collect(),
            amounts: outputs.iter().map(|o| o.amount).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    fn check(&self, tx: &Transaction) -> Result<()> {
        let inputs = tx.inputs().len();
        if self.script_pubkeys.len() != inputs || self.amounts.len() != inputs {
            return Err(TaprootError::InputCountMismatch {
                inputs,
                scripts: self.script_pubkeys.len(),
                amounts: self.amounts.len(),
            });
        }
        Ok(())
    }
}

/// BIP341 signature message and hash
pub struct TaprootSighash;

impl TaprootSighash {
    /// Compute the signature hash for one input
    pub fn compute(
        tx: &Transaction,
        input_index: usize,
        prevouts: &Prevouts,
        sighash_flag: SighashFlag,
        spend_type: SpendType,
        annex: Option<&[u8]>,
    ) -> Result<[u8; 32]> {
        let sig_msg = Self::signature_message(
            tx,
            input_index,
            prevouts,
            sighash_flag,
            spend_type,
            annex,
        )?;
        Ok(tagged_hash("TapSighash", &sig_msg))
    }

    /// Key-path sighash with the default flag and no annex
    pub fn key_path(tx: &Transaction, input_index: usize, prevouts: &Prevouts) -> Result<[u8; 32]> {
        Self::compute(
            tx,
            input_index,
            prevouts,
            SighashFlag::Default,
            SpendType::KeyPath,
            None,
        )
    }

    /// Script-path sighash with the default flag and no annex
    pub fn script_path(
        tx: &Transaction,
        input_index: usize,
        prevouts: &Prevouts,
        leaf_hash: [u8; 32],
    ) -> Result<[u8; 32]> {
        Self::compute(
            tx,
            input_index,
            prevouts,
            SighashFlag::Default,
            SpendType::script_path(leaf_hash),
            None,
        )
    }

    /// The preimage of the TapSighash tagged hash
    pub fn signature_message(
        tx: &Transaction,
        input_index: usize,
        prevouts: &Prevouts,
        sighash_flag: SighashFlag,
        spend_type: SpendType,
        annex: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        prevouts.check(tx)?;

        let inputs = tx.inputs();
        let outputs = tx.outputs();
        let input = inputs
            .get(input_index)
            .ok_or(TaprootError::InputIndexOutOfRange {
                index: input_index,
                inputs: inputs.len(),
            })?;

        if let Some(annex) = annex {
            if annex.first() != Some(&0x50) {
                return Err(TaprootError::SighashComputationError(
                    "annex must start with 0x50".into(),
                ));
            }
        }

        let mut sig_msg = Vec::new();

        // Epoch (0x00)
        sig_msg.push(0x00);

        // Sighash type
        sig_msg.push(sighash_flag.to_u8());

        // Version
        sig_msg.extend_from_slice(&tx.version().to_le_bytes());

        // Locktime
        sig_msg.extend_from_slice(&tx.locktime().to_le_bytes());

        if !sighash_flag.has_anyonecanpay() {
            // sha_prevouts
            let mut outpoints = Vec::new();
            for inp in inputs {
                outpoints.extend_from_slice(&inp.outpoint_bytes());
            }
            sig_msg.extend_from_slice(&sha256(&outpoints));

            // sha_amounts
            let mut amounts = Vec::new();
            for amount in &prevouts.amounts {
                amounts.extend_from_slice(&amount.to_le_bytes());
            }
            sig_msg.extend_from_slice(&sha256(&amounts));

            // sha_scriptpubkeys
            let mut scriptpubkeys = Vec::new();
            for spk in &prevouts.script_pubkeys {
                scriptpubkeys.extend_from_slice(&pushbytes(spk));
            }
            sig_msg.extend_from_slice(&sha256(&scriptpubkeys));

            // sha_sequences
            let mut sequences = Vec::new();
            for inp in inputs {
                sequences.extend_from_slice(&inp.sequence.to_le_bytes());
            }
            sig_msg.extend_from_slice(&sha256(&sequences));
        }

        // sha_outputs
        if sighash_flag.commits_to_outputs() {
            let mut outs = Vec::new();
            for output in outputs {
                outs.extend_from_slice(&output.serialize());
            }
            sig_msg.extend_from_slice(&sha256(&outs));
        }

        // spend_type
        let annex_present = u8::from(annex.is_some());
        sig_msg.push(spend_type.ext_flag() * 2 + annex_present);

        if sighash_flag.has_anyonecanpay() {
            sig_msg.extend_from_slice(&input.outpoint_bytes());
            sig_msg.extend_from_slice(&prevouts.amounts[input_index].to_le_bytes());
            sig_msg.extend_from_slice(&pushbytes(&prevouts.script_pubkeys[input_index]));
            sig_msg.extend_from_slice(&input.sequence.to_le_bytes());
        } else {
            sig_msg.extend_from_slice(&(input_index as u32).to_le_bytes());
        }

        if let Some(annex) = annex {
            sig_msg.extend_from_slice(&sha256(&pushbytes(annex)));
        }

        // SINGLE commits to the output at the same index
        if sighash_flag.base_type() == 0x03 {
            let output = outputs.get(input_index).ok_or_else(|| {
                TaprootError::SighashComputationError(format!(
                    "SIGHASH_SINGLE: no output at index {}",
                    input_index
                ))
            })?;
            sig_msg.extend_from_slice(&sha256(&output.serialize()));
        }

        // Script path extension (BIP342)
        if let SpendType::ScriptPath {
            leaf_hash,
            code_separator_pos,
        } = spend_type
        {
            sig_msg.extend_from_slice(&leaf_hash);
            sig_msg.push(0x00); // key_version
            sig_msg.extend_from_slice(&code_separator_pos.to_le_bytes());
        }

        Ok(sig_msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxInput;

    fn two_input_tx() -> (Transaction, Prevouts) {
        let mut tx = Transaction::new();
        tx.add_input(TxInput::new([0x11; 32], 0));
        tx.add_input(TxInput::new([0x22; 32], 1));
        tx.add_output(TxOutput::new(30_000, vec![0x51, 0x20, 0xaa]));
        tx.add_output(TxOutput::new(10_000, vec![0x00, 0x14, 0xbb]));
        let prevouts = Prevouts::new(
            vec![vec![0x51, 0x20, 0x01], vec![0x51, 0x20, 0x02]],
            vec![25_000, 20_000],
        );
        (tx, prevouts)
    }

    #[test]
    fn test_sighash_flag_parsing() {
        assert_eq!(SighashFlag::from_u8(0x01).unwrap(), SighashFlag::All);
        assert_eq!(
            SighashFlag::from_u8(0x81).unwrap(),
            SighashFlag::AllAnyoneCanPay
        );
        assert!(SighashFlag::from_u8(0xFF).is_err());
        assert!(SighashFlag::from_u8(0x80).is_err());
        assert_eq!(SighashFlag::default(), SighashFlag::Default);
        assert!(SighashFlag::SingleAnyoneCanPay.is_valid_for_taproot());
    }

    #[test]
    fn test_message_length() {
        let (tx, prevouts) = two_input_tx();
        let msg = TaprootSighash::signature_message(
            &tx,
            0,
            &prevouts,
            SighashFlag::Default,
            SpendType::KeyPath,
            None,
        )
        .unwrap();
        // 1 + 1 + 4 + 4 + 5*32 + 1 + 4
        assert_eq!(msg.len(), 175);

        let msg = TaprootSighash::signature_message(
            &tx,
            0,
            &prevouts,
            SighashFlag::Default,
            SpendType::script_path([0u8; 32]),
            None,
        )
        .unwrap();
        assert_eq!(msg.len(), 175 + 37);
        assert_eq!(msg[170], 0x02);
    }

    #[test]
    fn test_input_count_mismatch() {
        let (tx, _) = two_input_tx();
        let prevouts = Prevouts::new(vec![vec![0x51]], vec![1, 2]);
        assert_eq!(
            TaprootSighash::key_path(&tx, 0, &prevouts),
            Err(TaprootError::InputCountMismatch {
                inputs: 2,
                scripts: 1,
                amounts: 2
            })
        );
    }

    #[test]
    fn test_input_index_out_of_range() {
        let (tx, prevouts) = two_input_tx();
        assert!(matches!(
            TaprootSighash::key_path(&tx, 2, &prevouts),
            Err(TaprootError::InputIndexOutOfRange { index: 2, inputs: 2 })
        ));
    }

    #[test]
    fn test_sighash_sensitivity() {
        let (tx, prevouts) = two_input_tx();
        let base = TaprootSighash::key_path(&tx, 0, &prevouts).unwrap();

        let mut extra_output = tx.clone();
        extra_output.add_output(TxOutput::new(1, vec![0x6a]));
        assert_ne!(
            base,
            TaprootSighash::key_path(&extra_output, 0, &prevouts).unwrap()
        );

        // one satoshi more on a single output
        for vout in 0..tx.outputs().len() {
            let mut outputs = tx.outputs().to_vec();
            outputs[vout].amount += 1;
            let changed_amount = Transaction::from_parts(tx.inputs().to_vec(), outputs);
            assert_ne!(
                base,
                TaprootSighash::key_path(&changed_amount, 0, &prevouts).unwrap()
            );
            assert_ne!(
                TaprootSighash::script_path(&tx, 0, &prevouts, [0u8; 32]).unwrap(),
                TaprootSighash::script_path(&changed_amount, 0, &prevouts, [0u8; 32]).unwrap()
            );
        }

        let mut other_prevouts = prevouts.clone();
        other_prevouts.script_pubkeys[1] = vec![0x51, 0x20, 0x03];
        assert_ne!(
            base,
            TaprootSighash::key_path(&tx, 0, &other_prevouts).unwrap()
        );

        let mut other_amounts = prevouts.clone();
        other_amounts.amounts[1] += 1;
        assert_ne!(
            base,
            TaprootSighash::key_path(&tx, 0, &other_amounts).unwrap()
        );

        let script = TaprootSighash::script_path(&tx, 0, &prevouts, [0u8; 32]).unwrap();
        assert_ne!(base, script);
        assert_ne!(base, TaprootSighash::key_path(&tx, 1, &prevouts).unwrap());
    }

    #[test]
    fn test_anyonecanpay_ignores_other_inputs() {
        let (tx, prevouts) = two_input_tx();
        let acp = |p: &Prevouts| {
            TaprootSighash::compute(
                &tx,
                0,
                p,
                SighashFlag::AllAnyoneCanPay,
                SpendType::KeyPath,
                None,
            )
            .unwrap()
        };
        let mut other = prevouts.clone();
        other.amounts[1] = 1;
        assert_eq!(acp(&prevouts), acp(&other));
    }

    #[test]
    fn test_single_requires_matching_output() {
        let (mut tx, _) = two_input_tx();
        tx.add_input(TxInput::new([0x33; 32], 2));
        let prevouts = Prevouts::new(vec![vec![0x51]; 3], vec![1; 3]);
        let result = TaprootSighash::compute(
            &tx,
            2,
            &prevouts,
            SighashFlag::Single,
            SpendType::KeyPath,
            None,
        );
        assert!(matches!(
            result,
            Err(TaprootError::SighashComputationError(_))
        ));
    }

    #[test]
    fn test_annex_changes_sighash() {
        let (tx, prevouts) = two_input_tx();
        let plain = TaprootSighash::key_path(&tx, 0, &prevouts).unwrap();
        let with_annex = TaprootSighash::compute(
            &tx,
            0,
            &prevouts,
            SighashFlag::Default,
            SpendType::KeyPath,
            Some(&[0x50, 0x01]),
        )
        .unwrap();
        assert_ne!(plain, with_annex);
        assert!(TaprootSighash::compute(
            &tx,
            0,
            &prevouts,
            SighashFlag::Default,
            SpendType::KeyPath,
            Some(&[0x51]),
        )
        .is_err());
    }
}
