//! Taproot witness verification
//!
//! Covers key path spends and script path spends of single-key
//! `<key> OP_CHECKSIG` leaves. Other tapscripts would need a script
//! interpreter and are reported as `InvalidScript`.

use crate::config::ScriptConfig;
use crate::error::{Result, TaprootError};
use crate::flags::sighash::{Prevouts, SpendType, TaprootSighash};
use crate::script::Script;
use crate::taproot::control_block::ControlBlock;
use crate::taproot::p2tr::Signature;
use crate::taproot::schnorr::schnorr_verify;
use crate::transaction::Transaction;

/// Witness stack with the annex split off
fn split_annex(items: &[Vec<u8>]) -> (&[Vec<u8>], Option<&[u8]>) {
    match items.split_last() {
        Some((last, rest)) if items.len() >= 2 && last.first() == Some(&0x50) => {
            (rest, Some(last.as_slice()))
        }
        _ => (items, None),
    }
}

fn spent_output_key(prevouts: &Prevouts, input_index: usize) -> Result<[u8; 32]> {
    let script_pubkey = prevouts
        .script_pubkeys
        .get(input_index)
        .ok_or(TaprootError::InputIndexOutOfRange {
            index: input_index,
            inputs: prevouts.script_pubkeys.len(),
        })?;
    Script::from_bytes(script_pubkey, &ScriptConfig::default())?
        .taproot_output_key()
        .ok_or_else(|| TaprootError::InvalidScript("spent output is not P2TR".into()))
}

/// Verify the witness of one Taproot input
pub fn verify_input(tx: &Transaction, input_index: usize, prevouts: &Prevouts) -> Result<bool> {
    let witness = tx
        .witness(input_index)
        .ok_or(TaprootError::InputIndexOutOfRange {
            index: input_index,
            inputs: tx.inputs().len(),
        })?;
    let (stack, annex) = split_annex(witness.items());
    let output_key = spent_output_key(prevouts, input_index)?;

    match stack {
        [] => Ok(false),
        [sig] => verify_signature(
            tx,
            input_index,
            prevouts,
            &output_key,
            sig,
            SpendType::KeyPath,
            annex,
        ),
        [args @ .., script, control_block] => {
            let control_block = ControlBlock::decode(control_block)?;
            let script = Script::from_bytes(script, &ScriptConfig::default())?;
            if !control_block.verify_taproot_commitment(&output_key, &script)? {
                log::debug!("input {}: control block does not commit to script", input_index);
                return Ok(false);
            }

            let leaf_key = script.p2pk_key().ok_or_else(|| {
                TaprootError::InvalidScript(format!("cannot evaluate leaf {}", script))
            })?;
            let [sig] = args else {
                return Ok(false);
            };
            let leaf_hash = script.leaf_hash(control_block.leaf_version);
            verify_signature(
                tx,
                input_index,
                prevouts,
                &leaf_key,
                sig,
                SpendType::script_path(leaf_hash),
                annex,
            )
        }
    }
}

/// Verify every input of the transaction
pub fn verify_transaction(tx: &Transaction, prevouts: &Prevouts) -> Result<bool> {
    for input_index in 0..tx.inputs().len() {
        if !verify_input(tx, input_index, prevouts)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn verify_signature(
    tx: &Transaction,
    input_index: usize,
    prevouts: &Prevouts,
    pubkey: &[u8; 32],
    sig: &[u8],
    spend_type: SpendType,
    annex: Option<&[u8]>,
) -> Result<bool> {
    let sig = match Signature::from_bytes(sig) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    let sighash = TaprootSighash::compute(
        tx,
        input_index,
        prevouts,
        sig.sighash_flag(),
        spend_type,
        annex,
    )?;
    schnorr_verify(pubkey, &sighash, sig.schnorr_bytes())
}
