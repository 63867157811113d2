//! Control block for script path spends
//!
//! control_block = (leaf_version | parity) || internal_key || merkle_path

use crate::error::{Result, TaprootError};
use crate::script::Script;
use crate::taproot::schnorr::output_key;
use crate::taproot::taptree::{compute_root_from_proof, TAPROOT_CONTROL_MAX_NODE_COUNT};
use crate::utils::PublicKey;

const CONTROL_BLOCK_BASE_SIZE: usize = 33;
const NODE_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    pub leaf_version: u8,
    /// Whether the tweaked output key has an odd y coordinate
    pub output_key_parity: bool,
    /// x-only internal key
    pub internal_key: [u8; 32],
    pub merkle_branch: Vec<[u8; 32]>,
}

impl ControlBlock {
    /// Fails with `InvalidLeafVersion` if the low bit of `leaf_version` is
    /// set, since that bit carries the output key parity
    pub fn new(
        leaf_version: u8,
        output_key_parity: bool,
        internal_key: [u8; 32],
        merkle_branch: Vec<[u8; 32]>,
    ) -> Result<Self> {
        if leaf_version & 0x01 != 0 {
            return Err(TaprootError::InvalidLeafVersion(leaf_version));
        }
        Ok(Self {
            leaf_version,
            output_key_parity,
            internal_key,
            merkle_branch,
        })
    }

    pub fn size(&self) -> usize {
        CONTROL_BLOCK_BASE_SIZE + NODE_SIZE * self.merkle_branch.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let version_byte = (self.leaf_version & 0xfe) | u8::from(self.output_key_parity);

        let mut control_block = Vec::with_capacity(self.size());
        control_block.push(version_byte);
        control_block.extend_from_slice(&self.internal_key);
        for hash in &self.merkle_branch {
            control_block.extend_from_slice(hash);
        }

        control_block
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONTROL_BLOCK_BASE_SIZE
            || (bytes.len() - CONTROL_BLOCK_BASE_SIZE) % NODE_SIZE != 0
        {
            return Err(TaprootError::InvalidControlBlock(format!(
                "length {} is not 33 + 32k",
                bytes.len()
            )));
        }

        let node_count = (bytes.len() - CONTROL_BLOCK_BASE_SIZE) / NODE_SIZE;
        if node_count > TAPROOT_CONTROL_MAX_NODE_COUNT {
            return Err(TaprootError::InvalidControlBlock(format!(
                "{} merkle nodes exceeds {}",
                node_count, TAPROOT_CONTROL_MAX_NODE_COUNT
            )));
        }

        let mut internal_key = [0u8; 32];
        internal_key.copy_from_slice(&bytes[1..CONTROL_BLOCK_BASE_SIZE]);
        PublicKey::from_x_only(&internal_key)
            .map_err(|_| TaprootError::InvalidControlBlock("invalid internal key".into()))?;

        let merkle_branch = bytes[CONTROL_BLOCK_BASE_SIZE..]
            .chunks_exact(NODE_SIZE)
            .map(|chunk| {
                let mut node = [0u8; 32];
                node.copy_from_slice(chunk);
                node
            })
            .collect();

        Ok(Self {
            leaf_version: bytes[0] & 0xfe,
            output_key_parity: bytes[0] & 0x01 == 1,
            internal_key,
            merkle_branch,
        })
    }

    /// Merkle root committed to by this block for the given leaf hash
    pub fn root_for(&self, leaf_hash: &[u8; 32]) -> [u8; 32] {
        compute_root_from_proof(leaf_hash, &self.merkle_branch)
    }

    /// Check that `script` is committed to by `output_key` through this
    /// control block (BIP341 script path validation)
    pub fn verify_taproot_commitment(&self, output_key_x: &[u8; 32], script: &Script) -> Result<bool> {
        let root = self.root_for(&script.leaf_hash(self.leaf_version));
        let internal = PublicKey::from_x_only(&self.internal_key)?;
        let (tweaked, parity) = output_key(&internal, Some(&root))?;
        Ok(&tweaked.x_only() == output_key_x && parity == self.output_key_parity)
    }
}
