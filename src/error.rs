//! Error taxonomy shared by every module of the crate.

use thiserror::Error;

/// Errors returned by key, script, tree, sighash and signing operations.
///
/// Nothing is retried or silently corrected internally; a failed operation
/// leaves its inputs untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaprootError {
    #[error("invalid private key: scalar must be in [1, n-1]")]
    InvalidKey,

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("tweak produced an invalid key")]
    InvalidTweak,

    #[error("invalid leaf version 0x{0:02x}")]
    InvalidLeafVersion(u8),

    #[error("tap tree must contain at least one leaf")]
    EmptyTree,

    #[error("tap tree deeper than {0} levels")]
    TreeTooDeep(usize),

    #[error("leaf index {index} out of range for tree with {leaves} leaves")]
    LeafIndexOutOfRange { index: usize, leaves: usize },

    #[error("invalid control block: {0}")]
    InvalidControlBlock(String),

    #[error("non-minimal push at script offset {0}")]
    NonMinimalPush(usize),

    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("transaction has {inputs} inputs but {scripts} prevout scripts and {amounts} prevout amounts were supplied")]
    InputCountMismatch {
        inputs: usize,
        scripts: usize,
        amounts: usize,
    },

    #[error("input index {index} out of range for transaction with {inputs} inputs")]
    InputIndexOutOfRange { index: usize, inputs: usize },

    #[error("sighash computation failed: {0}")]
    SighashComputationError(String),

    #[error("signature does not verify against the signing key")]
    SigningKeyMismatch,

    #[error("invalid transaction encoding: {0}")]
    InvalidTransaction(String),

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("node error: {0}")]
    Node(String),
}

pub type Result<T> = std::result::Result<T, TaprootError>;
