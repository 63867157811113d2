pub mod transaction;
pub mod witness;

pub use transaction::{Transaction, TxInput, TxOutput, DEFAULT_SEQUENCE, DEFAULT_VERSION};
pub use witness::Witness;
