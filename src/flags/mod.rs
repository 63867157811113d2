pub mod sighash;

pub use sighash::{Prevouts, SighashFlag, SpendType, TaprootSighash};
