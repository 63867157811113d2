//! Node collaborator interface
//!
//! The signing core never talks to a node. Broadcasting, funding and block
//! generation go through a [`NodeClient`] handle supplied by the caller.

pub mod cli;
pub mod harness;

pub use cli::BitcoinCli;
pub use harness::{run_scenario, NodeSession, ScenarioParams, ScenarioReport};

use crate::error::Result;

/// One output of a transaction as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDetail {
    pub address: Option<String>,
    pub amount: u64,
    pub vout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionDetails {
    pub outputs: Vec<OutputDetail>,
    pub confirmations: u32,
}

impl TransactionDetails {
    /// First output paying to `address`
    pub fn find_output(&self, address: &str) -> Option<&OutputDetail> {
        self.outputs
            .iter()
            .find(|output| output.address.as_deref() == Some(address))
    }
}

/// Operations the regtest harness needs from a node. Amounts are in
/// satoshis and txids in display hex.
pub trait NodeClient {
    fn send_raw_transaction(&mut self, raw_tx: &[u8]) -> Result<String>;

    fn get_transaction_details(&mut self, txid: &str) -> Result<TransactionDetails>;

    fn generate_blocks(&mut self, count: u32, address: &str) -> Result<Vec<String>>;

    fn get_new_address(&mut self) -> Result<String>;

    fn send_to_address(&mut self, address: &str, amount: u64) -> Result<String>;

    fn load_or_create_wallet(&mut self, name: &str) -> Result<()>;

    fn unload_wallet(&mut self, name: &str) -> Result<()>;
}
