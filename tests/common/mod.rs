//! In-memory node used by the harness tests
//!
//! Tracks a UTXO set and refuses any transaction whose Taproot witnesses do
//! not verify against the outputs they spend.

#![allow(dead_code)]

use std::collections::HashMap;

use bitcoin::Network;
use taproot_tx_rust::node::{NodeClient, OutputDetail, TransactionDetails};
use taproot_tx_rust::*;

pub struct MockNode {
    network: Network,
    height: u32,
    utxos: HashMap<(String, u32), TxOutput>,
    transactions: HashMap<String, (Transaction, Option<u32>)>,
    mempool: Vec<String>,
    wallet: Option<String>,
    counter: u8,
    pub unloaded: Vec<String>,
    pub reject_broadcasts: bool,
    /// Only report transactions the wallet sent, like a node without
    /// `-txindex`
    pub wallet_lookups_only: bool,
    sent: Vec<String>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            network: Network::Regtest,
            height: 0,
            utxos: HashMap::new(),
            transactions: HashMap::new(),
            mempool: Vec::new(),
            wallet: None,
            counter: 0,
            unloaded: Vec::new(),
            reject_broadcasts: false,
            wallet_lookups_only: false,
            sent: Vec::new(),
        }
    }

    pub fn wallet(&self) -> Option<&str> {
        self.wallet.as_deref()
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn utxo(&self, txid: &str, vout: u32) -> Option<&TxOutput> {
        self.utxos.get(&(txid.to_string(), vout))
    }

    fn require_wallet(&self) -> Result<()> {
        match self.wallet {
            Some(_) => Ok(()),
            None => Err(TaprootError::Node("no wallet loaded".into())),
        }
    }

    fn next_key(&mut self) -> PrivateKey {
        self.counter += 1;
        PrivateKey::from_bytes(&[self.counter; 32]).unwrap()
    }

    fn accept(&mut self, tx: Transaction) -> String {
        let txid = tx.txid_hex();
        for input in tx.inputs() {
            self.utxos.remove(&(hex::encode(input.txid), input.vout));
        }
        for (vout, output) in tx.outputs().iter().enumerate() {
            self.utxos
                .insert((txid.clone(), vout as u32), output.clone());
        }
        self.transactions.insert(txid.clone(), (tx, None));
        self.mempool.push(txid.clone());
        txid
    }
}

impl NodeClient for MockNode {
    fn send_raw_transaction(&mut self, raw_tx: &[u8]) -> Result<String> {
        if self.reject_broadcasts {
            return Err(TaprootError::Node("broadcast rejected".into()));
        }

        let tx = Transaction::deserialize(raw_tx)?;
        let mut spent = Vec::new();
        for input in tx.inputs() {
            let prevout = self
                .utxo(&hex::encode(input.txid), input.vout)
                .ok_or_else(|| TaprootError::Node("bad-txns-inputs-missingorspent".into()))?;
            spent.push(prevout.clone());
        }

        let input_total: u64 = spent.iter().map(|o| o.amount).sum();
        let output_total: u64 = tx.outputs().iter().map(|o| o.amount).sum();
        if output_total > input_total {
            return Err(TaprootError::Node("bad-txns-in-belowout".into()));
        }

        let prevouts = Prevouts::from_outputs(&spent);
        if !verify_transaction(&tx, &prevouts)? {
            return Err(TaprootError::Node(
                "mandatory-script-verify-flag-failed".into(),
            ));
        }

        Ok(self.accept(tx))
    }

    fn get_transaction_details(&mut self, txid: &str) -> Result<TransactionDetails> {
        if self.wallet_lookups_only && !self.sent.iter().any(|sent| sent == txid) {
            return Err(TaprootError::Node(format!(
                "Invalid or non-wallet transaction id {}",
                txid
            )));
        }
        let (tx, included) = self
            .transactions
            .get(txid)
            .ok_or_else(|| TaprootError::Node(format!("unknown transaction {}", txid)))?;

        let outputs = tx
            .outputs()
            .iter()
            .enumerate()
            .map(|(vout, output)| OutputDetail {
                address: script_pubkey_to_address(&output.script_pubkey, self.network).ok(),
                amount: output.amount,
                vout: vout as u32,
            })
            .collect();

        Ok(TransactionDetails {
            outputs,
            confirmations: included.map_or(0, |h| self.height - h + 1),
        })
    }

    fn generate_blocks(&mut self, count: u32, _address: &str) -> Result<Vec<String>> {
        let first = self.height + 1;
        self.height += count;
        for txid in self.mempool.drain(..) {
            if let Some((_, included)) = self.transactions.get_mut(&txid) {
                *included = Some(first);
            }
        }
        Ok((first..=self.height).map(|h| format!("{:064x}", h)).collect())
    }

    fn get_new_address(&mut self) -> Result<String> {
        self.require_wallet()?;
        let key = self.next_key();
        p2wpkh_address(&key.public_key(), self.network)
    }

    /// Funding transaction with wallet change at vout 0 and the payment at
    /// vout 1
    fn send_to_address(&mut self, address: &str, amount: u64) -> Result<String> {
        self.require_wallet()?;
        let script_pubkey = address_to_script_pubkey(address, self.network)?;
        let change = Script::p2wpkh(&self.next_key().public_key()).to_bytes();

        let mut tx = Transaction::new();
        tx.add_input(TxInput::new([self.counter; 32], 0));
        tx.add_output(TxOutput::new(5_000_000_000 - amount - 1_000, change));
        tx.add_output(TxOutput::new(amount, script_pubkey));
        let txid = self.accept(tx);
        self.sent.push(txid.clone());
        Ok(txid)
    }

    fn load_or_create_wallet(&mut self, name: &str) -> Result<()> {
        self.wallet = Some(name.to_string());
        Ok(())
    }

    fn unload_wallet(&mut self, name: &str) -> Result<()> {
        if self.wallet.as_deref() != Some(name) {
            return Err(TaprootError::Node(format!("wallet {} is not loaded", name)));
        }
        self.wallet = None;
        self.unloaded.push(name.to_string());
        Ok(())
    }
}
