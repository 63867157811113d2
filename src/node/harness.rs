//! Regtest scenario: fund a Taproot output, spend it through the key path,
//! then spend the change through the script path.
//!
//! The output commits to two leaves: a single-key `OP_CHECKSIG` leaf and a
//! 2-of-2 `OP_CHECKSIGADD` leaf. The script path spend uses the first one.

use bitcoin::Network;

use crate::error::{Result, TaprootError};
use crate::flags::sighash::Prevouts;
use crate::node::NodeClient;
use crate::script::Script;
use crate::taproot::p2tr::{InputSpend, SpendPath, TaprootSigner};
use crate::taproot::schnorr::TaprootOutputKey;
use crate::taproot::taptree::TapTree;
use crate::taproot::verify::verify_transaction;
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utils::*;

/// A node handle with a loaded wallet; the wallet is unloaded on drop
pub struct NodeSession<'a, C: NodeClient + ?Sized> {
    client: &'a mut C,
    wallet: String,
}

impl<'a, C: NodeClient + ?Sized> NodeSession<'a, C> {
    pub fn open(client: &'a mut C, wallet: &str) -> Result<Self> {
        client.load_or_create_wallet(wallet)?;
        log::info!("wallet {} loaded", wallet);
        Ok(Self {
            client,
            wallet: wallet.to_string(),
        })
    }

    pub fn client(&mut self) -> &mut C {
        &mut *self.client
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }
}

impl<C: NodeClient + ?Sized> Drop for NodeSession<'_, C> {
    fn drop(&mut self) {
        match self.client.unload_wallet(&self.wallet) {
            Ok(()) => log::info!("wallet {} unloaded", self.wallet),
            Err(e) => log::warn!("failed to unload wallet {}: {}", self.wallet, e),
        }
    }
}

/// Keys and amounts (in satoshis) for the scenario
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub network: Network,
    pub wallet: String,
    pub internal_key: PrivateKey,
    pub script_keys: [PrivateKey; 2],
    pub destination_keys: [PrivateKey; 2],
    /// Blocks mined up front so the wallet has spendable coins
    pub mature_blocks: u32,
    pub fund_amount: u64,
    pub key_path_amount: u64,
    pub change_amount: u64,
    pub script_path_amount: u64,
}

impl ScenarioParams {
    /// Fresh random keys
    pub fn new(network: Network) -> Self {
        Self {
            network,
            wallet: "mywallet".to_string(),
            internal_key: PrivateKey::generate(),
            script_keys: [PrivateKey::generate(), PrivateKey::generate()],
            destination_keys: [PrivateKey::generate(), PrivateKey::generate()],
            mature_blocks: 101,
            fund_amount: 20_000_000,
            key_path_amount: 9_000_000,
            change_amount: 10_990_000,
            script_path_amount: 10_980_000,
        }
    }

    fn validate(&self) -> Result<()> {
        let key_path_total = self.key_path_amount.checked_add(self.change_amount);
        if key_path_total.map_or(true, |total| total >= self.fund_amount) {
            return Err(TaprootError::InvalidConfig(
                "key path outputs leave no fee".into(),
            ));
        }
        if self.script_path_amount >= self.change_amount {
            return Err(TaprootError::InvalidConfig(
                "script path output leaves no fee".into(),
            ));
        }
        Ok(())
    }

    /// Leaf 0: `<k1> OP_CHECKSIG`; leaf 1: 2-of-2 over `k1`, `k2`
    pub fn tree(&self) -> Result<TapTree> {
        let k1 = self.script_keys[0].public_key().x_only();
        let k2 = self.script_keys[1].public_key().x_only();
        TapTree::from_scripts(vec![
            Script::p2pk_tapscript(&k1),
            Script::multi_a(2, &[k1, k2])?,
        ])
    }
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self::new(Network::Regtest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub taproot_address: String,
    pub output_key_parity: bool,
    pub funding_txid: String,
    pub funding_vout: u32,
    pub key_path_txid: String,
    pub script_path_txid: String,
    /// `None` when the node could not look the spend up after mining it
    pub script_path_confirmations: Option<u32>,
}

/// Run the full fund / key path / script path flow against `client`
pub fn run_scenario<C: NodeClient + ?Sized>(
    client: &mut C,
    params: &ScenarioParams,
    signer: &TaprootSigner,
) -> Result<ScenarioReport> {
    params.validate()?;

    let mut session = NodeSession::open(client, &params.wallet)?;
    let node = session.client();

    // Taproot output
    let tree = params.tree()?;
    let merkle_root = tree.root_hash();
    let internal_pubkey = params.internal_key.public_key();
    let output = TaprootOutputKey::new(&internal_pubkey, Some(&merkle_root))?;
    let taproot_address = output.address(params.network)?;
    let taproot_spk = output.script_pubkey().to_bytes();
    log::info!(
        "taproot address {} (internal key {}, output key odd: {})",
        taproot_address,
        internal_pubkey.to_x_only_hex(),
        output.parity()
    );

    let mining_address = node.get_new_address()?;
    if params.mature_blocks > 0 {
        node.generate_blocks(params.mature_blocks, &mining_address)?;
    }

    // Fund
    let funding_txid = node.send_to_address(&taproot_address, params.fund_amount)?;
    node.generate_blocks(1, &mining_address)?;
    let funding = node.get_transaction_details(&funding_txid)?;
    let funding_output = funding.find_output(&taproot_address).ok_or_else(|| {
        TaprootError::Node(format!("no output to {} in {}", taproot_address, funding_txid))
    })?;
    if funding_output.amount != params.fund_amount {
        return Err(TaprootError::Node(format!(
            "funding output holds {} sat, expected {}",
            funding_output.amount, params.fund_amount
        )));
    }
    let funding_vout = funding_output.vout;
    log::info!("funded {}:{}", funding_txid, funding_vout);

    // Key path spend: destination plus change back to the Taproot output
    let mut key_tx = Transaction::new();
    key_tx.add_input(TxInput::from_txid_hex(&funding_txid, funding_vout)?);
    key_tx.add_output(TxOutput::new(
        params.key_path_amount,
        Script::p2pkh(&params.destination_keys[0].public_key()).to_bytes(),
    ));
    key_tx.add_output(TxOutput::new(params.change_amount, taproot_spk.clone()));

    let key_prevouts = Prevouts::new(vec![taproot_spk.clone()], vec![params.fund_amount]);
    signer.sign_input(
        &mut key_tx,
        &key_prevouts,
        &InputSpend {
            input_index: 0,
            privkey: params.internal_key,
            path: SpendPath::KeyPath {
                merkle_root: Some(merkle_root),
            },
        },
        None,
    )?;
    let key_path_txid = broadcast(node, &key_tx, &key_prevouts)?;
    node.generate_blocks(1, &mining_address)?;
    log::info!("key path spend {} confirmed", key_path_txid);

    // Script path spend of the change output through leaf 0
    let leaf = tree.leaf(0)?.clone();
    let control_block = tree.control_block(0, &internal_pubkey.x_only(), output.parity())?;
    log::debug!("control block {}", control_block.to_hex());

    let mut script_tx = Transaction::new();
    script_tx.add_input(TxInput::from_txid_hex(&key_path_txid, 1)?);
    script_tx.add_output(TxOutput::new(
        params.script_path_amount,
        Script::p2pkh(&params.destination_keys[1].public_key()).to_bytes(),
    ));

    let script_prevouts = Prevouts::new(vec![taproot_spk], vec![params.change_amount]);
    signer.sign_input(
        &mut script_tx,
        &script_prevouts,
        &InputSpend {
            input_index: 0,
            privkey: params.script_keys[0],
            path: SpendPath::ScriptPath {
                leaf,
                control_block,
            },
        },
        None,
    )?;
    let script_path_txid = broadcast(node, &script_tx, &script_prevouts)?;
    node.generate_blocks(1, &mining_address)?;

    // The spend pays outside the wallet, so some nodes cannot report on it
    let confirmations = match node.get_transaction_details(&script_path_txid) {
        Ok(details) => {
            log::info!(
                "script path spend {} has {} confirmations",
                script_path_txid,
                details.confirmations
            );
            Some(details.confirmations)
        }
        Err(e) => {
            log::warn!("script path spend {} broadcast, lookup failed: {}", script_path_txid, e);
            None
        }
    };

    Ok(ScenarioReport {
        taproot_address,
        output_key_parity: output.parity(),
        funding_txid,
        funding_vout,
        key_path_txid,
        script_path_txid,
        script_path_confirmations: confirmations,
    })
}

/// Verify locally, then hand the transaction to the node
fn broadcast<C: NodeClient + ?Sized>(
    node: &mut C,
    tx: &Transaction,
    prevouts: &Prevouts,
) -> Result<String> {
    if !verify_transaction(tx, prevouts)? {
        return Err(TaprootError::SigningKeyMismatch);
    }
    log::debug!("broadcasting {} ({} vbytes)", tx.to_hex(), tx.vsize());

    let txid = node.send_raw_transaction(&tx.serialize())?;
    if txid != tx.txid_hex() {
        log::warn!("node returned txid {}, computed {}", txid, tx.txid_hex());
    }
    Ok(txid)
}
