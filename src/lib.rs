//! # Taproot Transaction Library
//!
//! Construction and signing of Taproot (BIP340/341/342) transactions.
//!
//! ## Features
//!
//! - **Keys**
//!   - secp256k1 private/public keys, x-only encoding, WIF
//!   - BIP341 tweaking with explicit even-y normalisation
//!
//! - **Scripts and Trees**
//!   - Tapscript construction (single key, `OP_CHECKSIGADD` multisig)
//!   - TapTree with balanced or explicit branch structure
//!   - Control blocks and commitment checks
//!
//! - **Transactions**
//!   - Segwit serialization, txid/wtxid, weight
//!   - BIP341 signature hash for every hash type, with annex support
//!   - Key path and script path signing, witness assembly and verification
//!
//! - **Node Harness**
//!   - `NodeClient` collaborator and a `bitcoin-cli` implementation
//!   - Regtest fund / key path / script path scenario
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taproot_tx_rust::*;
//!
//! # fn main() -> Result<()> {
//! // Keys
//! let internal = PrivateKey::generate();
//! let leaf_key = PrivateKey::generate();
//!
//! // Tree with one P2PK leaf, and the resulting output
//! let leaf_script = Script::p2pk_tapscript(&leaf_key.public_key().x_only());
//! let tree = TapTree::build(vec![TapLeaf::new(leaf_script.clone())])?;
//! let output = TaprootOutputKey::new(&internal.public_key(), Some(&tree.root_hash()))?;
//! let address = output.address(bitcoin::Network::Regtest)?;
//!
//! // Spend it through the script path
//! let mut tx = Transaction::new();
//! tx.add_input(TxInput::from_txid_hex(&"00".repeat(32), 0)?);
//! tx.add_output(TxOutput::new(19_000_000, output.script_pubkey().to_bytes()));
//!
//! let prevouts = Prevouts::new(vec![output.script_pubkey().to_bytes()], vec![20_000_000]);
//! let control_block = tree.control_block(0, &internal.public_key().x_only(), output.parity())?;
//! TaprootSigner::default().sign_input(
//!     &mut tx,
//!     &prevouts,
//!     &InputSpend {
//!         input_index: 0,
//!         privkey: leaf_key,
//!         path: SpendPath::ScriptPath {
//!             leaf: tree.leaf(0)?.clone(),
//!             control_block,
//!         },
//!     },
//!     None,
//! )?;
//!
//! println!("{} -> {}", address, tx.to_hex());
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety
//!
//! ⚠️ **Educational Purpose Only**: This library is designed for learning and testing.
//! Do not use in production without thorough security review and testing.
//!
//! ## Testing with Bitcoin Core
//!
//! ```bash
//! # Start Bitcoin Core in regtest mode
//! bitcoind -regtest -daemon
//! ```
//!
//! then call [`node::run_scenario`] with a [`node::BitcoinCli`].

pub mod config;
pub mod error;
pub mod flags;
pub mod node;
pub mod script;
pub mod taproot;
pub mod transaction;
pub mod utils;

pub use config::*;
pub use error::{Result, TaprootError};
pub use flags::*;
pub use script::{Script, ScriptElement};
pub use taproot::*;
pub use transaction::{Transaction, TxInput, TxOutput, Witness};
pub use utils::*;
