pub mod address;
pub mod crypto;
pub mod keys;

pub use address::{
    address_to_script_pubkey, p2pkh_address, p2wpkh_address, parse_network,
    script_pubkey_to_address, taproot_address,
};
pub use crypto::{hash160, hash256, pushbytes, read_varint, sha256, tagged_hash, varint_encode};
pub use keys::{
    derive_public_key, tweak_private_key, tweak_public_key, x_only, PrivateKey, PublicKey,
};
