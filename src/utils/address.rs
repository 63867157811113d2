use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::key::TweakedPublicKey;
use bitcoin::network::Network;
use bitcoin::XOnlyPublicKey;

use crate::error::{Result, TaprootError};
use crate::utils::keys::PublicKey;

/// Map a network name to a `bitcoin::Network`
pub fn parse_network(network: &str) -> Result<Network> {
    match network {
        "mainnet" | "bitcoin" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        other => Err(TaprootError::InvalidConfig(format!(
            "unknown network: {}",
            other
        ))),
    }
}

/// Convert a 32-byte x-only tweaked output key to a P2TR (bech32m) address
///
/// `output_key` must be the **final tweaked** key, e.g.
/// `TaprootOutputKey::x_only`.
pub fn taproot_address(output_key: &[u8; 32], network: Network) -> Result<String> {
    let xonly =
        XOnlyPublicKey::from_slice(output_key).map_err(|_| TaprootError::InvalidPublicKey)?;
    let tweaked = TweakedPublicKey::dangerous_assume_tweaked(xonly);
    Ok(Address::p2tr_tweaked(tweaked, network).to_string())
}

/// Legacy P2PKH address of a compressed public key
pub fn p2pkh_address(pubkey: &PublicKey, network: Network) -> String {
    let pubkey = bitcoin::PublicKey::new(*pubkey.inner());
    Address::p2pkh(&pubkey, network).to_string()
}

/// Native SegWit v0 P2WPKH address of a compressed public key
pub fn p2wpkh_address(pubkey: &PublicKey, network: Network) -> Result<String> {
    let pubkey = bitcoin::PublicKey::new(*pubkey.inner());
    Address::p2wpkh(&pubkey, network)
        .map(|a| a.to_string())
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))
}

/// Decode any standard address into its scriptPubKey, checking the network
pub fn address_to_script_pubkey(address: &str, network: Network) -> Result<Vec<u8>> {
    let addr = address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))?;
    let addr = addr
        .require_network(network)
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))?;
    Ok(addr.script_pubkey().to_bytes())
}

/// Render a standard scriptPubKey as an address
pub fn script_pubkey_to_address(script_pubkey: &[u8], network: Network) -> Result<String> {
    let script = bitcoin::Script::from_bytes(script_pubkey);
    Address::from_script(script, network)
        .map(|a| a.to_string())
        .map_err(|e| TaprootError::InvalidAddress(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::keys::PrivateKey;

    #[test]
    fn test_parse_network() {
        assert_eq!(parse_network("regtest").unwrap(), Network::Regtest);
        assert_eq!(parse_network("mainnet").unwrap(), Network::Bitcoin);
        assert!(parse_network("moonnet").is_err());
    }

    #[test]
    fn test_p2wpkh_address() {
        let pubkey = PrivateKey::from_bytes(&[0x11u8; 32]).unwrap().public_key();
        let address = p2wpkh_address(&pubkey, Network::Regtest).unwrap();
        assert_eq!(address, "bcrt1ql3e9pgs3mmwuwrh95fecme0s0qtn2880hlwwpw");
    }

    #[test]
    fn test_taproot_address_roundtrip() {
        let output_key = PrivateKey::from_bytes(&[0x44u8; 32])
            .unwrap()
            .public_key()
            .x_only();
        let address = taproot_address(&output_key, Network::Regtest).unwrap();
        assert!(address.starts_with("bcrt1p"));

        let spk = address_to_script_pubkey(&address, Network::Regtest).unwrap();
        assert_eq!(&spk[..2], &[0x51, 0x20]);
        assert_eq!(&spk[2..], &output_key[..]);
        assert_eq!(script_pubkey_to_address(&spk, Network::Regtest).unwrap(), address);
    }

    #[test]
    fn test_taproot_address_from_output_key() {
        let internal = PrivateKey::from_bytes(&[0x45u8; 32]).unwrap().public_key();
        let output = crate::taproot::TaprootOutputKey::new(&internal, Some(&[0x07u8; 32])).unwrap();
        assert_eq!(
            taproot_address(&output.x_only(), Network::Regtest).unwrap(),
            output.address(Network::Regtest).unwrap()
        );
        assert_ne!(
            taproot_address(&internal.x_only(), Network::Regtest).unwrap(),
            output.address(Network::Regtest).unwrap()
        );
    }

    #[test]
    fn test_wrong_network_rejected() {
        let pubkey = PrivateKey::from_bytes(&[0x11u8; 32]).unwrap().public_key();
        let address = p2pkh_address(&pubkey, Network::Bitcoin);
        assert!(address.starts_with('1'));
        assert!(address_to_script_pubkey(&address, Network::Regtest).is_err());
    }
}
