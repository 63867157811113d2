//! BIP340 Schnorr signatures and BIP341 key tweaking

use bitcoin::Network;
use secp256k1::schnorr::Signature;
use secp256k1::{Keypair, Message, Secp256k1, XOnlyPublicKey};

use crate::error::{Result, TaprootError};
use crate::script::Script;
use crate::utils::*;

/// Sign a message hash using Schnorr signature (BIP340)
///
/// Without auxiliary randomness the signature is deterministic.
pub fn schnorr_sign(
    privkey: &PrivateKey,
    msg_hash: &[u8; 32],
    aux_rand: Option<&[u8; 32]>,
) -> Result<[u8; 64]> {
    let secp = Secp256k1::new();
    let keypair = Keypair::from_secret_key(&secp, privkey.secret_key());
    let message = Message::from_digest_slice(msg_hash)
        .map_err(|e| TaprootError::SighashComputationError(e.to_string()))?;

    let sig = match aux_rand {
        Some(aux) => secp.sign_schnorr_with_aux_rand(&message, &keypair, aux),
        None => secp.sign_schnorr_no_aux_rand(&message, &keypair),
    };

    let mut out = [0u8; 64];
    out.copy_from_slice(sig.as_ref());
    Ok(out)
}

/// Verify Schnorr signature (BIP340)
pub fn schnorr_verify(pubkey: &[u8; 32], msg_hash: &[u8; 32], signature: &[u8]) -> Result<bool> {
    let secp = Secp256k1::verification_only();
    let xonly_pubkey =
        XOnlyPublicKey::from_slice(pubkey).map_err(|_| TaprootError::InvalidPublicKey)?;
    let message = Message::from_digest_slice(msg_hash)
        .map_err(|e| TaprootError::SighashComputationError(e.to_string()))?;
    let sig = match Signature::from_slice(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    Ok(secp.verify_schnorr(&sig, &message, &xonly_pubkey).is_ok())
}

/// Compute taptweak for a public key (BIP341)
/// taptweak = tagged_hash("TapTweak", pubkey || merkle_root)
pub fn compute_taptweak(internal_pubkey: &[u8; 32], merkle_root: Option<&[u8; 32]>) -> [u8; 32] {
    let mut data = internal_pubkey.to_vec();
    if let Some(root) = merkle_root {
        data.extend_from_slice(root);
    }
    tagged_hash("TapTweak", &data)
}

/// Negate the key if its public point has an odd y coordinate, so that it
/// matches the x-only internal key used in the tweak
pub fn even_y_private_key(privkey: &PrivateKey) -> PrivateKey {
    if privkey.public_key().has_odd_y() {
        privkey.negate()
    } else {
        *privkey
    }
}

/// Tweaked output key and its parity for an internal key and optional
/// script tree root
pub fn output_key(
    internal_key: &PublicKey,
    merkle_root: Option<&[u8; 32]>,
) -> Result<(PublicKey, bool)> {
    let internal_x = internal_key.x_only();
    // P is the even-y point with the internal key's x coordinate
    let lifted = PublicKey::from_x_only(&internal_x)?;
    let tweak = compute_taptweak(&internal_x, merkle_root);
    tweak_public_key(&lifted, &tweak)
}

/// Private key for the key path of `output_key(internal, merkle_root)`
pub fn output_private_key(
    internal_privkey: &PrivateKey,
    merkle_root: Option<&[u8; 32]>,
) -> Result<PrivateKey> {
    let normalized = even_y_private_key(internal_privkey);
    let tweak = compute_taptweak(&normalized.public_key().x_only(), merkle_root);
    tweak_private_key(&normalized, &tweak)
}

/// A Taproot output: internal key, optional tree root and the tweaked key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaprootOutputKey {
    pub internal_key: [u8; 32],
    pub merkle_root: Option<[u8; 32]>,
    output_key: PublicKey,
}

impl TaprootOutputKey {
    pub fn new(internal_key: &PublicKey, merkle_root: Option<&[u8; 32]>) -> Result<Self> {
        let (tweaked, _) = output_key(internal_key, merkle_root)?;
        Ok(Self {
            internal_key: internal_key.x_only(),
            merkle_root: merkle_root.copied(),
            output_key: tweaked,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.output_key
    }

    pub fn x_only(&self) -> [u8; 32] {
        self.output_key.x_only()
    }

    /// Whether the output point has an odd y coordinate; recorded in the
    /// control block
    pub fn parity(&self) -> bool {
        self.output_key.has_odd_y()
    }

    pub fn script_pubkey(&self) -> Script {
        Script::p2tr(&self.x_only())
    }

    pub fn address(&self, network: Network) -> Result<String> {
        taproot_address(&self.x_only(), network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odd_y_key() -> PrivateKey {
        (1..=u8::MAX)
            .map(|b| PrivateKey::from_bytes(&[b; 32]).unwrap())
            .find(|k| k.public_key().has_odd_y())
            .unwrap()
    }

    fn even_y_key() -> PrivateKey {
        (1..=u8::MAX)
            .map(|b| PrivateKey::from_bytes(&[b; 32]).unwrap())
            .find(|k| !k.public_key().has_odd_y())
            .unwrap()
    }

    #[test]
    fn test_schnorr_sign_verify() {
        let privkey = PrivateKey::from_bytes(&[0x01u8; 32]).unwrap();
        let pubkey = privkey.public_key().x_only();
        let msg_hash = [0x42u8; 32];

        let signature = schnorr_sign(&privkey, &msg_hash, None).unwrap();
        assert!(schnorr_verify(&pubkey, &msg_hash, &signature).unwrap());
        assert!(!schnorr_verify(&pubkey, &[0x43u8; 32], &signature).unwrap());
        assert!(!schnorr_verify(&pubkey, &msg_hash, &signature[..63]).unwrap());

        // deterministic without aux randomness
        assert_eq!(signature, schnorr_sign(&privkey, &msg_hash, None).unwrap());
        let randomized = schnorr_sign(&privkey, &msg_hash, Some(&[0x07; 32])).unwrap();
        assert_ne!(signature, randomized);
        assert!(schnorr_verify(&pubkey, &msg_hash, &randomized).unwrap());
    }

    #[test]
    fn test_bip340_vector_0() {
        let mut secret = [0u8; 32];
        secret[31] = 3;
        let privkey = PrivateKey::from_bytes(&secret).unwrap();
        assert_eq!(
            hex::encode(privkey.public_key().x_only()),
            "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9"
        );

        let sig = schnorr_sign(&privkey, &[0u8; 32], Some(&[0u8; 32])).unwrap();
        assert_eq!(
            hex::encode(sig),
            "e907831f80848d1069a5371b402410364bdf1c5f8307b0084c55f1ce2dca8215\
             25f66a4a85ea8b71e482a74f382d2ce5ebeee8fdb2172f477df4900d310536c0"
        );
    }

    #[test]
    fn test_bip341_key_path_only_vector() {
        let internal = hex::decode("d6889cb081036e0faefa3a35157ad71086b123b2b144b649798b494c300a961d")
            .unwrap();
        let internal = PublicKey::from_x_only(&internal.try_into().unwrap()).unwrap();

        let output = TaprootOutputKey::new(&internal, None).unwrap();
        assert_eq!(
            hex::encode(output.x_only()),
            "53a1f6e454df1aa2776a2814a721372d6258050de330b3c6d10ee8f4e0dda343"
        );
        assert_eq!(
            output.address(Network::Bitcoin).unwrap(),
            "bc1p2wsldez5mud2yam29q22wgfh9439spgduvct83k3pm50fcxa5dps59h4z5"
        );
    }

    #[test]
    fn test_even_y_normalization() {
        let odd = odd_y_key();
        let normalized = even_y_private_key(&odd);
        assert_ne!(normalized, odd);
        assert!(!normalized.public_key().has_odd_y());
        assert_eq!(normalized.public_key().x_only(), odd.public_key().x_only());

        let even = even_y_key();
        assert_eq!(even_y_private_key(&even), even);
    }

    #[test]
    fn test_tweak_consistency() {
        let roots = [None, Some([0x02u8; 32]), Some([0xabu8; 32])];
        for privkey in [odd_y_key(), even_y_key()] {
            for root in roots.iter() {
                let (tweaked, parity) = output_key(&privkey.public_key(), root.as_ref()).unwrap();
                let tweaked_priv = output_private_key(&privkey, root.as_ref()).unwrap();

                // The private tweak lands on the same point as the public one
                assert_eq!(tweaked_priv.public_key(), tweaked);
                assert_eq!(parity, tweaked.has_odd_y());

                let msg = [0x5au8; 32];
                let sig = schnorr_sign(&tweaked_priv, &msg, None).unwrap();
                assert!(schnorr_verify(&tweaked.x_only(), &msg, &sig).unwrap());
            }
        }
    }

    #[test]
    fn test_odd_internal_key_without_normalization_fails() {
        let privkey = odd_y_key();
        let tweak = compute_taptweak(&privkey.public_key().x_only(), None);
        let naive = tweak_private_key(&privkey, &tweak).unwrap();
        let (tweaked, _) = output_key(&privkey.public_key(), None).unwrap();
        assert_ne!(naive.public_key().x_only(), tweaked.x_only());
    }

    #[test]
    fn test_taptweak_computation() {
        let internal_pubkey = [0x02u8; 32];
        let merkle_root = [0x03u8; 32];

        let with_root = compute_taptweak(&internal_pubkey, Some(&merkle_root));
        let without = compute_taptweak(&internal_pubkey, None);
        assert_ne!(with_root, without);
        assert_eq!(without, tagged_hash("TapTweak", &internal_pubkey));
    }
}
