//! secp256k1 key wrappers: derivation, x-only encoding, tweaking and WIF.

use bitcoin::Network;
use rand::rngs::OsRng;
use secp256k1::{Parity, Scalar, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::error::{Result, TaprootError};

/// A secp256k1 private key, range-checked to `[1, n-1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateKey {
    inner: SecretKey,
}

/// A secp256k1 curve point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(&mut OsRng);
        Self { inner: secret_key }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Self::from_slice(bytes)
    }

    /// Parse a 32-byte big-endian scalar; zero and values >= n are rejected
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(TaprootError::InvalidKey);
        }
        SecretKey::from_slice(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| TaprootError::InvalidKey)
    }

    pub fn from_wif(wif: &str) -> Result<Self> {
        let key = bitcoin::PrivateKey::from_wif(wif).map_err(|_| TaprootError::InvalidKey)?;
        Ok(Self { inner: key.inner })
    }

    /// Export as compressed WIF for the given network
    pub fn to_wif(&self, network: Network) -> String {
        bitcoin::PrivateKey::new(self.inner, network).to_wif()
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        derive_public_key(self)
    }

    /// `n - k`
    pub fn negate(&self) -> Self {
        Self {
            inner: self.inner.negate(),
        }
    }

    pub fn add_tweak(&self, tweak: &[u8; 32]) -> Result<Self> {
        tweak_private_key(self, tweak)
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.inner
    }
}

impl PublicKey {
    /// Parse a compressed (33-byte) or uncompressed (65-byte) SEC1 encoding
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        secp256k1::PublicKey::from_slice(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| TaprootError::InvalidPublicKey)
    }

    /// Lift a 32-byte x-only key to the point with even y (BIP340)
    pub fn from_x_only(x_only: &[u8; 32]) -> Result<Self> {
        let xonly = XOnlyPublicKey::from_slice(x_only).map_err(|_| TaprootError::InvalidPublicKey)?;
        Ok(Self {
            inner: xonly.public_key(Parity::Even),
        })
    }

    /// 33-byte compressed encoding
    pub fn serialize(&self) -> [u8; 33] {
        self.inner.serialize()
    }

    /// 32-byte x coordinate; the parity of y is dropped
    pub fn x_only(&self) -> [u8; 32] {
        let (xonly, _) = self.inner.x_only_public_key();
        xonly.serialize()
    }

    pub fn has_odd_y(&self) -> bool {
        let (_, parity) = self.inner.x_only_public_key();
        parity == Parity::Odd
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn to_x_only_hex(&self) -> String {
        hex::encode(self.x_only())
    }

    pub fn add_tweak(&self, tweak: &[u8; 32]) -> Result<(PublicKey, bool)> {
        tweak_public_key(self, tweak)
    }

    pub(crate) fn inner(&self) -> &secp256k1::PublicKey {
        &self.inner
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Derive the public key `k*G`
pub fn derive_public_key(privkey: &PrivateKey) -> PublicKey {
    let secp = Secp256k1::new();
    PublicKey {
        inner: secp256k1::PublicKey::from_secret_key(&secp, &privkey.inner),
    }
}

/// x-only (32-byte) encoding of a public key
pub fn x_only(pubkey: &PublicKey) -> [u8; 32] {
    pubkey.x_only()
}

pub(crate) fn tweak_scalar(tweak: &[u8; 32]) -> Result<Scalar> {
    Scalar::from_be_bytes(*tweak).map_err(|_| TaprootError::InvalidTweak)
}

/// `(privkey + tweak) mod n`; fails when the tweak is out of range or the
/// sum is zero
pub fn tweak_private_key(privkey: &PrivateKey, tweak: &[u8; 32]) -> Result<PrivateKey> {
    let scalar = tweak_scalar(tweak)?;
    privkey
        .inner
        .add_tweak(&scalar)
        .map(|inner| PrivateKey { inner })
        .map_err(|_| TaprootError::InvalidTweak)
}

/// `P + tweak*G`, returning the new point and whether its y is odd
pub fn tweak_public_key(pubkey: &PublicKey, tweak: &[u8; 32]) -> Result<(PublicKey, bool)> {
    let secp = Secp256k1::verification_only();
    let scalar = tweak_scalar(tweak)?;
    let tweaked = pubkey
        .inner
        .add_exp_tweak(&secp, &scalar)
        .map_err(|_| TaprootError::InvalidTweak)?;
    let tweaked = PublicKey { inner: tweaked };
    let parity = tweaked.has_odd_y();
    Ok((tweaked, parity))
}
