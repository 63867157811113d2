use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{Result, TaprootError};

/// Compute SHA256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute double SHA256 (hash256)
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD160(SHA256(data)) - also known as hash160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(sha);
    hasher.finalize().into()
}

/// Compute a BIP-340 tagged hash: SHA256(SHA256(tag) || SHA256(tag) || data)
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a compact-size integer (Bitcoin varint)
pub fn varint_encode(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut v = vec![0xfd];
        v.extend_from_slice(&(n as u16).to_le_bytes());
        v
    } else if n <= 0xffffffff {
        let mut v = vec![0xfe];
        v.extend_from_slice(&(n as u32).to_le_bytes());
        v
    } else {
        let mut v = vec![0xff];
        v.extend_from_slice(&n.to_le_bytes());
        v
    }
}

/// Decode a compact-size integer, returning `(value, bytes consumed)`.
///
/// Non-canonical encodings (a wider prefix than the value needs) are
/// rejected, matching consensus deserialization.
pub fn read_varint(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data.first().ok_or(TaprootError::UnexpectedEof)?;

    let (value, width, min) = match first {
        0xfd => (read_le(data, 2)?, 3, 0xfd),
        0xfe => (read_le(data, 4)?, 5, 0x10000),
        0xff => (read_le(data, 8)?, 9, 0x100000000),
        n => return Ok((n as u64, 1)),
    };

    if value < min {
        return Err(TaprootError::InvalidTransaction(
            "non-canonical compact size".to_string(),
        ));
    }
    Ok((value, width))
}

fn read_le(data: &[u8], len: usize) -> Result<u64> {
    let bytes = data.get(1..1 + len).ok_or(TaprootError::UnexpectedEof)?;
    let mut buf = [0u8; 8];
    buf[..len].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

/// Prefix data with its compact-size length
pub fn pushbytes(data: &[u8]) -> Vec<u8> {
    let mut result = varint_encode(data.len() as u64);
    result.extend_from_slice(data);
    result
}
