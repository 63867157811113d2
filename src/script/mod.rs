//! Bitcoin scripts as sequences of opcodes and data pushes.
//!
//! A [`Script`] is an immutable value whose identity is its serialized byte
//! encoding. Data pushes built in code are emitted with the smallest push
//! opcode for their length; parsed scripts keep the bytes they were parsed
//! from, non-minimal pushes included. Strict mode ([`ScriptConfig::strict_minimal_push`])
//! additionally rejects pushes that have a dedicated opcode (`OP_1`..`OP_16`,
//! `OP_1NEGATE`) and oversized `OP_PUSHDATAn` encodings when parsing.

pub mod opcodes;

use std::fmt;

use crate::config::ScriptConfig;
use crate::error::{Result, TaprootError};
use crate::utils::{hash160, pushbytes, tagged_hash, PublicKey};
use opcodes::*;

/// One script item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptElement {
    Op(u8),
    Push(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    elements: Vec<ScriptElement>,
    /// Encoding as parsed, kept so non-minimal pushes survive reserialization
    raw: Option<Vec<u8>>,
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Script {}

impl Script {
    pub fn new(elements: Vec<ScriptElement>) -> Self {
        Self {
            elements,
            raw: None,
        }
    }

    /// Build a script from ASM-style tokens: opcode names (`OP_CHECKSIG`,
    /// `OP_2`) or hex-encoded data pushes.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let elements = tokens
            .iter()
            .map(|token| {
                let token = token.as_ref();
                if let Some(op) = opcode_from_name(token) {
                    return Ok(ScriptElement::Op(op));
                }
                hex::decode(token)
                    .map(ScriptElement::Push)
                    .map_err(|_| TaprootError::InvalidScript(format!("unknown token {}", token)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(elements))
    }

    pub fn push_opcode(mut self, op: u8) -> Self {
        if let Some(raw) = self.raw.as_mut() {
            raw.push(op);
        }
        self.elements.push(ScriptElement::Op(op));
        self
    }

    pub fn push_slice(mut self, data: &[u8]) -> Self {
        if let Some(raw) = self.raw.as_mut() {
            encode_push(raw, data);
        }
        self.elements.push(ScriptElement::Push(data.to_vec()));
        self
    }

    /// Push an integer, using `OP_0`/`OP_1NEGATE`/`OP_n` where possible
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(OP_1 + n as u8 - 1),
            _ => self.push_slice(&scriptnum_encode(n)),
        }
    }

    pub fn elements(&self) -> &[ScriptElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Serialized bytes: the parsed encoding if there is one, otherwise
    /// canonical push encodings
    pub fn to_bytes(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut out = Vec::new();
        for element in &self.elements {
            match element {
                ScriptElement::Op(op) => out.push(*op),
                ScriptElement::Push(data) => encode_push(&mut out, data),
            }
        }
        out
    }

    /// Serialize, enforcing minimal pushes when the config is strict
    pub fn serialize_with(&self, config: &ScriptConfig) -> Result<Vec<u8>> {
        if config.strict_minimal_push {
            self.check_minimal()?;
        }
        Ok(self.to_bytes())
    }

    /// Fail with `NonMinimalPush` at the byte offset of the first push that
    /// is not minimal: a single byte that should have been written as
    /// `OP_1`..`OP_16` or `OP_1NEGATE`, or an `OP_PUSHDATAn` used for data
    /// that fits a shorter push opcode
    pub fn check_minimal(&self) -> Result<()> {
        if let Some(raw) = &self.raw {
            return Self::from_bytes(raw, &ScriptConfig { strict_minimal_push: true }).map(|_| ());
        }
        let mut offset = 0;
        for element in &self.elements {
            match element {
                ScriptElement::Op(_) => offset += 1,
                ScriptElement::Push(data) => {
                    if data.len() == 1 && has_dedicated_opcode(data[0]) {
                        return Err(TaprootError::NonMinimalPush(offset));
                    }
                    let mut encoded = Vec::new();
                    encode_push(&mut encoded, data);
                    offset += encoded.len();
                }
            }
        }
        Ok(())
    }

    /// Parse serialized script bytes
    pub fn from_bytes(bytes: &[u8], config: &ScriptConfig) -> Result<Self> {
        let strict = config.strict_minimal_push;
        let mut elements = Vec::new();
        let mut cursor = 0;

        while cursor < bytes.len() {
            let start = cursor;
            let op = bytes[cursor];
            cursor += 1;

            let (len, min_len) = match op {
                0x01..=0x4b => (op as usize, 0),
                OP_PUSHDATA1 => (read_push_len(bytes, &mut cursor, 1)?, 0x4c),
                OP_PUSHDATA2 => (read_push_len(bytes, &mut cursor, 2)?, 0x100),
                OP_PUSHDATA4 => (read_push_len(bytes, &mut cursor, 4)?, 0x10000),
                _ => {
                    elements.push(ScriptElement::Op(op));
                    continue;
                }
            };

            if strict && len < min_len {
                return Err(TaprootError::NonMinimalPush(start));
            }

            let data = bytes
                .get(cursor..cursor + len)
                .ok_or_else(|| TaprootError::InvalidScript("push past end of script".to_string()))?;
            cursor += len;

            if strict && len == 1 && has_dedicated_opcode(data[0]) {
                return Err(TaprootError::NonMinimalPush(start));
            }
            elements.push(ScriptElement::Push(data.to_vec()));
        }

        Ok(Self {
            elements,
            raw: Some(bytes.to_vec()),
        })
    }

    pub fn from_hex(s: &str, config: &ScriptConfig) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| TaprootError::InvalidScript(e.to_string()))?;
        Self::from_bytes(&bytes, config)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// TapLeaf hash: tagged_hash("TapLeaf", leaf_version || compact_size(len) || script)
    pub fn leaf_hash(&self, leaf_version: u8) -> [u8; 32] {
        let mut data = vec![leaf_version];
        data.extend_from_slice(&pushbytes(&self.to_bytes()));
        tagged_hash("TapLeaf", &data)
    }

    /// `<x-only key> OP_CHECKSIG`
    pub fn p2pk_tapscript(x_only: &[u8; 32]) -> Self {
        Script::default().push_slice(x_only).push_opcode(OP_CHECKSIG)
    }

    /// k-of-n tapscript multisig:
    /// `<k1> OP_CHECKSIG <k2> OP_CHECKSIGADD ... <kn> OP_CHECKSIGADD <k> OP_NUMEQUAL`
    pub fn multi_a(threshold: usize, keys: &[[u8; 32]]) -> Result<Self> {
        if keys.is_empty() || threshold == 0 || threshold > keys.len() {
            return Err(TaprootError::InvalidScript(format!(
                "invalid {}-of-{} multisig",
                threshold,
                keys.len()
            )));
        }

        let mut script = Script::default();
        for (i, key) in keys.iter().enumerate() {
            script = script.push_slice(key);
            script = script.push_opcode(if i == 0 { OP_CHECKSIG } else { OP_CHECKSIGADD });
        }
        Ok(script.push_int(threshold as i64).push_opcode(OP_NUMEQUAL))
    }

    /// `OP_1 <32-byte output key>`
    pub fn p2tr(output_key: &[u8; 32]) -> Self {
        Script::default().push_opcode(OP_1).push_slice(output_key)
    }

    /// `OP_DUP OP_HASH160 <hash160(pubkey)> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh(pubkey: &PublicKey) -> Self {
        Script::default()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&hash160(&pubkey.serialize()))
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    }

    /// `OP_0 <hash160(pubkey)>`
    pub fn p2wpkh(pubkey: &PublicKey) -> Self {
        Script::default()
            .push_opcode(OP_0)
            .push_slice(&hash160(&pubkey.serialize()))
    }

    /// The output key if this is a P2TR scriptPubKey
    pub fn taproot_output_key(&self) -> Option<[u8; 32]> {
        match self.elements.as_slice() {
            [ScriptElement::Op(OP_1), ScriptElement::Push(key)] => key.as_slice().try_into().ok(),
            _ => None,
        }
    }

    /// The key if this is a single-key `<x-only> OP_CHECKSIG` tapscript
    pub fn p2pk_key(&self) -> Option<[u8; 32]> {
        match self.elements.as_slice() {
            [ScriptElement::Push(key), ScriptElement::Op(OP_CHECKSIG)] => {
                key.as_slice().try_into().ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for element in &self.elements {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            match element {
                ScriptElement::Op(op) => match opcode_name(*op) {
                    Some(name) => write!(f, "{}", name)?,
                    None => write!(f, "OP_UNKNOWN_0x{:02x}", op)?,
                },
                ScriptElement::Push(data) => write!(f, "{}", hex::encode(data))?,
            }
        }
        Ok(())
    }
}

fn has_dedicated_opcode(byte: u8) -> bool {
    (1..=16).contains(&byte) || byte == 0x81
}

fn encode_push(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len < OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

fn read_push_len(bytes: &[u8], cursor: &mut usize, width: usize) -> Result<usize> {
    let raw = bytes
        .get(*cursor..*cursor + width)
        .ok_or_else(|| TaprootError::InvalidScript("truncated push length".to_string()))?;
    *cursor += width;
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(raw);
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Minimal CScriptNum encoding
fn scriptnum_encode(n: i64) -> Vec<u8> {
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if let Some(last) = out.last_mut() {
        if *last & 0x80 != 0 {
            out.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            *last |= 0x80;
        }
    }
    out
}
