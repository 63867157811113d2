use crate::error::{Result, TaprootError};
use crate::utils::{read_varint, varint_encode};

/// Per-input witness stack
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Witness {
    items: Vec<Vec<u8>>,
}

impl Witness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: impl Into<Vec<u8>>) {
        self.items.push(item.into());
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// BIP341 annex: last item starting with 0x50 when there are at least two
    pub fn annex(&self) -> Option<&[u8]> {
        match self.items.as_slice() {
            [.., last] if self.items.len() >= 2 && last.first() == Some(&0x50) => Some(last.as_slice()),
            _ => None,
        }
    }

    /// Item count followed by each length-prefixed item
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = varint_encode(self.items.len() as u64);
        for item in &self.items {
            out.extend_from_slice(&varint_encode(item.len() as u64));
            out.extend_from_slice(item);
        }
        out
    }

    /// Parse a witness stack, returning it with the number of bytes consumed
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        let (count, mut cursor) = read_varint(data)?;
        let mut items = Vec::new();

        for _ in 0..count {
            let (len, read) = read_varint(&data[cursor..])?;
            cursor += read;
            let len = usize::try_from(len)
                .map_err(|_| TaprootError::InvalidTransaction("witness item too large".into()))?;
            let end = cursor.checked_add(len).ok_or(TaprootError::UnexpectedEof)?;
            let item = data.get(cursor..end).ok_or(TaprootError::UnexpectedEof)?;
            items.push(item.to_vec());
            cursor = end;
        }

        Ok((Self { items }, cursor))
    }
}
