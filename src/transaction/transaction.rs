//! Transaction data model with legacy and segwit (BIP144) encodings.

use crate::error::{Result, TaprootError};
use crate::transaction::witness::Witness;
use crate::utils::*;

pub const DEFAULT_VERSION: u32 = 2;
pub const DEFAULT_SEQUENCE: u32 = 0xffffffff;

/// Represents a transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Previous txid in display (RPC) byte order
    pub txid: [u8; 32],
    pub vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        Self {
            txid,
            vout,
            script_sig: Vec::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    /// Build from the hex txid a node returns
    pub fn from_txid_hex(txid: &str, vout: u32) -> Result<Self> {
        let bytes = hex::decode(txid)
            .map_err(|e| TaprootError::InvalidTransaction(format!("bad txid hex: {}", e)))?;
        let txid: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TaprootError::InvalidTransaction("txid must be 32 bytes".into()))?;
        Ok(Self::new(txid, vout))
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Outpoint as serialized on the wire: txid (little endian) || vout
    pub fn outpoint_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        let mut txid_le = self.txid;
        txid_le.reverse();
        out[..32].copy_from_slice(&txid_le);
        out[32..].copy_from_slice(&self.vout.to_le_bytes());
        out
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.outpoint_bytes());
        data.extend_from_slice(&pushbytes(&self.script_sig));
        data.extend_from_slice(&self.sequence.to_le_bytes());
        data
    }
}

/// Represents a transaction output (also used to describe prevouts)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    pub fn new(amount: u64, script_pubkey: Vec<u8>) -> Self {
        Self {
            amount,
            script_pubkey,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.extend_from_slice(&pushbytes(&self.script_pubkey));
        data
    }
}

/// A transaction: built unsigned, then completed by attaching witnesses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    version: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    witnesses: Vec<Witness>,
    locktime: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            witnesses: Vec::new(),
            locktime: 0,
        }
    }

    pub fn from_parts(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let witnesses = vec![Witness::new(); inputs.len()];
        Self {
            version: DEFAULT_VERSION,
            inputs,
            outputs,
            witnesses,
            locktime: 0,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_locktime(mut self, locktime: u32) -> Self {
        self.locktime = locktime;
        self
    }

    pub fn add_input(&mut self, input: TxInput) {
        self.inputs.push(input);
        self.witnesses.push(Witness::new());
    }

    pub fn add_output(&mut self, output: TxOutput) {
        self.outputs.push(output);
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn witnesses(&self) -> &[Witness] {
        &self.witnesses
    }

    pub fn witness(&self, input_index: usize) -> Option<&Witness> {
        self.witnesses.get(input_index)
    }

    /// Attach (or replace) the witness of one input
    pub fn set_witness(&mut self, input_index: usize, witness: Witness) -> Result<()> {
        let inputs = self.inputs.len();
        let slot = self
            .witnesses
            .get_mut(input_index)
            .ok_or(TaprootError::InputIndexOutOfRange {
                index: input_index,
                inputs,
            })?;
        *slot = witness;
        Ok(())
    }

    pub fn has_witness(&self) -> bool {
        self.witnesses.iter().any(|w| !w.is_empty())
    }

    /// Serialization without marker, flag or witnesses (the txid preimage)
    pub fn serialize_no_witness(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Full serialization; segwit encoding is used when any witness is present
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(self.has_witness())
    }

    fn encode(&self, include_witness: bool) -> Vec<u8> {
        let mut tx = Vec::new();

        tx.extend_from_slice(&self.version.to_le_bytes());

        if include_witness {
            tx.push(0x00); // marker
            tx.push(0x01); // flag
        }

        tx.extend_from_slice(&varint_encode(self.inputs.len() as u64));
        for input in &self.inputs {
            tx.extend_from_slice(&input.serialize());
        }

        tx.extend_from_slice(&varint_encode(self.outputs.len() as u64));
        for output in &self.outputs {
            tx.extend_from_slice(&output.serialize());
        }

        if include_witness {
            for witness in &self.witnesses {
                tx.extend_from_slice(&witness.serialize());
            }
        }

        tx.extend_from_slice(&self.locktime.to_le_bytes());

        tx
    }

    /// Parse a legacy or segwit serialization
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        // A legacy transaction with zero inputs and one output also starts
        // with 00 01 after the version, so fall back to the legacy reading.
        if bytes.get(4..6) == Some(&[0x00, 0x01][..]) {
            return Self::parse(bytes, true).or_else(|segwit_err| {
                Self::parse(bytes, false).map_err(|_| segwit_err)
            });
        }
        Self::parse(bytes, false)
    }

    fn parse(bytes: &[u8], segwit: bool) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let version = reader.read_u32()?;
        if segwit {
            reader.take(2)?;
        }

        let input_count = reader.read_varint()?;
        if segwit && input_count == 0 {
            return Err(TaprootError::InvalidTransaction(
                "segwit transaction without inputs".into(),
            ));
        }
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            let mut txid: [u8; 32] = reader
                .take(32)?
                .try_into()
                .map_err(|_| TaprootError::UnexpectedEof)?;
            txid.reverse();
            let vout = reader.read_u32()?;
            let script_sig = reader.read_prefixed()?.to_vec();
            let sequence = reader.read_u32()?;
            inputs.push(TxInput {
                txid,
                vout,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            let amount = reader.read_u64()?;
            let script_pubkey = reader.read_prefixed()?.to_vec();
            outputs.push(TxOutput {
                amount,
                script_pubkey,
            });
        }

        let witnesses = if segwit {
            let mut witnesses = Vec::with_capacity(inputs.len());
            for _ in 0..inputs.len() {
                let (witness, consumed) = Witness::deserialize(reader.remaining())?;
                reader.take(consumed)?;
                witnesses.push(witness);
            }
            if witnesses.iter().all(Witness::is_empty) {
                return Err(TaprootError::InvalidTransaction(
                    "superfluous witness record".into(),
                ));
            }
            witnesses
        } else {
            vec![Witness::new(); inputs.len()]
        };

        let locktime = reader.read_u32()?;

        if !reader.remaining().is_empty() {
            return Err(TaprootError::InvalidTransaction(format!(
                "{} trailing bytes",
                reader.remaining().len()
            )));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            witnesses,
            locktime,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| TaprootError::InvalidTransaction(e.to_string()))?;
        Self::deserialize(&bytes)
    }

    /// Double SHA256 of the non-witness serialization, in display byte order
    pub fn txid(&self) -> [u8; 32] {
        let mut id = hash256(&self.serialize_no_witness());
        id.reverse();
        id
    }

    /// Double SHA256 of the full serialization, in display byte order
    pub fn wtxid(&self) -> [u8; 32] {
        let mut id = hash256(&self.serialize());
        id.reverse();
        id
    }

    pub fn txid_hex(&self) -> String {
        hex::encode(self.txid())
    }

    /// BIP141 weight: base size * 3 + total size
    pub fn weight(&self) -> usize {
        self.serialize_no_witness().len() * 3 + self.serialize().len()
    }

    pub fn vsize(&self) -> usize {
        self.weight().div_ceil(4)
    }
}

/// Cursor over consensus-encoded bytes
struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.cursor..]
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.cursor.checked_add(len).ok_or(TaprootError::UnexpectedEof)?;
        let slice = self
            .data
            .get(self.cursor..end)
            .ok_or(TaprootError::UnexpectedEof)?;
        self.cursor = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = read_varint(self.remaining())?;
        self.cursor += consumed;
        Ok(value)
    }

    fn read_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| TaprootError::UnexpectedEof)?;
        self.take(len)
    }
}
