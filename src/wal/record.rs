use crate::error::{Error, Result};
use crate::types::Record;

/// Record type byte at the start of every encoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Put = 0x01,
    Delete = 0x02,
}

impl RecordType {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(RecordType::Put),
            0x02 => Ok(RecordType::Delete),
            _ => Err(Error::Corruption(format!("invalid record type: {}", byte))),
        }
    }
}

/// Serialized record payload, shared by WAL frames and SSTable data regions.
///
/// ```text
/// ┌──────────┬─────────────┬───────────┬───────────┐
/// │ Type(1B) │ Key Len(4B) │ Key (var) │ Val (var) │
/// └──────────┴─────────────┴───────────┴───────────┘
/// ```
///
/// The value runs to the end of the payload. A Delete has no value bytes.
const TYPE_SIZE: usize = 1;
const KEY_LEN_SIZE: usize = 4;
const PAYLOAD_HEADER_SIZE: usize = TYPE_SIZE + KEY_LEN_SIZE;

/// A WAL frame is `[payload_len: u64 LE][payload]`.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Encode a record payload (no length prefix).
pub fn encode_record(record: &Record) -> Vec<u8> {
    let value: &[u8] = record.value.as_deref().unwrap_or_default();
    let mut buf = Vec::with_capacity(PAYLOAD_HEADER_SIZE + record.key.len() + value.len());

    let record_type = if record.is_tombstone() {
        RecordType::Delete
    } else {
        RecordType::Put
    };
    buf.push(record_type as u8);
    buf.extend_from_slice(&(record.key.len() as u32).to_le_bytes());
    buf.extend_from_slice(record.key.as_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Decode a record payload produced by [`encode_record`].
pub fn decode_record(data: &[u8]) -> Result<Record> {
    if data.len() < PAYLOAD_HEADER_SIZE {
        return Err(Error::Corruption("record too short".into()));
    }

    let record_type = RecordType::from_u8(data[0])?;
    let key_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;

    let key_end = PAYLOAD_HEADER_SIZE
        .checked_add(key_len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| Error::Corruption("key length exceeds record".into()))?;

    let key = std::str::from_utf8(&data[PAYLOAD_HEADER_SIZE..key_end])
        .map_err(|e| Error::Corruption(format!("key is not UTF-8: {e}")))?
        .to_string();
    let value = &data[key_end..];

    match record_type {
        RecordType::Put => Ok(Record::put(key, value)),
        RecordType::Delete if value.is_empty() => Ok(Record::tombstone(key)),
        RecordType::Delete => Err(Error::Corruption(format!(
            "delete record for {key:?} carries {} value bytes",
            value.len()
        ))),
    }
}

/// Encode a record as a length-prefixed WAL frame.
pub fn encode_frame(record: &Record) -> Vec<u8> {
    let payload = encode_record(record);
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);
    buf
}

/// Every non-empty log starts with `[magic: 8B][generation: u64 LE]`.
///
/// The generation is handed out by the log manager each time a log is
/// created or reset, so of two logs the one with the higher generation
/// holds the newer writes.
pub const WAL_HEADER_SIZE: usize = 16;

const WAL_MAGIC: &[u8; 8] = b"lsmkvwal";

pub fn encode_header(generation: u64) -> [u8; WAL_HEADER_SIZE] {
    let mut buf = [0u8; WAL_HEADER_SIZE];
    buf[..8].copy_from_slice(WAL_MAGIC);
    buf[8..].copy_from_slice(&generation.to_le_bytes());
    buf
}

/// Read the generation from the start of a log. `data` must hold at least
/// [`WAL_HEADER_SIZE`] bytes.
pub fn decode_header(data: &[u8]) -> Result<u64> {
    if data.len() < WAL_HEADER_SIZE {
        return Err(Error::Corruption("WAL header too short".into()));
    }
    if &data[..8] != WAL_MAGIC {
        return Err(Error::Corruption("bad WAL magic".into()));
    }
    let mut generation = [0u8; 8];
    generation.copy_from_slice(&data[8..WAL_HEADER_SIZE]);
    Ok(u64::from_le_bytes(generation))
}
