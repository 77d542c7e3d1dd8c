use crate::error::{Error, Result};

/// Current on-disk format version written into every footer.
pub const FORMAT_VERSION: u64 = 1;

/// The footer sits at the end of the SSTable file.
/// It tells the reader where to find the data and index regions.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Format version (8B)                  │
/// │ Data region offset (8B)              │
/// │ Data region size (8B)                │
/// │ Index region offset (8B)             │
/// │ Index region size (8B)               │
/// └──────────────────────────────────────┘
/// ```
///
/// All fields little-endian. Located at `file_size - Footer::SIZE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub version: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub index_offset: u64,
    pub index_size: u64,
}

impl Footer {
    /// Size of the footer in bytes (fixed).
    pub const SIZE: usize = 8 * 5; // 40 bytes

    /// Encode footer to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.data_offset.to_le_bytes());
        buf.extend_from_slice(&self.data_size.to_le_bytes());
        buf.extend_from_slice(&self.index_offset.to_le_bytes());
        buf.extend_from_slice(&self.index_size.to_le_bytes());
        buf
    }

    /// Decode footer from bytes and check it describes a file of `file_size`.
    pub fn decode(data: &[u8], file_size: u64) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("footer too short".into()));
        }
        let field = |i: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[i * 8..(i + 1) * 8]);
            u64::from_le_bytes(bytes)
        };
        let footer = Footer {
            version: field(0),
            data_offset: field(1),
            data_size: field(2),
            index_offset: field(3),
            index_size: field(4),
        };

        if footer.version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported format version: expected {}, got {}",
                FORMAT_VERSION, footer.version
            )));
        }

        let body = file_size.saturating_sub(Self::SIZE as u64);
        let data_end = footer.data_offset.checked_add(footer.data_size);
        let index_end = footer.index_offset.checked_add(footer.index_size);
        match (data_end, index_end) {
            (Some(d), Some(i)) if d <= footer.index_offset && i <= body => Ok(footer),
            _ => Err(Error::Corruption(format!(
                "footer regions out of bounds: {:?} in file of {} bytes",
                footer, file_size
            ))),
        }
    }
}
