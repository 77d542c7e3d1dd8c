pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{Replay, WALReader};
pub use record::{
    decode_header, decode_record, encode_frame, encode_header, encode_record, FRAME_HEADER_SIZE,
    WAL_HEADER_SIZE,
};
pub use writer::{WALManager, WALWriter};

/// Controls when the WAL is fsync'd to disk.
///
/// Trade-off: durability vs throughput.
///   - EveryWrite: zero data loss, every append waits for the disk
///   - EveryNWrites: batched durability, lose up to N writes on crash
///
/// Rotation and close always sync regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every record. Safest, slowest.
    EveryWrite,
    /// fsync every N records. Batched durability.
    EveryNWrites(usize),
}
