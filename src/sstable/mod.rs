//! Immutable on-disk tables.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┬──────────────┐
//! │ data region          │ index region (JSON)  │ footer (40B) │
//! │ records, input order │ key → {start,len,del}│              │
//! └──────────────────────┴──────────────────────┴──────────────┘
//! ```

pub mod builder;
pub mod footer;
pub mod index;
pub mod reader;

pub use builder::SSTableBuilder;
pub use footer::Footer;
pub use index::{IndexEntry, Position};
pub use reader::SSTable;
