//! Reader and writer for TAS files: per-symbol, per-year containers of tick data
//! (trades or quotes) stored as one compressed, checksummed block per calendar day
//! behind a date index.
//!
//! File layout (little-endian):
//!
//! ```text
//! +--------------------+  0
//! | header (72 bytes)  |  tag, version, exchange, symbol, index checksum/offset/size
//! +--------------------+  72
//! | block 2008-01-02   |  compressed records
//! | block 2008-01-03   |
//! | ...                |
//! +--------------------+  index_offset
//! | index entries      |  72 bytes each: date, offset, sizes, checksum
//! +--------------------+  index_offset + index_size
//! ```

pub mod block;
pub mod checksum;
pub mod config;
pub mod date;
pub mod error;
pub mod header;
pub mod index;
pub mod layout;
pub mod record;
pub mod store;

pub use config::{ChecksumPolicy, Codec, StoreConfig};
pub use date::Date;
pub use error::{FormatError, Result};
pub use header::FileHeader;
pub use index::{IndexEntry, IndexTable};
pub use layout::{common_dates, DatasetLayout, LayoutError};
pub use record::{Record, RecordKind, RECORD_SIZE};
pub use store::{TasStore, VerifyReport};
