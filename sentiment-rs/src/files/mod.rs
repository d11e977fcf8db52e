//! Uploaded video records
//!
//! Tracks which identity uploaded each object key and whether it has
//! already been sent for analysis.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteFileStore;
pub use store::{FileStore, MemoryFileStore, VideoFile};
