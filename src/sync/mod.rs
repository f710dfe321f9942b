//! Directory-to-bucket publishing.
//!
//! A single walker feeds a bounded queue; a fixed pool of workers drains
//! it, each one compressing, hashing and uploading a file at a time.

pub mod classify;
pub mod compression;
pub mod engine;
pub mod hash;
pub mod task;
pub mod walker;
pub mod worker;

pub use classify::{Classification, ContentTable};
pub use compression::{CompressionLevel, CompressionType};
pub use engine::{SyncEngine, SyncStats};
pub use hash::{hash_bytes, hash_file, FileHash};
pub use task::{remote_key, FileTask, HeaderSet};
pub use walker::TreeWalker;
pub use worker::{FileOutcome, UploadDecision, UploadReason, UploadWorker};
