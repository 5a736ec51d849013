//! Storage, source, and event-stream adapters for the canonical record.
//!
//! `canon-core` defines the contracts; this crate ships the backends:
//!
//! - [`FilesystemStorage`]: the canonical record on a local filesystem,
//!   with key-atomic writes;
//! - [`FilesystemSource`]: `file://` content confined to a base
//!   directory (e.g. a legacy data tree);
//! - [`MemoryStorage`] / [`MemorySource`]: in-memory backends for tests
//!   and fixtures;
//! - [`RemoteSource`]: trusted `https://` content with bounded
//!   retry/backoff;
//! - [`MemoryStream`]: an in-process event bus with per-shard sequence
//!   numbers;
//! - [`LockService`]: named FIFO write locks for single-writer
//!   coordination within a process.

pub mod bus;
pub mod filesystem;
pub mod lock;
pub mod memory;
pub mod remote;

pub use bus::MemoryStream;
pub use filesystem::{FilesystemSource, FilesystemStorage};
pub use lock::{LockGuard, LockService};
pub use memory::{MemorySource, MemoryStorage};
pub use remote::RemoteSource;
