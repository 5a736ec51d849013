//! Integrity and consistency concerns for the canonical record.
//!
//! Consistency checks are performed at several levels of granularity
//! (file, version, e-print, day, month, year, global), so that the
//! completeness and integrity of all or part of the record can be verified
//! by comparing checksum values at the corresponding level. The strategy is
//! the one used for checksum validation of large chunked uploads to S3:
//!
//! - a file-level checksum is the md5 hash of the binary content;
//! - a collection-level checksum is the md5 hash of the concatenation of
//!   its members' checksums, sorted by member key.
//!
//! All checksum values are md5 hashes, stored and transmitted as URL-safe
//! base64-encoded strings. Collection members and counters live in a
//! [`Manifest`], whose byte representation is canonical JSON so that
//! identical contents in any two replicas hash identically.

pub mod checksum;
pub mod manifest;

pub use checksum::{checksum_bytes, checksum_manifest, checksum_reader, ChecksumError};
pub use manifest::{Manifest, ManifestEntry};
