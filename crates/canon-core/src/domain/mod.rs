//! Core domain concepts of the canonical record.
//!
//! Everything here is plain data with reversible serde representations:
//! enums serialize as their string values, dates as `YYYY-MM-DD`, and
//! datetimes as RFC 3339 with offset. Unknown fields are ignored on read
//! and missing optional fields default to absent.

pub mod content;
pub mod eprint;
pub mod event;
pub mod file;
pub mod identifier;
pub mod listing;
pub mod metadata;
pub mod uri;
pub mod version;

pub use content::{ContentType, SourceFileType, SourceType};
pub use eprint::EPrint;
pub use event::{Event, EventIdentifier, EventSummary, EventType, DEFAULT_SHARD};
pub use file::CanonicalFile;
pub use identifier::{Identifier, ListingIdentifier, VersionedIdentifier};
pub use listing::Listing;
pub use metadata::{Category, License, Metadata, Person};
pub use uri::{Key, Uri};
pub use version::{Version, VersionReference};
