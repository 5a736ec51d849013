//! Core of the arXiv canonical record.
//!
//! The canonical record is the authoritative, append-only archive of every
//! announced e-print version and every announcement-related event. This
//! crate provides:
//!
//! - the domain model (identifiers, versions, events, listings),
//! - the record layout (the key algebra of the key/blob store),
//! - the integrity layer (checksums, manifests, hierarchical validation),
//! - the register (the hierarchical structure that translates an event
//!   stream into the content-addressed store and serves reads from it),
//! - the storage and event-stream contracts that backends must satisfy,
//! - capability-restricted roles over the register and stream.
//!
//! Storage and source *adapters* (filesystem, in-memory, trusted remote)
//! live in `canon-store`; this crate only defines the contracts.

pub mod domain;
pub mod errors;
pub mod integrity;
pub mod record;
pub mod register;
pub mod roles;
pub mod store;
pub mod stream;

// Convenience re-exports
pub use domain::{
    CanonicalFile, Category, ContentType, EPrint, Event, EventIdentifier, EventSummary,
    EventType, Identifier, Key, License, Listing, ListingIdentifier, Metadata, Person,
    SourceType, Uri, Version, VersionReference, VersionedIdentifier,
};
pub use errors::{DomainError, RegisterError, SourceError, StorageError};
pub use integrity::{checksum, Manifest, ManifestEntry};
pub use register::RegisterApi;
pub use roles::{Observer, Primary, Replicant, Repository};
pub use store::{dereference, LazyReader, RecordStream, Source, StorableEntry, Storage};
pub use stream::{EventStream, SequencedEvent};
