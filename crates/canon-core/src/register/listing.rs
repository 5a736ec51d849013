//! Listings in the register, and the listing side of the hierarchy.
//!
//! A listing file is the terminal bitstream on this side: the canonical
//! JSON serialization of the events announced on one (date, shard), in
//! arrival order. A day may hold more than one listing file, one per
//! shard; the day manifest has one entry per shard listing.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::domain::{CanonicalFile, ContentType, Event, Key, Listing, ListingIdentifier};
use crate::errors::{DomainError, RegisterError, RegisterResult};
use crate::integrity::ManifestEntry;
use crate::record;
use crate::store::{LazyReader, StorableEntry};

use super::node::{Block, Ctx, Level, Node};

/// One listing file: the events of a single (date, shard).
pub struct ListingNode {
    identifier: ListingIdentifier,
    listing: Listing,
    size_bytes: u64,
    checksum: Option<String>,
}

impl ListingNode {
    /// Load a listing, or start an empty one if it does not exist yet.
    pub fn load(
        ctx: &Ctx<'_>,
        identifier: &ListingIdentifier,
        checksum: Option<String>,
    ) -> RegisterResult<Self> {
        let key = record::listing_key(identifier);
        match ctx.storage.load_entry(&key) {
            Ok((mut stream, _)) => {
                let bytes = stream.content.bytes()?;
                let listing: Listing = serde_json::from_slice(&bytes)
                    .map_err(|e| RegisterError::serialization(key.to_string(), e))?;
                Ok(ListingNode {
                    identifier: identifier.clone(),
                    listing,
                    size_bytes: bytes.len() as u64,
                    checksum,
                })
            }
            Err(e) if e.is_does_not_exist() => Ok(ListingNode {
                identifier: identifier.clone(),
                listing: Listing::new(identifier.clone()),
                size_bytes: 0,
                checksum: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// The last event instant, used as the file's modification time so
    /// that the descriptor stays deterministic.
    fn modified(&self) -> DateTime<Utc> {
        self.listing
            .events
            .iter()
            .map(|e| e.event_date)
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Node for ListingNode {
    fn add_events(&mut self, _ctx: &Ctx<'_>, events: &[Event]) -> RegisterResult<()> {
        // Strictly append-only, in arrival order.
        self.listing.events.extend(events.iter().cloned());
        Ok(())
    }

    fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String> {
        let key = record::listing_key(&self.identifier);
        let bytes = serde_jcs::to_vec(&self.listing)
            .map_err(|e| RegisterError::serialization(key.to_string(), e))?;
        let descriptor = CanonicalFile {
            modified: self.modified(),
            size_bytes: bytes.len() as u64,
            content_type: ContentType::Json,
            filename: Some(key.filename().to_string()),
            ref_: key.uri().clone(),
            is_gzipped: false,
        };
        self.size_bytes = bytes.len() as u64;
        let mut entry = StorableEntry::new(key.clone(), descriptor, LazyReader::from_bytes(bytes));
        ctx.storage.store_entry(&mut entry)?;
        let checksum = entry.checksum.ok_or_else(|| {
            RegisterError::validation(key.to_string(), "store returned no checksum")
        })?;
        self.checksum = Some(checksum.clone());
        Ok(checksum)
    }

    fn manifest_entry(&self, member_name: &str) -> ManifestEntry {
        ManifestEntry {
            key: member_name.to_string(),
            checksum: self.checksum.clone(),
            size_bytes: Some(self.size_bytes),
            mime_type: Some(ContentType::Json.mime_type().to_string()),
            number_of_versions: 0,
            number_of_events: self.listing.number_of_events(),
            number_of_events_by_type: self.listing.number_of_events_by_type(),
        }
    }
}

/// Day level: one member per shard listing. Routed by
/// `(event_date, shard)`; nothing assumes one shard per day.
pub struct ListingDayLevel;

impl Level for ListingDayLevel {
    type Name = NaiveDate;
    type MemberName = ListingIdentifier;
    type Member = ListingNode;

    fn manifest_key(name: &Self::Name) -> Key {
        record::listing_day_manifest_key(*name)
    }

    fn route(event: &Event) -> Self::MemberName {
        ListingIdentifier::from_parts(event.event_date.date_naive(), event.shard())
    }

    fn member_name_str(name: &Self::MemberName) -> String {
        record::listing_key(name).to_string()
    }

    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError> {
        record::parse_listing_member(raw)
    }

    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member> {
        ListingNode::load(ctx, name, checksum)
    }
}

/// Month level of the listing hierarchy.
pub struct ListingMonthLevel;

impl Level for ListingMonthLevel {
    type Name = (i32, u32);
    type MemberName = NaiveDate;
    type Member = Block<ListingDayLevel>;

    fn manifest_key(name: &Self::Name) -> Key {
        record::listing_month_manifest_key(name.0, name.1)
    }

    fn route(event: &Event) -> Self::MemberName {
        event.event_date.date_naive()
    }

    fn member_name_str(name: &Self::MemberName) -> String {
        record::date_member_name(*name)
    }

    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError> {
        record::parse_date(raw)
    }

    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member> {
        Block::load(ctx, *name, checksum)
    }
}

/// Year level of the listing hierarchy.
pub struct ListingYearLevel;

impl Level for ListingYearLevel {
    type Name = i32;
    type MemberName = (i32, u32);
    type Member = Block<ListingMonthLevel>;

    fn manifest_key(name: &Self::Name) -> Key {
        record::listing_year_manifest_key(*name)
    }

    fn route(event: &Event) -> Self::MemberName {
        (event.event_date.year(), event.event_date.month())
    }

    fn member_name_str(name: &Self::MemberName) -> String {
        record::year_month_member_name(name.0, name.1)
    }

    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError> {
        record::parse_year_month(raw)
    }

    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member> {
        Block::load(ctx, *name, checksum)
    }
}

/// The complete set of listings in the record.
pub struct ListingsLevel;

impl Level for ListingsLevel {
    type Name = ();
    type MemberName = i32;
    type Member = Block<ListingYearLevel>;

    fn manifest_key(_name: &Self::Name) -> Key {
        record::listings_manifest_key()
    }

    fn route(event: &Event) -> Self::MemberName {
        event.event_date.year()
    }

    fn member_name_str(name: &Self::MemberName) -> String {
        record::year_member_name(*name)
    }

    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError> {
        record::parse_year(raw)
    }

    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member> {
        Block::load(ctx, *name, checksum)
    }
}
