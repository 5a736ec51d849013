//! The public register API.
//!
//! [`RegisterApi`] is the main entry point for the canonical record: it
//! owns the top of the hierarchy, routes new events into both towers, and
//! serves reads directly from storage. Reads are lazy: loading a version
//! touches only its metadata record and manifest, and iterating the events
//! of a whole year loads one listing at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{
    CanonicalFile, EPrint, Event, EventIdentifier, EventSummary, Identifier, Listing,
    ListingIdentifier, Version, VersionedIdentifier, DEFAULT_SHARD,
};
use crate::errors::{RegisterError, RegisterResult};
use crate::integrity::{checksum_manifest, Manifest};
use crate::record;
use crate::store::{LazyReader, Source, Storage};

use super::eprint::EPrintsLevel;
use super::listing::ListingsLevel;
use super::node::{Block, Ctx, Node};
use super::validate;
use super::version::VersionNode;

const EPRINTS_MEMBER: &str = "eprints";
const LISTINGS_MEMBER: &str = "listings";

/// The top of the register hierarchy: the two towers plus the global
/// manifest.
pub(crate) struct Register {
    manifest: Manifest,
    eprints: Block<EPrintsLevel>,
    listings: Block<ListingsLevel>,
}

impl Register {
    pub fn load(ctx: &Ctx<'_>) -> RegisterResult<Self> {
        let manifest = match ctx.storage.load_manifest(&record::global_manifest_key()) {
            Ok(manifest) => manifest,
            Err(e) if e.is_does_not_exist() => Manifest::empty(),
            Err(e) => return Err(e.into()),
        };
        let eprints = Block::load(ctx, (), manifest.checksum_for(EPRINTS_MEMBER))?;
        let listings = Block::load(ctx, (), manifest.checksum_for(LISTINGS_MEMBER))?;
        Ok(Register {
            manifest,
            eprints,
            listings,
        })
    }

    /// Add events to the record: dispatch to the e-print tower first (it
    /// enforces the version-sequence rules), then append to listings.
    pub fn add_events(&mut self, ctx: &Ctx<'_>, events: &[Event]) -> RegisterResult<()> {
        // Each event's summary becomes part of its version's history.
        let mut enriched = events.to_vec();
        for event in &mut enriched {
            let summary = event.summary();
            event.version.events.push(summary);
        }

        self.eprints.add_events(ctx, &enriched)?;
        let checksum = self.eprints.save(ctx)?;
        self.manifest
            .upsert(self.eprints.manifest_entry(EPRINTS_MEMBER));
        tracing::debug!(%checksum, "saved e-print tower");

        self.listings.add_events(ctx, &enriched)?;
        let checksum = self.listings.save(ctx)?;
        self.manifest
            .upsert(self.listings.manifest_entry(LISTINGS_MEMBER));
        tracing::debug!(%checksum, "saved listing tower");
        Ok(())
    }

    pub fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String> {
        ctx.storage
            .store_manifest(&record::global_manifest_key(), &self.manifest)?;
        checksum_manifest(&self.manifest).map_err(Into::into)
    }
}

/// Selects the scope of a [`RegisterApi::load_events`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Year(i32),
    Month(i32, u32),
    Date(NaiveDate),
}

impl From<i32> for Selector {
    fn from(year: i32) -> Self {
        Selector::Year(year)
    }
}

impl From<(i32, u32)> for Selector {
    fn from((year, month): (i32, u32)) -> Self {
        Selector::Month(year, month)
    }
}

impl From<NaiveDate> for Selector {
    fn from(date: NaiveDate) -> Self {
        Selector::Date(date)
    }
}

/// The main public API for the canonical record.
pub struct RegisterApi {
    storage: Arc<dyn Storage>,
    sources: Vec<Box<dyn Source>>,
    register: Register,
}

impl RegisterApi {
    /// Initialize the API over a storage backend and a set of sources for
    /// dereferencing external URIs. Creates empty register state if the
    /// record does not exist yet.
    pub fn new(storage: Arc<dyn Storage>, sources: Vec<Box<dyn Source>>) -> RegisterResult<Self> {
        let register = {
            let ctx = Ctx {
                storage: storage.as_ref(),
                sources: &sources,
            };
            Register::load(&ctx)?
        };
        Ok(RegisterApi {
            storage,
            sources,
            register,
        })
    }

    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            storage: self.storage.as_ref(),
            sources: &self.sources,
        }
    }

    /// Append events to the record.
    ///
    /// Consistency errors are fatal to the batch: events applied before
    /// the failing one remain in the record, the failing one and the rest
    /// are not applied, and the caller decides whether to skip or halt.
    pub fn add_events(&mut self, events: &[Event]) -> RegisterResult<()> {
        let ctx = Ctx {
            storage: self.storage.as_ref(),
            sources: &self.sources,
        };
        self.register.add_events(&ctx, events)?;
        self.register.save(&ctx)?;
        Ok(())
    }

    /// Load an e-print version.
    pub fn load_version(&self, identifier: &VersionedIdentifier) -> RegisterResult<Version> {
        let node = VersionNode::load(&self.ctx(), identifier, None).map_err(|e| {
            if e.is_not_found() {
                RegisterError::no_such_resource(identifier.to_string())
            } else {
                e
            }
        })?;
        Ok(node.version().clone())
    }

    /// Load an e-print with all of its versions.
    pub fn load_eprint(&self, identifier: &Identifier) -> RegisterResult<EPrint> {
        let manifest = self
            .storage
            .load_manifest(&record::eprint_manifest_key(identifier))
            .map_err(|e| {
                if e.is_does_not_exist() {
                    RegisterError::no_such_resource(identifier.to_string())
                } else {
                    e.into()
                }
            })?;
        let mut eprint = EPrint::new(identifier.clone());
        for entry in &manifest.entries {
            let vid: VersionedIdentifier = entry.key.parse()?;
            let version = self.load_version(&vid)?;
            eprint.versions.insert(vid.version, version);
        }
        Ok(eprint)
    }

    /// Load the event history of an e-print, in version order.
    pub fn load_history(&self, identifier: &Identifier) -> RegisterResult<Vec<EventSummary>> {
        let eprint = self.load_eprint(identifier)?;
        Ok(eprint
            .versions
            .values()
            .flat_map(|v| v.events.iter().cloned())
            .collect())
    }

    /// Load the event history of a single version.
    pub fn load_version_history(
        &self,
        identifier: &VersionedIdentifier,
    ) -> RegisterResult<Vec<EventSummary>> {
        Ok(self.load_version(identifier)?.events)
    }

    /// Load an event by its identifier.
    pub fn load_event(&self, identifier: &EventIdentifier) -> RegisterResult<Event> {
        let listing = self.load_listing(identifier.event_date.date_naive(), &identifier.shard)?;
        listing
            .events
            .into_iter()
            .find(|e| e.event_id() == *identifier)
            .ok_or_else(|| RegisterError::no_such_resource(identifier.to_string()))
    }

    /// Load the events for a year, month, or day.
    ///
    /// Returns a lazy iterator that walks the listing hierarchy one
    /// listing at a time, plus a best-effort event count read from the
    /// manifests. Consuming the whole iterator for a year can touch a lot
    /// of storage; nothing is loaded until the iterator is advanced.
    pub fn load_events(
        &self,
        selector: impl Into<Selector>,
    ) -> RegisterResult<(EventIter, u64)> {
        let selector = selector.into();
        let mut iter = EventIter {
            storage: self.storage.clone(),
            months: VecDeque::new(),
            days: VecDeque::new(),
            listings: VecDeque::new(),
            events: VecDeque::new(),
        };
        let estimate = match selector {
            Selector::Year(year) => {
                match self
                    .storage
                    .load_manifest(&record::listing_year_manifest_key(year))
                {
                    Ok(manifest) => {
                        for entry in &manifest.entries {
                            iter.months.push_back(record::parse_year_month(&entry.key)?);
                        }
                        manifest.number_of_events
                    }
                    Err(e) if e.is_does_not_exist() => 0,
                    Err(e) => return Err(e.into()),
                }
            }
            Selector::Month(year, month) => {
                match self
                    .storage
                    .load_manifest(&record::listing_month_manifest_key(year, month))
                {
                    Ok(manifest) => {
                        for entry in &manifest.entries {
                            iter.days.push_back(record::parse_date(&entry.key)?);
                        }
                        manifest.number_of_events
                    }
                    Err(e) if e.is_does_not_exist() => 0,
                    Err(e) => return Err(e.into()),
                }
            }
            Selector::Date(date) => {
                match self
                    .storage
                    .load_manifest(&record::listing_day_manifest_key(date))
                {
                    Ok(manifest) => {
                        for entry in &manifest.entries {
                            iter.listings
                                .push_back(record::parse_listing_member(&entry.key)?);
                        }
                        manifest.number_of_events
                    }
                    Err(e) if e.is_does_not_exist() => 0,
                    Err(e) => return Err(e.into()),
                }
            }
        };
        Ok((iter, estimate))
    }

    /// Load the listing for a (date, shard).
    pub fn load_listing(&self, date: NaiveDate, shard: &str) -> RegisterResult<Listing> {
        let identifier = ListingIdentifier::from_parts(date, shard);
        let key = record::listing_key(&identifier);
        let (mut stream, _) = self.storage.load_entry(&key).map_err(|e| {
            if e.is_does_not_exist() {
                RegisterError::no_such_resource(identifier.to_string())
            } else {
                e.into()
            }
        })?;
        let bytes = stream.content.bytes()?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RegisterError::serialization(key.to_string(), e))
    }

    /// Load the listing for a date with the default shard.
    pub fn load_listing_default(&self, date: NaiveDate) -> RegisterResult<Listing> {
        self.load_listing(date, DEFAULT_SHARD)
    }

    /// Load the source package of a version: descriptor plus lazy stream.
    pub fn load_source(
        &self,
        identifier: &VersionedIdentifier,
    ) -> RegisterResult<(CanonicalFile, LazyReader)> {
        let version = self.load_version(identifier)?;
        let stream = self.ctx().dereference(&version.source.ref_)?;
        Ok((version.source, stream))
    }

    /// Load the canonical rendering of a version, if it has one.
    pub fn load_render(
        &self,
        identifier: &VersionedIdentifier,
    ) -> RegisterResult<(CanonicalFile, LazyReader)> {
        let version = self.load_version(identifier)?;
        let render = version.render.ok_or_else(|| {
            RegisterError::no_such_resource(format!("{identifier} has no render"))
        })?;
        let stream = self.ctx().dereference(&render.ref_)?;
        Ok((render, stream))
    }

    /// Walk the entire record, recomputing every file checksum and every
    /// manifest checksum bottom-up and comparing with the stored values.
    pub fn validate(&self) -> RegisterResult<()> {
        validate::validate_record(self.storage.as_ref())
    }
}

/// Lazy iterator over the events of a year, month, or day.
///
/// Walks the listing hierarchy top-down, loading one manifest or listing
/// at a time; abandoning the iterator releases everything. Events are
/// yielded in per-shard-date order: days in date order, shards within a
/// day in key order, events within a listing in insertion order.
pub struct EventIter {
    storage: Arc<dyn Storage>,
    months: VecDeque<(i32, u32)>,
    days: VecDeque<NaiveDate>,
    listings: VecDeque<ListingIdentifier>,
    events: VecDeque<Event>,
}

impl EventIter {
    fn refill(&mut self) -> RegisterResult<bool> {
        loop {
            if !self.events.is_empty() {
                return Ok(true);
            }
            if let Some(identifier) = self.listings.pop_front() {
                let key = record::listing_key(&identifier);
                match self.storage.load_entry(&key) {
                    Ok((mut stream, _)) => {
                        let bytes = stream.content.bytes()?;
                        let listing: Listing = serde_json::from_slice(&bytes)
                            .map_err(|e| RegisterError::serialization(key.to_string(), e))?;
                        self.events.extend(listing.events);
                    }
                    Err(e) if e.is_does_not_exist() => continue,
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            if let Some(date) = self.days.pop_front() {
                match self
                    .storage
                    .load_manifest(&record::listing_day_manifest_key(date))
                {
                    Ok(manifest) => {
                        for entry in &manifest.entries {
                            self.listings
                                .push_back(record::parse_listing_member(&entry.key)?);
                        }
                    }
                    Err(e) if e.is_does_not_exist() => continue,
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            if let Some((year, month)) = self.months.pop_front() {
                match self
                    .storage
                    .load_manifest(&record::listing_month_manifest_key(year, month))
                {
                    Ok(manifest) => {
                        for entry in &manifest.entries {
                            self.days.push_back(record::parse_date(&entry.key)?);
                        }
                    }
                    Err(e) if e.is_does_not_exist() => continue,
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            return Ok(false);
        }
    }
}

impl Iterator for EventIter {
    type Item = RegisterResult<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.refill() {
            Ok(true) => self.events.pop_front().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
