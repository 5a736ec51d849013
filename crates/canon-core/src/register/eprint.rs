//! E-prints in the register, and the e-print side of the hierarchy.
//!
//! Event dispatch happens here: each event type maps to an operation on
//! the e-print's versions. `new`, `replace`, and `withdraw` create a
//! version; the rest mutate an existing one. A `new`-family event against
//! an existing version, or an `update`-family event against a missing one,
//! is a consistency error and leaves the record untouched.

use chrono::NaiveDate;

use crate::domain::{Event, EventType, Identifier, Key, VersionedIdentifier};
use crate::errors::{DomainError, RegisterError, RegisterResult};
use crate::integrity::{checksum_manifest, Manifest, ManifestEntry};
use crate::record;

use super::lazy::LazyMap;
use super::node::{Block, Ctx, Level, Node};
use super::version::VersionNode;

/// An e-print in the register: one or more sequential versions.
pub struct EPrintNode {
    identifier: Identifier,
    manifest: Manifest,
    checksum: Option<String>,
    versions: LazyMap<VersionedIdentifier, VersionNode>,
}

impl EPrintNode {
    pub fn load(
        ctx: &Ctx<'_>,
        identifier: &Identifier,
        checksum: Option<String>,
    ) -> RegisterResult<Self> {
        let manifest = match ctx
            .storage
            .load_manifest(&record::eprint_manifest_key(identifier))
        {
            Ok(manifest) => manifest,
            Err(e) if e.is_does_not_exist() => Manifest::empty(),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            names.push(entry.key.parse::<VersionedIdentifier>()?);
        }
        Ok(EPrintNode {
            identifier: identifier.clone(),
            manifest,
            checksum,
            versions: LazyMap::new(names),
        })
    }

    fn check_event(&self, event: &Event) -> RegisterResult<VersionedIdentifier> {
        if event.identifier != event.version.identifier {
            return Err(RegisterError::consistency(format!(
                "event identifier {} does not match its version state {}",
                event.identifier, event.version.identifier
            )));
        }
        if event.identifier.arxiv_id != self.identifier {
            return Err(RegisterError::consistency(format!(
                "event for {} routed to e-print {}",
                event.identifier, self.identifier
            )));
        }
        Ok(event.identifier.clone())
    }

    /// Create a version from a `new`, `replace`, or `withdraw` event.
    fn apply_new(&mut self, ctx: &Ctx<'_>, event: &Event) -> RegisterResult<()> {
        let vid = self.check_event(event)?;
        if self.versions.contains(&vid) {
            return Err(RegisterError::consistency(format!(
                "version already exists: {vid}"
            )));
        }
        let node = VersionNode::create(ctx, &event.version)?;
        self.versions.insert(vid, node);
        Ok(())
    }

    /// Apply an `update`-family event to an existing version.
    fn apply_update(
        &mut self,
        ctx: &Ctx<'_>,
        event: &Event,
        metadata_only: bool,
    ) -> RegisterResult<()> {
        let vid = self.check_event(event)?;
        if !self.versions.contains(&vid) {
            return Err(RegisterError::consistency(format!("no such version: {vid}")));
        }
        let recorded = self.manifest.checksum_for(&vid.to_string());
        let node = self
            .versions
            .get_mut_or_load(&vid, |v| VersionNode::load(ctx, v, recorded))?;
        node.update(ctx, &event.version, metadata_only)
    }
}

impl Node for EPrintNode {
    fn add_events(&mut self, ctx: &Ctx<'_>, events: &[Event]) -> RegisterResult<()> {
        for event in events {
            tracing::debug!(
                identifier = %event.identifier,
                event_type = %event.event_type,
                "dispatching event"
            );
            match event.event_type {
                EventType::New | EventType::Replace | EventType::Withdraw => {
                    self.apply_new(ctx, event)?
                }
                EventType::Update | EventType::Migrate => self.apply_update(ctx, event, false)?,
                EventType::UpdateMetadata
                | EventType::Cross
                | EventType::MigrateMetadata
                | EventType::Jref => self.apply_update(ctx, event, true)?,
            }
            // Persist the affected version and fold it into our manifest.
            let vid = event.identifier.clone();
            let node = self.versions.get_loaded_mut(&vid).ok_or_else(|| {
                RegisterError::consistency("version vanished during dispatch")
            })?;
            let checksum = node.save(ctx)?;
            tracing::debug!(version = %vid, %checksum, "stored version record");
            let entry = node.manifest_entry(&vid.to_string());
            self.manifest.upsert(entry);
        }
        self.checksum = Some(checksum_manifest(&self.manifest)?);
        Ok(())
    }

    fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String> {
        ctx.storage.store_manifest(
            &record::eprint_manifest_key(&self.identifier),
            &self.manifest,
        )?;
        let checksum = checksum_manifest(&self.manifest)?;
        self.checksum = Some(checksum.clone());
        Ok(checksum)
    }

    fn manifest_entry(&self, member_name: &str) -> ManifestEntry {
        ManifestEntry::for_member(
            member_name,
            self.checksum.clone().unwrap_or_default(),
            &self.manifest,
        )
    }
}

/// Day level: all e-prints whose first version was announced on this day.
pub struct EPrintDayLevel;

impl Level for EPrintDayLevel {
    type Name = NaiveDate;
    type MemberName = Identifier;
    type Member = EPrintNode;

    fn manifest_key(name: &Self::Name) -> Key {
        record::day_manifest_key(*name)
    }

    fn route(event: &Event) -> Self::MemberName {
        event.version.identifier.arxiv_id.clone()
    }

    fn member_name_str(name: &Self::MemberName) -> String {
        name.to_string()
    }

    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError> {
        raw.parse()
    }

    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member> {
        EPrintNode::load(ctx, name, checksum)
    }
}

/// Month level, addressed by the first announcement date of each member.
pub struct EPrintMonthLevel;

impl Level for EPrintMonthLevel {
    type Name = (i32, u32);
    type MemberName = NaiveDate;
    type Member = Block<EPrintDayLevel>;

    fn manifest_key(name: &Self::Name) -> Key {
        record::month_manifest_key(name.0, name.1)
    }

    fn route(event: &Event) -> Self::MemberName {
        event.version.announced_date_first
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

/// Year level.
pub struct EPrintYearLevel;

impl Level for EPrintYearLevel {
    type Name = i32;
    type MemberName = (i32, u32);
    type Member = Block<EPrintMonthLevel>;

    fn manifest_key(name: &Self::Name) -> Key {
        record::year_manifest_key(*name)
    }

    fn route(event: &Event) -> Self::MemberName {
        (
            event.version.identifier.year(),
            event.version.identifier.month(),
        )
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

/// The complete set of e-prints in the record.
pub struct EPrintsLevel;

impl Level for EPrintsLevel {
    type Name = ();
    type MemberName = i32;
    type Member = Block<EPrintYearLevel>;

    fn manifest_key(_name: &Self::Name) -> Key {
        record::eprints_manifest_key()
    }

    fn route(event: &Event) -> Self::MemberName {
        event.version.identifier.year()
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
