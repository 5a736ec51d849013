//! Generic machinery of the register hierarchy.
//!
//! Every interior level of the hierarchy (day, month, year, all, on both
//! the e-print and the listing side) behaves identically: it owns a
//! manifest, routes events to members, materializes members lazily, and
//! rolls member checksums and counters up into its own manifest. [`Block`]
//! implements that behavior once, parameterized by a [`Level`] policy.
//! Terminal nodes (versions, e-prints, listings) implement [`Node`]
//! directly.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Event, Key, Uri};
use crate::errors::{DomainError, RegisterResult, SourceResult};
use crate::integrity::{checksum_manifest, Manifest, ManifestEntry};
use crate::store::{dereference, LazyReader, Source, Storage};

use super::lazy::LazyMap;

/// Shared handles passed down the hierarchy during register operations.
pub struct Ctx<'a> {
    pub storage: &'a dyn Storage,
    pub sources: &'a [Box<dyn Source>],
}

impl Ctx<'_> {
    /// Dereference a URI: canonical keys resolve through storage, anything
    /// else through the registered sources in order.
    pub fn dereference(&self, uri: &Uri) -> SourceResult<LazyReader> {
        if self.storage.can_resolve(uri) {
            return self.storage.load(uri);
        }
        dereference(self.sources, uri)
    }
}

/// A node in the register hierarchy.
pub trait Node: Sized {
    /// Apply events to this node, persisting any affected children.
    fn add_events(&mut self, ctx: &Ctx<'_>, events: &[Event]) -> RegisterResult<()>;

    /// Persist this node's own record (manifest or bitstream) and return
    /// its checksum. Called after [`add_events`](Node::add_events), so a
    /// node's record always lands after its children's.
    fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String>;

    /// Describe this node for its parent's manifest.
    fn manifest_entry(&self, member_name: &str) -> ManifestEntry;
}

/// Level policy: everything that distinguishes one interior level of the
/// hierarchy from another.
pub trait Level {
    /// Name of a node at this level (a year, a month, a date, …).
    type Name: Clone + fmt::Debug;

    /// Name of a member at this level.
    type MemberName: Ord + Clone + fmt::Debug;

    /// The member node type.
    type Member: Node;

    /// Key under which a node at this level stores its manifest.
    fn manifest_key(name: &Self::Name) -> Key;

    /// Route an event to the member that contains it.
    fn route(event: &Event) -> Self::MemberName;

    /// Render a member name the way it appears as a manifest entry key.
    fn member_name_str(name: &Self::MemberName) -> String;

    /// Parse a manifest entry key back into a member name. Exact inverse
    /// of [`member_name_str`](Level::member_name_str).
    fn parse_member_name(raw: &str) -> Result<Self::MemberName, DomainError>;

    /// Load (or initialize empty) the named member.
    fn load_member(
        ctx: &Ctx<'_>,
        name: &Self::MemberName,
        checksum: Option<String>,
    ) -> RegisterResult<Self::Member>;
}

/// An interior node: a lazy collection of members governed by a [`Level`].
pub struct Block<L: Level> {
    name: L::Name,
    manifest: Manifest,
    checksum: Option<String>,
    members: LazyMap<L::MemberName, L::Member>,
}

impl<L: Level> Block<L> {
    /// Load a block from its manifest, or start empty if the manifest does
    /// not exist yet. No member I/O happens here.
    pub fn load(ctx: &Ctx<'_>, name: L::Name, checksum: Option<String>) -> RegisterResult<Self> {
        let manifest = match ctx.storage.load_manifest(&L::manifest_key(&name)) {
            Ok(manifest) => manifest,
            Err(e) if e.is_does_not_exist() => Manifest::empty(),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            names.push(L::parse_member_name(&entry.key)?);
        }
        Ok(Block {
            name,
            manifest,
            checksum,
            members: LazyMap::new(names),
        })
    }

    /// Materialize a member, creating an empty one if it is new.
    pub fn member_mut(
        &mut self,
        ctx: &Ctx<'_>,
        name: &L::MemberName,
    ) -> RegisterResult<&mut L::Member> {
        let recorded = self.manifest.checksum_for(&L::member_name_str(name));
        self.members
            .get_mut_or_load(name, |n| L::load_member(ctx, n, recorded))
    }
}

impl<L: Level> Node for Block<L> {
    fn add_events(&mut self, ctx: &Ctx<'_>, events: &[Event]) -> RegisterResult<()> {
        // Group per member, preserving arrival order within each group.
        let mut grouped: BTreeMap<L::MemberName, Vec<Event>> = BTreeMap::new();
        for event in events {
            grouped.entry(L::route(event)).or_default().push(event.clone());
        }
        for (member_name, member_events) in grouped {
            let member = self.member_mut(ctx, &member_name)?;
            member.add_events(ctx, &member_events)?;
            let checksum = member.save(ctx)?;
            tracing::debug!(
                member = %L::member_name_str(&member_name),
                %checksum,
                events = member_events.len(),
                "updated register member"
            );
            let entry = member.manifest_entry(&L::member_name_str(&member_name));
            self.manifest.upsert(entry);
        }
        self.checksum = Some(checksum_manifest(&self.manifest)?);
        Ok(())
    }

    fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String> {
        ctx.storage
            .store_manifest(&L::manifest_key(&self.name), &self.manifest)?;
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
