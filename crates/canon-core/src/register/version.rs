//! Version records in the register.
//!
//! A version record is comprised of (1) a metadata record, (2) the source
//! package provided by the submitter, (3) an optional canonical rendering
//! (usually a PDF), and (4) zero or more additional dissemination formats.
//! The members live under `e-prints/<YYYY>/<MM>/<id>/v<n>/`; the version
//! manifest records their keys, checksums, sizes, and MIME types.

use crate::domain::{CanonicalFile, ContentType, Event, Version, VersionedIdentifier};
use crate::errors::{RegisterError, RegisterResult};
use crate::integrity::{checksum_manifest, Manifest, ManifestEntry};
use crate::record;
use crate::store::{LazyReader, StorableEntry};

use super::node::{Ctx, Node};

/// A single e-print version in the register.
pub struct VersionNode {
    identifier: VersionedIdentifier,
    version: Version,
    manifest: Manifest,
    checksum: Option<String>,
}

impl VersionNode {
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Create a version record from an announced [`Version`].
    ///
    /// Dereferences the source and render URIs through the source
    /// registry, stores each bitstream under its canonical key, rewrites
    /// the refs, and assembles the version manifest.
    pub fn create(ctx: &Ctx<'_>, announced: &Version) -> RegisterResult<Self> {
        check_version_invariants(announced)?;
        let mut version = announced.clone();
        let identifier = version.identifier.clone();
        let mut manifest = Manifest::empty();

        let entry = store_file(ctx, &identifier, &mut version.source, None)?;
        manifest.upsert(entry);
        if let Some(render) = version.render.as_mut() {
            manifest.upsert(store_file(ctx, &identifier, render, None)?);
        }
        let formats = std::mem::take(&mut version.formats);
        for (content_type, mut file) in formats {
            let entry = store_file(ctx, &identifier, &mut file, None)?;
            manifest.upsert(entry);
            version.formats.insert(content_type, file);
        }

        // The metadata record is serialized after the refs have been
        // rewritten, so it always points into the record.
        manifest.upsert(store_metadata(ctx, &version)?);

        Ok(VersionNode {
            identifier,
            version,
            manifest,
            checksum: None,
        })
    }

    /// Load a version record. Most of the data needed to reconstitute the
    /// [`Version`] is in the metadata record; the manifest provides the
    /// pre-calculated checksums of the other members. File content is not
    /// touched.
    pub fn load(
        ctx: &Ctx<'_>,
        identifier: &VersionedIdentifier,
        checksum: Option<String>,
    ) -> RegisterResult<Self> {
        let key = record::metadata_key(identifier);
        let (mut stream, _) = ctx.storage.load_entry(&key)?;
        let bytes = stream.content.bytes()?;
        let version: Version = serde_json::from_slice(&bytes)
            .map_err(|e| RegisterError::serialization(key.to_string(), e))?;
        let manifest = ctx
            .storage
            .load_manifest(&record::version_manifest_key(identifier))?;
        Ok(VersionNode {
            identifier: identifier.clone(),
            version,
            manifest,
            checksum,
        })
    }

    /// Apply a partial update to this version in place.
    ///
    /// Members present in `incoming` but absent locally are added; members
    /// whose checksum differs are replaced; members absent from `incoming`
    /// are dropped from the manifest. Members whose refs already point at
    /// their canonical keys carry no new content and are left untouched.
    ///
    /// With `metadata_only`, the update asserts that no new bitstream
    /// content is supplied (all refs must already be canonical).
    pub fn update(
        &mut self,
        ctx: &Ctx<'_>,
        incoming: &Version,
        metadata_only: bool,
    ) -> RegisterResult<()> {
        if incoming.identifier != self.identifier {
            return Err(RegisterError::consistency(format!(
                "update for {} routed to version {}",
                incoming.identifier, self.identifier
            )));
        }
        if metadata_only {
            assert_no_new_content(incoming)?;
        }

        let mut version = incoming.clone();
        let previous = std::mem::replace(&mut self.manifest, Manifest::empty());
        let mut manifest = Manifest::empty();

        let entry = store_file(ctx, &self.identifier, &mut version.source, Some(&previous))?;
        manifest.upsert(entry);
        if let Some(render) = version.render.as_mut() {
            manifest.upsert(store_file(ctx, &self.identifier, render, Some(&previous))?);
        }
        let formats = std::mem::take(&mut version.formats);
        for (content_type, mut file) in formats {
            let entry = store_file(ctx, &self.identifier, &mut file, Some(&previous))?;
            manifest.upsert(entry);
            version.formats.insert(content_type, file);
        }
        manifest.upsert(store_metadata(ctx, &version)?);

        self.version = version;
        self.manifest = manifest;
        self.checksum = None;
        Ok(())
    }
}

impl Node for VersionNode {
    fn add_events(&mut self, _ctx: &Ctx<'_>, _events: &[Event]) -> RegisterResult<()> {
        Err(RegisterError::consistency(
            "events are dispatched at the e-print level, not per version",
        ))
    }

    fn save(&mut self, ctx: &Ctx<'_>) -> RegisterResult<String> {
        ctx.storage.store_manifest(
            &record::version_manifest_key(&self.identifier),
            &self.manifest,
        )?;
        let checksum = checksum_manifest(&self.manifest)?;
        self.checksum = Some(checksum.clone());
        Ok(checksum)
    }

    fn manifest_entry(&self, member_name: &str) -> ManifestEntry {
        ManifestEntry {
            key: member_name.to_string(),
            checksum: self.checksum.clone(),
            number_of_versions: 1,
            ..ManifestEntry::default()
        }
    }
}

fn check_version_invariants(version: &Version) -> RegisterResult<()> {
    if version.announced_date_first > version.announced_date {
        return Err(RegisterError::consistency(format!(
            "{}: announced_date_first is after announced_date",
            version.identifier
        )));
    }
    if version.identifier.version == 1 && version.announced_date_first != version.announced_date {
        return Err(RegisterError::consistency(format!(
            "{}: first version must have announced_date_first == announced_date",
            version.identifier
        )));
    }
    Ok(())
}

fn assert_no_new_content(version: &Version) -> RegisterResult<()> {
    let mut refs = vec![&version.source.ref_];
    if let Some(render) = &version.render {
        refs.push(&render.ref_);
    }
    refs.extend(version.formats.values().map(|f| &f.ref_));
    for uri in refs {
        if !uri.is_canonical() {
            return Err(RegisterError::consistency(format!(
                "{}: metadata-only event supplies bitstream content at {uri}",
                version.identifier
            )));
        }
    }
    Ok(())
}

/// Store one version member file, rewriting its ref to the canonical key.
///
/// When a previous manifest is given and the file's ref already points at
/// its canonical key, the existing manifest entry is reused without any
/// content I/O.
fn store_file(
    ctx: &Ctx<'_>,
    identifier: &VersionedIdentifier,
    file: &mut CanonicalFile,
    previous: Option<&Manifest>,
) -> RegisterResult<ManifestEntry> {
    let filename = file
        .filename
        .clone()
        .unwrap_or_else(|| file.content_type.make_filename(identifier));
    let key = record::version_file_key(identifier, &filename);

    if file.ref_ == *key.uri() {
        if let Some(entry) = previous.and_then(|m| m.entry(&key.to_string())).cloned() {
            file.filename = Some(filename);
            return Ok(entry);
        }
    }

    let content = ctx.dereference(&file.ref_)?;
    let mut entry = StorableEntry::new(key.clone(), file.clone(), content);
    ctx.storage.store_entry(&mut entry)?;
    *file = entry.domain;
    file.filename = Some(filename);
    let checksum = entry
        .checksum
        .ok_or_else(|| RegisterError::validation(key.to_string(), "store returned no checksum"))?;
    Ok(ManifestEntry::for_file(
        key.to_string(),
        checksum,
        file.size_bytes,
        file.content_type.mime_type(),
    ))
}

/// Serialize and store the metadata record for a version.
fn store_metadata(ctx: &Ctx<'_>, version: &Version) -> RegisterResult<ManifestEntry> {
    let key = record::metadata_key(&version.identifier);
    let bytes = serde_jcs::to_vec(version)
        .map_err(|e| RegisterError::serialization(key.to_string(), e))?;
    let descriptor = CanonicalFile {
        modified: version.updated_date,
        size_bytes: bytes.len() as u64,
        content_type: ContentType::Json,
        filename: Some(key.filename().to_string()),
        ref_: key.uri().clone(),
        is_gzipped: false,
    };
    let mut entry = StorableEntry::new(key.clone(), descriptor, LazyReader::from_bytes(bytes));
    ctx.storage.store_entry(&mut entry)?;
    let checksum = entry
        .checksum
        .ok_or_else(|| RegisterError::validation(key.to_string(), "store returned no checksum"))?;
    Ok(ManifestEntry::for_file(
        key.to_string(),
        checksum,
        entry.domain.size_bytes,
        ContentType::Json.mime_type(),
    ))
}
