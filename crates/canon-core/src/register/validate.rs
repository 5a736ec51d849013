//! Full-record integrity validation.
//!
//! Walks both manifest towers from the root, recomputing every collection
//! checksum from its children and every file checksum from its stored
//! bytes, and comparing with the recorded values. A corrupted bitstream is
//! detected at the file level and, because parent checksums are functions
//! of child checksums, invalidates every ancestor up to the root.

use crate::domain::{Identifier, Key, VersionedIdentifier};
use crate::errors::{RegisterError, RegisterResult};
use crate::integrity::{checksum_manifest, Manifest, ManifestEntry};
use crate::record;
use crate::store::Storage;

/// Validate the whole record, starting from the global manifest.
pub fn validate_record(storage: &dyn Storage) -> RegisterResult<()> {
    let global_key = record::global_manifest_key();
    let global = storage.load_manifest(&global_key)?;
    check_counters(&global_key, &global)?;

    for entry in &global.entries {
        let manifest = match entry.key.as_str() {
            "eprints" => validate_eprints(storage)?,
            "listings" => validate_listings(storage)?,
            other => {
                return Err(RegisterError::validation(
                    global_key.to_string(),
                    format!("unexpected member: {other}"),
                ))
            }
        };
        check_recorded_checksum(&global_key, entry, &manifest)?;
    }
    Ok(())
}

fn validate_eprints(storage: &dyn Storage) -> RegisterResult<Manifest> {
    let key = record::eprints_manifest_key();
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let year = record::parse_year(&entry.key)?;
        let child = validate_eprint_year(storage, year)?;
        check_recorded_checksum(&key, entry, &child)?;
    }
    Ok(manifest)
}

fn validate_eprint_year(storage: &dyn Storage, year: i32) -> RegisterResult<Manifest> {
    let key = record::year_manifest_key(year);
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let (y, m) = record::parse_year_month(&entry.key)?;
        let child = validate_eprint_month(storage, y, m)?;
        check_recorded_checksum(&key, entry, &child)?;
    }
    Ok(manifest)
}

fn validate_eprint_month(storage: &dyn Storage, year: i32, month: u32) -> RegisterResult<Manifest> {
    let key = record::month_manifest_key(year, month);
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let date = record::parse_date(&entry.key)?;
        let day_key = record::day_manifest_key(date);
        let day = storage.load_manifest(&day_key)?;
        check_counters(&day_key, &day)?;
        for day_entry in &day.entries {
            let identifier: Identifier = day_entry.key.parse()?;
            let eprint_key = record::eprint_manifest_key(&identifier);
            let eprint = storage.load_manifest(&eprint_key)?;
            check_counters(&eprint_key, &eprint)?;
            for version_entry in &eprint.entries {
                let vid: VersionedIdentifier = version_entry.key.parse()?;
                let version = validate_version(storage, &vid)?;
                check_recorded_checksum(&eprint_key, version_entry, &version)?;
            }
            check_recorded_checksum(&day_key, day_entry, &eprint)?;
        }
        check_recorded_checksum(&key, entry, &day)?;
    }
    Ok(manifest)
}

fn validate_version(storage: &dyn Storage, vid: &VersionedIdentifier) -> RegisterResult<Manifest> {
    let key = record::version_manifest_key(vid);
    let manifest = storage.load_manifest(&key)?;
    for entry in &manifest.entries {
        validate_file(storage, &key, entry)?;
    }
    Ok(manifest)
}

fn validate_listings(storage: &dyn Storage) -> RegisterResult<Manifest> {
    let key = record::listings_manifest_key();
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let year = record::parse_year(&entry.key)?;
        let child = validate_listing_year(storage, year)?;
        check_recorded_checksum(&key, entry, &child)?;
    }
    Ok(manifest)
}

fn validate_listing_year(storage: &dyn Storage, year: i32) -> RegisterResult<Manifest> {
    let key = record::listing_year_manifest_key(year);
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let (y, m) = record::parse_year_month(&entry.key)?;
        let child = validate_listing_month(storage, y, m)?;
        check_recorded_checksum(&key, entry, &child)?;
    }
    Ok(manifest)
}

fn validate_listing_month(
    storage: &dyn Storage,
    year: i32,
    month: u32,
) -> RegisterResult<Manifest> {
    let key = record::listing_month_manifest_key(year, month);
    let manifest = storage.load_manifest(&key)?;
    check_counters(&key, &manifest)?;
    for entry in &manifest.entries {
        let date = record::parse_date(&entry.key)?;
        let day_key = record::listing_day_manifest_key(date);
        let day = storage.load_manifest(&day_key)?;
        check_counters(&day_key, &day)?;
        for day_entry in &day.entries {
            validate_file(storage, &day_key, day_entry)?;
        }
        check_recorded_checksum(&key, entry, &day)?;
    }
    Ok(manifest)
}

/// Verify one terminal bitstream against its manifest entry.
fn validate_file(
    storage: &dyn Storage,
    manifest_key: &Key,
    entry: &ManifestEntry,
) -> RegisterResult<()> {
    let file_key = Key::parse(&entry.key)?;
    let (stream, computed) = storage.load_entry(&file_key)?;
    if Some(&computed) != entry.checksum.as_ref() {
        return Err(RegisterError::validation(
            entry.key.clone(),
            format!(
                "file checksum mismatch: recorded {:?}, computed {computed}",
                entry.checksum
            ),
        ));
    }
    if let Some(size) = entry.size_bytes {
        if stream.domain.size_bytes != size {
            return Err(RegisterError::validation(
                entry.key.clone(),
                format!(
                    "size mismatch: recorded {size}, stored {}",
                    stream.domain.size_bytes
                ),
            ));
        }
    }
    tracing::trace!(key = %entry.key, parent = %manifest_key, "file verified");
    Ok(())
}

/// Verify that a member manifest hashes to the checksum its parent
/// recorded for it.
fn check_recorded_checksum(
    parent_key: &Key,
    entry: &ManifestEntry,
    member: &Manifest,
) -> RegisterResult<()> {
    let computed = checksum_manifest(member)?;
    if Some(&computed) != entry.checksum.as_ref() {
        return Err(RegisterError::validation(
            entry.key.clone(),
            format!(
                "manifest checksum mismatch under {parent_key}: recorded {:?}, computed {computed}",
                entry.checksum
            ),
        ));
    }
    Ok(())
}

/// Verify that a manifest's counters equal the sum of its entries'.
fn check_counters(key: &Key, manifest: &Manifest) -> RegisterResult<()> {
    if !manifest.counters_consistent() {
        return Err(RegisterError::validation(
            key.to_string(),
            "counters do not equal the sum of the entries",
        ));
    }
    Ok(())
}
