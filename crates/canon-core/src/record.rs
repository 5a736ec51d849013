//! Record layout: how the canonical record maps onto a key/blob system.
//!
//! Pure functions from domain identifiers to canonical keys, and the
//! reverse parsers used to interpret manifest member names. The key schema:
//!
//! ```text
//! e-prints/<YYYY>/<MM>/<arXiv id>/v<n>/<files>
//! e-prints/<YYYY>/<MM>/<arXiv id>/<id>v<n>.manifest.json
//! e-prints/<YYYY>/<MM>/<arXiv id>.manifest.json
//! e-prints/<YYYY>/<MM>/<YYYY-MM-DD>.manifest.json
//! e-prints/<YYYY>/<YYYY-MM>.manifest.json
//! e-prints/<YYYY>.manifest.json
//! e-prints.manifest.json
//! announcement/<YYYY>/<MM>/<DD>/<YYYY-MM-DD>-<shard>.json
//! announcement/<YYYY>/<MM>/<YYYY-MM-DD>.manifest.json
//! announcement/<YYYY>/<YYYY-MM>.manifest.json
//! announcement/<YYYY>.manifest.json
//! announcement.manifest.json
//! global.manifest.json
//! ```
//!
//! `YYYY`/`MM` are the year and month of the e-print identifier; day-level
//! blocks are named by the first announcement date. Old-style identifiers
//! contain a `/` and therefore split into `<category>/<numeric>` path
//! segments; their file names use only the numeric part
//! (`<numeric>v<n>.json`).

use chrono::{Datelike, NaiveDate};

use crate::domain::{
    ContentType, Identifier, Key, ListingIdentifier, VersionedIdentifier,
};
use crate::errors::DomainError;

/// File-name stem for a version: `<id>v<n>`, or `<numeric>v<n>` for
/// old-style identifiers.
fn version_stem(identifier: &VersionedIdentifier) -> String {
    if identifier.arxiv_id.is_old_style() {
        let (yy, mm) = identifier.arxiv_id.yymm();
        format!(
            "{yy:02}{mm:02}{:03}v{}",
            identifier.arxiv_id.incremental_part(),
            identifier.version
        )
    } else {
        identifier.to_string()
    }
}

/// Key prefix for an e-print: `e-prints/<YYYY>/<MM>/<arXiv id>`.
pub fn eprint_prefix(identifier: &Identifier) -> String {
    format!(
        "e-prints/{}/{:02}/{identifier}",
        identifier.year(),
        identifier.month()
    )
}

/// Key prefix for a version record: `<eprint prefix>/v<n>`.
pub fn version_prefix(identifier: &VersionedIdentifier) -> String {
    format!("{}/v{}", eprint_prefix(&identifier.arxiv_id), identifier.version)
}

/// Key of the version metadata record.
pub fn metadata_key(identifier: &VersionedIdentifier) -> Key {
    Key::new(&format!(
        "{}/{}",
        version_prefix(identifier),
        ContentType::Json.make_filename(identifier)
    ))
}

/// Key of a named file within a version record.
pub fn version_file_key(identifier: &VersionedIdentifier, filename: &str) -> Key {
    Key::new(&format!("{}/{filename}", version_prefix(identifier)))
}

/// Key of the version manifest.
pub fn version_manifest_key(identifier: &VersionedIdentifier) -> Key {
    Key::new(&format!(
        "{}/{}.manifest.json",
        eprint_prefix(&identifier.arxiv_id),
        version_stem(identifier)
    ))
}

/// Key of the e-print manifest.
pub fn eprint_manifest_key(identifier: &Identifier) -> Key {
    Key::new(&format!("{}.manifest.json", eprint_prefix(identifier)))
}

/// Key of the daily e-print manifest.
pub fn day_manifest_key(date: NaiveDate) -> Key {
    Key::new(&format!(
        "e-prints/{}/{:02}/{}.manifest.json",
        date.year(),
        date.month(),
        date.format("%Y-%m-%d")
    ))
}

/// Key of the monthly e-print manifest.
pub fn month_manifest_key(year: i32, month: u32) -> Key {
    Key::new(&format!("e-prints/{year}/{year}-{month:02}.manifest.json"))
}

/// Key of the yearly e-print manifest.
pub fn year_manifest_key(year: i32) -> Key {
    Key::new(&format!("e-prints/{year}.manifest.json"))
}

/// Key of the all-e-prints manifest.
pub fn eprints_manifest_key() -> Key {
    Key::new("e-prints.manifest.json")
}

/// Key of a listing file.
pub fn listing_key(identifier: &ListingIdentifier) -> Key {
    let d = identifier.date;
    Key::new(&format!(
        "announcement/{}/{:02}/{:02}/{}-{}.json",
        d.year(),
        d.month(),
        d.day(),
        d.format("%Y-%m-%d"),
        identifier.shard
    ))
}

/// Key of the daily listing manifest.
pub fn listing_day_manifest_key(date: NaiveDate) -> Key {
    Key::new(&format!(
        "announcement/{}/{:02}/{}.manifest.json",
        date.year(),
        date.month(),
        date.format("%Y-%m-%d")
    ))
}

/// Key of the monthly listing manifest.
pub fn listing_month_manifest_key(year: i32, month: u32) -> Key {
    Key::new(&format!("announcement/{year}/{year}-{month:02}.manifest.json"))
}

/// Key of the yearly listing manifest.
pub fn listing_year_manifest_key(year: i32) -> Key {
    Key::new(&format!("announcement/{year}.manifest.json"))
}

/// Key of the all-listings manifest.
pub fn listings_manifest_key() -> Key {
    Key::new("announcement.manifest.json")
}

/// Key of the global manifest covering the entire record.
pub fn global_manifest_key() -> Key {
    Key::new("global.manifest.json")
}

// ---------------------------------------------------------------------------
// Reverse parsing of manifest member names. Each parser is the exact
// inverse of the member-name rendering used at the corresponding level.

/// Parse a year member name (`"2029"`).
pub fn parse_year(name: &str) -> Result<i32, DomainError> {
    if name.len() != 4 {
        return Err(DomainError::InvalidDate {
            value: name.to_string(),
        });
    }
    name.parse().map_err(|_| DomainError::InvalidDate {
        value: name.to_string(),
    })
}

/// Parse a `"YYYY-MM"` member name.
pub fn parse_year_month(name: &str) -> Result<(i32, u32), DomainError> {
    let invalid = || DomainError::InvalidDate {
        value: name.to_string(),
    };
    let (y, m) = name.split_once('-').ok_or_else(invalid)?;
    let year = parse_year(y)?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || m.len() != 2 {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Parse a `"YYYY-MM-DD"` member name.
pub fn parse_date(name: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").map_err(|_| DomainError::InvalidDate {
        value: name.to_string(),
    })
}

/// Parse a listing member name (the listing file key) back into its
/// [`ListingIdentifier`]. Inverse of [`listing_key`].
pub fn parse_listing_member(name: &str) -> Result<ListingIdentifier, DomainError> {
    let invalid = || DomainError::InvalidDate {
        value: name.to_string(),
    };
    let basename = name.rsplit('/').next().ok_or_else(invalid)?;
    let stem = basename.strip_suffix(".json").ok_or_else(invalid)?;
    // <YYYY-MM-DD>-<shard>; the shard itself may contain `-`.
    if stem.len() < 12 {
        return Err(invalid());
    }
    let (date_part, rest) = stem.split_at(10);
    let shard = rest.strip_prefix('-').ok_or_else(invalid)?;
    if shard.is_empty() {
        return Err(invalid());
    }
    Ok(ListingIdentifier::from_parts(parse_date(date_part)?, shard))
}

/// Member-name renderers, used when writing manifest entries.
pub fn year_member_name(year: i32) -> String {
    format!("{year}")
}

pub fn year_month_member_name(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

pub fn date_member_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
