//! E-print versions.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentType, SourceType};
use super::event::EventSummary;
use super::file::CanonicalFile;
use super::identifier::VersionedIdentifier;
use super::metadata::{Metadata, Person};

/// An abridged reference to an earlier [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReference {
    pub identifier: VersionedIdentifier,
    pub announced_date: NaiveDate,
    pub submitted_date: NaiveDate,
}

impl From<&Version> for VersionReference {
    fn from(version: &Version) -> Self {
        VersionReference {
            identifier: version.identifier.clone(),
            announced_date: version.announced_date,
            submitted_date: version.submitted_date.date_naive(),
        }
    }
}

/// A single version of an arXiv e-print: the unit that an announcement
/// creates or replaces.
///
/// Invariants: `announced_date_first <= announced_date`; `version >= 1`;
/// the first version of an e-print has
/// `announced_date_first == announced_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub identifier: VersionedIdentifier,

    /// Day on which this version was announced.
    pub announced_date: NaiveDate,

    /// Day on which the first version of the e-print was announced.
    pub announced_date_first: NaiveDate,

    /// When this version was submitted to arXiv.
    pub submitted_date: DateTime<Utc>,

    /// The last time the record for this version was changed.
    pub updated_date: DateTime<Utc>,

    pub metadata: Metadata,

    /// Events that are specific to this version of the e-print.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventSummary>,

    /// References to previous versions of the e-print.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_versions: Vec<VersionReference>,

    /// Person responsible for submitting this version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter: Option<Person>,

    /// Proxy that deposited the version on behalf of the submitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(default)]
    pub is_announced: bool,

    #[serde(default)]
    pub is_withdrawn: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_withdrawal: Option<String>,

    /// True if this record was populated from the legacy system.
    #[serde(default)]
    pub is_legacy: bool,

    /// The original user-submitted source package.
    pub source: CanonicalFile,

    /// Human-readable representation of the e-print; usually a PDF
    /// generated from the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<CanonicalFile>,

    /// Internal code for the source type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,

    /// Additional dissemination formats for this version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub formats: BTreeMap<ContentType, CanonicalFile>,
}

impl Version {
    /// Get a particular dissemination format for this version.
    ///
    /// `"source"` and `"render"` name the corresponding members; anything
    /// else is looked up in [`formats`](Version::formats).
    pub fn get_format(&self, desired: &str) -> Option<&CanonicalFile> {
        match desired {
            "source" => Some(&self.source),
            "render" => self.render.as_ref(),
            other => {
                let content_type = ContentType::from_mime_type(other)
                    .or_else(|_| ContentType::from_value(other))
                    .ok()?;
                self.formats.get(&content_type)
            }
        }
    }

    /// Size of the source package in kilobytes.
    pub fn size_kilobytes(&self) -> u64 {
        self.source.size_bytes.div_ceil(1_024)
    }
}
