//! File descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::ContentType;
use super::uri::Uri;

/// Immutable descriptor of one bitstream in the record.
///
/// Content is not held here; it is fetched on demand by dereferencing
/// [`ref_`](CanonicalFile::ref_) through a [`crate::store::Source`]. Once a
/// file has been stored, `ref_` is rewritten to its canonical key and the
/// original URI is no longer required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFile {
    /// When the bitstream was last modified at its source.
    pub modified: DateTime<Utc>,

    /// Size of the (decompressed) bitstream in bytes.
    pub size_bytes: u64,

    /// Content type of the bitstream.
    pub content_type: ContentType,

    /// Name of the file within its version record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Where the content can be dereferenced.
    #[serde(rename = "ref")]
    pub ref_: Uri,

    /// True if the bitstream is wrapped in an outer gzip layer that storage
    /// must strip at store time.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_gzipped: bool,
}

impl CanonicalFile {
    pub fn mime_type(&self) -> &'static str {
        self.content_type.mime_type()
    }
}
