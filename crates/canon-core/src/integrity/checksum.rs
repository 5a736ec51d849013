//! Checksum primitives.

use std::io::Read;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use thiserror::Error;

use super::manifest::Manifest;

/// A checksum could not be computed.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// A manifest entry has no checksum, so the collection checksum is
    /// undefined.
    #[error("manifest entry has no checksum: {key}")]
    MissingEntryChecksum { key: String },

    /// Reading the content to be hashed failed.
    #[error("failed to read content for checksum: {0}")]
    Io(#[from] std::io::Error),
}

/// URL-safe base64-encoded md5 hash of a byte slice.
pub fn checksum_bytes(content: &[u8]) -> String {
    URL_SAFE.encode(md5::compute(content).0)
}

/// URL-safe base64-encoded md5 hash of a reader's full content.
pub fn checksum_reader<R: Read>(reader: &mut R) -> Result<String, ChecksumError> {
    let mut content = Vec::new();
    reader.read_to_end(&mut content)?;
    Ok(checksum_bytes(&content))
}

/// Collection checksum: md5 over the concatenation of the manifest's entry
/// checksums, sorted by entry key.
pub fn checksum_manifest(manifest: &Manifest) -> Result<String, ChecksumError> {
    let mut entries: Vec<_> = manifest.entries.iter().collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    let mut concatenated = String::new();
    for entry in entries {
        match &entry.checksum {
            Some(checksum) => concatenated.push_str(checksum),
            None => {
                return Err(ChecksumError::MissingEntryChecksum {
                    key: entry.key.clone(),
                })
            }
        }
    }
    Ok(checksum_bytes(concatenated.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::manifest::ManifestEntry;

    #[test]
    fn bytes_checksum_is_url_safe_base64_md5() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(checksum_bytes(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
        assert_eq!(checksum_bytes(b"hello world"), "XrY7u-Ae7tCTyyK7j1rNww==");
    }

    #[test]
    fn reader_checksum_matches_bytes_checksum() {
        let data = vec![42u8; 10_000];
        let mut cursor = std::io::Cursor::new(data.clone());
        assert_eq!(checksum_reader(&mut cursor).unwrap(), checksum_bytes(&data));
    }

    #[test]
    fn manifest_checksum_is_order_independent() {
        let mut a = Manifest::empty();
        a.entries.push(ManifestEntry::for_member("2029", "abc", &Manifest::empty()));
        a.entries.push(ManifestEntry::for_member("1999", "def", &Manifest::empty()));
        let mut b = Manifest::empty();
        b.entries.push(ManifestEntry::for_member("1999", "def", &Manifest::empty()));
        b.entries.push(ManifestEntry::for_member("2029", "abc", &Manifest::empty()));
        assert_eq!(
            checksum_manifest(&a).unwrap(),
            checksum_manifest(&b).unwrap()
        );
        // Sorted concatenation: md5("defabc"), not md5("abcdef").
        assert_eq!(
            checksum_manifest(&a).unwrap(),
            checksum_bytes(b"defabc")
        );
    }

    #[test]
    fn manifest_checksum_requires_entry_checksums() {
        let mut m = Manifest::empty();
        m.entries.push(ManifestEntry {
            key: "2029".to_string(),
            checksum: None,
            ..ManifestEntry::default()
        });
        assert!(matches!(
            checksum_manifest(&m),
            Err(ChecksumError::MissingEntryChecksum { .. })
        ));
    }
}
