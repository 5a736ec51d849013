//! In-memory backends for tests and fixtures.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use canon_core::domain::{CanonicalFile, ContentType, Key, Uri};
use canon_core::errors::{SourceError, SourceResult, StorageError, StorageResult};
use canon_core::integrity::{checksum_bytes, Manifest};
use canon_core::store::{LazyReader, RecordStream, Source, StorableEntry, Storage};

#[derive(Debug, Clone)]
struct StoredEntry {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, StoredEntry>,
    manifests: BTreeMap<String, Manifest>,
}

/// A whole canonical record held in memory.
///
/// Cheap to clone handles around: the state is shared behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// All stored entry keys, in order. Handy for asserting exactly which
    /// keys a scenario wrote.
    pub fn entry_keys(&self) -> Vec<String> {
        self.inner.lock().expect("poisoned").entries.keys().cloned().collect()
    }

    /// All stored manifest keys, in order.
    pub fn manifest_keys(&self) -> Vec<String> {
        self.inner.lock().expect("poisoned").manifests.keys().cloned().collect()
    }

    /// Raw bytes of a stored entry.
    pub fn entry_bytes(&self, key: &Key) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("poisoned")
            .entries
            .get(&key.to_string())
            .map(|e| e.bytes.clone())
    }

    /// Full copy of the stored entries, keyed by canonical key.
    pub fn dump_entries(&self) -> BTreeMap<String, Vec<u8>> {
        self.inner
            .lock()
            .expect("poisoned")
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.bytes.clone()))
            .collect()
    }

    /// Full copy of the stored manifests, keyed by canonical key.
    pub fn dump_manifests(&self) -> BTreeMap<String, Manifest> {
        self.inner.lock().expect("poisoned").manifests.clone()
    }

    /// Overwrite a stored entry's bytes in place, bypassing the storage
    /// contract. For corruption tests.
    pub fn corrupt_entry(&self, key: &Key, bytes: Vec<u8>) {
        if let Some(entry) = self
            .inner
            .lock()
            .expect("poisoned")
            .entries
            .get_mut(&key.to_string())
        {
            entry.bytes = bytes;
        }
    }

    fn content_type_for(key: &Key) -> ContentType {
        ContentType::from_filename(key.filename()).unwrap_or(ContentType::Json)
    }
}

impl Source for MemoryStorage {
    fn can_resolve(&self, uri: &Uri) -> bool {
        uri.is_canonical()
    }

    fn load(&self, uri: &Uri) -> SourceResult<LazyReader> {
        let inner = self.inner.clone();
        let display = uri.to_string();
        Ok(LazyReader::deferred(move || {
            inner
                .lock()
                .expect("poisoned")
                .entries
                .get(&display)
                .map(|e| e.bytes.clone())
                .ok_or_else(|| SourceError::read(&display, "no such key"))
        }))
    }
}

impl Storage for MemoryStorage {
    fn list_subkeys(&self, key: &Key) -> StorageResult<Vec<String>> {
        let prefix = format!("{key}/");
        let inner = self.inner.lock().expect("poisoned");
        let mut children: Vec<String> = inner
            .entries
            .keys()
            .chain(inner.manifests.keys())
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();
        children.sort();
        children.dedup();
        if children.is_empty() {
            return Err(StorageError::does_not_exist(key.to_string()));
        }
        Ok(children)
    }

    fn store_entry(&self, entry: &mut StorableEntry) -> StorageResult<()> {
        let bytes = entry.resolve_bytes()?;
        tracing::debug!(key = %entry.key, bytes = bytes.len(), "stored in memory");
        self.inner.lock().expect("poisoned").entries.insert(
            entry.key.to_string(),
            StoredEntry {
                bytes,
                modified: entry.domain.modified,
            },
        );
        Ok(())
    }

    fn load_entry(&self, key: &Key) -> StorageResult<(RecordStream, String)> {
        let inner = self.inner.lock().expect("poisoned");
        let stored = inner
            .entries
            .get(&key.to_string())
            .ok_or_else(|| StorageError::does_not_exist(key.to_string()))?;
        let checksum = checksum_bytes(&stored.bytes);
        let domain = CanonicalFile {
            modified: stored.modified,
            size_bytes: stored.bytes.len() as u64,
            content_type: Self::content_type_for(key),
            filename: Some(key.filename().to_string()),
            ref_: key.uri().clone(),
            is_gzipped: false,
        };
        Ok((
            RecordStream {
                domain,
                content: LazyReader::from_bytes(stored.bytes.clone()),
            },
            checksum,
        ))
    }

    fn store_manifest(&self, key: &Key, manifest: &Manifest) -> StorageResult<()> {
        // Round-trip through the canonical bytes so that what is "stored"
        // is exactly what a durable backend would hold.
        let bytes = manifest
            .canonical_bytes()
            .map_err(|e| StorageError::decode(key.to_string(), e))?;
        let parsed: Manifest = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::decode(key.to_string(), e))?;
        self.inner
            .lock()
            .expect("poisoned")
            .manifests
            .insert(key.to_string(), parsed);
        Ok(())
    }

    fn load_manifest(&self, key: &Key) -> StorageResult<Manifest> {
        self.inner
            .lock()
            .expect("poisoned")
            .manifests
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| StorageError::does_not_exist(key.to_string()))
    }
}

/// A content source over an in-memory map of URIs.
#[derive(Debug, Default)]
pub struct MemorySource {
    content: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// Register content for a URI.
    pub fn add(&mut self, uri: &Uri, bytes: Vec<u8>, modified: DateTime<Utc>) {
        self.content.insert(uri.to_string(), (bytes, modified));
    }
}

impl Source for MemorySource {
    fn can_resolve(&self, uri: &Uri) -> bool {
        self.content.contains_key(&uri.to_string())
    }

    fn load(&self, uri: &Uri) -> SourceResult<LazyReader> {
        let (bytes, _) = self
            .content
            .get(&uri.to_string())
            .ok_or_else(|| SourceError::cannot_resolve(uri.to_string()))?;
        Ok(LazyReader::from_bytes(bytes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn subkeys_are_direct_children_only() {
        let storage = MemoryStorage::new();
        let mut put = |path: &str| {
            let key = Key::new(path);
            let mut entry = StorableEntry::new(
                key.clone(),
                CanonicalFile {
                    modified: Utc.with_ymd_and_hms(2029, 1, 29, 0, 0, 0).unwrap(),
                    size_bytes: 1,
                    content_type: ContentType::Pdf,
                    filename: Some(key.filename().to_string()),
                    ref_: key.uri().clone(),
                    is_gzipped: false,
                },
                LazyReader::from_bytes(vec![0]),
            );
            storage.store_entry(&mut entry).unwrap();
        };
        put("e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf");
        put("e-prints/2029/01/2901.00345/v2/2901.00345v2.pdf");
        put("e-prints/2029/01/2901.00346/v1/2901.00346v1.pdf");

        assert_eq!(
            storage
                .list_subkeys(&Key::new("e-prints/2029/01/2901.00345"))
                .unwrap(),
            vec!["v1".to_string(), "v2".to_string()]
        );
        assert!(storage
            .list_subkeys(&Key::new("e-prints/1999"))
            .unwrap_err()
            .is_does_not_exist());
    }
}
