//! Filesystem backends.
//!
//! [`FilesystemStorage`] lays the canonical record out on disk exactly as
//! the key algebra dictates: the record-relative path of a key is its path
//! under the base directory. Writes are key-atomic (tempfile + rename), so
//! a store either succeeds entirely or leaves the prior value intact.
//!
//! [`FilesystemSource`] resolves `file://` URIs, refusing anything outside
//! its configured base directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use canon_core::domain::{CanonicalFile, ContentType, Key, Uri};
use canon_core::errors::{SourceError, SourceResult, StorageError, StorageResult};
use canon_core::integrity::{checksum_bytes, Manifest};
use canon_core::store::{LazyReader, RecordStream, Source, StorableEntry, Storage};

/// Content source over a filesystem tree (outside the canonical record).
pub struct FilesystemSource {
    base: PathBuf,
}

impl FilesystemSource {
    /// The base directory must exist; everything under it is resolvable.
    pub fn new(base: impl Into<PathBuf>) -> std::io::Result<Self> {
        Ok(FilesystemSource {
            base: base.into().canonicalize()?,
        })
    }

    fn resolve_path(&self, uri: &Uri) -> Option<PathBuf> {
        if !uri.is_file() {
            return None;
        }
        let path = Path::new(uri.path());
        // Refuse paths that escape the base directory once normalized.
        let resolved = path.canonicalize().ok()?;
        resolved.starts_with(&self.base).then_some(resolved)
    }
}

impl Source for FilesystemSource {
    fn can_resolve(&self, uri: &Uri) -> bool {
        self.resolve_path(uri).is_some()
    }

    fn load(&self, uri: &Uri) -> SourceResult<LazyReader> {
        let path = self
            .resolve_path(uri)
            .ok_or_else(|| SourceError::cannot_resolve(uri.to_string()))?;
        let display = uri.to_string();
        Ok(LazyReader::deferred(move || {
            fs::read(&path).map_err(|e| SourceError::read(&display, e))
        }))
    }
}

/// The canonical record on a local filesystem.
pub struct FilesystemStorage {
    base: PathBuf,
}

impl FilesystemStorage {
    /// Open (creating if necessary) a record rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(FilesystemStorage {
            base: base.canonicalize()?,
        })
    }

    fn path_for(&self, key: &Key) -> PathBuf {
        self.base.join(key.rel_path())
    }

    /// Write bytes atomically: to a tempfile in the target directory, then
    /// rename over the destination.
    fn write_atomic(&self, key: &Key, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key);
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::io(key.to_string(), "key has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|e| StorageError::io(key.to_string(), e))?;
        let tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StorageError::io(key.to_string(), e))?;
        fs::write(tmp.path(), bytes).map_err(|e| StorageError::io(key.to_string(), e))?;
        tmp.persist(&path)
            .map_err(|e| StorageError::io(key.to_string(), e))?;
        tracing::debug!(key = %key, bytes = bytes.len(), "stored");
        Ok(())
    }

    fn descriptor_for(&self, key: &Key, path: &Path) -> StorageResult<CanonicalFile> {
        let meta = fs::metadata(path).map_err(|e| StorageError::io(key.to_string(), e))?;
        let modified: DateTime<Utc> = meta
            .modified()
            .map_err(|e| StorageError::io(key.to_string(), e))?
            .into();
        let content_type = ContentType::from_filename(key.filename())
            .map_err(|e| StorageError::decode(key.to_string(), e))?;
        Ok(CanonicalFile {
            modified,
            size_bytes: meta.len(),
            content_type,
            filename: Some(key.filename().to_string()),
            ref_: key.uri().clone(),
            is_gzipped: false,
        })
    }
}

impl Source for FilesystemStorage {
    fn can_resolve(&self, uri: &Uri) -> bool {
        uri.is_canonical()
    }

    fn load(&self, uri: &Uri) -> SourceResult<LazyReader> {
        if !uri.is_canonical() {
            return Err(SourceError::cannot_resolve(uri.to_string()));
        }
        let path = self.base.join(uri.rel_path());
        let display = uri.to_string();
        Ok(LazyReader::deferred(move || {
            fs::read(&path).map_err(|e| SourceError::read(&display, e))
        }))
    }
}

impl Storage for FilesystemStorage {
    fn list_subkeys(&self, key: &Key) -> StorageResult<Vec<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StorageError::does_not_exist(key.to_string()));
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&path).map_err(|e| StorageError::io(key.to_string(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(key.to_string(), e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn store_entry(&self, entry: &mut StorableEntry) -> StorageResult<()> {
        let bytes = entry.resolve_bytes()?;
        self.write_atomic(&entry.key, &bytes)
    }

    fn load_entry(&self, key: &Key) -> StorageResult<(RecordStream, String)> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StorageError::does_not_exist(key.to_string()));
        }
        let domain = self.descriptor_for(key, &path)?;
        let bytes = fs::read(&path).map_err(|e| StorageError::io(key.to_string(), e))?;
        let checksum = checksum_bytes(&bytes);
        Ok((
            RecordStream {
                domain,
                content: LazyReader::from_bytes(bytes),
            },
            checksum,
        ))
    }

    fn store_manifest(&self, key: &Key, manifest: &Manifest) -> StorageResult<()> {
        let bytes = manifest
            .canonical_bytes()
            .map_err(|e| StorageError::decode(key.to_string(), e))?;
        self.write_atomic(key, &bytes)
    }

    fn load_manifest(&self, key: &Key) -> StorageResult<Manifest> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StorageError::does_not_exist(key.to_string()));
        }
        let bytes = fs::read(&path).map_err(|e| StorageError::io(key.to_string(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::decode(key.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::integrity::ManifestEntry;
    use chrono::TimeZone;
    use std::io::Read as _;

    fn storage() -> (tempfile::TempDir, FilesystemStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    fn entry(key: &Key, bytes: &[u8]) -> StorableEntry {
        StorableEntry::new(
            key.clone(),
            CanonicalFile {
                modified: Utc.with_ymd_and_hms(2029, 1, 29, 0, 0, 0).unwrap(),
                size_bytes: bytes.len() as u64,
                content_type: ContentType::Pdf,
                filename: Some(key.filename().to_string()),
                ref_: Uri::parse("file:///somewhere/else.pdf").unwrap(),
                is_gzipped: false,
            },
            LazyReader::from_bytes(bytes.to_vec()),
        )
    }

    #[test]
    fn store_and_load_entry_round_trip() {
        let (_dir, storage) = storage();
        let key = Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf");
        let mut e = entry(&key, b"%PDF-1.7 pretend");
        storage.store_entry(&mut e).unwrap();
        assert_eq!(e.domain.ref_, key.uri().clone());

        let (mut stream, checksum) = storage.load_entry(&key).unwrap();
        assert_eq!(checksum, e.checksum.unwrap());
        let mut content = Vec::new();
        stream.content.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"%PDF-1.7 pretend");
        assert_eq!(stream.domain.size_bytes, content.len() as u64);
    }

    #[test]
    fn missing_key_is_distinct() {
        let (_dir, storage) = storage();
        let err = storage
            .load_entry(&Key::new("e-prints/2029/01/nope/v1/nope.pdf"))
            .unwrap_err();
        assert!(err.is_does_not_exist());
        let err = storage
            .load_manifest(&Key::new("e-prints/2029.manifest.json"))
            .unwrap_err();
        assert!(err.is_does_not_exist());
    }

    #[test]
    fn manifest_round_trip() {
        let (_dir, storage) = storage();
        let key = Key::new("e-prints/2029.manifest.json");
        let mut manifest = Manifest::empty();
        manifest.upsert(ManifestEntry::for_member("2029-01", "abc", &Manifest::empty()));
        storage.store_manifest(&key, &manifest).unwrap();
        assert_eq!(storage.load_manifest(&key).unwrap(), manifest);
    }

    #[test]
    fn list_subkeys_returns_direct_children() {
        let (_dir, storage) = storage();
        let mut a = entry(
            &Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf"),
            b"a",
        );
        let mut b = entry(
            &Key::new("e-prints/2029/01/2901.00345/v2/2901.00345v2.pdf"),
            b"b",
        );
        storage.store_entry(&mut a).unwrap();
        storage.store_entry(&mut b).unwrap();
        assert_eq!(
            storage
                .list_subkeys(&Key::new("e-prints/2029/01/2901.00345"))
                .unwrap(),
            vec!["v1".to_string(), "v2".to_string()]
        );
    }

    #[test]
    fn source_refuses_paths_outside_base() {
        let dir = tempfile::tempdir().unwrap();
        let inside = dir.path().join("data");
        fs::create_dir_all(&inside).unwrap();
        fs::write(inside.join("ok.pdf"), b"fine").unwrap();
        let source = FilesystemSource::new(&inside).unwrap();

        let ok = Uri::parse(&format!("file://{}/ok.pdf", inside.display())).unwrap();
        assert!(source.can_resolve(&ok));

        let outside = dir.path().join("secret.pdf");
        fs::write(&outside, b"no").unwrap();
        let bad = Uri::parse(&format!("file://{}", outside.display())).unwrap();
        assert!(!source.can_resolve(&bad));
        assert!(source.load(&bad).is_err());
    }
}
