//! Storage and source contracts.
//!
//! A [`Source`] can dereference opaque URIs to lazy byte streams; a
//! [`Storage`] is a source over canonical keys that can also persist
//! entries and manifests. Adapters live in `canon-store`; the register
//! works exclusively through these traits.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use flate2::read::GzDecoder;

use crate::domain::{CanonicalFile, Key, Uri};
use crate::errors::{SourceError, SourceResult, StorageResult};
use crate::integrity::{checksum_bytes, Manifest};

/// A lazily-loaded, memoizing byte stream.
///
/// The underlying I/O is deferred until the first read; once read, the
/// content is held in memory, so seeks and re-reads are cheap. Dropping an
/// unread stream never touches the underlying resource.
pub struct LazyReader {
    loader: Option<Box<dyn FnOnce() -> SourceResult<Vec<u8>> + Send>>,
    content: Option<Cursor<Vec<u8>>>,
}

impl LazyReader {
    /// Defer to `loader` on first read.
    pub fn deferred(loader: impl FnOnce() -> SourceResult<Vec<u8>> + Send + 'static) -> Self {
        LazyReader {
            loader: Some(Box::new(loader)),
            content: None,
        }
    }

    /// A stream over bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        LazyReader {
            loader: None,
            content: Some(Cursor::new(bytes)),
        }
    }

    fn materialize(&mut self) -> SourceResult<&mut Cursor<Vec<u8>>> {
        if self.content.is_none() {
            let loader = self.loader.take().ok_or_else(|| {
                SourceError::read("<closed>", "stream already consumed")
            })?;
            self.content = Some(Cursor::new(loader()?));
        }
        Ok(self.content.as_mut().expect("just materialized"))
    }

    /// Read the full content, memoizing it. The stream position is left at
    /// the start, so the stream can still be read afterwards.
    pub fn bytes(&mut self) -> SourceResult<Vec<u8>> {
        let cursor = self.materialize()?;
        cursor.set_position(0);
        let bytes = cursor.get_ref().clone();
        Ok(bytes)
    }
}

impl std::fmt::Debug for LazyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.content {
            Some(c) => write!(f, "LazyReader(loaded, {} bytes)", c.get_ref().len()),
            None => write!(f, "LazyReader(deferred)"),
        }
    }
}

impl Read for LazyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cursor = self.materialize().map_err(io::Error::other)?;
        cursor.read(buf)
    }
}

impl Seek for LazyReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let cursor = self.materialize().map_err(io::Error::other)?;
        cursor.seek(pos)
    }
}

/// A bitstream loaded from the record: descriptor plus lazy content.
#[derive(Debug)]
pub struct RecordStream {
    pub domain: CanonicalFile,
    pub content: LazyReader,
}

/// A bitstream on its way into the record.
///
/// [`Storage::store_entry`] consumes the content, decompresses it if the
/// descriptor says it is gzipped (updating `size_bytes` and clearing the
/// flag), rewrites `ref` to the canonical key, and records the checksum of
/// the stored bytes.
#[derive(Debug)]
pub struct StorableEntry {
    pub key: Key,
    pub domain: CanonicalFile,
    pub content: LazyReader,
    pub checksum: Option<String>,
}

impl StorableEntry {
    pub fn new(key: Key, domain: CanonicalFile, content: LazyReader) -> Self {
        StorableEntry {
            key,
            domain,
            content,
            checksum: None,
        }
    }

    /// Resolve the bytes to be written: read the content, unwrap exactly
    /// one gzip layer if the descriptor requires it, and update the
    /// descriptor (size, gzip flag, canonical ref) and checksum.
    ///
    /// Storage adapters call this before writing; the returned bytes are
    /// what must land under [`key`](StorableEntry::key).
    pub fn resolve_bytes(&mut self) -> SourceResult<Vec<u8>> {
        let raw = LazyReader::bytes(&mut self.content)?;
        let bytes = if self.domain.is_gzipped {
            let mut decoder = GzDecoder::new(raw.as_slice());
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SourceError::read(self.key.to_string(), e))?;
            self.domain.is_gzipped = false;
            decompressed
        } else {
            raw
        };
        self.domain.size_bytes = bytes.len() as u64;
        self.domain.ref_ = self.key.uri().clone();
        self.checksum = Some(checksum_bytes(&bytes));
        Ok(bytes)
    }
}

/// Dereferences opaque URIs to lazy byte streams.
///
/// Implementations must be safe to call concurrently.
pub trait Source: Send + Sync {
    /// Whether this source can resolve the URI.
    fn can_resolve(&self, uri: &Uri) -> bool;

    /// Make a stream that waits to load until it is read.
    fn load(&self, uri: &Uri) -> SourceResult<LazyReader>;
}

/// Dereference a URI using a set of available sources.
///
/// Sources are tried in order; the first whose `can_resolve` answers true
/// is used.
pub fn dereference(sources: &[Box<dyn Source>], uri: &Uri) -> SourceResult<LazyReader> {
    for source in sources {
        if source.can_resolve(uri) {
            return source.load(uri);
        }
    }
    Err(SourceError::cannot_resolve(uri.to_string()))
}

/// Stores the canonical record.
///
/// A storage is also a [`Source`] for the keys it holds, so that canonical
/// refs dereference through the same machinery as external URIs.
pub trait Storage: Source {
    /// List the direct children of `key`.
    fn list_subkeys(&self, key: &Key) -> StorageResult<Vec<String>>;

    /// Store a bitstream entry, decompressing per the descriptor and
    /// updating it (see [`StorableEntry::resolve_bytes`]).
    fn store_entry(&self, entry: &mut StorableEntry) -> StorageResult<()>;

    /// Load a bitstream entry and the checksum of its stored bytes.
    fn load_entry(&self, key: &Key) -> StorageResult<(RecordStream, String)>;

    /// Store an integrity manifest.
    fn store_manifest(&self, key: &Key, manifest: &Manifest) -> StorageResult<()>;

    /// Load an integrity manifest.
    fn load_manifest(&self, key: &Key) -> StorageResult<Manifest>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentType;
    use chrono::{TimeZone, Utc};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn lazy_reader_defers_and_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut reader = LazyReader::deferred(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(b"deferred content".to_vec())
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "deferred content");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Seek to zero and re-read without touching the loader again.
        reader.seek(SeekFrom::Start(0)).unwrap();
        let mut again = String::new();
        reader.read_to_string(&mut again).unwrap();
        assert_eq!(again, buf);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn descriptor(is_gzipped: bool, size: u64) -> CanonicalFile {
        CanonicalFile {
            modified: Utc.with_ymd_and_hms(2029, 1, 29, 0, 0, 0).unwrap(),
            size_bytes: size,
            content_type: ContentType::Targz,
            filename: Some("2901.00345v1.tar.gz".to_string()),
            ref_: Uri::parse("file:///data/orig/2901.00345v1.tar.gz").unwrap(),
            is_gzipped,
        }
    }

    #[test]
    fn resolve_bytes_unwraps_one_gzip_layer() {
        let inner = b"pretend this is a tarball".to_vec();
        let wrapped = gzip(&inner);
        let key = Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.tar.gz");
        let mut entry = StorableEntry::new(
            key.clone(),
            descriptor(true, wrapped.len() as u64),
            LazyReader::from_bytes(wrapped),
        );

        let stored = entry.resolve_bytes().unwrap();
        assert_eq!(stored, inner);
        assert!(!entry.domain.is_gzipped);
        assert_eq!(entry.domain.size_bytes, inner.len() as u64);
        assert_eq!(entry.domain.ref_, key.uri().clone());
        assert_eq!(entry.checksum.as_deref(), Some(checksum_bytes(&inner).as_str()));
    }

    #[test]
    fn resolve_bytes_passes_plain_content_through() {
        let data = b"plain bytes".to_vec();
        let key = Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf");
        let mut entry = StorableEntry::new(
            key,
            descriptor(false, data.len() as u64),
            LazyReader::from_bytes(data.clone()),
        );
        assert_eq!(entry.resolve_bytes().unwrap(), data);
        assert_eq!(entry.domain.size_bytes, data.len() as u64);
    }

    #[test]
    fn dereference_uses_first_resolving_source() {
        struct Only(&'static str);
        impl Source for Only {
            fn can_resolve(&self, uri: &Uri) -> bool {
                uri.to_string().contains(self.0)
            }
            fn load(&self, _uri: &Uri) -> SourceResult<LazyReader> {
                let tag = self.0;
                Ok(LazyReader::deferred(move || Ok(tag.as_bytes().to_vec())))
            }
        }
        let sources: Vec<Box<dyn Source>> = vec![Box::new(Only("alpha")), Box::new(Only("beta"))];
        let uri = Uri::parse("file:///data/beta/file").unwrap();
        let mut stream = dereference(&sources, &uri).unwrap();
        assert_eq!(LazyReader::bytes(&mut stream).unwrap(), b"beta".to_vec());

        let missing = Uri::parse("file:///data/gamma/file").unwrap();
        assert!(matches!(
            dereference(&sources, &missing),
            Err(SourceError::CannotResolve { .. })
        ));
    }
}
