//! Scheme-tagged URIs and canonical keys.
//!
//! Three schemes are meaningful to the record:
//!
//! - `arxiv:///…`: a canonical key within the record;
//! - `file:///…`: a filesystem path (a plain absolute path normalizes
//!   to this form);
//! - `http(s)://…`: a trusted remote.
//!
//! A [`Key`] is a URI that is guaranteed to carry the `arxiv` scheme.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

/// URI scheme accepted by the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scheme {
    Arxiv,
    File,
    Http,
    Https,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Arxiv => "arxiv",
            Scheme::File => "file",
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// An opaque reference to content, resolvable by a [`crate::store::Source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    scheme: Scheme,
    /// Host for http(s) URIs; empty otherwise.
    netloc: String,
    /// Path component, always with a leading `/`.
    path: String,
}

impl Uri {
    /// Parse a URI, normalizing a bare absolute path to `file://`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if let Some(path) = value.strip_prefix('/') {
            return Ok(Uri {
                scheme: Scheme::File,
                netloc: String::new(),
                path: format!("/{}", path.trim_start_matches('/')),
            });
        }
        if let Some(rest) = value.strip_prefix("arxiv://") {
            return Ok(Uri {
                scheme: Scheme::Arxiv,
                netloc: String::new(),
                path: normalize_path(rest),
            });
        }
        if let Some(rest) = value.strip_prefix("file://") {
            return Ok(Uri {
                scheme: Scheme::File,
                netloc: String::new(),
                path: normalize_path(rest),
            });
        }
        if value.starts_with("http://") || value.starts_with("https://") {
            let parsed = url::Url::parse(value).map_err(|e| DomainError::InvalidUri {
                value: value.to_string(),
                reason: e.to_string(),
            })?;
            let scheme = if parsed.scheme() == "http" {
                Scheme::Http
            } else {
                Scheme::Https
            };
            return Ok(Uri {
                scheme,
                netloc: parsed.host_str().unwrap_or_default().to_string(),
                path: parsed.path().to_string(),
            });
        }
        Err(DomainError::InvalidUri {
            value: value.to_string(),
            reason: "unsupported scheme".to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host component; empty for `arxiv` and `file` URIs.
    pub fn netloc(&self) -> &str {
        &self.netloc
    }

    /// Path component, with a leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path component without the leading `/`.
    pub fn rel_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Final path segment, if any.
    pub fn filename(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|s| !s.is_empty())
    }

    pub fn is_canonical(&self) -> bool {
        self.scheme == Scheme::Arxiv
    }

    pub fn is_file(&self) -> bool {
        self.scheme == Scheme::File
    }

    pub fn is_http_url(&self) -> bool {
        matches!(self.scheme, Scheme::Http | Scheme::Https)
    }
}

fn normalize_path(rest: &str) -> String {
    // `arxiv:///x` and `file:///x` have an empty authority; tolerate the
    // authority-less spellings `arxiv:/x` and `arxiv://x` as well.
    format!("/{}", rest.trim_start_matches('/'))
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.netloc, self.path)
    }
}

impl FromStr for Uri {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Uri::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A canonical key: a URI with scheme `arxiv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Uri);

impl Key {
    /// Build a key from a record-relative path like
    /// `e-prints/2029/01/2901.00345/v1/2901.00345v1.json`.
    pub fn new(path: &str) -> Self {
        Key(Uri {
            scheme: Scheme::Arxiv,
            netloc: String::new(),
            path: format!("/{}", path.trim_start_matches('/')),
        })
    }

    /// Parse a key from its URI form, rejecting non-`arxiv` schemes.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if !value.starts_with("arxiv://") {
            return Err(DomainError::NotAKey {
                value: value.to_string(),
            });
        }
        let uri = Uri::parse(value)?;
        Ok(Key(uri))
    }

    pub fn uri(&self) -> &Uri {
        &self.0
    }

    /// Record-relative path (no leading `/`).
    pub fn rel_path(&self) -> &str {
        self.0.rel_path()
    }

    /// Final path segment.
    pub fn filename(&self) -> &str {
        self.0.filename().unwrap_or_default()
    }
}

impl From<Key> for Uri {
    fn from(key: Key) -> Uri {
        key.0
    }
}

impl TryFrom<Uri> for Key {
    type Error = DomainError;

    fn try_from(uri: Uri) -> Result<Self, Self::Error> {
        if uri.is_canonical() {
            Ok(Key(uri))
        } else {
            Err(DomainError::NotAKey {
                value: uri.to_string(),
            })
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Key {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::parse(s)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Key::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_uri() {
        let uri = Uri::parse("arxiv:///e-prints/2029/01/2901.00345").unwrap();
        assert!(uri.is_canonical());
        assert_eq!(uri.rel_path(), "e-prints/2029/01/2901.00345");
        assert_eq!(uri.to_string(), "arxiv:///e-prints/2029/01/2901.00345");
    }

    #[test]
    fn normalizes_bare_path_to_file() {
        let uri = Uri::parse("/data/orig/2901.00345v1.tar.gz").unwrap();
        assert!(uri.is_file());
        assert_eq!(uri.to_string(), "file:///data/orig/2901.00345v1.tar.gz");
    }

    #[test]
    fn parses_https_uri_with_host() {
        let uri = Uri::parse("https://export.arxiv.org/src/2901.00345v1").unwrap();
        assert!(uri.is_http_url());
        assert_eq!(uri.netloc(), "export.arxiv.org");
        assert_eq!(uri.path(), "/src/2901.00345v1");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(Uri::parse("ftp://example.org/x").is_err());
    }

    #[test]
    fn key_round_trips_through_uri_form() {
        let key = Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.json");
        assert_eq!(key.filename(), "2901.00345v1.json");
        let parsed = Key::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn key_rejects_non_canonical() {
        assert!(Key::parse("file:///tmp/x").is_err());
    }

    #[test]
    fn serde_round_trip() {
        let uri = Uri::parse("arxiv:///global.manifest.json").unwrap();
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"arxiv:///global.manifest.json\"");
        let back: Uri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }
}
