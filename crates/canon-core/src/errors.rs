//! Error types for the canonical record.
//!
//! The taxonomy mirrors how callers are expected to react:
//!
//! - [`SourceError`]: a URI could not be dereferenced; surfaced to the
//!   caller, never retried here.
//! - [`StorageError`]: blob/manifest I/O. `DoesNotExist` is a distinct
//!   variant so that load sites can choose between creating empty state
//!   (register initialization) and failing (user-facing loads).
//! - [`RegisterError`]: consistency violations, validation failures, and
//!   everything bubbled up from storage during register operations.
//! - [`DomainError`]: malformed identifiers, URIs, and serialized values.

use thiserror::Error;

/// Errors raised while parsing or constructing domain values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Not a valid arXiv identifier.
    #[error("not a valid arXiv identifier: {value}")]
    InvalidIdentifier { value: String },

    /// Not a valid versioned identifier (`<id>v<n>`).
    #[error("not a valid versioned identifier: {value}")]
    InvalidVersionedIdentifier { value: String },

    /// Event identifier could not be decoded.
    #[error("not a valid event identifier: {value}: {reason}")]
    InvalidEventIdentifier { value: String, reason: String },

    /// URI has an unsupported scheme or cannot be parsed.
    #[error("invalid URI '{value}': {reason}")]
    InvalidUri { value: String, reason: String },

    /// A value that must be a canonical key (`arxiv:///…`) is not one.
    #[error("not a canonical key: {value}")]
    NotAKey { value: String },

    /// Unrecognized content type or file extension.
    #[error("unrecognized content type: {value}")]
    UnknownContentType { value: String },

    /// Unrecognized event type value.
    #[error("unrecognized event type: {value}")]
    UnknownEventType { value: String },

    /// A date or timestamp field could not be parsed.
    #[error("invalid date in '{value}'")]
    InvalidDate { value: String },
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while dereferencing URIs through content sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No registered source can resolve the URI.
    #[error("cannot resolve URI: {uri}")]
    CannotResolve { uri: String },

    /// The resource was resolvable but reading it failed.
    #[error("failed to read {uri}: {message}")]
    Read { uri: String, message: String },
}

impl SourceError {
    pub fn cannot_resolve(uri: impl Into<String>) -> Self {
        Self::CannotResolve { uri: uri.into() }
    }

    pub fn read(uri: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Read {
            uri: uri.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key or manifest does not exist.
    #[error("does not exist: {key}")]
    DoesNotExist { key: String },

    /// I/O failure (after any adapter-internal retries are exhausted).
    #[error("storage I/O error at {key}: {message}")]
    Io { key: String, message: String },

    /// The entry could not be decoded (bad gzip, bad manifest JSON, …).
    #[error("cannot decode {key}: {message}")]
    Decode { key: String, message: String },

    /// The storage backend cannot handle this URI.
    #[error("cannot store at this URI: {key}")]
    Unsupported { key: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl StorageError {
    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self::DoesNotExist { key: key.into() }
    }

    pub fn io(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// True if this error indicates a missing key rather than a failure.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist { .. })
    }
}

/// Result type for register operations.
pub type RegisterResult<T> = Result<T, RegisterError>;

/// Errors raised by the register.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// An operation would violate the consistency of the record, e.g. a
    /// duplicate `new` or an `update` against a missing version.
    #[error("consistency violation: {message}")]
    Consistency { message: String },

    /// The requested resource is not in the record.
    #[error("no such resource: {resource}")]
    NoSuchResource { resource: String },

    /// A checksum did not match; the record is considered corrupt.
    #[error("validation failed at {key}: {message}")]
    Validation { key: String, message: String },

    /// A domain value embedded in the record could not be interpreted.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A checksum could not be computed.
    #[error(transparent)]
    Checksum(#[from] crate::integrity::ChecksumError),

    /// The event stream failed while a role was using it.
    #[error(transparent)]
    Stream(#[from] crate::stream::StreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// (De)serialization of a record entry failed.
    #[error("serialization error at {key}: {message}")]
    Serialization { key: String, message: String },
}

impl RegisterError {
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn no_such_resource(resource: impl Into<String>) -> Self {
        Self::NoSuchResource {
            resource: resource.into(),
        }
    }

    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// True if the error is a consistency violation.
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }

    /// True if the underlying cause is a missing key or resource.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NoSuchResource { .. } => true,
            Self::Storage(e) => e.is_does_not_exist(),
            _ => false,
        }
    }
}
