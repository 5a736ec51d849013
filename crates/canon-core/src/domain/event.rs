//! Announcement events.
//!
//! An [`Event`] embeds the full state of the affected [`Version`]; its
//! [`EventSummary`] carries everything except that state. Listings and the
//! event stream carry full events; a version's history holds summaries.
//! The two are distinct record shapes so that the domain stays acyclic.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

use super::identifier::VersionedIdentifier;
use super::metadata::Category;
use super::version::Version;

/// The default listing shard.
///
/// There is not currently a driver for sharding listings, but the shard
/// field is kept on events and listing identifiers so that listings can be
/// split (e.g. by primary category) without a format change.
pub const DEFAULT_SHARD: &str = "listing";

/// Supported event types.
///
/// Serializes as its string value, also when used as a map key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub enum EventType {
    New,
    Update,
    UpdateMetadata,
    Replace,
    Cross,
    /// Journal-reference update. Deprecated; accepted from legacy streams
    /// and treated as a metadata update.
    Jref,
    Withdraw,
    Migrate,
    MigrateMetadata,
}

impl EventType {
    /// True if this event type results in a new version.
    pub fn is_new_version(self) -> bool {
        matches!(self, EventType::New | EventType::Replace | EventType::Withdraw)
    }

    /// String value used in serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::New => "new",
            EventType::Update => "update",
            EventType::UpdateMetadata => "update_metadata",
            EventType::Replace => "replace",
            EventType::Cross => "cross",
            EventType::Jref => "jref",
            EventType::Withdraw => "withdraw",
            EventType::Migrate => "migrate",
            EventType::MigrateMetadata => "migrate_metadata",
        }
    }

    /// All event types, in serialized-value order.
    pub fn all() -> [EventType; 9] {
        [
            EventType::New,
            EventType::Update,
            EventType::UpdateMetadata,
            EventType::Replace,
            EventType::Cross,
            EventType::Jref,
            EventType::Withdraw,
            EventType::Migrate,
            EventType::MigrateMetadata,
        ]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> String {
        event_type.as_str().to_string()
    }
}

impl TryFrom<String> for EventType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::all()
            .into_iter()
            .find(|t| t.as_str() == value)
            .ok_or(DomainError::UnknownEventType { value })
    }
}

/// Unique identifier for an [`Event`].
///
/// Derived from `(versioned identifier, instant, shard)` via URL-safe
/// base64 of `<vid>::<RFC 3339 instant>::<shard>`; reversible, and
/// collision-free within one (version, instant, shard).
#[derive(Debug, Clone)]
pub struct EventIdentifier {
    pub version_id: VersionedIdentifier,
    pub event_date: DateTime<Utc>,
    pub shard: String,
    encoded: String,
}

impl EventIdentifier {
    /// Generate an event identifier from its parts.
    pub fn from_parts(
        version_id: &VersionedIdentifier,
        event_date: DateTime<Utc>,
        shard: &str,
    ) -> Self {
        let raw = format!(
            "{version_id}::{}::{shard}",
            event_date.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        );
        EventIdentifier {
            version_id: version_id.clone(),
            event_date,
            shard: shard.to_string(),
            encoded: URL_SAFE.encode(raw.as_bytes()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl FromStr for EventIdentifier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DomainError::InvalidEventIdentifier {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let decoded = URL_SAFE
            .decode(value.as_bytes())
            .map_err(|_| invalid("not base64"))?;
        let decoded = String::from_utf8(decoded).map_err(|_| invalid("not utf-8"))?;
        let mut parts = decoded.splitn(3, "::");
        let (vid, instant, shard) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(invalid("expected <vid>::<instant>::<shard>")),
        };
        let version_id: VersionedIdentifier = vid.parse()?;
        let event_date = DateTime::parse_from_rfc3339(instant)
            .map_err(|_| invalid("bad instant"))?
            .with_timezone(&Utc);
        Ok(EventIdentifier {
            version_id,
            event_date,
            shard: shard.to_string(),
            encoded: value.to_string(),
        })
    }
}

impl fmt::Display for EventIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl PartialEq for EventIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for EventIdentifier {}

impl std::hash::Hash for EventIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl Serialize for EventIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

impl<'de> Deserialize<'de> for EventIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An announcement-related event, embedding the state of the affected
/// version after the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the version to which the event pertains.
    pub identifier: VersionedIdentifier,

    /// Timestamp of the event.
    pub event_date: DateTime<Utc>,

    pub event_type: EventType,

    /// The state of the version after the event.
    pub version: Version,

    /// Categories related to this event. An artifact of the legacy
    /// daily.log format.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,

    /// Free-form administrative notes about the event.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// True if the event was populated from the legacy record.
    #[serde(default)]
    pub is_legacy: bool,

    /// Agent that generated the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_agent: Option<String>,
}

impl Event {
    /// The listing shard this event belongs to.
    pub fn shard(&self) -> &str {
        DEFAULT_SHARD
    }

    /// The unique identifier for this event.
    pub fn event_id(&self) -> EventIdentifier {
        EventIdentifier::from_parts(&self.identifier, self.event_date, self.shard())
    }

    /// A summary of this event (everything except the version state).
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            identifier: self.identifier.clone(),
            event_date: self.event_date,
            event_type: self.event_type,
            event_id: self.event_id(),
            categories: self.categories.clone(),
            description: self.description.clone(),
            is_legacy: self.is_legacy,
            event_agent: self.event_agent.clone(),
        }
    }
}

/// A lightweight description of an event: all of the data of the original
/// [`Event`] except for the state of the e-print version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub identifier: VersionedIdentifier,
    pub event_date: DateTime<Utc>,
    pub event_type: EventType,
    pub event_id: EventIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub is_legacy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_identifier_round_trip() {
        let vid: VersionedIdentifier = "2901.00345v1".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2029, 1, 29, 20, 5, 30).unwrap();
        let event_id = EventIdentifier::from_parts(&vid, instant, DEFAULT_SHARD);

        let parsed: EventIdentifier = event_id.as_str().parse().unwrap();
        assert_eq!(parsed.version_id, vid);
        assert_eq!(parsed.event_date, instant);
        assert_eq!(parsed.shard, DEFAULT_SHARD);
        assert_eq!(parsed, event_id);
    }

    #[test]
    fn event_identifier_distinct_per_shard() {
        let vid: VersionedIdentifier = "2901.00345v1".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2029, 1, 29, 20, 5, 30).unwrap();
        let a = EventIdentifier::from_parts(&vid, instant, "listing");
        let b = EventIdentifier::from_parts(&vid, instant, "cs");
        assert_ne!(a, b);
    }

    #[test]
    fn event_summary_serde_round_trip() {
        let vid: VersionedIdentifier = "2901.00345v1".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2029, 1, 29, 20, 5, 30).unwrap();
        let summary = EventSummary {
            identifier: vid.clone(),
            event_date: instant,
            event_type: EventType::New,
            event_id: EventIdentifier::from_parts(&vid, instant, DEFAULT_SHARD),
            categories: vec![Category::new("cs.DL")],
            description: String::new(),
            is_legacy: false,
            event_agent: Some("announce".to_string()),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: EventSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn event_type_values() {
        assert_eq!(
            serde_json::to_string(&EventType::UpdateMetadata).unwrap(),
            "\"update_metadata\""
        );
        assert_eq!(EventType::Cross.as_str(), "cross");
        assert!(EventType::Withdraw.is_new_version());
        assert!(!EventType::Cross.is_new_version());
    }
}
