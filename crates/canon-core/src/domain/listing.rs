//! Listings: the chronologically-ordered events of one (date, shard).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::event::{Event, EventType};
use super::identifier::ListingIdentifier;

/// The events announced on a given (date, shard), in arrival order.
///
/// Listings are strictly append-only: the event list is never reordered or
/// truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub identifier: ListingIdentifier,
    pub events: Vec<Event>,
}

impl Listing {
    pub fn new(identifier: ListingIdentifier) -> Self {
        Listing {
            identifier,
            events: Vec::new(),
        }
    }

    pub fn number_of_events(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn number_of_events_by_type(&self) -> BTreeMap<EventType, u64> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type).or_insert(0) += 1;
        }
        counts
    }
}

// ListingIdentifier serializes as {"date": ..., "shard": ...} inside a
// listing document.
impl Serialize for ListingIdentifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ListingIdentifier", 2)?;
        s.serialize_field("date", &self.date)?;
        s.serialize_field("shard", &self.shard)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for ListingIdentifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            date: chrono::NaiveDate,
            #[serde(default = "default_shard")]
            shard: String,
        }
        fn default_shard() -> String {
            super::event::DEFAULT_SHARD.to_string()
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(ListingIdentifier {
            date: raw.date,
            shard: raw.shard,
        })
    }
}
