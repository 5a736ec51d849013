//! Manifest records: deterministic descriptions of collection members.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::EventType;

/// A single entry in a [`Manifest`].
///
/// File-level entries carry `size_bytes` and `mime_type`; collection-level
/// entries carry the rolled-up counters of the member they describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Member name: a full canonical key for file entries, a short member
    /// name (year, date, identifier) for collection entries.
    pub key: String,

    pub checksum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub number_of_versions: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub number_of_events: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub number_of_events_by_type: BTreeMap<EventType, u64>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl ManifestEntry {
    /// Entry for a terminal bitstream.
    pub fn for_file(
        key: impl Into<String>,
        checksum: impl Into<String>,
        size_bytes: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        ManifestEntry {
            key: key.into(),
            checksum: Some(checksum.into()),
            size_bytes: Some(size_bytes),
            mime_type: Some(mime_type.into()),
            ..ManifestEntry::default()
        }
    }

    /// Entry for a member collection, copying its rolled-up counters.
    pub fn for_member(
        key: impl Into<String>,
        checksum: impl Into<String>,
        member_manifest: &Manifest,
    ) -> Self {
        ManifestEntry {
            key: key.into(),
            checksum: Some(checksum.into()),
            size_bytes: None,
            mime_type: None,
            number_of_versions: member_manifest.number_of_versions,
            number_of_events: member_manifest.number_of_events,
            number_of_events_by_type: member_manifest.number_of_events_by_type.clone(),
        }
    }
}

/// A deterministic record of a collection's members and rolled-up counters.
///
/// Entries are kept sorted by key so that the serialized byte
/// representation is stable; counters always equal the sum of the entries'
/// counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,

    #[serde(default)]
    pub number_of_events: u64,

    #[serde(default)]
    pub number_of_versions: u64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub number_of_events_by_type: BTreeMap<EventType, u64>,
}

impl Manifest {
    pub fn empty() -> Self {
        Manifest::default()
    }

    pub fn entry(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Retrieve the checksum recorded for a member.
    pub fn checksum_for(&self, key: &str) -> Option<String> {
        self.entry(key).and_then(|e| e.checksum.clone())
    }

    /// Upsert a member entry, keeping entries sorted by key and counters
    /// equal to the sum of the entries.
    pub fn upsert(&mut self, entry: ManifestEntry) {
        match self.entries.binary_search_by(|e| e.key.cmp(&entry.key)) {
            Ok(at) => self.entries[at] = entry,
            Err(at) => self.entries.insert(at, entry),
        }
        self.roll_up();
    }

    /// Remove a member entry, if present.
    pub fn remove(&mut self, key: &str) {
        if let Ok(at) = self.entries.binary_search_by(|e| e.key.as_str().cmp(key)) {
            self.entries.remove(at);
            self.roll_up();
        }
    }

    /// Recompute the rolled-up counters from the entries.
    pub fn roll_up(&mut self) {
        self.number_of_events = self.entries.iter().map(|e| e.number_of_events).sum();
        self.number_of_versions = self.entries.iter().map(|e| e.number_of_versions).sum();
        let mut by_type = BTreeMap::new();
        for entry in &self.entries {
            for (event_type, count) in &entry.number_of_events_by_type {
                *by_type.entry(*event_type).or_insert(0) += count;
            }
        }
        self.number_of_events_by_type = by_type;
    }

    /// True if the counters equal the sum of the entries' counters.
    pub fn counters_consistent(&self) -> bool {
        let mut recomputed = self.clone();
        recomputed.roll_up();
        recomputed.number_of_events == self.number_of_events
            && recomputed.number_of_versions == self.number_of_versions
            && recomputed.number_of_events_by_type == self.number_of_events_by_type
    }

    /// Canonical (RFC 8785) byte representation, with entries sorted by
    /// key. This is what gets persisted and hashed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut sorted = self.clone();
        sorted.entries.sort_by(|a, b| a.key.cmp(&b.key));
        serde_jcs::to_vec(&sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_entry(key: &str, checksum: &str, events: u64, versions: u64) -> ManifestEntry {
        ManifestEntry {
            key: key.to_string(),
            checksum: Some(checksum.to_string()),
            number_of_events: events,
            number_of_versions: versions,
            number_of_events_by_type: if events > 0 {
                [(EventType::New, events)].into_iter().collect()
            } else {
                BTreeMap::new()
            },
            ..ManifestEntry::default()
        }
    }

    #[test]
    fn upsert_keeps_entries_sorted_and_counters_summed() {
        let mut m = Manifest::empty();
        m.upsert(member_entry("2029-01-30", "b", 2, 0));
        m.upsert(member_entry("2029-01-29", "a", 3, 0));
        assert_eq!(m.entries[0].key, "2029-01-29");
        assert_eq!(m.number_of_events, 5);
        assert_eq!(m.number_of_events_by_type[&EventType::New], 5);

        // Replacing an entry recounts rather than accumulating.
        m.upsert(member_entry("2029-01-29", "a2", 4, 0));
        assert_eq!(m.number_of_events, 6);
        assert!(m.counters_consistent());
    }

    #[test]
    fn remove_recounts() {
        let mut m = Manifest::empty();
        m.upsert(member_entry("x", "a", 1, 1));
        m.upsert(member_entry("y", "b", 2, 1));
        m.remove("x");
        assert_eq!(m.number_of_events, 2);
        assert_eq!(m.number_of_versions, 1);
    }

    #[test]
    fn canonical_bytes_are_deterministic_and_sorted() {
        let mut a = Manifest::empty();
        a.upsert(member_entry("b", "2", 0, 1));
        a.upsert(member_entry("a", "1", 0, 1));
        let mut b = Manifest::empty();
        b.upsert(member_entry("a", "1", 0, 1));
        b.upsert(member_entry("b", "2", 0, 1));
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());

        let text = String::from_utf8(a.canonical_bytes().unwrap()).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn serde_round_trip_preserves_counters() {
        let mut m = Manifest::empty();
        m.upsert(member_entry("2029", "c", 7, 3));
        let bytes = m.canonical_bytes().unwrap();
        let back: Manifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn file_entries_carry_size_and_mime() {
        let e = ManifestEntry::for_file(
            "arxiv:///e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf",
            "abc",
            404,
            "application/pdf",
        );
        assert_eq!(e.size_bytes, Some(404));
        assert_eq!(e.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(e.number_of_versions, 0);
    }
}
