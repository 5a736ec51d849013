//! End-to-end scenarios for the register over in-memory backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use canon_core::domain::{
    CanonicalFile, Category, ContentType, Event, EventType, License, Metadata, Person, Uri,
    Version, VersionedIdentifier, DEFAULT_SHARD,
};
use canon_core::errors::RegisterError;
use canon_core::register::RegisterApi;
use canon_core::store::Source;
use canon_store::{MemorySource, MemoryStorage};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn metadata() -> Metadata {
    Metadata {
        primary_classification: Category::from("cs.DL"),
        secondary_classification: vec![],
        title: "Adventures in Flatland".to_string(),
        abstract_: "We consider the problem of living in two dimensions.".to_string(),
        authors: "Ima N. Author (FSU)".to_string(),
        license: License::new("https://arxiv.org/licenses/nonexclusive-distrib/1.0/"),
        comments: Some("4 figures, 2 turtles".to_string()),
        journal_ref: None,
        report_num: None,
        doi: None,
        msc_class: None,
        acm_class: None,
    }
}

fn file(uri: &str, size: u64, content_type: ContentType, filename: &str) -> CanonicalFile {
    CanonicalFile {
        modified: instant(2029, 1, 28, 12),
        size_bytes: size,
        content_type,
        filename: Some(filename.to_string()),
        ref_: Uri::parse(uri).unwrap(),
        is_gzipped: false,
    }
}

fn version(vid: &str, announced: NaiveDate, first: NaiveDate) -> Version {
    let identifier: VersionedIdentifier = vid.parse().unwrap();
    let n = identifier.version;
    Version {
        identifier: identifier.clone(),
        announced_date: announced,
        announced_date_first: first,
        submitted_date: instant(2029, 1, 28, 10),
        updated_date: instant(2029, 1, 29, 20),
        metadata: metadata(),
        events: vec![],
        previous_versions: vec![],
        submitter: Some(Person::named("Ima N. Author")),
        proxy: None,
        is_announced: true,
        is_withdrawn: false,
        reason_for_withdrawal: None,
        is_legacy: false,
        source: file(
            &format!("file:///orig/{}v{n}.tar.gz", identifier.arxiv_id),
            4304,
            ContentType::Targz,
            &format!("{}v{n}.tar.gz", identifier.arxiv_id),
        ),
        render: Some(file(
            &format!("file:///orig/{}v{n}.pdf", identifier.arxiv_id),
            404,
            ContentType::Pdf,
            &format!("{}v{n}.pdf", identifier.arxiv_id),
        )),
        source_type: None,
        formats: BTreeMap::new(),
    }
}

fn event(vid: &str, event_type: EventType, when: DateTime<Utc>, version: Version) -> Event {
    Event {
        identifier: vid.parse().unwrap(),
        event_date: when,
        event_type,
        version,
        categories: vec![Category::from("cs.DL")],
        description: String::new(),
        is_legacy: false,
        event_agent: None,
    }
}

/// A source holding the original bitstreams for every version used in
/// these scenarios.
fn orig_source() -> MemorySource {
    let mut source = MemorySource::new();
    let modified = instant(2029, 1, 28, 12);
    for v in 1..=3u8 {
        source.add(
            &Uri::parse(&format!("file:///orig/2901.00345v{v}.tar.gz")).unwrap(),
            vec![v; 4304],
            modified,
        );
        source.add(
            &Uri::parse(&format!("file:///orig/2901.00345v{v}.pdf")).unwrap(),
            vec![0x25; 404],
            modified,
        );
    }
    source
}

fn api(storage: &MemoryStorage) -> RegisterApi {
    RegisterApi::new(
        Arc::new(storage.clone()),
        vec![Box::new(orig_source()) as Box<dyn Source>],
    )
    .unwrap()
}

fn s1_event() -> Event {
    event(
        "2901.00345v1",
        EventType::New,
        instant(2029, 1, 29, 20),
        version("2901.00345v1", date(2029, 1, 29), date(2029, 1, 29)),
    )
}

#[test]
fn s1_first_version_new() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    let prefix = "arxiv:///e-prints/2029/01/2901.00345";
    let entry_keys = storage.entry_keys();
    for expected in [
        format!("{prefix}/v1/2901.00345v1.json"),
        format!("{prefix}/v1/2901.00345v1.pdf"),
        format!("{prefix}/v1/2901.00345v1.tar.gz"),
        "arxiv:///announcement/2029/01/29/2029-01-29-listing.json".to_string(),
    ] {
        assert!(entry_keys.contains(&expected), "missing entry {expected}");
    }
    let manifest_keys = storage.manifest_keys();
    for expected in [
        format!("{prefix}/2901.00345v1.manifest.json"),
        format!("{prefix}.manifest.json"),
        "arxiv:///e-prints/2029/01/2029-01-29.manifest.json".to_string(),
        "arxiv:///e-prints/2029/2029-01.manifest.json".to_string(),
        "arxiv:///e-prints/2029.manifest.json".to_string(),
        "arxiv:///e-prints.manifest.json".to_string(),
        "arxiv:///announcement/2029/01/2029-01-29.manifest.json".to_string(),
        "arxiv:///announcement/2029/2029-01.manifest.json".to_string(),
        "arxiv:///announcement/2029.manifest.json".to_string(),
        "arxiv:///announcement.manifest.json".to_string(),
        "arxiv:///global.manifest.json".to_string(),
    ] {
        assert!(manifest_keys.contains(&expected), "missing manifest {expected}");
    }

    // The listing contains exactly one event with the expected id.
    let listing = api.load_listing(date(2029, 1, 29), DEFAULT_SHARD).unwrap();
    assert_eq!(listing.events.len(), 1);
    assert_eq!(listing.events[0].event_id(), s1_event().event_id());

    // The stored version points into the record, not at the original URIs.
    let loaded = api
        .load_version(&"2901.00345v1".parse().unwrap())
        .unwrap();
    assert_eq!(
        loaded.source.ref_.to_string(),
        format!("{prefix}/v1/2901.00345v1.tar.gz")
    );
    assert_eq!(loaded.source.size_bytes, 4304);
    assert_eq!(loaded.events.len(), 1);
    assert_eq!(loaded.events[0].event_type, EventType::New);

    // The source dereferences to the original bitstream.
    let (descriptor, mut stream) = api.load_source(&"2901.00345v1".parse().unwrap()).unwrap();
    assert_eq!(descriptor.size_bytes, 4304);
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut bytes).unwrap();
    assert_eq!(bytes, vec![1u8; 4304]);
}

#[test]
fn s2_replace_creates_second_version() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    let v1_metadata_key =
        canon_core::domain::Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.json");
    let v1_bytes_before = storage.entry_bytes(&v1_metadata_key).unwrap();
    let manifests_before = storage.dump_manifests();

    api.add_events(&[event(
        "2901.00345v2",
        EventType::Replace,
        instant(2029, 2, 15, 20),
        version("2901.00345v2", date(2029, 2, 15), date(2029, 1, 29)),
    )])
    .unwrap();

    // Two versions now; the v1 record is untouched on disk.
    let eprint = api.load_eprint(&"2901.00345".parse().unwrap()).unwrap();
    assert_eq!(eprint.versions.len(), 2);
    assert_eq!(storage.entry_bytes(&v1_metadata_key).unwrap(), v1_bytes_before);

    // Every ancestor manifest changed.
    let manifests_after = storage.dump_manifests();
    for key in [
        "arxiv:///e-prints/2029/01/2901.00345.manifest.json",
        "arxiv:///e-prints/2029/01/2029-01-29.manifest.json",
        "arxiv:///e-prints/2029/2029-01.manifest.json",
        "arxiv:///e-prints/2029.manifest.json",
        "arxiv:///e-prints.manifest.json",
        "arxiv:///global.manifest.json",
    ] {
        assert_ne!(
            manifests_before.get(key),
            manifests_after.get(key),
            "manifest {key} should have changed"
        );
    }

    // History in version order: v1 new, then v2 replace.
    let history = api.load_history(&"2901.00345".parse().unwrap()).unwrap();
    let kinds: Vec<EventType> = history.iter().map(|s| s.event_type).collect();
    assert_eq!(kinds, vec![EventType::New, EventType::Replace]);
}

#[test]
fn s3_cross_list_updates_metadata_in_place() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();
    api.add_events(&[event(
        "2901.00345v2",
        EventType::Replace,
        instant(2029, 2, 15, 20),
        version("2901.00345v2", date(2029, 2, 15), date(2029, 1, 29)),
    )])
    .unwrap();

    let keys_before = storage.entry_keys();

    // The cross event carries the version state with no new content: its
    // file refs already point into the record.
    let mut crossed = api.load_version(&"2901.00345v2".parse().unwrap()).unwrap();
    crossed.metadata.add_secondaries([Category::from("cs.IR")]);
    let cross_date = instant(2029, 2, 20, 20);
    api.add_events(&[event(
        "2901.00345v2",
        EventType::Cross,
        cross_date,
        crossed,
    )])
    .unwrap();

    let reloaded = api.load_version(&"2901.00345v2".parse().unwrap()).unwrap();
    assert!(reloaded
        .metadata
        .secondary_classification
        .contains(&Category::from("cs.IR")));

    // No new file keys appear.
    assert_eq!(storage.entry_keys(), {
        let mut expected = keys_before.clone();
        expected.push("arxiv:///announcement/2029/02/20/2029-02-20-listing.json".to_string());
        expected.sort();
        expected
    });

    // The listing for the cross date has the event.
    let listing = api.load_listing(date(2029, 2, 20), DEFAULT_SHARD).unwrap();
    assert_eq!(listing.events.len(), 1);
    assert_eq!(listing.events[0].event_type, EventType::Cross);
}

#[test]
fn s4_duplicate_new_is_rejected_without_side_effects() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    let entries_before = storage.dump_entries();
    let manifests_before = storage.dump_manifests();

    let err = api.add_events(&[s1_event()]).unwrap_err();
    assert!(err.is_consistency(), "expected consistency error, got {err}");

    assert_eq!(storage.dump_entries(), entries_before);
    assert_eq!(storage.dump_manifests(), manifests_before);
}

#[test]
fn s5_withdrawal_creates_flagged_version() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    let mut withdrawn = version("2901.00345v3", date(2029, 3, 1), date(2029, 1, 29));
    withdrawn.is_withdrawn = true;
    withdrawn.reason_for_withdrawal = Some("An error was found in the proof.".to_string());
    api.add_events(&[event(
        "2901.00345v3",
        EventType::Withdraw,
        instant(2029, 3, 1, 20),
        withdrawn,
    )])
    .unwrap();

    let loaded = api.load_version(&"2901.00345v3".parse().unwrap()).unwrap();
    assert!(loaded.is_withdrawn);
    assert_eq!(
        loaded.reason_for_withdrawal.as_deref(),
        Some("An error was found in the proof.")
    );

    // Earlier versions do not inherit the flag.
    let v1 = api.load_version(&"2901.00345v1".parse().unwrap()).unwrap();
    assert!(!v1.is_withdrawn);
}

#[test]
fn s6_recovery_validates_and_detects_corruption() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();
    api.add_events(&[event(
        "2901.00345v2",
        EventType::Replace,
        instant(2029, 2, 15, 20),
        version("2901.00345v2", date(2029, 2, 15), date(2029, 1, 29)),
    )])
    .unwrap();

    // A complete record revalidates bit-for-bit.
    api.validate().unwrap();

    // Corrupting any bitstream is detected at the file level.
    let render_key =
        canon_core::domain::Key::new("e-prints/2029/01/2901.00345/v1/2901.00345v1.pdf");
    storage.corrupt_entry(&render_key, b"corrupted".to_vec());
    let err = api.validate().unwrap_err();
    match err {
        RegisterError::Validation { key, .. } => assert_eq!(key, render_key.to_string()),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn update_on_missing_version_is_a_consistency_error() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    let phantom = api.load_version(&"2901.00345v1".parse().unwrap()).unwrap();
    let mut phantom_v2 = phantom;
    phantom_v2.identifier = "2901.00345v2".parse().unwrap();
    let err = api
        .add_events(&[event(
            "2901.00345v2",
            EventType::UpdateMetadata,
            instant(2029, 2, 1, 20),
            phantom_v2,
        )])
        .unwrap_err();
    assert!(err.is_consistency());
}

#[test]
fn metadata_only_events_must_not_carry_content() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();

    // A cross event whose source still points outside the record is
    // supplying content, which metadata-only updates must not do.
    let outside = version("2901.00345v1", date(2029, 1, 29), date(2029, 1, 29));
    let err = api
        .add_events(&[event(
            "2901.00345v1",
            EventType::Cross,
            instant(2029, 2, 1, 20),
            outside,
        )])
        .unwrap_err();
    assert!(err.is_consistency());
}

#[test]
fn load_event_returns_the_appended_event() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    let e = s1_event();
    api.add_events(&[e.clone()]).unwrap();

    let loaded = api.load_event(&e.event_id()).unwrap();
    assert_eq!(loaded.event_id(), e.event_id());
    assert_eq!(loaded.identifier, e.identifier);
    assert_eq!(loaded.event_type, e.event_type);
    assert_eq!(loaded.event_date, e.event_date);
    assert_eq!(loaded.version.identifier, e.version.identifier);
}

#[test]
fn load_events_walks_the_listing_hierarchy() {
    let storage = MemoryStorage::new();
    let mut api = api(&storage);
    api.add_events(&[s1_event()]).unwrap();
    api.add_events(&[event(
        "2901.00345v2",
        EventType::Replace,
        instant(2029, 2, 15, 20),
        version("2901.00345v2", date(2029, 2, 15), date(2029, 1, 29)),
    )])
    .unwrap();

    // Whole year: both events, in date order, count matches.
    let (iter, estimate) = api.load_events(2029).unwrap();
    let events: Vec<Event> = iter.map(|e| e.unwrap()).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(estimate, 2);
    assert_eq!(events[0].event_type, EventType::New);
    assert_eq!(events[1].event_type, EventType::Replace);

    // Single month and single day.
    let (iter, estimate) = api.load_events((2029, 2)).unwrap();
    assert_eq!(iter.map(|e| e.unwrap()).count(), 1);
    assert_eq!(estimate, 1);
    let (iter, estimate) = api.load_events(date(2029, 1, 29)).unwrap();
    assert_eq!(iter.map(|e| e.unwrap()).count(), 1);
    assert_eq!(estimate, 1);

    // A year with no record yields nothing.
    let (iter, estimate) = api.load_events(1999).unwrap();
    assert_eq!(iter.count(), 0);
    assert_eq!(estimate, 0);
}

#[test]
fn gzipped_sources_are_unwrapped_at_store_time() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write as _;

    let inner = b"tarball bytes that were double-wrapped".to_vec();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&inner).unwrap();
    let wrapped = encoder.finish().unwrap();

    let mut source = MemorySource::new();
    source.add(
        &Uri::parse("file:///orig/2901.00345v1.tar.gz").unwrap(),
        wrapped.clone(),
        instant(2029, 1, 28, 12),
    );
    source.add(
        &Uri::parse("file:///orig/2901.00345v1.pdf").unwrap(),
        vec![0x25; 404],
        instant(2029, 1, 28, 12),
    );

    let storage = MemoryStorage::new();
    let mut api = RegisterApi::new(
        Arc::new(storage.clone()),
        vec![Box::new(source) as Box<dyn Source>],
    )
    .unwrap();

    let mut e = s1_event();
    e.version.source.is_gzipped = true;
    e.version.source.size_bytes = wrapped.len() as u64;
    api.add_events(&[e]).unwrap();

    // Stored bytes are the decompressed payload; descriptor updated.
    let key = canon_core::domain::Key::new(
        "e-prints/2029/01/2901.00345/v1/2901.00345v1.tar.gz",
    );
    assert_eq!(storage.entry_bytes(&key).unwrap(), inner);
    let loaded = api.load_version(&"2901.00345v1".parse().unwrap()).unwrap();
    assert!(!loaded.source.is_gzipped);
    assert_eq!(loaded.source.size_bytes, inner.len() as u64);

    // And the record still validates: the manifest checksum was computed
    // from the decompressed bytes.
    api.validate().unwrap();
}
