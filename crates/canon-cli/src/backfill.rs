//! Backfill a record from an NDJSON event stream.
//!
//! Events come pre-parsed from the classic-format ingest adapter; this
//! command feeds them into a [`Primary`] role one at a time, logging a
//! success or failure per event. A cursor file under the cache directory
//! records how many events have been processed, so an interrupted run
//! resumes after the last processed event instead of starting over.

use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use canon_core::roles::Primary;
use canon_core::store::Source;
use canon_store::{FilesystemSource, FilesystemStorage, MemoryStream, RemoteSource};

use crate::events::NdjsonEvents;
use crate::exit_codes;

#[derive(Args)]
pub struct BackfillArgs {
    /// NDJSON file of canonical events, in announcement order.
    #[arg(long)]
    pub events: PathBuf,

    /// Root of the target canonical record.
    #[arg(long, env = "CANON_RECORD")]
    pub record: PathBuf,

    /// Cache directory holding the resumable cursor.
    #[arg(long, env = "CANON_CACHE")]
    pub cache: PathBuf,

    /// Base directory for dereferencing file:// source URIs (the classic
    /// data tree).
    #[arg(long)]
    pub source_base: Option<PathBuf>,

    /// Trusted host for dereferencing https:// source URIs.
    #[arg(long)]
    pub remote_host: Option<String>,

    /// Halt on the first consistency error instead of skipping the event.
    #[arg(long)]
    pub halt_on_error: bool,
}

fn cursor_path(args: &BackfillArgs) -> PathBuf {
    args.cache.join("backfill.cursor")
}

fn load_cursor(args: &BackfillArgs) -> Result<usize> {
    let path = cursor_path(args);
    if !path.exists() {
        return Ok(0);
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("cannot read cursor {}", path.display()))?;
    raw.trim()
        .parse()
        .with_context(|| format!("corrupt cursor {}", path.display()))
}

fn store_cursor(args: &BackfillArgs, processed: usize) -> Result<()> {
    let path = cursor_path(args);
    fs::write(&path, format!("{processed}\n"))
        .with_context(|| format!("cannot write cursor {}", path.display()))
}

pub fn run(args: BackfillArgs) -> Result<i32> {
    fs::create_dir_all(&args.cache)
        .with_context(|| format!("cannot create cache {}", args.cache.display()))?;

    let storage = FilesystemStorage::new(&args.record)
        .with_context(|| format!("cannot open record {}", args.record.display()))?;
    let mut sources: Vec<Box<dyn Source>> = Vec::new();
    if let Some(base) = &args.source_base {
        sources.push(Box::new(
            FilesystemSource::new(base)
                .with_context(|| format!("cannot open source base {}", base.display()))?,
        ));
    }
    if let Some(host) = &args.remote_host {
        sources.push(Box::new(RemoteSource::new(host)));
    }

    // No transport is wired up during a backfill; announcements already
    // happened. The role still gets a stream so the write path is the
    // production one.
    let mut primary = Primary::new(Arc::new(storage), sources, Arc::new(MemoryStream::new()))
        .context("cannot open register")?;

    let file = fs::File::open(&args.events)
        .with_context(|| format!("cannot open events {}", args.events.display()))?;
    let start_at = load_cursor(&args)?;
    if start_at > 0 {
        tracing::info!(start_at, "resuming from cursor");
    }

    let mut processed = 0usize;
    let mut applied = 0usize;
    let mut skipped = 0usize;
    for parsed in NdjsonEvents::new(BufReader::new(file)) {
        let event = parsed?;
        processed += 1;
        if processed <= start_at {
            continue;
        }
        match primary.add_events(std::slice::from_ref(&event)) {
            Ok(_) => {
                applied += 1;
                tracing::info!(
                    identifier = %event.identifier,
                    event_type = %event.event_type,
                    "applied"
                );
            }
            Err(e) if e.is_consistency() => {
                skipped += 1;
                tracing::error!(
                    identifier = %event.identifier,
                    event_type = %event.event_type,
                    error = %e,
                    "rejected"
                );
                if args.halt_on_error {
                    store_cursor(&args, processed.saturating_sub(1))?;
                    anyhow::bail!("halted on consistency error: {e}");
                }
            }
            Err(e) => {
                // Fatal I/O: keep the cursor before this event so the run
                // can resume with it.
                store_cursor(&args, processed.saturating_sub(1))?;
                return Err(e).context("storage failure during backfill");
            }
        }
        store_cursor(&args, processed)?;
    }

    tracing::info!(processed, applied, skipped, "backfill complete");
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::domain::{
        CanonicalFile, Category, ContentType, Event, EventType, License, Metadata, Uri, Version,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::io::Write as _;

    fn sample_event(source_uri: &str) -> Event {
        let identifier = "2901.00345v1".parse().unwrap();
        let announced = NaiveDate::from_ymd_opt(2029, 1, 29).unwrap();
        Event {
            identifier,
            event_date: Utc.with_ymd_and_hms(2029, 1, 29, 20, 0, 0).unwrap(),
            event_type: EventType::New,
            version: Version {
                identifier: "2901.00345v1".parse().unwrap(),
                announced_date: announced,
                announced_date_first: announced,
                submitted_date: Utc.with_ymd_and_hms(2029, 1, 28, 10, 0, 0).unwrap(),
                updated_date: Utc.with_ymd_and_hms(2029, 1, 29, 20, 0, 0).unwrap(),
                metadata: Metadata {
                    primary_classification: Category::from("cs.DL"),
                    secondary_classification: vec![],
                    title: "t".to_string(),
                    abstract_: "a".to_string(),
                    authors: "x".to_string(),
                    license: License::new("https://arxiv.org/licenses/x/1.0/"),
                    comments: None,
                    journal_ref: None,
                    report_num: None,
                    doi: None,
                    msc_class: None,
                    acm_class: None,
                },
                events: vec![],
                previous_versions: vec![],
                submitter: None,
                proxy: None,
                is_announced: true,
                is_withdrawn: false,
                reason_for_withdrawal: None,
                is_legacy: true,
                source: CanonicalFile {
                    modified: Utc.with_ymd_and_hms(2029, 1, 28, 12, 0, 0).unwrap(),
                    size_bytes: 8,
                    content_type: ContentType::Targz,
                    filename: Some("2901.00345v1.tar.gz".to_string()),
                    ref_: Uri::parse(source_uri).unwrap(),
                    is_gzipped: false,
                },
                render: None,
                source_type: None,
                formats: Default::default(),
            },
            categories: vec![Category::from("cs.DL")],
            description: String::new(),
            is_legacy: true,
            event_agent: None,
        }
    }

    fn args(root: &std::path::Path) -> BackfillArgs {
        BackfillArgs {
            events: root.join("events.ndjson"),
            record: root.join("record"),
            cache: root.join("cache"),
            source_base: Some(root.join("classic")),
            remote_host: None,
            halt_on_error: false,
        }
    }

    #[test]
    fn backfill_applies_resumes_and_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        // Classic tree with the original source package.
        let classic = root.join("classic");
        fs::create_dir_all(&classic).unwrap();
        fs::write(classic.join("2901.00345v1.tar.gz"), b"tarbytes").unwrap();

        let source_uri = format!("file://{}/2901.00345v1.tar.gz", classic.display());
        let event = sample_event(&source_uri);
        let mut ndjson = fs::File::create(root.join("events.ndjson")).unwrap();
        for _ in 0..2 {
            // The same event twice: the second is a duplicate `new`.
            writeln!(ndjson, "{}", serde_json::to_string(&event).unwrap()).unwrap();
        }
        drop(ndjson);

        let code = run(args(root)).unwrap();
        assert_eq!(code, exit_codes::OK);
        assert_eq!(fs::read_to_string(root.join("cache/backfill.cursor")).unwrap(), "2\n");
        assert!(root
            .join("record/e-prints/2029/01/2901.00345/v1/2901.00345v1.tar.gz")
            .exists());

        // The finished record validates.
        let code = crate::validate::run(crate::validate::ValidateArgs {
            record: root.join("record"),
        })
        .unwrap();
        assert_eq!(code, exit_codes::OK);

        // Re-running resumes from the cursor and does nothing.
        let code = run(args(root)).unwrap();
        assert_eq!(code, exit_codes::OK);
        assert_eq!(fs::read_to_string(root.join("cache/backfill.cursor")).unwrap(), "2\n");
    }
}
