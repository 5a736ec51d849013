//! In-process event bus.
//!
//! Payloads round-trip through canonical JSON, exactly as they would on a
//! durable transport, so a consumer sees what a remote consumer would
//! see. Sequence numbers are per shard, start at 1, and are contiguous.

use std::collections::BTreeMap;
use std::sync::Mutex;

use canon_core::domain::Event;
use canon_core::stream::{EventStream, SequencedEvent, StreamError, StreamResult};

/// An in-memory, shard-partitioned event stream.
#[derive(Default)]
pub struct MemoryStream {
    shards: Mutex<BTreeMap<String, Vec<Vec<u8>>>>,
}

impl MemoryStream {
    pub fn new() -> Self {
        MemoryStream::default()
    }

    /// Total number of events published to a shard.
    pub fn len(&self, shard: &str) -> usize {
        self.shards
            .lock()
            .expect("poisoned")
            .get(shard)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, shard: &str) -> bool {
        self.len(shard) == 0
    }
}

impl EventStream for MemoryStream {
    fn emit(&self, event: &Event) -> StreamResult<SequencedEvent> {
        let payload = serde_jcs::to_vec(event).map_err(StreamError::payload)?;
        let mut shards = self.shards.lock().expect("poisoned");
        let log = shards.entry(event.shard().to_string()).or_default();
        log.push(payload);
        Ok(SequencedEvent {
            shard: event.shard().to_string(),
            sequence: log.len() as u64,
            event: event.clone(),
        })
    }

    fn read_from(&self, shard: &str, after: u64) -> StreamResult<Vec<SequencedEvent>> {
        let shards = self.shards.lock().expect("poisoned");
        let log = match shards.get(shard) {
            Some(log) => log,
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        for (at, payload) in log.iter().enumerate().skip(after as usize) {
            let event: Event = serde_json::from_slice(payload).map_err(StreamError::payload)?;
            out.push(SequencedEvent {
                shard: shard.to_string(),
                sequence: at as u64 + 1,
                event,
            });
        }
        Ok(out)
    }
}
