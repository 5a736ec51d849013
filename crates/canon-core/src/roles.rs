//! Capability-restricted roles over the register and the event stream.
//!
//! Four compositions of register access (read / write) and stream access
//! (emit / listen) cover every deployment of the record:
//!
//! | Role         | Register      | Stream  |
//! |--------------|---------------|---------|
//! | [`Primary`]    | read + write  | emit    |
//! | [`Replicant`]  | read + write  | listen  |
//! | [`Repository`] | read          | none    |
//! | [`Observer`]   | none          | listen  |
//!
//! The capability whitelist is the type surface: a role only has the
//! methods it is allowed to use, so a disallowed operation is a compile
//! error rather than a runtime fault. Read access is exposed by
//! dereferencing to [`RegisterApi`]; none of the roles dereference
//! mutably, so writes only happen through the role's own methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{Event, DEFAULT_SHARD};
use crate::errors::RegisterResult;
use crate::register::RegisterApi;
use crate::store::{Source, Storage};
use crate::stream::{EventStream, SequencedEvent};

/// The primary canonical record: the sole authoritative writer.
///
/// All events are first written to and emitted from this record.
pub struct Primary {
    register: RegisterApi,
    stream: Arc<dyn EventStream>,
}

impl Primary {
    pub fn new(
        storage: Arc<dyn Storage>,
        sources: Vec<Box<dyn Source>>,
        stream: Arc<dyn EventStream>,
    ) -> RegisterResult<Self> {
        Ok(Primary {
            register: RegisterApi::new(storage, sources)?,
            stream,
        })
    }

    /// Write events to the record, then emit them on the stream.
    ///
    /// Events are only emitted once they are durably part of the record;
    /// a failed batch emits nothing beyond the events already applied.
    pub fn add_events(&mut self, events: &[Event]) -> RegisterResult<Vec<SequencedEvent>> {
        self.register.add_events(events)?;
        let mut emitted = Vec::with_capacity(events.len());
        for event in events {
            let sequenced = self.stream.emit(event)?;
            tracing::info!(
                identifier = %event.identifier,
                event_type = %event.event_type,
                sequence = sequenced.sequence,
                "announced event"
            );
            emitted.push(sequenced);
        }
        Ok(emitted)
    }
}

impl std::ops::Deref for Primary {
    type Target = RegisterApi;

    fn deref(&self) -> &RegisterApi {
        &self.register
    }
}

/// A system that transcribes events to a secondary record, e.g. a mirror
/// site.
pub struct Replicant {
    register: RegisterApi,
    stream: Arc<dyn EventStream>,
    cursors: BTreeMap<String, u64>,
}

impl Replicant {
    pub fn new(
        storage: Arc<dyn Storage>,
        sources: Vec<Box<dyn Source>>,
        stream: Arc<dyn EventStream>,
    ) -> RegisterResult<Self> {
        Ok(Replicant {
            register: RegisterApi::new(storage, sources)?,
            stream,
            cursors: BTreeMap::new(),
        })
    }

    /// Apply every event of the default shard not yet transcribed.
    pub fn poll(&mut self) -> RegisterResult<usize> {
        self.poll_shard(DEFAULT_SHARD)
    }

    /// Apply every event of a shard not yet transcribed; returns how many
    /// were applied.
    pub fn poll_shard(&mut self, shard: &str) -> RegisterResult<usize> {
        let after = self.cursors.get(shard).copied().unwrap_or(0);
        let batch = self.stream.read_from(shard, after)?;
        let mut applied = 0;
        for sequenced in batch {
            self.register.add_events(std::slice::from_ref(&sequenced.event))?;
            self.cursors.insert(shard.to_string(), sequenced.sequence);
            applied += 1;
        }
        Ok(applied)
    }
}

impl std::ops::Deref for Replicant {
    type Target = RegisterApi;

    fn deref(&self) -> &RegisterApi {
        &self.register
    }
}

/// A read-only API onto the canonical record.
pub struct Repository {
    register: RegisterApi,
}

impl Repository {
    pub fn new(storage: Arc<dyn Storage>, sources: Vec<Box<dyn Source>>) -> RegisterResult<Self> {
        Ok(Repository {
            register: RegisterApi::new(storage, sources)?,
        })
    }
}

impl std::ops::Deref for Repository {
    type Target = RegisterApi;

    fn deref(&self) -> &RegisterApi {
        &self.register
    }
}

/// A system that processes canonical events without holding a register,
/// e.g. a search indexer fed from the stream.
pub struct Observer {
    stream: Arc<dyn EventStream>,
    cursors: BTreeMap<String, u64>,
}

impl Observer {
    pub fn new(stream: Arc<dyn EventStream>) -> Self {
        Observer {
            stream,
            cursors: BTreeMap::new(),
        }
    }

    /// Hand every new event of a shard to `on_event`, in sequence order.
    pub fn poll_shard(
        &mut self,
        shard: &str,
        mut on_event: impl FnMut(&SequencedEvent),
    ) -> RegisterResult<usize> {
        let after = self.cursors.get(shard).copied().unwrap_or(0);
        let batch = self.stream.read_from(shard, after)?;
        let mut seen = 0;
        for sequenced in &batch {
            on_event(sequenced);
            self.cursors.insert(shard.to_string(), sequenced.sequence);
            seen += 1;
        }
        Ok(seen)
    }

    /// Hand every new event of the default shard to `on_event`.
    pub fn poll(&mut self, on_event: impl FnMut(&SequencedEvent)) -> RegisterResult<usize> {
        self.poll_shard(DEFAULT_SHARD, on_event)
    }
}
