//! Named write locks.
//!
//! The register assumes a single writer per record root. Within a
//! process, [`LockService`] hands out named FIFO locks: acquirers queue in
//! arrival order and are granted the lock strictly in that order.
//! Cross-process coordination is outside the core; deployments that need
//! it put an external lock service behind the same acquire → hold →
//! release shape.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

#[derive(Default)]
struct LockState {
    /// Tickets waiting for the lock, in arrival order. The front ticket
    /// holds the lock.
    queue: VecDeque<u64>,
    next_ticket: u64,
}

struct NamedLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

/// Hands out named, FIFO-ordered write locks.
#[derive(Clone, Default)]
pub struct LockService {
    locks: Arc<Mutex<BTreeMap<String, Arc<NamedLock>>>>,
}

impl LockService {
    pub fn new() -> Self {
        LockService::default()
    }

    fn named(&self, name: &str) -> Arc<NamedLock> {
        let mut locks = self.locks.lock().expect("poisoned");
        locks
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(NamedLock {
                    state: Mutex::new(LockState::default()),
                    cond: Condvar::new(),
                })
            })
            .clone()
    }

    /// Acquire the named lock, blocking until every earlier acquirer has
    /// released it. The returned guard releases on drop.
    pub fn acquire(&self, name: &str) -> LockGuard {
        let lock = self.named(name);
        let ticket;
        {
            let mut state = lock.state.lock().expect("poisoned");
            ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(ticket);
            while state.queue.front() != Some(&ticket) {
                state = lock.cond.wait(state).expect("poisoned");
            }
        }
        tracing::debug!(%name, ticket, "write lock acquired");
        LockGuard {
            lock,
            name: name.to_string(),
            ticket,
        }
    }

    /// The number of acquirers currently queued (including the holder).
    pub fn queue_depth(&self, name: &str) -> usize {
        let lock = self.named(name);
        let state = lock.state.lock().expect("poisoned");
        state.queue.len()
    }
}

/// Holds a named write lock; releases it on drop.
pub struct LockGuard {
    lock: Arc<NamedLock>,
    name: String,
    ticket: u64,
}

impl LockGuard {
    /// Position of this guard's ticket in the queue (0 = holder).
    pub fn position(&self) -> usize {
        let state = self.lock.state.lock().expect("poisoned");
        state
            .queue
            .iter()
            .position(|t| *t == self.ticket)
            .unwrap_or(0)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().expect("poisoned");
        if let Some(at) = state.queue.iter().position(|t| *t == self.ticket) {
            state.queue.remove(at);
        }
        tracing::debug!(name = %self.name, ticket = self.ticket, "write lock released");
        self.lock.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_is_exclusive_and_fifo() {
        let service = LockService::new();
        let in_section = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = service.acquire("record");
        let mut handles = Vec::new();
        for i in 0..4 {
            let service = service.clone();
            let in_section = in_section.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                // Stagger arrival so the queue order is deterministic.
                thread::sleep(Duration::from_millis(20 * (i as u64 + 1)));
                let _guard = service.acquire("record");
                assert_eq!(in_section.fetch_add(1, Ordering::SeqCst), 0);
                order.lock().unwrap().push(i);
                thread::sleep(Duration::from_millis(5));
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        thread::sleep(Duration::from_millis(150));
        drop(first);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn locks_with_different_names_are_independent() {
        let service = LockService::new();
        let _a = service.acquire("a");
        let _b = service.acquire("b");
        assert_eq!(service.queue_depth("a"), 1);
        assert_eq!(service.queue_depth("b"), 1);
    }
}
