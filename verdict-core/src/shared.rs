//! Thread-safe handle around an [`Engine`].
//!
//! Every call takes the engine lock for its full duration, so operations from
//! different threads are serialized. A call issued from the thread that already
//! holds the lock (for example from inside a vault transfer hook) is rejected with
//! [`MarketError::ReentrantCall`] instead of deadlocking.

use crate::{engine::Engine, error::Result, vault::ValueTransfer, MarketError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

pub struct SharedEngine<V> {
    engine: Arc<Mutex<Engine<V>>>,
    holder: Arc<Mutex<Option<ThreadId>>>,
}

impl<V> Clone for SharedEngine<V> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            holder: Arc::clone(&self.holder),
        }
    }
}

/// Clears the holder slot when the transaction ends, even on panic.
struct HolderGuard<'a> {
    holder: &'a Mutex<Option<ThreadId>>,
}

impl Drop for HolderGuard<'_> {
    fn drop(&mut self) {
        *lock(self.holder) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V: ValueTransfer> SharedEngine<V> {
    pub fn new(engine: Engine<V>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            holder: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `op` as one serialized transaction.
    pub fn transact<T>(&self, op: impl FnOnce(&mut Engine<V>) -> Result<T>) -> Result<T> {
        let me = thread::current().id();
        if *lock(&self.holder) == Some(me) {
            return Err(MarketError::ReentrantCall);
        }

        let mut engine = lock(&self.engine);
        *lock(&self.holder) = Some(me);
        let _guard = HolderGuard {
            holder: &self.holder,
        };
        op(&mut engine)
    }

    /// Run a read-only query under the same lock.
    pub fn read<T>(&self, query: impl FnOnce(&Engine<V>) -> T) -> Result<T> {
        self.transact(|engine| Ok(query(engine)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{engine_at, START};

    #[test]
    fn test_reentrant_call_is_rejected() {
        let shared = SharedEngine::new(engine_at(START - 100).0);
        let inner = shared.clone();

        let result = shared.transact(|_| inner.read(|engine| engine.market_count()));
        assert!(matches!(result, Err(MarketError::ReentrantCall)));

        // the slot is released afterwards
        assert_eq!(shared.read(|engine| engine.market_count()).unwrap(), 0);
    }

    #[test]
    fn test_calls_from_threads_are_serialized() {
        let shared = SharedEngine::new(engine_at(START - 100).0);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.transact(|engine| {
                        engine.open_market(
                            &"creator".into(),
                            format!("market {i}"),
                            START,
                            START + 100,
                            0,
                        )
                    })
                })
            })
            .collect();

        let mut ids: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
