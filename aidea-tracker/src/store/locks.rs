//! Per-date serialization of day-file access, and per-record serialization
//! of multi-step operations

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One mutex per calendar date
///
/// Holding a date's guard gives exclusive use of that day-file for one
/// logical store operation. Different dates never contend.
#[derive(Debug, Default)]
pub struct DateLocks {
    locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl DateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex guarding `date`, created on first use
    pub fn lock_for(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        // A panic while holding the map lock cannot leave the map inconsistent
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(date).or_default().clone()
    }

    /// Number of dates seen so far
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acquire `lock`, recovering from poisoning
///
/// Every write path finishes with an atomic rename or a single append, so a
/// panicked holder leaves the file in a readable state.
pub fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One async mutex per stored record
///
/// Held across a read, the upstream calls that follow it and the final
/// write, so two operations on the same activity never interleave. The
/// date lock only covers a single store call.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<(NaiveDate, String), Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of record `id` of `date`
    pub async fn lock(&self, date: NaiveDate, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map references entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry((date, id.to_string())).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Records currently held or awaited
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
