//! Sequential and parallel batch strategies.
//!
//! A strategy decides how entry indices are handed to a task; the task does
//! the per-entry work and accounting. Returning `Err` from the task is a
//! fatal error: no new indices are handed out after it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;

use crate::error::{ShelfError, ShelfResult};

/// Default number of parallel workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-entry work item, called with an entry index.
pub type EntryTask<'a> = dyn Fn(usize) -> ShelfResult<()> + Sync + 'a;

/// Strategy for visiting `count` entries.
pub trait BatchStrategy: Send + Sync {
    /// Run `task` for indices `0..count`.
    ///
    /// # Returns
    ///
    /// The first fatal error, if any, after all started tasks finished.
    fn execute(&self, count: usize, task: &EntryTask<'_>) -> ShelfResult<()>;
}

/// Visits entries one at a time, in order.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl BatchStrategy for SequentialStrategy {
    fn execute(&self, count: usize, task: &EntryTask<'_>) -> ShelfResult<()> {
        for index in 0..count {
            task(index)?;
        }
        Ok(())
    }
}

/// Fixed pool of worker threads pulling indices from a shared cursor.
///
/// Completion order is unspecified. After a fatal error no new indices are
/// taken; entries already in flight on other workers run to completion.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of concurrent workers.
    pub concurrency: usize,
}

impl ParallelStrategy {
    /// Create a parallel strategy (minimum 1 worker).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BatchStrategy for ParallelStrategy {
    fn execute(&self, count: usize, task: &EntryTask<'_>) -> ShelfResult<()> {
        let cursor = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<ShelfError>> = Mutex::new(None);
        let workers = self.concurrency.min(count);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    while !abort.load(Ordering::SeqCst) {
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        if index >= count {
                            break;
                        }
                        if let Err(e) = task(index) {
                            abort.store(true, Ordering::SeqCst);
                            let mut slot = first_error.lock();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            break;
                        }
                    }
                });
            }
        });

        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Sequential for `concurrency <= 1`, parallel otherwise.
pub fn strategy_for(concurrency: usize) -> Box<dyn BatchStrategy> {
    if concurrency <= 1 {
        Box::new(SequentialStrategy::new())
    } else {
        Box::new(ParallelStrategy::new(concurrency))
    }
}
