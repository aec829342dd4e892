//! Batch ("sequence") mode.
//!
//! While batch mode is active, uploaded PDFs are queued instead of being
//! attached to the session. One action is then applied to every queued file
//! in upload order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use crate::errors::BatchError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Default)]
struct UserBatch {
    active: bool,
    entries: Vec<BatchEntry>,
}

/// One failed file in a batch run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchFailure {
    pub file_name: String,
    pub error: String,
}

/// Tally of a batch run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

#[derive(Debug)]
pub struct BatchQueue {
    batches: Mutex<HashMap<i64, UserBatch>>,
    max_files: usize,
}

impl BatchQueue {
    pub fn new(max_files: usize) -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            max_files,
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Enter batch mode with an empty queue
    pub fn start(&self, user_id: i64) {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.insert(
            user_id,
            UserBatch {
                active: true,
                entries: Vec::new(),
            },
        );
        info!(user_id = %user_id, "Batch mode started");
    }

    /// Leave batch mode and drop anything still queued
    pub fn stop(&self, user_id: i64) -> bool {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.remove(&user_id).is_some_and(|batch| batch.active)
    }

    pub fn is_active(&self, user_id: i64) -> bool {
        let batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.get(&user_id).is_some_and(|batch| batch.active)
    }

    /// Queue a file; returns the new queue length
    pub fn add(&self, user_id: i64, entry: BatchEntry) -> Result<usize, BatchError> {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        let batch = batches
            .get_mut(&user_id)
            .filter(|batch| batch.active)
            .ok_or(BatchError::NotActive)?;

        if batch.entries.len() >= self.max_files {
            return Err(BatchError::Full {
                max: self.max_files,
            });
        }

        batch.entries.push(entry);
        Ok(batch.entries.len())
    }

    pub fn len(&self, user_id: i64) -> usize {
        let batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.get(&user_id).map_or(0, |batch| batch.entries.len())
    }

    pub fn is_empty(&self, user_id: i64) -> bool {
        self.len(user_id) == 0
    }

    pub fn entries(&self, user_id: i64) -> Vec<BatchEntry> {
        let batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches
            .get(&user_id)
            .map(|batch| batch.entries.clone())
            .unwrap_or_default()
    }

    /// Take every queued entry, leaving the queue empty and batch mode on
    pub fn drain(&self, user_id: i64) -> Vec<BatchEntry> {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches
            .get_mut(&user_id)
            .map(|batch| std::mem::take(&mut batch.entries))
            .unwrap_or_default()
    }

    /// Empty the queue; returns how many entries were dropped
    pub fn clear(&self, user_id: i64) -> usize {
        self.drain(user_id).len()
    }

    /// Apply `operation` to every queued file in order.
    ///
    /// The queue is drained before the first file is touched, so it is empty
    /// afterwards whatever the individual results were.
    pub async fn process<F, Fut>(&self, user_id: i64, mut operation: F) -> BatchReport
    where
        F: FnMut(BatchEntry) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let entries = self.drain(user_id);
        let mut report = BatchReport::default();

        for entry in entries {
            let file_name = entry.file_name.clone();
            match operation(entry).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!(user_id = %user_id, file_name = %file_name, error = %e, "Batch entry failed");
                    report.failed.push(BatchFailure {
                        file_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            user_id = %user_id,
            succeeded = report.succeeded,
            failed = report.failed_count(),
            "Batch processed"
        );
        report
    }
}
