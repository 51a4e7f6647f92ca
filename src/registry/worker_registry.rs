//! # Worker Registry
//!
//! Owns the mapping from worker name to worker instance. Names are unique for
//! the lifetime of the registry; a second registration under the same name is
//! rejected rather than overwriting the first.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{error, info};

use crate::error::{BusError, BusResult};
use crate::worker::Worker;

/// Registry of live workers keyed by name
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: DashMap<String, Arc<Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a worker under its own name.
    pub fn register(&self, worker: Worker) -> BusResult<Arc<Worker>> {
        match self.workers.entry(worker.name().to_string()) {
            Entry::Occupied(occupied) => {
                error!(worker = %occupied.key(), "Worker name already registered");
                Err(BusError::DuplicateWorker {
                    worker: occupied.key().clone(),
                })
            }
            Entry::Vacant(vacant) => {
                let worker = Arc::new(worker);
                info!(
                    worker = %worker.name(),
                    handlers = worker.handlers().len(),
                    "Registered worker"
                );
                vacant.insert(Arc::clone(&worker));
                Ok(worker)
            }
        }
    }

    /// Look up a worker. Absence is reported as [`BusError::WorkerNotFound`];
    /// the caller decides whether that is fatal.
    pub fn get(&self, name: &str) -> BusResult<Arc<Worker>> {
        self.workers
            .get(name)
            .map(|worker| Arc::clone(worker.value()))
            .ok_or_else(|| BusError::WorkerNotFound {
                worker: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.iter().map(|w| w.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
