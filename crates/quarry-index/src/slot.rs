//! Atomically swappable holder of the live index handle.

use std::sync::{Arc, RwLock};

use tracing::info;

use quarry_core::errors::{QuarryError, QuarryResult, StorageError};

use crate::backend::IndexHandle;

#[derive(Default)]
struct SlotState {
    handle: Option<Arc<dyn IndexHandle>>,
    generation: u64,
}

/// The lock is held only to clone or replace the `Arc`; searches run on the
/// cloned handle, so a swap never waits for in-flight queries.
#[derive(Default)]
pub struct IndexSlot {
    state: RwLock<SlotState>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handle, or `IndexNotReady` if none was ever installed.
    pub fn get(&self) -> QuarryResult<Arc<dyn IndexHandle>> {
        self.snapshot().map(|(handle, _)| handle)
    }

    /// Current handle together with its generation.
    pub fn snapshot(&self) -> QuarryResult<(Arc<dyn IndexHandle>, u64)> {
        let state = self.state.read().map_err(|_| poisoned())?;
        match &state.handle {
            Some(handle) => Ok((Arc::clone(handle), state.generation)),
            None => Err(QuarryError::IndexNotReady),
        }
    }

    /// Install a new handle; returns the new generation.
    pub fn swap(&self, handle: Arc<dyn IndexHandle>) -> QuarryResult<u64> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let records = handle.len();
        state.handle = Some(handle);
        state.generation += 1;
        info!(generation = state.generation, records, "index handle swapped in");
        Ok(state.generation)
    }

    /// Generation of the installed handle; 0 when empty.
    pub fn generation(&self) -> u64 {
        self.state.read().map(|s| s.generation).unwrap_or(0)
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().map(|s| s.handle.is_some()).unwrap_or(false)
    }
}

fn poisoned() -> QuarryError {
    QuarryError::Storage(StorageError::LockPoisoned {
        resource: "index slot".to_string(),
    })
}
