//! In-memory mirror of the status table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::metrics;

use super::{StatusCode, StatusError, StatusId, StatusStore};

#[derive(Debug, Default)]
struct Mirror {
    by_id: HashMap<StatusId, StatusCode>,
    by_label: HashMap<String, StatusId>,
}

impl Mirror {
    fn insert(&mut self, status: StatusCode) {
        if let Some(previous) = self.by_id.get(&status.id) {
            if previous.label != status.label {
                warn!(
                    id = status.id,
                    cached = %previous.label,
                    stored = %status.label,
                    "Status mirror disagreed with store, taking store value"
                );
                self.by_label.remove(&previous.label);
            }
        }
        self.by_label.insert(status.label.clone(), status.id);
        self.by_id.insert(status.id, status);
    }
}

/// Bidirectional label/id mapping shared by every pipeline worker.
///
/// The mirror is only mutated through [`StatusCatalog::ensure`], which holds
/// the lock across the check and the store insert.
pub struct StatusCatalog {
    store: Arc<dyn StatusStore>,
    mirror: Mutex<Mirror>,
}

impl std::fmt::Debug for StatusCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCatalog")
            .field("store", &"<store>")
            .field("statuses", &self.len())
            .finish()
    }
}

impl StatusCatalog {
    /// Read the full status table into memory.
    ///
    /// Any store failure here is reported as [`StatusError::StoreUnavailable`].
    pub fn load(store: Arc<dyn StatusStore>) -> Result<Self, StatusError> {
        info!("Reading statuses");
        let rows = store.load_all().map_err(|e| match e {
            StatusError::StoreUnavailable(msg) => StatusError::StoreUnavailable(msg),
            other => StatusError::StoreUnavailable(other.to_string()),
        })?;

        let mut mirror = Mirror::default();
        for status in rows {
            debug!(id = status.id, label = %status.label, pending = status.pending, "Loaded status");
            mirror.insert(status);
        }
        info!(count = mirror.by_id.len(), "Statuses read");

        Ok(Self {
            store,
            mirror: Mutex::new(mirror),
        })
    }

    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Id of a known label, from memory only.
    pub fn resolve(&self, label: &str) -> Option<StatusId> {
        self.mirror().by_label.get(label).copied()
    }

    /// Full status record for an id, from memory only.
    pub fn get(&self, id: StatusId) -> Option<StatusCode> {
        self.mirror().by_id.get(&id).cloned()
    }

    /// Return the id for `label`, inserting a new row when the label is unseen.
    ///
    /// `pending` only applies to a newly inserted row; existing rows keep their
    /// stored flag. On failure the mirror is left untouched.
    pub fn ensure(&self, label: &str, pending: bool) -> Result<StatusId, StatusError> {
        let mut mirror = self.mirror();

        if let Some(id) = mirror.by_label.get(label) {
            return Ok(*id);
        }

        let status = match self.store.insert(label, pending) {
            Ok(status) => {
                info!(id = status.id, label = %status.label, pending = status.pending, "Inserted new status");
                metrics::STATUSES_INSERTED.inc();
                status
            }
            Err(StatusError::AlreadyExists(_)) => {
                debug!(label = %label, "Status inserted concurrently, re-reading");
                self.store
                    .find_by_label(label)
                    .map_err(|e| StatusError::StoreWriteFailed(e.to_string()))?
                    .ok_or_else(|| {
                        StatusError::StoreWriteFailed(format!(
                            "status {:?} collided on insert but cannot be read back",
                            label
                        ))
                    })?
            }
            Err(e @ StatusError::StoreWriteFailed(_)) => return Err(e),
            Err(e) => return Err(StatusError::StoreWriteFailed(e.to_string())),
        };

        let id = status.id;
        mirror.insert(status);
        Ok(id)
    }

    /// Whether items in status `id` still need processing.
    pub fn is_pending(&self, id: StatusId) -> Result<bool, StatusError> {
        self.mirror()
            .by_id
            .get(&id)
            .map(|status| status.pending)
            .ok_or(StatusError::UnknownStatus(id))
    }

    /// Number of statuses in the mirror.
    pub fn len(&self) -> usize {
        self.mirror().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
