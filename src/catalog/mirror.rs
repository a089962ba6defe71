

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::debug;

use super::record::{Record, RecordId, Stored};

/// In-memory copy of the records currently shown to the user. Written only
/// by user-triggered handlers and the initial load; last writer wins.
pub struct RecordMirror<R> {
    records: Arc<RwLock<Vec<Stored<R>>>>,
    loaded: Arc<AtomicBool>,
}

impl<R: Record> RecordMirror<R> {

    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }


    pub async fn reset(&self, records: Vec<Stored<R>>) {
        let mut guard = self.records.write().await;
        debug!("Mirror of {} reset with {} records", R::KIND, records.len());
        *guard = records;
        self.loaded.store(true, Ordering::SeqCst);
    }

    /// True once `reset` has filled the mirror from the store. From then on
    /// the mirror is the list the user acts on.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Newest first, the same order the admin lists use.
    pub async fn insert(&self, record: Stored<R>) {
        let mut guard = self.records.write().await;
        guard.retain(|r| r.id != record.id);
        guard.insert(0, record);
    }


    pub async fn replace(&self, record: Stored<R>) -> bool {
        let mut guard = self.records.write().await;
        match guard.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }


    pub async fn remove(&self, id: &RecordId) -> Option<Stored<R>> {
        let mut guard = self.records.write().await;
        let index = guard.iter().position(|r| &r.id == id)?;
        Some(guard.remove(index))
    }


    pub async fn get(&self, id: &RecordId) -> Option<Stored<R>> {
        let guard = self.records.read().await;
        guard.iter().find(|r| &r.id == id).cloned()
    }


    pub async fn contains(&self, id: &RecordId) -> bool {
        let guard = self.records.read().await;
        guard.iter().any(|r| &r.id == id)
    }


    pub async fn list(&self) -> Vec<Stored<R>> {
        self.records.read().await.clone()
    }


    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }


    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<R: Record> Default for RecordMirror<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for RecordMirror<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            loaded: Arc::clone(&self.loaded),
        }
    }
}
