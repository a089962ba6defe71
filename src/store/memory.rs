

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{AssetError, AssetStore, RecordStore, StoreError};
use crate::catalog::{AssetRef, Record, RecordId, Stored};

/// Record store kept in process memory. Also the fixture for controller
/// tests, so it can be told to fail upcoming calls.
pub struct MemoryRecordStore<R> {
    records: Mutex<Vec<Stored<R>>>,
    failing_deletes: AtomicUsize,
    failing_creates: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl<R: Record> MemoryRecordStore<R> {

    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing_deletes: AtomicUsize::new(0),
            failing_creates: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }


    pub fn seed(&self, records: impl IntoIterator<Item = R>) -> Vec<Stored<R>> {
        let mut guard = self.records.lock();
        let mut created = Vec::new();
        for record in records {
            let stored = Stored::new(RecordId::new(Uuid::new_v4().to_string()), record);
            guard.insert(0, stored.clone());
            created.push(stored);
        }
        created
    }

    /// The next `count` deletes fail with `Unavailable`.
    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }

    /// The next `count` creates fail with `Unavailable`.
    pub fn fail_next_creates(&self, count: usize) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }


    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }


    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }


    pub fn len(&self) -> usize {
        self.records.lock().len()
    }


    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<R: Record> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryRecordStore<R> {
    async fn create(&self, record: R) -> Result<Stored<R>, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_creates) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }

        let stored = Stored::new(RecordId::new(Uuid::new_v4().to_string()), record);
        debug!("Created {} {}", R::KIND, stored.id);
        self.records.lock().insert(0, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &RecordId, record: R) -> Result<Stored<R>, StoreError> {
        let mut guard = self.records.lock();
        let slot = guard
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        slot.record = record;
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_deletes) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }

        self.records.lock().retain(|r| &r.id != id);
        debug!("Deleted {} {}", R::KIND, id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Stored<R>>, StoreError> {
        Ok(self.records.lock().clone())
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Stored<R>>, StoreError> {
        Ok(self.records.lock().iter().find(|r| &r.id == id).cloned())
    }
}


#[derive(Debug, Clone)]
pub struct AssetCall {
    pub asset: AssetRef,
    pub at: Instant,
    pub succeeded: bool,
}

/// Asset store that only records what it was asked to delete.
pub struct MemoryAssetStore {
    calls: Mutex<Vec<AssetCall>>,
    failing: Mutex<HashSet<AssetRef>>,
}

impl MemoryAssetStore {

    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Every delete of `asset` fails from now on.
    pub fn fail_on(&self, asset: impl Into<AssetRef>) {
        self.failing.lock().insert(asset.into());
    }


    pub fn calls(&self) -> Vec<AssetCall> {
        self.calls.lock().clone()
    }


    pub fn attempted(&self) -> Vec<AssetRef> {
        self.calls.lock().iter().map(|c| c.asset.clone()).collect()
    }


    pub fn deleted(&self) -> Vec<AssetRef> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.succeeded)
            .map(|c| c.asset.clone())
            .collect()
    }


    pub fn calls_for(&self, asset: &AssetRef) -> usize {
        self.calls.lock().iter().filter(|c| &c.asset == asset).count()
    }
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), AssetError> {
        let fails = self.failing.lock().contains(asset);
        self.calls.lock().push(AssetCall {
            asset: asset.clone(),
            at: Instant::now(),
            succeeded: !fails,
        });

        if fails {
            Err(AssetError::Unavailable(format!("injected failure for {}", asset)))
        } else {
            Ok(())
        }
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
