

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::models::{
    CancelOutcome, DeletionError, DeletionStats, DeletionTicket, FinalizeReport, TicketId,
    TicketState,
};
use super::prompt::{
    deleted_message, remove_failed_message, restore_failed_message, restored_message,
};
use crate::catalog::{AssetRef, Record, RecordId, RecordMirror, Stored};
use crate::core::config::DeletionConfig;
use crate::core::debounce::Debouncer;
use crate::core::events::{Event, EventBus, EventType};
use crate::notify::{Notice, Notifier, UndoAction};
use crate::store::{AssetStore, RecordStore, StoreError};


struct PendingTicket<R> {
    ticket: DeletionTicket<R>,
    // Taken exactly once, by whichever of cancel or finalize gets there first.
    cancel: Option<oneshot::Sender<()>>,
}

struct ControllerInner<R: Record> {
    config: DeletionConfig,
    store: Arc<dyn RecordStore<R>>,
    assets: Arc<dyn AssetStore>,
    notifier: Arc<dyn Notifier>,
    mirror: RecordMirror<R>,
    tickets: Mutex<HashMap<TicketId, PendingTicket<R>>>,
    // Records whose store delete is in flight and have no ticket yet.
    removing: Mutex<HashSet<RecordId>>,
    events: Option<EventBus>,
    reindex: Option<Debouncer>,
    stats: Mutex<DeletionStats>,
}


pub struct DeletionControllerBuilder<R: Record> {
    config: DeletionConfig,
    store: Arc<dyn RecordStore<R>>,
    assets: Arc<dyn AssetStore>,
    notifier: Arc<dyn Notifier>,
    mirror: Option<RecordMirror<R>>,
    events: Option<EventBus>,
    reindex: Option<Debouncer>,
}

impl<R: Record> DeletionControllerBuilder<R> {
    pub fn config(mut self, config: DeletionConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing mirror instead of starting with an empty one.
    pub fn mirror(mut self, mirror: RecordMirror<R>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Triggered after every change that reaches the store.
    pub fn reindex(mut self, debouncer: Debouncer) -> Self {
        self.reindex = Some(debouncer);
        self
    }

    pub fn build(self) -> DeletionController<R> {
        info!(
            "DeletionController initialized for {} (grace={}ms, asset store={})",
            R::KIND,
            self.config.grace_period.as_millis(),
            self.assets.store_name()
        );

        DeletionController {
            inner: Arc::new(ControllerInner {
                config: self.config,
                store: self.store,
                assets: self.assets,
                notifier: self.notifier,
                mirror: self.mirror.unwrap_or_default(),
                tickets: Mutex::new(HashMap::new()),
                removing: Mutex::new(HashSet::new()),
                events: self.events,
                reindex: self.reindex,
                stats: Mutex::new(DeletionStats::default()),
            }),
        }
    }
}

/// Runs delete-with-undo for one record type: the record leaves the store at
/// once, its assets only after the grace window passes without an undo.
pub struct DeletionController<R: Record> {
    inner: Arc<ControllerInner<R>>,
}

impl<R: Record> Clone for DeletionController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> DeletionController<R> {
    pub fn builder(
        store: Arc<dyn RecordStore<R>>,
        assets: Arc<dyn AssetStore>,
        notifier: Arc<dyn Notifier>,
    ) -> DeletionControllerBuilder<R> {
        DeletionControllerBuilder {
            config: DeletionConfig::default(),
            store,
            assets,
            notifier,
            mirror: None,
            events: None,
            reindex: None,
        }
    }


    pub fn mirror(&self) -> &RecordMirror<R> {
        &self.inner.mirror
    }


    pub fn config(&self) -> &DeletionConfig {
        &self.inner.config
    }

    /// Replaces the mirror with the store's current contents.
    pub async fn load(&self) -> Result<usize, DeletionError> {
        let records = self.inner.store.list().await?;
        let count = records.len();
        self.inner.mirror.reset(records).await;
        info!("Loaded {} {} records", count, R::KIND);
        Ok(count)
    }


    pub async fn create(&self, record: R) -> Result<Stored<R>, DeletionError> {
        let stored = self.inner.store.create(record).await?;
        self.inner.mirror.insert(stored.clone()).await;
        self.inner.trigger_reindex();
        debug!("Created {} {}", R::KIND, stored.id);
        Ok(stored)
    }


    pub async fn update(&self, id: &RecordId, record: R) -> Result<Stored<R>, DeletionError> {
        let stored = self.inner.store.update(id, record).await?;
        if !self.inner.mirror.replace(stored.clone()).await {
            self.inner.mirror.insert(stored.clone()).await;
        }
        self.inner.trigger_reindex();
        debug!("Updated {} {}", R::KIND, stored.id);
        Ok(stored)
    }

    /// Deletes `record` from the primary store and opens an undo window.
    ///
    /// The caller must already hold the user's confirmation; `prompt` is the
    /// text they confirmed and is kept on the ticket. Returns once the store
    /// delete is done. If that delete fails nothing else happens: no ticket,
    /// the record stays listed, and the user gets an error notice.
    ///
    /// A record gets at most one open ticket. Repeat requests for it are
    /// refused, as are records missing from a loaded mirror.
    pub async fn request_deletion(
        &self,
        record: &Stored<R>,
        prompt: &str,
    ) -> Result<TicketId, DeletionError> {
        let inner = &self.inner;
        let label = record.label();
        info!("Deletion requested for {} {} ({})", R::KIND, record.id, label);

        if inner.mirror.is_loaded() && !inner.mirror.contains(&record.id).await {
            warn!("{} {} is not listed, deletion refused", R::KIND, record.id);
            return Err(DeletionError::NotListed {
                record_id: record.id.clone(),
            });
        }

        let claim = match Claim::<R>::acquire(inner, &record.id) {
            Ok(claim) => claim,
            Err(e) => {
                warn!("Deletion of {} {} refused: {}", R::KIND, record.id, e);
                return Err(e);
            }
        };

        if let Err(e) = inner.store.delete(&record.id).await {
            error!("Failed to delete {} {}: {}", R::KIND, record.id, e);
            inner.stats.lock().remove_failures += 1;
            inner
                .notifier
                .notify(Notice::error(remove_failed_message(R::KIND, &label), inner.config.notice));
            return Err(DeletionError::RemoveFailed {
                record_id: record.id.clone(),
                source: e,
            });
        }

        inner.mirror.remove(&record.id).await;

        let asset_refs = inner.cleanup_targets(record);
        let ticket_id = TicketId::new();
        let requested_at = Utc::now();
        let grace_deadline = requested_at
            + chrono::Duration::from_std(inner.config.grace_period)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let (cancel_tx, cancel_rx) = oneshot::channel();

        {
            let mut tickets = inner.tickets.lock();
            tickets.insert(
                ticket_id,
                PendingTicket {
                    ticket: DeletionTicket {
                        id: ticket_id,
                        record_id: record.id.clone(),
                        snapshot: record.clone(),
                        asset_refs: asset_refs.clone(),
                        state: TicketState::GraceWindow,
                        prompt: prompt.to_string(),
                        requested_at,
                        grace_deadline,
                        notification: None,
                    },
                    cancel: Some(cancel_tx),
                },
            );
        }
        // The ticket now blocks repeat requests on its own.
        drop(claim);

        let notice = Notice::success(deleted_message(R::KIND, &label), inner.config.undo_notice)
            .with_action(self.undo_action(ticket_id));
        let notification = inner.notifier.notify(notice);
        if let Some(pending) = inner.tickets.lock().get_mut(&ticket_id) {
            pending.ticket.notification = Some(notification);
        }

        self.schedule_finalize(ticket_id, cancel_rx);

        inner.stats.lock().requested += 1;
        inner
            .emit(
                EventType::DeletionRequested,
                ticket_id,
                json!({
                    "kind": R::KIND,
                    "record_id": record.id,
                    "label": label,
                    "prompt": prompt,
                    "assets": asset_refs.len(),
                    "grace_deadline": grace_deadline,
                }),
            )
            .await;
        inner.trigger_reindex();

        info!(
            "Deleted {} {}; {} asset(s) pending until {}",
            R::KIND,
            record.id,
            asset_refs.len(),
            grace_deadline
        );
        Ok(ticket_id)
    }

    /// Undo for a ticket in its grace window: stops the cleanup timer and
    /// re-creates the record from its snapshot under a new id. Any other
    /// ticket state makes this a no-op.
    pub async fn cancel_deletion(&self, ticket_id: TicketId) -> Result<CancelOutcome<R>, DeletionError> {
        let inner = &self.inner;

        let (snapshot, notification) = {
            let mut tickets = inner.tickets.lock();
            match tickets.get_mut(&ticket_id) {
                Some(pending) if pending.ticket.state == TicketState::GraceWindow => {
                    pending.ticket.state = TicketState::Restoring;
                    if let Some(cancel) = pending.cancel.take() {
                        let _ = cancel.send(());
                    }
                    (pending.ticket.snapshot.clone(), pending.ticket.notification)
                }
                Some(pending) => {
                    debug!("Ticket {} is {}, cancel ignored", ticket_id, pending.ticket.state);
                    return Ok(CancelOutcome::Ignored);
                }
                None => {
                    debug!("Ticket {} not pending, cancel ignored", ticket_id);
                    return Ok(CancelOutcome::Ignored);
                }
            }
        };

        if let Some(notification) = notification {
            inner.notifier.dismiss(notification);
        }

        let label = snapshot.label();
        info!("Restoring {} {} ({})", R::KIND, snapshot.id, label);

        let (result, attempts) = inner.restore(&snapshot).await;
        inner.close_ticket(ticket_id, TicketState::Cancelled);

        match result {
            Ok(restored) => {
                inner.mirror.insert(restored.clone()).await;
                inner.stats.lock().cancelled += 1;
                inner
                    .notifier
                    .notify(Notice::success(restored_message(R::KIND, &label), inner.config.notice));
                inner
                    .emit(
                        EventType::DeletionCancelled,
                        ticket_id,
                        json!({
                            "kind": R::KIND,
                            "record_id": snapshot.id,
                            "restored_id": restored.id,
                            "attempts": attempts,
                        }),
                    )
                    .await;
                inner.trigger_reindex();

                info!("Restored {} {} as {}", R::KIND, snapshot.id, restored.id);
                Ok(CancelOutcome::Restored(restored))
            }
            Err(e) => {
                error!(
                    "Failed to restore {} {} after {} attempt(s): {}",
                    R::KIND,
                    snapshot.id,
                    attempts,
                    e
                );
                inner.stats.lock().restore_failures += 1;
                inner.notifier.notify(Notice::error(
                    restore_failed_message(R::KIND, &label, &e.to_string()),
                    inner.config.notice,
                ));
                inner
                    .emit(
                        EventType::RestoreFailed,
                        ticket_id,
                        json!({
                            "kind": R::KIND,
                            "record_id": snapshot.id,
                            "attempts": attempts,
                            "error": e.to_string(),
                        }),
                    )
                    .await;

                Err(DeletionError::RestoreFailed {
                    ticket: ticket_id,
                    record_id: snapshot.id.clone(),
                    attempts,
                    source: e,
                })
            }
        }
    }

    /// Finalizes every ticket still in its grace window without waiting for
    /// the timers. Meant for shutdown, so assets are not left orphaned.
    pub async fn flush_pending(&self) -> Vec<FinalizeReport> {
        let ids = self.pending();
        if !ids.is_empty() {
            info!("Flushing {} pending {} deletion(s)", ids.len(), R::KIND);
        }

        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(report) = ControllerInner::finalize(&self.inner, id).await {
                reports.push(report);
            }
        }
        reports
    }

    /// Snapshot of a ticket. `None` once it reached a terminal state.
    pub fn ticket(&self, id: TicketId) -> Option<DeletionTicket<R>> {
        self.inner.tickets.lock().get(&id).map(|p| p.ticket.clone())
    }

    /// Tickets still waiting out their grace window, oldest first.
    pub fn pending(&self) -> Vec<TicketId> {
        let tickets = self.inner.tickets.lock();
        let mut pending: Vec<&DeletionTicket<R>> = tickets
            .values()
            .map(|p| &p.ticket)
            .filter(|t| t.state == TicketState::GraceWindow)
            .collect();
        pending.sort_by_key(|t| t.requested_at);
        pending.iter().map(|t| t.id).collect()
    }


    pub fn stats(&self) -> DeletionStats {
        self.inner.stats.lock().clone()
    }

    fn undo_action(&self, ticket_id: TicketId) -> UndoAction {
        let weak: Weak<ControllerInner<R>> = Arc::downgrade(&self.inner);
        UndoAction::new(
            "Undo",
            Arc::new(move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        debug!("Undo for ticket {} after controller shutdown", ticket_id);
                        return;
                    };
                    let controller = DeletionController { inner };
                    // Failures were already surfaced as an error notice.
                    let _ = controller.cancel_deletion(ticket_id).await;
                }
                .boxed()
            }),
        )
    }

    fn schedule_finalize(&self, ticket_id: TicketId, cancel_rx: oneshot::Receiver<()>) {
        let weak = Arc::downgrade(&self.inner);
        let grace = self.inner.config.grace_period;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                // Fires on undo, and also when the sender is dropped by a flush.
                _ = cancel_rx => {
                    debug!("Grace timer for ticket {} stopped", ticket_id);
                    return;
                }
            }

            match weak.upgrade() {
                Some(inner) => {
                    ControllerInner::finalize(&inner, ticket_id).await;
                }
                None => {
                    warn!("Controller gone before ticket {} finalized; assets left in place", ticket_id);
                }
            }
        });
    }
}

/// Marks a record as being removed until dropped.
struct Claim<'a, R: Record> {
    inner: &'a ControllerInner<R>,
    record_id: RecordId,
}

impl<'a, R: Record> Claim<'a, R> {
    fn acquire(inner: &'a ControllerInner<R>, record_id: &RecordId) -> Result<Self, DeletionError> {
        let tickets = inner.tickets.lock();
        if let Some(pending) = tickets.values().find(|p| &p.ticket.record_id == record_id) {
            return Err(DeletionError::AlreadyPending {
                record_id: record_id.clone(),
                ticket: pending.ticket.id,
            });
        }
        if !inner.removing.lock().insert(record_id.clone()) {
            return Err(DeletionError::InProgress {
                record_id: record_id.clone(),
            });
        }
        Ok(Self {
            inner,
            record_id: record_id.clone(),
        })
    }
}

impl<R: Record> Drop for Claim<'_, R> {
    fn drop(&mut self) {
        self.inner.removing.lock().remove(&self.record_id);
    }
}

impl<R: Record> ControllerInner<R> {
    fn cleanup_targets(&self, record: &Stored<R>) -> Vec<AssetRef> {
        record
            .asset_refs()
            .into_iter()
            .filter(|asset| !asset.is_empty())
            .filter(|asset| {
                let accepted = self.assets.accepts(asset);
                if !accepted {
                    warn!(
                        "Asset {} cannot be deleted by the {} store, skipped",
                        asset,
                        self.assets.store_name()
                    );
                }
                accepted
            })
            .filter(|asset| match &self.config.asset_host {
                Some(host) => {
                    let hosted = asset.is_hosted_on(host);
                    if !hosted {
                        debug!("Asset {} not on {}, leaving it alone", asset, host);
                    }
                    hosted
                }
                None => true,
            })
            .collect()
    }

    async fn restore(&self, snapshot: &Stored<R>) -> (Result<Stored<R>, StoreError>, u32) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.create(snapshot.record.clone()).await {
                Ok(restored) => return (Ok(restored), attempts),
                Err(e) if attempts <= self.config.restore_retries => {
                    warn!(
                        "Restore of {} {} failed (attempt {}), retrying: {}",
                        R::KIND,
                        snapshot.id,
                        attempts,
                        e
                    );
                }
                Err(e) => return (Err(e), attempts),
            }
        }
    }

    /// Deletes the ticket's assets one by one. A failed asset is logged and
    /// skipped. No-op unless the ticket is still in its grace window.
    async fn finalize(inner: &Arc<Self>, ticket_id: TicketId) -> Option<FinalizeReport> {
        let ticket = {
            let mut tickets = inner.tickets.lock();
            match tickets.get_mut(&ticket_id) {
                Some(pending) if pending.ticket.state == TicketState::GraceWindow => {
                    pending.ticket.state = TicketState::Finalizing;
                    pending.cancel.take();
                    pending.ticket.clone()
                }
                _ => {
                    debug!("Ticket {} not in grace window, finalize skipped", ticket_id);
                    return None;
                }
            }
        };

        debug!(
            "Finalizing ticket {} ({} asset(s)) for {} {}",
            ticket_id,
            ticket.asset_refs.len(),
            R::KIND,
            ticket.record_id
        );

        let mut deleted = Vec::new();
        let mut failed = Vec::new();

        for asset in &ticket.asset_refs {
            match inner.assets.delete_asset(asset).await {
                Ok(()) => {
                    debug!("Deleted asset {} of {} {}", asset, R::KIND, ticket.record_id);
                    deleted.push(asset.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to delete asset {} of {} {}: {}",
                        asset,
                        R::KIND,
                        ticket.record_id,
                        e
                    );
                    inner
                        .emit(
                            EventType::AssetCleanupFailed,
                            ticket_id,
                            json!({
                                "kind": R::KIND,
                                "record_id": ticket.record_id,
                                "asset": asset,
                                "error": e.to_string(),
                            }),
                        )
                        .await;
                    failed.push((asset.clone(), e.to_string()));
                }
            }
        }

        inner.close_ticket(ticket_id, TicketState::Finalized);
        {
            let mut stats = inner.stats.lock();
            stats.finalized += 1;
            stats.assets_deleted += deleted.len();
            stats.asset_failures += failed.len();
        }

        let report = FinalizeReport {
            ticket: ticket_id,
            record_id: ticket.record_id.clone(),
            deleted,
            failed,
            finalized_at: Utc::now(),
        };

        inner
            .emit(
                EventType::DeletionFinalized,
                ticket_id,
                json!({
                    "kind": R::KIND,
                    "record_id": report.record_id,
                    "deleted": report.deleted.len(),
                    "failed": report.failed.len(),
                }),
            )
            .await;

        info!(
            "Finalized deletion of {} {}: {} asset(s) deleted, {} failed",
            R::KIND,
            report.record_id,
            report.deleted.len(),
            report.failed.len()
        );
        Some(report)
    }

    /// Terminal transition: the ticket leaves the table.
    fn close_ticket(&self, ticket_id: TicketId, state: TicketState) {
        if let Some(mut pending) = self.tickets.lock().remove(&ticket_id) {
            pending.ticket.state = state;
            debug!("Ticket {} closed as {}", ticket_id, state);
        }
    }

    async fn emit(&self, event_type: EventType, ticket_id: TicketId, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            events
                .emit(Event::new(event_type, payload).with_correlation(ticket_id.as_uuid()))
                .await;
        }
    }

    fn trigger_reindex(&self) {
        if let Some(reindex) = &self.reindex {
            reindex.trigger();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Material, Product};
    use crate::core::config::GerobakConfig;
    use crate::core::debounce::DebouncedAction;
    use crate::core::events::EventHandler;
    use crate::notify::{NoticeLevel, ToastQueue};
    use crate::store::{HttpAssetStore, MemoryAssetStore, MemoryRecordStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    const GRACE: Duration = Duration::from_millis(5000);

    struct Fixture {
        store: Arc<MemoryRecordStore<Product>>,
        assets: Arc<MemoryAssetStore>,
        toasts: ToastQueue,
        controller: DeletionController<Product>,
    }

    fn fixture_with(config: DeletionConfig, events: Option<EventBus>, reindex: Option<Debouncer>) -> Fixture {
        let store = Arc::new(MemoryRecordStore::new());
        let assets = Arc::new(MemoryAssetStore::new());
        let toasts = ToastQueue::new();

        let mut builder = DeletionController::builder(
            store.clone() as Arc<dyn RecordStore<Product>>,
            assets.clone() as Arc<dyn AssetStore>,
            Arc::new(toasts.clone()) as Arc<dyn Notifier>,
        )
        .config(config);
        if let Some(events) = events {
            builder = builder.events(events);
        }
        if let Some(reindex) = reindex {
            builder = builder.reindex(reindex);
        }

        Fixture {
            store,
            assets,
            toasts,
            controller: builder.build(),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(GerobakConfig::default().deletion(), None, None)
    }

    fn cart(name: &str, images: &[&str]) -> Product {
        Product::new(name, Material::Wood, 3_500_000).with_images(images.iter().copied())
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_removed_immediately() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();

        let ticket = fx.controller.request_deletion(&stored, "Delete product \"Cart A\"?").await.unwrap();

        assert!(fx.store.get_by_id(&stored.id).await.unwrap().is_none());
        assert!(fx.store.list().await.unwrap().is_empty());
        assert!(!fx.controller.mirror().contains(&stored.id).await);

        let pending = fx.controller.ticket(ticket).unwrap();
        assert_eq!(pending.state, TicketState::GraceWindow);
        assert_eq!(pending.snapshot, stored);
        assert_eq!(pending.asset_refs, vec![AssetRef::new("img1"), AssetRef::new("img2")]);
        assert!(fx.assets.attempted().is_empty());
        assert_eq!(fx.controller.pending(), vec![ticket]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_restores_exactly_once() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();
        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();

        tokio::time::sleep(Duration::from_millis(2000)).await;

        let outcome = fx.controller.cancel_deletion(ticket).await.unwrap();
        let restored = outcome.restored().cloned().unwrap();
        assert_ne!(restored.id, stored.id);
        assert_eq!(restored.record, stored.record);

        let second = fx.controller.cancel_deletion(ticket).await.unwrap();
        assert!(second.is_ignored());

        let listed = fx.store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, restored.id);
        assert_eq!(fx.store.create_calls(), 2);
        assert!(fx.controller.mirror().contains(&restored.id).await);
        assert!(fx.controller.ticket(ticket).is_none());
        assert_eq!(fx.controller.stats().cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_ticket_never_finalizes() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();
        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_ok!(fx.controller.cancel_deletion(ticket).await);

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert!(fx.assets.attempted().is_empty());
        assert_eq!(fx.controller.stats().finalized, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_window_respected() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();

        let start = Instant::now();
        fx.controller.request_deletion(&stored, "").await.unwrap();

        tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
        assert!(fx.assets.attempted().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img1")), 1);
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img2")), 1);
        for call in fx.assets.calls() {
            assert!(call.at.duration_since(start) >= GRACE);
        }

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(fx.assets.attempted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tickets_are_independent() {
        let fx = fixture();
        let a = fx.controller.create(cart("Cart A", &["a1"])).await.unwrap();
        let b = fx.controller.create(cart("Cart B", &["b1"])).await.unwrap();
        let c = fx.controller.create(cart("Cart C", &["c1"])).await.unwrap();

        let ticket_a = fx.controller.request_deletion(&a, "").await.unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let ticket_b = fx.controller.request_deletion(&b, "").await.unwrap();
        let ticket_c = fx.controller.request_deletion(&c, "").await.unwrap();

        assert_ok!(fx.controller.cancel_deletion(ticket_a).await);
        assert_ok!(fx.controller.cancel_deletion(ticket_c).await);

        tokio::time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(fx.assets.attempted(), vec![AssetRef::new("b1")]);
        assert!(fx.controller.ticket(ticket_b).is_none());

        // And the other way round: a cancel after B finalized changes nothing.
        assert!(fx.controller.cancel_deletion(ticket_b).await.unwrap().is_ignored());
        assert_eq!(fx.controller.stats().finalized, 1);
        assert_eq!(fx.controller.stats().cancelled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_asset_failure_is_not_fatal() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2", "img3"])).await.unwrap();
        fx.assets.fail_on("img1");

        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        tokio::time::sleep(GRACE + Duration::from_millis(10)).await;

        assert_eq!(
            fx.assets.attempted(),
            vec![AssetRef::new("img1"), AssetRef::new("img2"), AssetRef::new("img3")]
        );
        assert_eq!(fx.assets.deleted(), vec![AssetRef::new("img2"), AssetRef::new("img3")]);
        assert!(fx.controller.ticket(ticket).is_none());

        let stats = fx.controller.stats();
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.assets_deleted, 2);
        assert_eq!(stats.asset_failures, 1);
        assert!(fx.toasts.messages(NoticeLevel::Error).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_failure_aborts_request() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1"])).await.unwrap();
        fx.store.fail_next_deletes(1);

        let result = fx.controller.request_deletion(&stored, "").await;
        assert!(matches!(result, Err(DeletionError::RemoveFailed { .. })));

        assert!(fx.controller.mirror().contains(&stored.id).await);
        assert!(fx.store.get_by_id(&stored.id).await.unwrap().is_some());
        assert!(fx.controller.pending().is_empty());
        assert_eq!(fx.store.delete_calls(), 1);
        assert_eq!(
            fx.toasts.messages(NoticeLevel::Error),
            vec!["Failed to delete product \"Cart A\". Please try again.".to_string()]
        );

        tokio::time::sleep(GRACE * 2).await;
        assert!(fx.assets.attempted().is_empty());

        // The failed attempt leaves nothing behind that blocks a retry.
        assert_ok!(fx.controller.request_deletion(&stored, "").await);
        assert_eq!(fx.controller.pending().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_request_refused_then_undo_restores_once() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();

        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        match fx.controller.request_deletion(&stored, "").await {
            Err(DeletionError::AlreadyPending { record_id, ticket: open }) => {
                assert_eq!(record_id, stored.id);
                assert_eq!(open, ticket);
            }
            other => panic!("expected already pending, got {:?}", other),
        }
        assert_eq!(fx.store.delete_calls(), 1);
        assert_eq!(fx.controller.pending(), vec![ticket]);
        assert_eq!(fx.controller.stats().requested, 1);

        assert!(fx.controller.cancel_deletion(ticket).await.unwrap().restored().is_some());
        assert_eq!(fx.store.len(), 1);
        assert_eq!(fx.controller.mirror().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_request_never_deletes_assets_twice() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();

        fx.controller.request_deletion(&stored, "").await.unwrap();
        assert_err!(fx.controller.request_deletion(&stored, "").await);

        tokio::time::sleep(GRACE * 2).await;
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img1")), 1);
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img2")), 1);
        assert_eq!(fx.controller.stats().finalized, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_open_one_ticket() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1"])).await.unwrap();

        let (first, second) = tokio::join!(
            fx.controller.request_deletion(&stored, ""),
            fx.controller.request_deletion(&stored, "")
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(matches!(
            first.err().or(second.err()),
            Some(DeletionError::AlreadyPending { .. } | DeletionError::InProgress { .. })
        ));
        assert_eq!(fx.controller.pending().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_record_refused_once_loaded() {
        let fx = fixture();
        let seeded = fx.store.seed([cart("Cart A", &["img1"])]);
        fx.controller.load().await.unwrap();

        fx.controller.request_deletion(&seeded[0], "").await.unwrap();
        tokio::time::sleep(GRACE * 2).await;
        assert!(fx.controller.pending().is_empty());

        // A stale handler still holding the finalized record.
        assert!(matches!(
            fx.controller.request_deletion(&seeded[0], "").await,
            Err(DeletionError::NotListed { .. })
        ));
        let ghost = Stored::new(RecordId::new("ghost"), cart("Ghost", &["img9"]));
        assert!(matches!(
            fx.controller.request_deletion(&ghost, "").await,
            Err(DeletionError::NotListed { .. })
        ));

        assert_eq!(fx.store.delete_calls(), 1);
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img1")), 1);
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img9")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refs_the_asset_store_cannot_delete_are_not_scheduled() {
        let store = Arc::new(MemoryRecordStore::new());
        let assets = HttpAssetStore::new("http://127.0.0.1:9/api/cloudinary-delete", Duration::from_secs(1))
            .unwrap();
        let controller = DeletionController::builder(
            store.clone() as Arc<dyn RecordStore<Product>>,
            Arc::new(assets) as Arc<dyn AssetStore>,
            Arc::new(ToastQueue::new()) as Arc<dyn Notifier>,
        )
        .build();

        let hosted = "https://res.cloudinary.com/gerobak/image/upload/v1/products/a.jpg";
        let stored = controller
            .create(cart("Cart A", &[hosted, "/images/local.jpg"]))
            .await
            .unwrap();

        let ticket = controller.request_deletion(&stored, "").await.unwrap();
        assert_eq!(controller.ticket(ticket).unwrap().asset_refs, vec![AssetRef::new(hosted)]);
        assert_ok!(controller.cancel_deletion(ticket).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_retried_once_then_fails() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1"])).await.unwrap();
        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        fx.store.fail_next_creates(5);

        let result = fx.controller.cancel_deletion(ticket).await;
        match result {
            Err(DeletionError::RestoreFailed { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected restore failure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(fx.store.create_calls(), 3);
        assert!(fx.store.is_empty());
        assert_eq!(fx.controller.stats().restore_failures, 1);
        assert_eq!(fx.toasts.messages(NoticeLevel::Error).len(), 1);
        assert!(fx.toasts.messages(NoticeLevel::Error)[0].starts_with("Failed to restore product \"Cart A\""));

        tokio::time::sleep(GRACE * 2).await;
        assert!(fx.assets.attempted().is_empty());
        assert!(fx.controller.cancel_deletion(ticket).await.unwrap().is_ignored());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_succeeds_on_retry() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &[])).await.unwrap();
        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        fx.store.fail_next_creates(1);

        let outcome = fx.controller.cancel_deletion(ticket).await.unwrap();
        assert!(outcome.restored().is_some());
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_from_notification() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();
        fx.controller.request_deletion(&stored, "").await.unwrap();

        let notice = fx.toasts.latest_with_action().unwrap();
        assert_eq!(fx.toasts.active().last().unwrap().message, "Product \"Cart A\" deleted.");

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(fx.toasts.click_undo(notice).await);

        let listed = fx.store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].record.name, "Cart A");
        assert_ne!(listed[0].id, stored.id);

        tokio::time::sleep(GRACE * 2).await;
        assert!(fx.assets.attempted().is_empty());
        assert!(
            fx.toasts
                .messages(NoticeLevel::Success)
                .contains(&"Product \"Cart A\" restored.".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_undo_notice_expires_with_grace() {
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1"])).await.unwrap();
        fx.controller.request_deletion(&stored, "").await.unwrap();
        let notice = fx.toasts.latest_with_action().unwrap();

        tokio::time::sleep(GRACE + Duration::from_millis(1)).await;
        assert!(!fx.toasts.click_undo(notice).await);
        assert_eq!(fx.assets.attempted(), vec![AssetRef::new("img1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pending_finalizes_now() {
        let fx = fixture();
        let a = fx.controller.create(cart("Cart A", &["a1", "a2"])).await.unwrap();
        let b = fx.controller.create(cart("Cart B", &["b1"])).await.unwrap();
        fx.controller.request_deletion(&a, "").await.unwrap();
        fx.controller.request_deletion(&b, "").await.unwrap();

        let reports = fx.controller.flush_pending().await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports.iter().map(FinalizeReport::attempted).sum::<usize>(), 3);
        assert!(fx.controller.pending().is_empty());

        tokio::time::sleep(GRACE * 2).await;
        assert_eq!(fx.assets.attempted().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_hosted_assets_are_cleaned_up() {
        let config = GerobakConfig {
            asset_host: Some("res.cloudinary.com".to_string()),
            ..GerobakConfig::default()
        };
        let fx = fixture_with(config.deletion(), None, None);
        let hosted = "https://res.cloudinary.com/gerobak/image/upload/v1/products/a.jpg";
        let stored = fx
            .controller
            .create(cart("Cart A", &[hosted, "/images/local.jpg", ""]))
            .await
            .unwrap();

        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        assert_eq!(fx.controller.ticket(ticket).unwrap().asset_refs, vec![AssetRef::new(hosted)]);

        tokio::time::sleep(GRACE + Duration::from_millis(1)).await;
        assert_eq!(fx.assets.attempted(), vec![AssetRef::new(hosted)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: EventHandler = Arc::new(move |event| {
            seen_clone.lock().push(event.event_type);
        });
        bus.register_all(handler).await;

        let fx = fixture_with(GerobakConfig::default().deletion(), Some(bus), None);
        fx.assets.fail_on("b1");
        let a = fx.controller.create(cart("Cart A", &["a1"])).await.unwrap();
        let b = fx.controller.create(cart("Cart B", &["b1"])).await.unwrap();

        let ticket_a = fx.controller.request_deletion(&a, "").await.unwrap();
        fx.controller.request_deletion(&b, "").await.unwrap();
        fx.controller.cancel_deletion(ticket_a).await.unwrap();
        tokio::time::sleep(GRACE + Duration::from_millis(10)).await;

        let seen = seen.lock().clone();
        let count = |t: EventType| seen.iter().filter(|e| **e == t).count();
        assert_eq!(count(EventType::DeletionRequested), 2);
        assert_eq!(count(EventType::DeletionCancelled), 1);
        assert_eq!(count(EventType::AssetCleanupFailed), 1);
        assert_eq!(count(EventType::DeletionFinalized), 1);
        assert_eq!(count(EventType::RestoreFailed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_trigger_one_reindex() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let action: DebouncedAction = Arc::new(move || {
            let runs = Arc::clone(&runs_clone);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });
        let reindex = Debouncer::new("reindex", Duration::from_millis(5000), action);

        let fx = fixture_with(GerobakConfig::default().deletion(), None, Some(reindex.clone()));
        let a = fx.controller.create(cart("Cart A", &[])).await.unwrap();
        let b = fx.controller.create(cart("Cart B", &[])).await.unwrap();
        fx.controller.request_deletion(&a, "").await.unwrap();
        fx.controller.request_deletion(&b, "").await.unwrap();

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_and_update_keep_mirror_in_sync() {
        let fx = fixture();
        let seeded = fx.store.seed([cart("Cart A", &[]), cart("Cart B", &[])]);
        assert_eq!(fx.controller.load().await.unwrap(), 2);

        let mut edited = seeded[0].record.clone();
        edited.price = 4_000_000;
        let updated = fx.controller.update(&seeded[0].id, edited).await.unwrap();
        assert_eq!(
            fx.controller.mirror().get(&seeded[0].id).await.unwrap().record.price,
            updated.record.price
        );

        assert_err!(
            fx.controller
                .update(&RecordId::new("missing"), cart("x", &[]))
                .await
        );
        assert_eq!(fx.controller.mirror().len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_example_scenario() {
        // Undo run.
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();
        let ticket = fx.controller.request_deletion(&stored, "").await.unwrap();
        assert!(fx.controller.mirror().is_empty().await);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let restored = fx.controller.cancel_deletion(ticket).await.unwrap();
        assert_eq!(restored.restored().unwrap().record.name, "Cart A");
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(fx.assets.attempted().is_empty());

        // No-undo run.
        let fx = fixture();
        let stored = fx.controller.create(cart("Cart A", &["img1", "img2"])).await.unwrap();
        fx.controller.request_deletion(&stored, "").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img1")), 1);
        assert_eq!(fx.assets.calls_for(&AssetRef::new("img2")), 1);
    }
}
