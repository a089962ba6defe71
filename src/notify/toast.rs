

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Notice, NoticeLevel, NotificationId, Notifier, UndoAction};


struct Toast {
    id: NotificationId,
    level: NoticeLevel,
    message: String,
    action: Option<UndoAction>,
    expires_at: Instant,
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToast {
    pub id: NotificationId,
    pub level: NoticeLevel,
    pub message: String,
    pub action_label: Option<String>,
}

struct ToastQueueInner {
    next_id: AtomicU64,
    toasts: Mutex<Vec<Toast>>,
    history: Mutex<Vec<(NoticeLevel, String)>>,
}

/// In-memory toast stack. Toasts expire after their duration; expired ones
/// are swept on every access, so no timer task is needed.
#[derive(Clone)]
pub struct ToastQueue {
    inner: Arc<ToastQueueInner>,
}

impl ToastQueue {

    pub fn new() -> Self {
        Self {
            inner: Arc::new(ToastQueueInner {
                next_id: AtomicU64::new(1),
                toasts: Mutex::new(Vec::new()),
                history: Mutex::new(Vec::new()),
            }),
        }
    }


    pub fn active(&self) -> Vec<ActiveToast> {
        let mut toasts = self.inner.toasts.lock();
        Self::sweep(&mut toasts);
        toasts
            .iter()
            .map(|t| ActiveToast {
                id: t.id,
                level: t.level,
                message: t.message.clone(),
                action_label: t.action.as_ref().map(|a| a.label.clone()),
            })
            .collect()
    }

    /// Every message ever shown at `level`, oldest first.
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.inner
            .history
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Simulates a click on the toast's action button: runs the action, then
    /// dismisses the toast. Returns false if the toast is gone or has no action.
    pub async fn click_undo(&self, id: NotificationId) -> bool {
        let action = {
            let mut toasts = self.inner.toasts.lock();
            Self::sweep(&mut toasts);
            toasts
                .iter()
                .find(|t| t.id == id)
                .and_then(|t| t.action.clone())
        };

        match action {
            Some(action) => {
                debug!("Toast {} action '{}' clicked", id, action.label);
                action.invoke().await;
                self.dismiss(id);
                true
            }
            None => false,
        }
    }


    pub fn latest_with_action(&self) -> Option<NotificationId> {
        self.active()
            .into_iter()
            .rev()
            .find(|t| t.action_label.is_some())
            .map(|t| t.id)
    }

    fn sweep(toasts: &mut Vec<Toast>) {
        let now = Instant::now();
        toasts.retain(|t| t.expires_at > now);
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, notice: Notice) -> NotificationId {
        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        info!("[{}] {}", notice.level, notice.message);

        self.inner
            .history
            .lock()
            .push((notice.level, notice.message.clone()));

        let mut toasts = self.inner.toasts.lock();
        Self::sweep(&mut toasts);
        toasts.push(Toast {
            id,
            level: notice.level,
            message: notice.message,
            action: notice.action,
            expires_at: Instant::now() + notice.duration,
        });
        id
    }

    fn dismiss(&self, id: NotificationId) -> bool {
        let mut toasts = self.inner.toasts.lock();
        let before = toasts.len();
        toasts.retain(|t| t.id != id);
        toasts.len() != before
    }
}
