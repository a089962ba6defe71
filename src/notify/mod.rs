

pub mod toast;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub use toast::{ActiveToast, ToastQueue};


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notice-{}", self.0)
    }
}


pub type UndoCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Action button attached to a notice. The surface runs the callback when
/// the user clicks it.
#[derive(Clone)]
pub struct UndoAction {
    pub label: String,
    callback: UndoCallback,
}

impl UndoAction {
    pub fn new(label: impl Into<String>, callback: UndoCallback) -> Self {
        Self {
            label: label.into(),
            callback,
        }
    }


    pub async fn invoke(&self) {
        (self.callback)().await
    }
}

impl fmt::Debug for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoAction").field("label", &self.label).finish()
    }
}


#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub duration: Duration,
    pub action: Option<UndoAction>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            duration,
            action: None,
        }
    }

    pub fn success(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(NoticeLevel::Success, message, duration)
    }

    pub fn error(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(NoticeLevel::Error, message, duration)
    }

    pub fn warning(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(NoticeLevel::Warning, message, duration)
    }

    pub fn info(message: impl Into<String>, duration: Duration) -> Self {
        Self::new(NoticeLevel::Info, message, duration)
    }

    #[must_use]
    pub fn with_action(mut self, action: UndoAction) -> Self {
        self.action = Some(action);
        self
    }
}

/// Transient message surface (toasts, banners).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice) -> NotificationId;


    fn dismiss(&self, id: NotificationId) -> bool;
}
