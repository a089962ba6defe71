

pub mod catalog;
pub mod core;
pub mod deletion;
pub mod notify;
pub mod store;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use catalog::{AssetRef, Record, RecordId, RecordKind, RecordMirror, Stored};
pub use crate::core::config::{DeletionConfig, GerobakConfig};
pub use crate::core::error::{GerobakError, Result};
pub use deletion::{CancelOutcome, DeletionController, DeletionError, TicketId, TicketState};
pub use notify::{Notice, NoticeLevel, Notifier, ToastQueue};
pub use store::{AssetStore, RecordStore};


pub const DEFAULT_CONFIG_PATH: &str = "gerobak.toml";
