

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
pub enum EventType {
    #[strum(serialize = "deletion.requested")]
    DeletionRequested,
    #[strum(serialize = "deletion.finalized")]
    DeletionFinalized,
    #[strum(serialize = "deletion.cancelled")]
    DeletionCancelled,
    #[strum(serialize = "deletion.restore_failed")]
    RestoreFailed,
    #[strum(serialize = "asset.cleanup_failed")]
    AssetCleanupFailed,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {

    pub event_id: Uuid,

    pub event_type: EventType,

    pub timestamp: DateTime<Utc>,

    pub correlation_id: Option<Uuid>,

    pub payload: Value,
}

impl Event {

    #[must_use]
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            correlation_id: None,
            payload,
        }
    }

    /// Ties the event to the deletion ticket it describes.
    #[must_use]
    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}
