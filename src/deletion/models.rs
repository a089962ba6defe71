use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{AssetRef, RecordId, Stored};
use crate::notify::NotificationId;
use crate::store::StoreError;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a deletion is in its lifecycle.
///
/// `PendingConfirmation` is the confirm dialog before any ticket exists.
/// `Finalizing` and `Restoring` mark the window in which the asset cleanup or
/// the re-create call is in flight; neither can be interrupted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    PendingConfirmation,
    GraceWindow,
    Finalizing,
    Finalized,
    Restoring,
    Cancelled,
}

impl TicketState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}


#[derive(Debug, Clone)]
pub struct DeletionTicket<R> {
    pub id: TicketId,
    pub record_id: RecordId,
    pub snapshot: Stored<R>,
    pub asset_refs: Vec<AssetRef>,
    pub state: TicketState,
    pub prompt: String,
    pub requested_at: DateTime<Utc>,
    pub grace_deadline: DateTime<Utc>,
    pub notification: Option<NotificationId>,
}


#[derive(Debug, Clone)]
pub enum CancelOutcome<R> {
    /// The record is back under a new id.
    Restored(Stored<R>),
    /// The ticket was not in its grace window (already cancelled, finalized
    /// or unknown). Nothing happened.
    Ignored,
}

impl<R> CancelOutcome<R> {
    pub fn restored(&self) -> Option<&Stored<R>> {
        match self {
            Self::Restored(record) => Some(record),
            Self::Ignored => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub ticket: TicketId,
    pub record_id: RecordId,
    pub deleted: Vec<AssetRef>,
    pub failed: Vec<(AssetRef, String)>,
    pub finalized_at: DateTime<Utc>,
}

impl FinalizeReport {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionStats {
    pub requested: usize,
    pub remove_failures: usize,
    pub finalized: usize,
    pub cancelled: usize,
    pub restore_failures: usize,
    pub assets_deleted: usize,
    pub asset_failures: usize,
}


#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("Failed to remove record {record_id}: {source}")]
    RemoveFailed {
        record_id: RecordId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to restore record {record_id} after {attempts} attempt(s): {source}")]
    RestoreFailed {
        ticket: TicketId,
        record_id: RecordId,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Deletion of record {record_id} already pending (ticket {ticket})")]
    AlreadyPending { record_id: RecordId, ticket: TicketId },

    #[error("Deletion of record {record_id} already in progress")]
    InProgress { record_id: RecordId },

    #[error("Record {record_id} is not listed")]
    NotListed { record_id: RecordId },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
