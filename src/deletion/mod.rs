

pub mod controller;
pub mod models;
pub mod prompt;

pub use controller::{DeletionController, DeletionControllerBuilder};
pub use models::{
    CancelOutcome, DeletionError, DeletionStats, DeletionTicket, FinalizeReport, TicketId,
    TicketState,
};
pub use prompt::confirmation_prompt;
