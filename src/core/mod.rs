

pub mod config;
pub mod debounce;
pub mod error;
pub mod events;

pub use config::{DeletionConfig, GerobakConfig};
pub use debounce::{DebouncedAction, Debouncer};
pub use error::{GerobakError, Result};
pub use events::{Event, EventBus, EventHandler, EventType};
