

pub mod base;
pub mod bus;

pub use base::{Event, EventType};
pub use bus::{EventBus, EventHandler};
