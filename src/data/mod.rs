//! Event model and persisted record format

mod events;
mod format;

pub use events::*;
pub use format::*;
