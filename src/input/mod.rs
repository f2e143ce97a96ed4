//! Input source and output sink interfaces plus the rdev platform backend

mod rdev_backend;
mod sink;
mod source;

pub use rdev_backend::{RdevSink, RdevSource};
pub use sink::OutputSink;
pub use source::{InputHandler, InputSource, SubscriptionId};
