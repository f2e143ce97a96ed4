//! Playback engine

mod engine;

pub use engine::{PlaybackEngine, PlaybackOptions, ProgressObserver, StopHandle, DEFAULT_QUANTUM};
