//! Error taxonomy for recording, playback and storage

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No persisted recording under the given name
    #[error("recording '{0}' not found")]
    NotFound(String),

    /// Persisted data exists but cannot be parsed into a well-formed timeline
    #[error("recording '{name}' is corrupted: {detail}")]
    Corrupt { name: String, detail: String },

    /// Write or delete failed at the filesystem level
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Playback was requested for a timeline with no events
    #[error("timeline has no events to play")]
    EmptyTimeline,

    /// The output sink failed while synthesizing an event
    #[error("failed to synthesize input: {0}")]
    Synthesis(String),

    /// A persisted key or button name does not map to a known identifier
    #[error("unknown input symbol '{0}'")]
    UnknownSymbol(String),
}

pub type Result<T> = std::result::Result<T, Error>;
