//! Output sink collaborator interface

use crate::data::{Key, MouseButton};
use crate::error::Result;

/// Accepts synthesized input commands and injects them into the OS.
///
/// Each call may fail with a platform-level error; the playback engine
/// treats such a failure as fatal for the running session.
pub trait OutputSink: Send + Sync {
    fn press_key(&self, key: Key) -> Result<()>;
    fn release_key(&self, key: Key) -> Result<()>;
    fn move_pointer(&self, x: i32, y: i32) -> Result<()>;
    fn press_button(&self, button: MouseButton) -> Result<()>;
    fn release_button(&self, button: MouseButton) -> Result<()>;
    fn scroll(&self, dx: i32, dy: i32) -> Result<()>;
}
