//! Recording pipeline and hotkey chord matching

mod hotkey;
mod recorder;

pub use hotkey::HotkeyMatcher;
pub use recorder::Recorder;
