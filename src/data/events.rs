//! Timeline event data structures
//!
//! Keys and buttons are closed enumerations with an exhaustive string
//! mapping so persisted recordings never depend on platform key codes.

use std::collections::BTreeSet;

use crate::error::Error;

/// Symbolic key identifier: a printable character or a named key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Printable character as delivered by the keyboard layout
    Char(char),

    /// Non-printable or modifier key
    Named(NamedKey),
}

/// Named (non-character) keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Alt,
    AltGr,
    Backspace,
    CapsLock,
    ControlLeft,
    ControlRight,
    Delete,
    DownArrow,
    End,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Home,
    Insert,
    LeftArrow,
    MetaLeft,
    MetaRight,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Return,
    RightArrow,
    ScrollLock,
    ShiftLeft,
    ShiftRight,
    Space,
    Tab,
    UpArrow,
}

impl NamedKey {
    /// External name, without the `Key.` prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            NamedKey::Alt => "alt",
            NamedKey::AltGr => "alt_gr",
            NamedKey::Backspace => "backspace",
            NamedKey::CapsLock => "caps_lock",
            NamedKey::ControlLeft => "ctrl",
            NamedKey::ControlRight => "ctrl_r",
            NamedKey::Delete => "delete",
            NamedKey::DownArrow => "down",
            NamedKey::End => "end",
            NamedKey::Escape => "esc",
            NamedKey::F1 => "f1",
            NamedKey::F2 => "f2",
            NamedKey::F3 => "f3",
            NamedKey::F4 => "f4",
            NamedKey::F5 => "f5",
            NamedKey::F6 => "f6",
            NamedKey::F7 => "f7",
            NamedKey::F8 => "f8",
            NamedKey::F9 => "f9",
            NamedKey::F10 => "f10",
            NamedKey::F11 => "f11",
            NamedKey::F12 => "f12",
            NamedKey::Home => "home",
            NamedKey::Insert => "insert",
            NamedKey::LeftArrow => "left",
            NamedKey::MetaLeft => "cmd",
            NamedKey::MetaRight => "cmd_r",
            NamedKey::NumLock => "num_lock",
            NamedKey::PageDown => "page_down",
            NamedKey::PageUp => "page_up",
            NamedKey::Pause => "pause",
            NamedKey::PrintScreen => "print_screen",
            NamedKey::Return => "enter",
            NamedKey::RightArrow => "right",
            NamedKey::ScrollLock => "scroll_lock",
            NamedKey::ShiftLeft => "shift",
            NamedKey::ShiftRight => "shift_r",
            NamedKey::Space => "space",
            NamedKey::Tab => "tab",
            NamedKey::UpArrow => "up",
        }
    }

    fn from_name(name: &str) -> Option<NamedKey> {
        Some(match name {
            "alt" => NamedKey::Alt,
            "alt_gr" => NamedKey::AltGr,
            "backspace" => NamedKey::Backspace,
            "caps_lock" => NamedKey::CapsLock,
            "ctrl" => NamedKey::ControlLeft,
            "ctrl_r" => NamedKey::ControlRight,
            "delete" => NamedKey::Delete,
            "down" => NamedKey::DownArrow,
            "end" => NamedKey::End,
            "esc" => NamedKey::Escape,
            "f1" => NamedKey::F1,
            "f2" => NamedKey::F2,
            "f3" => NamedKey::F3,
            "f4" => NamedKey::F4,
            "f5" => NamedKey::F5,
            "f6" => NamedKey::F6,
            "f7" => NamedKey::F7,
            "f8" => NamedKey::F8,
            "f9" => NamedKey::F9,
            "f10" => NamedKey::F10,
            "f11" => NamedKey::F11,
            "f12" => NamedKey::F12,
            "home" => NamedKey::Home,
            "insert" => NamedKey::Insert,
            "left" => NamedKey::LeftArrow,
            "cmd" => NamedKey::MetaLeft,
            "cmd_r" => NamedKey::MetaRight,
            "num_lock" => NamedKey::NumLock,
            "page_down" => NamedKey::PageDown,
            "page_up" => NamedKey::PageUp,
            "pause" => NamedKey::Pause,
            "print_screen" => NamedKey::PrintScreen,
            "enter" => NamedKey::Return,
            "right" => NamedKey::RightArrow,
            "scroll_lock" => NamedKey::ScrollLock,
            "shift" => NamedKey::ShiftLeft,
            "shift_r" => NamedKey::ShiftRight,
            "space" => NamedKey::Space,
            "tab" => NamedKey::Tab,
            "up" => NamedKey::UpArrow,
            _ => return None,
        })
    }
}

impl Key {
    /// External string form: the character itself, or `Key.<name>`
    pub fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Named(named) => format!("Key.{}", named.as_str()),
        }
    }

    /// Parse the external string form back into a key
    pub fn parse(name: &str) -> Result<Key, Error> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Key::Char(c));
        }
        name.strip_prefix("Key.")
            .and_then(NamedKey::from_name)
            .map(Key::Named)
            .ok_or_else(|| Error::UnknownSymbol(name.to_string()))
    }
}

/// Mouse button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl MouseButton {
    /// External string form
    pub fn name(&self) -> String {
        match self {
            MouseButton::Left => "left".to_string(),
            MouseButton::Right => "right".to_string(),
            MouseButton::Middle => "middle".to_string(),
            MouseButton::Other(n) => format!("other-{}", n),
        }
    }

    /// Parse the external string form back into a button
    pub fn parse(name: &str) -> Result<MouseButton, Error> {
        match name {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => other
                .strip_prefix("other-")
                .and_then(|n| n.parse().ok())
                .map(MouseButton::Other)
                .ok_or_else(|| Error::UnknownSymbol(name.to_string())),
        }
    }
}

/// One recorded or replayed action
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    KeyPress {
        key: Key,
    },
    KeyRelease {
        key: Key,
    },
    MouseMove {
        x: i32,
        y: i32,
    },
    MouseClick {
        x: i32,
        y: i32,
        button: MouseButton,
        pressed: bool,
    },
    MouseScroll {
        x: i32,
        y: i32,
        dx: i32,
        dy: i32,
    },
}

/// An action stamped with its elapsed time since the session started
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    /// Seconds since the start of the recording session, non-negative
    pub offset: f64,

    /// The action that happened at that offset
    pub action: EventKind,
}

/// Ordered sequence of timestamped events from one recording session.
///
/// Offsets are non-decreasing: events are appended in arrival order and
/// arrival order is wall-clock order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TimelineEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event, or 0 when empty
    pub fn duration(&self) -> f64 {
        self.events.last().map(|e| e.offset).unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl FromIterator<TimelineEvent> for Timeline {
    fn from_iter<I: IntoIterator<Item = TimelineEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

/// A set of keys that must be simultaneously held to trigger an action.
///
/// Membership matters, order does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    keys: BTreeSet<Key>,
}

impl Chord {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// True when every chord key is present in `held`
    pub fn is_satisfied_by(&self, held: &BTreeSet<Key>) -> bool {
        self.keys.is_subset(held)
    }
}
