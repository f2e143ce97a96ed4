//! rdev-based input source and output sink
//!
//! Works on Windows, macOS, and Linux (X11). A single `rdev::listen` thread
//! feeds every subscriber; rdev only allows one listener per process, so the
//! thread is started lazily on the first subscription and kept for the
//! process lifetime. rdev reports physical keys, not layout characters, so
//! press and release of the same key always map to the same identifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error, warn};

use crate::data::{Key, MouseButton, NamedKey};
use crate::error::{Error, Result};
use crate::input::sink::OutputSink;
use crate::input::source::{InputHandler, InputSource, SubscriptionId};

/// Global-hook input source backed by `rdev::listen`
pub struct RdevSource {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    handlers: Mutex<HashMap<u64, InputHandler>>,
    next_id: AtomicU64,
    listening: AtomicBool,
    // rdev button and wheel events carry no pointer position, so the last
    // observed move position is stamped onto clicks and scrolls
    last_position: Mutex<(i32, i32)>,
}

impl RdevSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                handlers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                listening: AtomicBool::new(false),
                last_position: Mutex::new((0, 0)),
            }),
        }
    }

    fn ensure_listener(&self) {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        thread::spawn(move || {
            debug!("rdev listener thread started");
            if let Err(e) = rdev::listen(move |event| inner.dispatch(event)) {
                error!("rdev listen error: {:?}", e);
            }
        });
    }
}

impl Default for RdevSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for RdevSource {
    fn subscribe(&self, handler: InputHandler) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .handlers
            .lock()
            .expect("handler registry poisoned")
            .insert(id, handler);
        self.ensure_listener();
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .handlers
            .lock()
            .expect("handler registry poisoned")
            .remove(&id.0);
    }
}

impl SourceInner {
    fn subscribers(&self) -> Vec<InputHandler> {
        self.handlers
            .lock()
            .expect("handler registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn dispatch(&self, event: rdev::Event) {
        match event.event_type {
            rdev::EventType::KeyPress(raw) => {
                if let Some(key) = key_from_rdev(raw) {
                    for handler in self.subscribers() {
                        handler.key_press(key);
                    }
                }
            }
            rdev::EventType::KeyRelease(raw) => {
                if let Some(key) = key_from_rdev(raw) {
                    for handler in self.subscribers() {
                        handler.key_release(key);
                    }
                }
            }
            rdev::EventType::ButtonPress(raw) => {
                let (x, y) = *self.last_position.lock().expect("position poisoned");
                let button = button_from_rdev(raw);
                for handler in self.subscribers() {
                    handler.mouse_click(x, y, button, true);
                }
            }
            rdev::EventType::ButtonRelease(raw) => {
                let (x, y) = *self.last_position.lock().expect("position poisoned");
                let button = button_from_rdev(raw);
                for handler in self.subscribers() {
                    handler.mouse_click(x, y, button, false);
                }
            }
            rdev::EventType::MouseMove { x, y } => {
                let (x, y) = (x as i32, y as i32);
                *self.last_position.lock().expect("position poisoned") = (x, y);
                for handler in self.subscribers() {
                    handler.mouse_move(x, y);
                }
            }
            rdev::EventType::Wheel { delta_x, delta_y } => {
                let (x, y) = *self.last_position.lock().expect("position poisoned");
                for handler in self.subscribers() {
                    handler.mouse_scroll(x, y, delta_x as i32, delta_y as i32);
                }
            }
        }
    }
}

/// Output sink backed by `rdev::simulate`
pub struct RdevSink;

impl RdevSink {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, event: rdev::EventType) -> Result<()> {
        rdev::simulate(&event).map_err(|e| Error::Synthesis(format!("{:?} for {:?}", e, event)))
    }
}

impl Default for RdevSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for RdevSink {
    fn press_key(&self, key: Key) -> Result<()> {
        match key_to_rdev(key) {
            Some((raw, needs_shift)) => {
                if needs_shift {
                    self.send(rdev::EventType::KeyPress(rdev::Key::ShiftLeft))?;
                }
                self.send(rdev::EventType::KeyPress(raw))
            }
            None => {
                warn!("no physical key for {:?}, skipping press", key);
                Ok(())
            }
        }
    }

    fn release_key(&self, key: Key) -> Result<()> {
        match key_to_rdev(key) {
            Some((raw, needs_shift)) => {
                self.send(rdev::EventType::KeyRelease(raw))?;
                if needs_shift {
                    self.send(rdev::EventType::KeyRelease(rdev::Key::ShiftLeft))?;
                }
                Ok(())
            }
            None => {
                warn!("no physical key for {:?}, skipping release", key);
                Ok(())
            }
        }
    }

    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.send(rdev::EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })
    }

    fn press_button(&self, button: MouseButton) -> Result<()> {
        self.send(rdev::EventType::ButtonPress(button_to_rdev(button)))
    }

    fn release_button(&self, button: MouseButton) -> Result<()> {
        self.send(rdev::EventType::ButtonRelease(button_to_rdev(button)))
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        self.send(rdev::EventType::Wheel {
            delta_x: dx as i64,
            delta_y: dy as i64,
        })
    }
}

fn button_from_rdev(button: rdev::Button) -> MouseButton {
    match button {
        rdev::Button::Left => MouseButton::Left,
        rdev::Button::Right => MouseButton::Right,
        rdev::Button::Middle => MouseButton::Middle,
        rdev::Button::Unknown(n) => MouseButton::Other(n),
    }
}

fn button_to_rdev(button: MouseButton) -> rdev::Button {
    match button {
        MouseButton::Left => rdev::Button::Left,
        MouseButton::Right => rdev::Button::Right,
        MouseButton::Middle => rdev::Button::Middle,
        MouseButton::Other(n) => rdev::Button::Unknown(n),
    }
}

/// Map a raw rdev key to the symbolic identifier, or `None` for keys the
/// closed enumeration does not carry (dropped from the stream).
fn key_from_rdev(raw: rdev::Key) -> Option<Key> {
    if let Some(named) = named_from_rdev(raw) {
        return Some(Key::Named(named));
    }
    physical_char(raw).map(Key::Char)
}

/// Map a symbolic identifier back to a raw key, plus whether the character
/// requires shift to be held while it is pressed.
fn key_to_rdev(key: Key) -> Option<(rdev::Key, bool)> {
    match key {
        Key::Named(named) => Some((named_to_rdev(named), false)),
        Key::Char(c) => char_to_rdev(c),
    }
}

fn named_from_rdev(raw: rdev::Key) -> Option<NamedKey> {
    Some(match raw {
        rdev::Key::Alt => NamedKey::Alt,
        rdev::Key::AltGr => NamedKey::AltGr,
        rdev::Key::Backspace => NamedKey::Backspace,
        rdev::Key::CapsLock => NamedKey::CapsLock,
        rdev::Key::ControlLeft => NamedKey::ControlLeft,
        rdev::Key::ControlRight => NamedKey::ControlRight,
        rdev::Key::Delete => NamedKey::Delete,
        rdev::Key::DownArrow => NamedKey::DownArrow,
        rdev::Key::End => NamedKey::End,
        rdev::Key::Escape => NamedKey::Escape,
        rdev::Key::F1 => NamedKey::F1,
        rdev::Key::F2 => NamedKey::F2,
        rdev::Key::F3 => NamedKey::F3,
        rdev::Key::F4 => NamedKey::F4,
        rdev::Key::F5 => NamedKey::F5,
        rdev::Key::F6 => NamedKey::F6,
        rdev::Key::F7 => NamedKey::F7,
        rdev::Key::F8 => NamedKey::F8,
        rdev::Key::F9 => NamedKey::F9,
        rdev::Key::F10 => NamedKey::F10,
        rdev::Key::F11 => NamedKey::F11,
        rdev::Key::F12 => NamedKey::F12,
        rdev::Key::Home => NamedKey::Home,
        rdev::Key::Insert => NamedKey::Insert,
        rdev::Key::LeftArrow => NamedKey::LeftArrow,
        rdev::Key::MetaLeft => NamedKey::MetaLeft,
        rdev::Key::MetaRight => NamedKey::MetaRight,
        rdev::Key::NumLock => NamedKey::NumLock,
        rdev::Key::PageDown => NamedKey::PageDown,
        rdev::Key::PageUp => NamedKey::PageUp,
        rdev::Key::Pause => NamedKey::Pause,
        rdev::Key::PrintScreen => NamedKey::PrintScreen,
        rdev::Key::Return | rdev::Key::KpReturn => NamedKey::Return,
        rdev::Key::RightArrow => NamedKey::RightArrow,
        rdev::Key::ScrollLock => NamedKey::ScrollLock,
        rdev::Key::ShiftLeft => NamedKey::ShiftLeft,
        rdev::Key::ShiftRight => NamedKey::ShiftRight,
        rdev::Key::Space => NamedKey::Space,
        rdev::Key::Tab => NamedKey::Tab,
        rdev::Key::UpArrow => NamedKey::UpArrow,
        rdev::Key::KpDelete => NamedKey::Delete,
        _ => return None,
    })
}

fn named_to_rdev(named: NamedKey) -> rdev::Key {
    match named {
        NamedKey::Alt => rdev::Key::Alt,
        NamedKey::AltGr => rdev::Key::AltGr,
        NamedKey::Backspace => rdev::Key::Backspace,
        NamedKey::CapsLock => rdev::Key::CapsLock,
        NamedKey::ControlLeft => rdev::Key::ControlLeft,
        NamedKey::ControlRight => rdev::Key::ControlRight,
        NamedKey::Delete => rdev::Key::Delete,
        NamedKey::DownArrow => rdev::Key::DownArrow,
        NamedKey::End => rdev::Key::End,
        NamedKey::Escape => rdev::Key::Escape,
        NamedKey::F1 => rdev::Key::F1,
        NamedKey::F2 => rdev::Key::F2,
        NamedKey::F3 => rdev::Key::F3,
        NamedKey::F4 => rdev::Key::F4,
        NamedKey::F5 => rdev::Key::F5,
        NamedKey::F6 => rdev::Key::F6,
        NamedKey::F7 => rdev::Key::F7,
        NamedKey::F8 => rdev::Key::F8,
        NamedKey::F9 => rdev::Key::F9,
        NamedKey::F10 => rdev::Key::F10,
        NamedKey::F11 => rdev::Key::F11,
        NamedKey::F12 => rdev::Key::F12,
        NamedKey::Home => rdev::Key::Home,
        NamedKey::Insert => rdev::Key::Insert,
        NamedKey::LeftArrow => rdev::Key::LeftArrow,
        NamedKey::MetaLeft => rdev::Key::MetaLeft,
        NamedKey::MetaRight => rdev::Key::MetaRight,
        NamedKey::NumLock => rdev::Key::NumLock,
        NamedKey::PageDown => rdev::Key::PageDown,
        NamedKey::PageUp => rdev::Key::PageUp,
        NamedKey::Pause => rdev::Key::Pause,
        NamedKey::PrintScreen => rdev::Key::PrintScreen,
        NamedKey::Return => rdev::Key::Return,
        NamedKey::RightArrow => rdev::Key::RightArrow,
        NamedKey::ScrollLock => rdev::Key::ScrollLock,
        NamedKey::ShiftLeft => rdev::Key::ShiftLeft,
        NamedKey::ShiftRight => rdev::Key::ShiftRight,
        NamedKey::Space => rdev::Key::Space,
        NamedKey::Tab => rdev::Key::Tab,
        NamedKey::UpArrow => rdev::Key::UpArrow,
    }
}

fn physical_char(raw: rdev::Key) -> Option<char> {
    Some(match raw {
        rdev::Key::KeyA => 'a',
        rdev::Key::KeyB => 'b',
        rdev::Key::KeyC => 'c',
        rdev::Key::KeyD => 'd',
        rdev::Key::KeyE => 'e',
        rdev::Key::KeyF => 'f',
        rdev::Key::KeyG => 'g',
        rdev::Key::KeyH => 'h',
        rdev::Key::KeyI => 'i',
        rdev::Key::KeyJ => 'j',
        rdev::Key::KeyK => 'k',
        rdev::Key::KeyL => 'l',
        rdev::Key::KeyM => 'm',
        rdev::Key::KeyN => 'n',
        rdev::Key::KeyO => 'o',
        rdev::Key::KeyP => 'p',
        rdev::Key::KeyQ => 'q',
        rdev::Key::KeyR => 'r',
        rdev::Key::KeyS => 's',
        rdev::Key::KeyT => 't',
        rdev::Key::KeyU => 'u',
        rdev::Key::KeyV => 'v',
        rdev::Key::KeyW => 'w',
        rdev::Key::KeyX => 'x',
        rdev::Key::KeyY => 'y',
        rdev::Key::KeyZ => 'z',
        rdev::Key::Num0 | rdev::Key::Kp0 => '0',
        rdev::Key::Num1 | rdev::Key::Kp1 => '1',
        rdev::Key::Num2 | rdev::Key::Kp2 => '2',
        rdev::Key::Num3 | rdev::Key::Kp3 => '3',
        rdev::Key::Num4 | rdev::Key::Kp4 => '4',
        rdev::Key::Num5 | rdev::Key::Kp5 => '5',
        rdev::Key::Num6 | rdev::Key::Kp6 => '6',
        rdev::Key::Num7 | rdev::Key::Kp7 => '7',
        rdev::Key::Num8 | rdev::Key::Kp8 => '8',
        rdev::Key::Num9 | rdev::Key::Kp9 => '9',
        rdev::Key::Minus | rdev::Key::KpMinus => '-',
        rdev::Key::Equal => '=',
        rdev::Key::LeftBracket => '[',
        rdev::Key::RightBracket => ']',
        rdev::Key::SemiColon => ';',
        rdev::Key::Quote => '\'',
        rdev::Key::BackSlash | rdev::Key::IntlBackslash => '\\',
        rdev::Key::Comma => ',',
        rdev::Key::Dot => '.',
        rdev::Key::Slash | rdev::Key::KpDivide => '/',
        rdev::Key::BackQuote => '`',
        rdev::Key::KpPlus => '+',
        rdev::Key::KpMultiply => '*',
        _ => return None,
    })
}

fn char_to_rdev(c: char) -> Option<(rdev::Key, bool)> {
    let shifted = |raw| Some((raw, true));
    let plain = |raw| Some((raw, false));
    match c {
        'a'..='z' => plain(letter_key(c)),
        'A'..='Z' => shifted(letter_key(c.to_ascii_lowercase())),
        '0' => plain(rdev::Key::Num0),
        '1' => plain(rdev::Key::Num1),
        '2' => plain(rdev::Key::Num2),
        '3' => plain(rdev::Key::Num3),
        '4' => plain(rdev::Key::Num4),
        '5' => plain(rdev::Key::Num5),
        '6' => plain(rdev::Key::Num6),
        '7' => plain(rdev::Key::Num7),
        '8' => plain(rdev::Key::Num8),
        '9' => plain(rdev::Key::Num9),
        ')' => shifted(rdev::Key::Num0),
        '!' => shifted(rdev::Key::Num1),
        '@' => shifted(rdev::Key::Num2),
        '#' => shifted(rdev::Key::Num3),
        '$' => shifted(rdev::Key::Num4),
        '%' => shifted(rdev::Key::Num5),
        '^' => shifted(rdev::Key::Num6),
        '&' => shifted(rdev::Key::Num7),
        '*' => shifted(rdev::Key::Num8),
        '(' => shifted(rdev::Key::Num9),
        '-' => plain(rdev::Key::Minus),
        '_' => shifted(rdev::Key::Minus),
        '=' => plain(rdev::Key::Equal),
        '+' => shifted(rdev::Key::Equal),
        '[' => plain(rdev::Key::LeftBracket),
        '{' => shifted(rdev::Key::LeftBracket),
        ']' => plain(rdev::Key::RightBracket),
        '}' => shifted(rdev::Key::RightBracket),
        ';' => plain(rdev::Key::SemiColon),
        ':' => shifted(rdev::Key::SemiColon),
        '\'' => plain(rdev::Key::Quote),
        '"' => shifted(rdev::Key::Quote),
        '\\' => plain(rdev::Key::BackSlash),
        '|' => shifted(rdev::Key::BackSlash),
        ',' => plain(rdev::Key::Comma),
        '<' => shifted(rdev::Key::Comma),
        '.' => plain(rdev::Key::Dot),
        '>' => shifted(rdev::Key::Dot),
        '/' => plain(rdev::Key::Slash),
        '?' => shifted(rdev::Key::Slash),
        '`' => plain(rdev::Key::BackQuote),
        '~' => shifted(rdev::Key::BackQuote),
        ' ' => plain(rdev::Key::Space),
        '\n' => plain(rdev::Key::Return),
        '\t' => plain(rdev::Key::Tab),
        _ => None,
    }
}

fn letter_key(c: char) -> rdev::Key {
    match c {
        'a' => rdev::Key::KeyA,
        'b' => rdev::Key::KeyB,
        'c' => rdev::Key::KeyC,
        'd' => rdev::Key::KeyD,
        'e' => rdev::Key::KeyE,
        'f' => rdev::Key::KeyF,
        'g' => rdev::Key::KeyG,
        'h' => rdev::Key::KeyH,
        'i' => rdev::Key::KeyI,
        'j' => rdev::Key::KeyJ,
        'k' => rdev::Key::KeyK,
        'l' => rdev::Key::KeyL,
        'm' => rdev::Key::KeyM,
        'n' => rdev::Key::KeyN,
        'o' => rdev::Key::KeyO,
        'p' => rdev::Key::KeyP,
        'q' => rdev::Key::KeyQ,
        'r' => rdev::Key::KeyR,
        's' => rdev::Key::KeyS,
        't' => rdev::Key::KeyT,
        'u' => rdev::Key::KeyU,
        'v' => rdev::Key::KeyV,
        'w' => rdev::Key::KeyW,
        'x' => rdev::Key::KeyX,
        'y' => rdev::Key::KeyY,
        'z' => rdev::Key::KeyZ,
        _ => unreachable!("letter_key called with non-letter {:?}", c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_mapping_round_trip() {
        let all = [
            NamedKey::Alt,
            NamedKey::AltGr,
            NamedKey::Backspace,
            NamedKey::CapsLock,
            NamedKey::ControlLeft,
            NamedKey::ControlRight,
            NamedKey::Delete,
            NamedKey::DownArrow,
            NamedKey::End,
            NamedKey::Escape,
            NamedKey::F1,
            NamedKey::F2,
            NamedKey::F3,
            NamedKey::F4,
            NamedKey::F5,
            NamedKey::F6,
            NamedKey::F7,
            NamedKey::F8,
            NamedKey::F9,
            NamedKey::F10,
            NamedKey::F11,
            NamedKey::F12,
            NamedKey::Home,
            NamedKey::Insert,
            NamedKey::LeftArrow,
            NamedKey::MetaLeft,
            NamedKey::MetaRight,
            NamedKey::NumLock,
            NamedKey::PageDown,
            NamedKey::PageUp,
            NamedKey::Pause,
            NamedKey::PrintScreen,
            NamedKey::Return,
            NamedKey::RightArrow,
            NamedKey::ScrollLock,
            NamedKey::ShiftLeft,
            NamedKey::ShiftRight,
            NamedKey::Space,
            NamedKey::Tab,
            NamedKey::UpArrow,
        ];
        for named in all {
            assert_eq!(named_from_rdev(named_to_rdev(named)), Some(named));
        }
    }

    #[test]
    fn test_char_mapping() {
        assert_eq!(char_to_rdev('a'), Some((rdev::Key::KeyA, false)));
        assert_eq!(char_to_rdev('A'), Some((rdev::Key::KeyA, true)));
        assert_eq!(char_to_rdev('!'), Some((rdev::Key::Num1, true)));
        assert_eq!(char_to_rdev('/'), Some((rdev::Key::Slash, false)));
        assert_eq!(char_to_rdev('é'), None);
    }

    #[test]
    fn test_physical_char_consistency() {
        // A plain char produced by the listener must map back to a key
        // the sink can press without shift
        for raw in [rdev::Key::KeyQ, rdev::Key::Num7, rdev::Key::Comma] {
            let c = physical_char(raw).unwrap();
            assert_eq!(char_to_rdev(c), Some((raw, false)));
        }
    }

    #[test]
    fn test_button_round_trip() {
        for button in [
            MouseButton::Left,
            MouseButton::Right,
            MouseButton::Middle,
            MouseButton::Other(9),
        ] {
            assert_eq!(button_from_rdev(button_to_rdev(button)), button);
        }
    }
}
