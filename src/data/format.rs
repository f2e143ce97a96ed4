//! Persisted record format for recordings
//!
//! One recording is a JSON array of event records. Each record carries a
//! `type`/`action` pair, the `time` offset in seconds, and the fields that
//! apply to that action. Unknown key or button names are recovered with a
//! fallback identifier so one stale symbol cannot abort an otherwise-valid
//! replay; structural problems are reported as corruption.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::events::{EventKind, Key, MouseButton, NamedKey, Timeline, TimelineEvent};
use crate::error::{Error, Result};

/// Fallback for a key name that no longer maps to a known identifier
const FALLBACK_KEY: Key = Key::Named(NamedKey::Space);

/// Fallback for a button name that no longer maps to a known identifier
const FALLBACK_BUTTON: MouseButton = MouseButton::Left;

/// Device class of an event record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Keyboard,
    Mouse,
}

/// Action of an event record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Press,
    Release,
    Move,
    Click,
    Scroll,
}

/// One persisted event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub device: Device,

    pub action: Action,

    /// Key name, present for keyboard records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Pointer position, present for all mouse records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(i32, i32)>,

    /// Button name, present for click records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,

    /// Press (true) or release (false), present for click records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressed: Option<bool>,

    /// Scroll deltas, present for scroll records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<(i32, i32)>,

    /// Seconds since session start
    pub time: f64,
}

/// Convert a timeline into its persisted form
pub fn records_from_timeline(timeline: &Timeline) -> Vec<EventRecord> {
    timeline.events().iter().map(record_from_event).collect()
}

fn record_from_event(event: &TimelineEvent) -> EventRecord {
    let mut record = EventRecord {
        device: Device::Mouse,
        action: Action::Move,
        key: None,
        position: None,
        button: None,
        pressed: None,
        scroll: None,
        time: event.offset,
    };
    match &event.action {
        EventKind::KeyPress { key } => {
            record.device = Device::Keyboard;
            record.action = Action::Press;
            record.key = Some(key.name());
        }
        EventKind::KeyRelease { key } => {
            record.device = Device::Keyboard;
            record.action = Action::Release;
            record.key = Some(key.name());
        }
        EventKind::MouseMove { x, y } => {
            record.position = Some((*x, *y));
        }
        EventKind::MouseClick {
            x,
            y,
            button,
            pressed,
        } => {
            record.action = Action::Click;
            record.position = Some((*x, *y));
            record.button = Some(button.name());
            record.pressed = Some(*pressed);
        }
        EventKind::MouseScroll { x, y, dx, dy } => {
            record.action = Action::Scroll;
            record.position = Some((*x, *y));
            record.scroll = Some((*dx, *dy));
        }
    }
    record
}

/// Rebuild a timeline from its persisted form.
///
/// `name` identifies the recording in corruption reports.
pub fn timeline_from_records(name: &str, records: &[EventRecord]) -> Result<Timeline> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| event_from_record(name, index, record))
        .collect()
}

fn event_from_record(name: &str, index: usize, record: &EventRecord) -> Result<TimelineEvent> {
    let corrupt = |detail: String| Error::Corrupt {
        name: name.to_string(),
        detail: format!("event {}: {}", index, detail),
    };

    if !record.time.is_finite() || record.time < 0.0 {
        return Err(corrupt(format!("invalid time {}", record.time)));
    }

    let action = match (record.device, record.action) {
        (Device::Keyboard, Action::Press) | (Device::Keyboard, Action::Release) => {
            let key_name = record
                .key
                .as_deref()
                .ok_or_else(|| corrupt("keyboard record without a key".to_string()))?;
            let key = parse_key_or_fallback(key_name);
            if record.action == Action::Press {
                EventKind::KeyPress { key }
            } else {
                EventKind::KeyRelease { key }
            }
        }
        (Device::Mouse, Action::Move) => {
            let (x, y) = require_position(record).map_err(&corrupt)?;
            EventKind::MouseMove { x, y }
        }
        (Device::Mouse, Action::Click) => {
            let (x, y) = require_position(record).map_err(&corrupt)?;
            let button_name = record
                .button
                .as_deref()
                .ok_or_else(|| corrupt("click record without a button".to_string()))?;
            let pressed = record
                .pressed
                .ok_or_else(|| corrupt("click record without a pressed flag".to_string()))?;
            EventKind::MouseClick {
                x,
                y,
                button: parse_button_or_fallback(button_name),
                pressed,
            }
        }
        (Device::Mouse, Action::Scroll) => {
            let (x, y) = require_position(record).map_err(&corrupt)?;
            let (dx, dy) = record
                .scroll
                .ok_or_else(|| corrupt("scroll record without deltas".to_string()))?;
            EventKind::MouseScroll { x, y, dx, dy }
        }
        (device, action) => {
            return Err(corrupt(format!(
                "unsupported {:?}/{:?} combination",
                device, action
            )))
        }
    };

    Ok(TimelineEvent {
        offset: record.time,
        action,
    })
}

fn require_position(record: &EventRecord) -> std::result::Result<(i32, i32), String> {
    record
        .position
        .ok_or_else(|| "mouse record without a position".to_string())
}

fn parse_key_or_fallback(name: &str) -> Key {
    Key::parse(name).unwrap_or_else(|_| {
        warn!("unknown key name '{}', substituting space", name);
        FALLBACK_KEY
    })
}

fn parse_button_or_fallback(name: &str) -> MouseButton {
    MouseButton::parse(name).unwrap_or_else(|_| {
        warn!("unknown button name '{}', substituting left", name);
        FALLBACK_BUTTON
    })
}
