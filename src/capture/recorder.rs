//! Recording pipeline: raw input notifications to a timestamped timeline

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};

use crate::data::{Chord, EventKind, Key, Timeline, TimelineEvent};
use crate::input::{InputHandler, InputSource, SubscriptionId};

/// Converts input notifications into timeline events while active.
///
/// Keyboard and mouse notifications typically arrive on independent hook
/// threads; every append goes through one mutex and the offset is computed
/// under that lock, so the timeline grows strictly in append order with
/// non-decreasing offsets.
pub struct Recorder {
    session: Arc<Session>,
    source: Option<Arc<dyn InputSource>>,
    subscription: Option<SubscriptionId>,
}

struct Session {
    active: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    timeline: Mutex<Timeline>,
    /// Keys of the stop chord are never recorded, so a replay cannot
    /// re-trigger the stop hotkey
    stop_filter: Option<Chord>,
}

impl Session {
    fn record(&self, action: EventKind) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let Some(started_at) = *self.started_at.lock().expect("session start poisoned") else {
            return;
        };
        // Offset is taken inside the timeline lock: concurrent deliveries
        // get offsets in the same order they are appended
        let mut timeline = self.timeline.lock().expect("timeline poisoned");
        timeline.push(TimelineEvent {
            offset: started_at.elapsed().as_secs_f64(),
            action,
        });
    }

    fn record_key(&self, key: Key, pressed: bool) {
        if let Some(filter) = &self.stop_filter {
            if filter.contains(&key) {
                return;
            }
        }
        let action = if pressed {
            EventKind::KeyPress { key }
        } else {
            EventKind::KeyRelease { key }
        };
        self.record(action);
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_stop_filter(None)
    }

    /// A recorder that drops press/release events for every key in `chord`
    pub fn with_stop_filter(chord: Option<Chord>) -> Self {
        Self {
            session: Arc::new(Session {
                active: AtomicBool::new(false),
                started_at: Mutex::new(None),
                timeline: Mutex::new(Timeline::new()),
                stop_filter: chord,
            }),
            source: None,
            subscription: None,
        }
    }

    /// Reset to an empty timeline and start converting notifications
    pub fn start(&mut self, source: Arc<dyn InputSource>) {
        if self.session.active.load(Ordering::SeqCst) {
            debug!("recorder already active");
            return;
        }

        self.session
            .timeline
            .lock()
            .expect("timeline poisoned")
            .clear();
        *self
            .session
            .started_at
            .lock()
            .expect("session start poisoned") = Some(Instant::now());
        self.session.active.store(true, Ordering::SeqCst);

        let handler = {
            let press = self.session.clone();
            let release = self.session.clone();
            let moved = self.session.clone();
            let clicked = self.session.clone();
            let scrolled = self.session.clone();
            InputHandler::new()
                .on_key_press(move |key| press.record_key(key, true))
                .on_key_release(move |key| release.record_key(key, false))
                .on_mouse_move(move |x, y| moved.record(EventKind::MouseMove { x, y }))
                .on_mouse_click(move |x, y, button, pressed| {
                    clicked.record(EventKind::MouseClick {
                        x,
                        y,
                        button,
                        pressed,
                    })
                })
                .on_mouse_scroll(move |x, y, dx, dy| {
                    scrolled.record(EventKind::MouseScroll { x, y, dx, dy })
                })
        };

        self.subscription = Some(source.subscribe(handler));
        self.source = Some(source);
        info!("recording started");
    }

    /// Stop converting notifications; the captured timeline is kept.
    ///
    /// Idempotent: stopping a stopped recorder is a no-op.
    pub fn stop(&mut self) {
        if !self.session.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let (Some(source), Some(id)) = (self.source.take(), self.subscription.take()) {
            source.unsubscribe(id);
        }
        info!(
            "recording stopped ({} events)",
            self.session.timeline.lock().expect("timeline poisoned").len()
        );
    }

    pub fn is_active(&self) -> bool {
        self.session.active.load(Ordering::SeqCst)
    }

    /// Owned snapshot of the captured timeline
    pub fn events(&self) -> Timeline {
        self.session
            .timeline
            .lock()
            .expect("timeline poisoned")
            .clone()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::FakeSource;
    use crate::data::{MouseButton, NamedKey};

    #[test]
    fn test_records_in_arrival_order() {
        let source = Arc::new(FakeSource::new());
        let mut recorder = Recorder::new();
        recorder.start(source.clone());

        source.press(Key::Char('a'));
        source.emit_move(10, 20);
        source.emit_click(10, 20, MouseButton::Left, true);
        source.emit_scroll(10, 20, 0, -3);
        source.release(Key::Char('a'));
        recorder.stop();

        let timeline = recorder.events();
        assert_eq!(timeline.len(), 5);
        assert_eq!(
            timeline.events()[0].action,
            EventKind::KeyPress {
                key: Key::Char('a')
            }
        );
        assert_eq!(
            timeline.events()[1].action,
            EventKind::MouseMove { x: 10, y: 20 }
        );
        assert_eq!(
            timeline.events()[2].action,
            EventKind::MouseClick {
                x: 10,
                y: 20,
                button: MouseButton::Left,
                pressed: true,
            }
        );
        assert_eq!(
            timeline.events()[3].action,
            EventKind::MouseScroll {
                x: 10,
                y: 20,
                dx: 0,
                dy: -3,
            }
        );
        let offsets: Vec<f64> = timeline.events().iter().map(|e| e.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        assert!(offsets.iter().all(|o| *o >= 0.0));
    }

    #[test]
    fn test_drops_events_while_inactive() {
        let source = Arc::new(FakeSource::new());
        let mut recorder = Recorder::new();

        source.press(Key::Char('x'));
        recorder.start(source.clone());
        source.press(Key::Char('a'));
        recorder.stop();
        source.press(Key::Char('z'));

        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_start_resets_previous_timeline() {
        let source = Arc::new(FakeSource::new());
        let mut recorder = Recorder::new();

        recorder.start(source.clone());
        source.press(Key::Char('a'));
        source.press(Key::Char('b'));
        recorder.stop();
        assert_eq!(recorder.events().len(), 2);

        recorder.start(source.clone());
        source.press(Key::Char('c'));
        recorder.stop();
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_stop_chord_is_filtered() {
        let source = Arc::new(FakeSource::new());
        let chord = Chord::new([Key::Named(NamedKey::Escape)]);
        let mut recorder = Recorder::with_stop_filter(Some(chord));
        recorder.start(source.clone());

        source.press(Key::Char('a'));
        source.press(Key::Named(NamedKey::Escape));
        source.release(Key::Named(NamedKey::Escape));
        source.release(Key::Char('a'));
        recorder.stop();

        let timeline = recorder.events();
        assert_eq!(timeline.len(), 2);
        assert!(timeline.events().iter().all(|e| !matches!(
            e.action,
            EventKind::KeyPress {
                key: Key::Named(NamedKey::Escape)
            } | EventKind::KeyRelease {
                key: Key::Named(NamedKey::Escape)
            }
        )));
    }

    #[test]
    fn test_concurrent_appends_keep_offsets_monotonic() {
        let source = Arc::new(FakeSource::new());
        let mut recorder = Recorder::new();
        recorder.start(source.clone());

        let mut threads = Vec::new();
        for _ in 0..4 {
            let source = source.clone();
            threads.push(std::thread::spawn(move || {
                for i in 0..50 {
                    if i % 2 == 0 {
                        source.press(Key::Char('k'));
                    } else {
                        source.emit_move(i, i);
                    }
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        recorder.stop();

        let timeline = recorder.events();
        assert_eq!(timeline.len(), 200);
        let offsets: Vec<f64> = timeline.events().iter().map(|e| e.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let source = Arc::new(FakeSource::new());
        let mut recorder = Recorder::new();
        recorder.start(source.clone());
        recorder.stop();
        recorder.stop();
        assert!(!recorder.is_active());
        assert_eq!(source.subscriber_count(), 0);
    }
}
