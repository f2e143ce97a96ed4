//! Global hotkey chord matching
//!
//! A matcher keeps its own view of the currently-held keys, fed by the same
//! input source the recorder observes. Matching is re-evaluated on every
//! press while the chord is fully held (not edge-triggered); releases only
//! shrink the held-set and never fire.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::data::{Chord, Key};
use crate::input::{InputHandler, InputSource, SubscriptionId};

/// Fires a callback whenever a press leaves the configured chord fully held.
///
/// Matchers are independent: any number can observe one source without
/// interfering with each other's held-set tracking.
pub struct HotkeyMatcher {
    source: Arc<dyn InputSource>,
    subscription: Option<SubscriptionId>,
}

impl HotkeyMatcher {
    pub fn register(
        source: Arc<dyn InputSource>,
        chord: Chord,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let held = Arc::new(Mutex::new(BTreeSet::<Key>::new()));
        let callback = Arc::new(callback);

        let handler = {
            let held_on_press = held.clone();
            let held_on_release = held;
            let chord_label = chord.keys().map(|k| k.name()).collect::<Vec<_>>();
            InputHandler::new()
                .on_key_press(move |key| {
                    let satisfied = {
                        let mut held = held_on_press.lock().expect("held set poisoned");
                        held.insert(key);
                        chord.is_satisfied_by(&held)
                    };
                    if satisfied {
                        debug!("hotkey {:?} fired", chord_label);
                        callback();
                    }
                })
                .on_key_release(move |key| {
                    held_on_release
                        .lock()
                        .expect("held set poisoned")
                        .remove(&key);
                })
        };

        let subscription = Some(source.subscribe(handler));
        Self {
            source,
            subscription,
        }
    }

    /// Stop observing the source
    pub fn unregister(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.source.unsubscribe(id);
        }
    }
}

impl Drop for HotkeyMatcher {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::FakeSource;
    use crate::data::NamedKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_matcher(source: &Arc<FakeSource>, chord: Chord) -> (HotkeyMatcher, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        let matcher = HotkeyMatcher::register(source.clone(), chord, move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        (matcher, fired)
    }

    #[test]
    fn test_partial_chord_does_not_fire() {
        let source = Arc::new(FakeSource::new());
        let chord = Chord::new([Key::Char('a'), Key::Char('b')]);
        let (_matcher, fired) = counting_matcher(&source, chord);

        source.press(Key::Char('a'));
        source.release(Key::Char('a'));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_chord_fires_on_completing_press_and_refires() {
        let source = Arc::new(FakeSource::new());
        let chord = Chord::new([Key::Char('a'), Key::Char('b')]);
        let (_matcher, fired) = counting_matcher(&source, chord);

        source.press(Key::Char('a'));
        source.press(Key::Char('b'));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Releasing one chord key and pressing it again while the other is
        // still held completes the chord a second time
        source.release(Key::Char('a'));
        source.press(Key::Char('a'));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unrelated_press_while_held_refires() {
        let source = Arc::new(FakeSource::new());
        let chord = Chord::new([Key::Char('a'), Key::Char('b')]);
        let (_matcher, fired) = counting_matcher(&source, chord);

        source.press(Key::Char('a'));
        source.press(Key::Char('b'));
        source.press(Key::Char('c'));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_never_fires() {
        let source = Arc::new(FakeSource::new());
        let chord = Chord::new([Key::Named(NamedKey::Escape)]);
        let (_matcher, fired) = counting_matcher(&source, chord);

        source.press(Key::Named(NamedKey::Escape));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        source.release(Key::Named(NamedKey::Escape));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matchers_do_not_interfere() {
        let source = Arc::new(FakeSource::new());
        let (_stop, stop_fired) =
            counting_matcher(&source, Chord::new([Key::Named(NamedKey::Escape)]));
        let (_record, record_fired) = counting_matcher(&source, Chord::new([Key::Char('r')]));

        source.press(Key::Char('r'));
        source.release(Key::Char('r'));
        source.press(Key::Named(NamedKey::Escape));

        assert_eq!(record_fired.load(Ordering::SeqCst), 1);
        assert_eq!(stop_fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_stops_observing() {
        let source = Arc::new(FakeSource::new());
        let (matcher, fired) = counting_matcher(&source, Chord::new([Key::Char('r')]));

        matcher.unregister();
        assert_eq!(source.subscriber_count(), 0);
        source.press(Key::Char('r'));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
