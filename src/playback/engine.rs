//! Timeline playback with cancellable waits
//!
//! Playback runs on a dedicated thread. Between events it sleeps in small
//! quanta while watching a shared running flag, so a stop request takes
//! effect within roughly one quantum no matter how long the remaining delay
//! is. Wait deadlines are computed from each event's own recorded offset
//! relative to the fixed start of the current iteration; summing successive
//! deltas instead would let floating-point error drift over a long timeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::data::{EventKind, Timeline};
use crate::error::{Error, Result};
use crate::input::OutputSink;

/// Default cancellable-wait quantum
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(10);

/// Options for one playback session
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Timing scale: 2.0 halves every delay, 0.5 doubles it
    pub speed: f64,

    /// Restart from the first event after the last one
    pub looped: bool,

    /// Sleep slice for the cancellable wait
    pub quantum: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            looped: false,
            quantum: DEFAULT_QUANTUM,
        }
    }
}

/// Observer for fractional progress in percent
pub type ProgressObserver = Box<dyn Fn(f64) + Send>;

/// Clonable stop control for a running session.
///
/// Stopping only clears the flag; the playback thread notices it at the
/// next quantum boundary. Stopping an idle session is a no-op.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Replays a timeline through an output sink
pub struct PlaybackEngine {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start replaying `timeline` on a dedicated thread.
    ///
    /// Fails with [`Error::EmptyTimeline`] when there is nothing to play;
    /// a start while a session is already running is logged and ignored.
    pub fn start(
        &mut self,
        timeline: Arc<Timeline>,
        sink: Arc<dyn OutputSink>,
        options: PlaybackOptions,
        progress: Option<ProgressObserver>,
    ) -> Result<()> {
        if timeline.is_empty() {
            return Err(Error::EmptyTimeline);
        }
        if self.running.load(Ordering::SeqCst) {
            debug!("playback already running");
            return Ok(());
        }
        // Collect a worker that finished on its own
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let options = sanitized(options);
        info!(
            "playback started: {} events, speed {}, loop {}",
            timeline.len(),
            options.speed,
            options.looped
        );

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        self.worker = Some(thread::spawn(move || {
            let result = run_session(&timeline, sink.as_ref(), &options, &progress, &running);
            running.store(false, Ordering::SeqCst);
            if let Err(e) = &result {
                error!("playback aborted: {}", e);
            }
            result
        }));
        Ok(())
    }

    /// Request a stop; idempotent
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop control usable from hotkey callbacks and signal handlers
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for the session to end and surface its outcome.
    ///
    /// Returns `Ok(())` after a natural completion or a requested stop, and
    /// the synthesis error if the session aborted.
    pub fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(Error::Synthesis("playback thread panicked".into()))),
            None => Ok(()),
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn sanitized(mut options: PlaybackOptions) -> PlaybackOptions {
    if !(options.speed > 0.0) || !options.speed.is_finite() {
        warn!("invalid playback speed {}, using 1.0", options.speed);
        options.speed = 1.0;
    }
    if options.quantum.is_zero() {
        options.quantum = DEFAULT_QUANTUM;
    }
    options
}

fn run_session(
    timeline: &Timeline,
    sink: &dyn OutputSink,
    options: &PlaybackOptions,
    progress: &Option<ProgressObserver>,
    running: &AtomicBool,
) -> Result<()> {
    let total = timeline.duration();
    report(progress, 0.0);

    loop {
        let iteration_start = Instant::now();
        for event in timeline.events() {
            let deadline = iteration_start + Duration::from_secs_f64(event.offset / options.speed);
            if !wait_until(deadline, options.quantum, running) {
                // Stop observed mid-wait: the pending event is not executed
                return Ok(());
            }
            execute(sink, &event.action)?;
            if total > 0.0 {
                report(progress, event.offset / total * 100.0);
            }
        }

        if !(options.looped && running.load(Ordering::SeqCst)) {
            break;
        }
        debug!("loop enabled, restarting from the first event");
    }

    report(progress, 100.0);
    info!("playback finished");
    Ok(())
}

/// Sleep toward `deadline` in quantum slices, giving up as soon as the
/// running flag clears. Returns false when stopped.
fn wait_until(deadline: Instant, quantum: Duration, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(quantum));
    }
}

fn execute(sink: &dyn OutputSink, action: &EventKind) -> Result<()> {
    match action {
        EventKind::KeyPress { key } => sink.press_key(*key),
        EventKind::KeyRelease { key } => sink.release_key(*key),
        EventKind::MouseMove { x, y } => sink.move_pointer(*x, *y),
        EventKind::MouseClick {
            x,
            y,
            button,
            pressed,
        } => {
            // Position the pointer before the button change, as captured
            sink.move_pointer(*x, *y)?;
            if *pressed {
                sink.press_button(*button)
            } else {
                sink.release_button(*button)
            }
        }
        EventKind::MouseScroll { dx, dy, .. } => sink.scroll(*dx, *dy),
    }
}

fn report(progress: &Option<ProgressObserver>, percent: f64) {
    if let Some(observer) = progress {
        observer(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Key, MouseButton, TimelineEvent};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum SinkCall {
        PressKey(Key),
        ReleaseKey(Key),
        MovePointer(i32, i32),
        PressButton(MouseButton),
        ReleaseButton(MouseButton),
        Scroll(i32, i32),
    }

    #[derive(Default)]
    struct FakeSink {
        calls: Mutex<Vec<SinkCall>>,
        fail_from_call: Option<usize>,
    }

    impl FakeSink {
        fn new() -> Self {
            Self::default()
        }

        fn failing_from(call: usize) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_from_call: Some(call),
            }
        }

        fn record(&self, call: SinkCall) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            if let Some(limit) = self.fail_from_call {
                if calls.len() >= limit {
                    return Err(Error::Synthesis("injection rejected".into()));
                }
            }
            calls.push(call);
            Ok(())
        }

        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl OutputSink for FakeSink {
        fn press_key(&self, key: Key) -> Result<()> {
            self.record(SinkCall::PressKey(key))
        }

        fn release_key(&self, key: Key) -> Result<()> {
            self.record(SinkCall::ReleaseKey(key))
        }

        fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
            self.record(SinkCall::MovePointer(x, y))
        }

        fn press_button(&self, button: MouseButton) -> Result<()> {
            self.record(SinkCall::PressButton(button))
        }

        fn release_button(&self, button: MouseButton) -> Result<()> {
            self.record(SinkCall::ReleaseButton(button))
        }

        fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
            self.record(SinkCall::Scroll(dx, dy))
        }
    }

    fn key_timeline(offsets: &[f64]) -> Arc<Timeline> {
        Arc::new(
            offsets
                .iter()
                .map(|&offset| TimelineEvent {
                    offset,
                    action: EventKind::KeyPress {
                        key: Key::Char('a'),
                    },
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_timeline_is_rejected() {
        let mut engine = PlaybackEngine::new();
        let result = engine.start(
            Arc::new(Timeline::new()),
            Arc::new(FakeSink::new()),
            PlaybackOptions::default(),
            None,
        );
        assert!(matches!(result, Err(Error::EmptyTimeline)));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_executes_events_in_order() {
        let timeline = Arc::new(Timeline::from_iter([
            TimelineEvent {
                offset: 0.0,
                action: EventKind::KeyPress {
                    key: Key::Char('a'),
                },
            },
            TimelineEvent {
                offset: 0.0,
                action: EventKind::MouseClick {
                    x: 3,
                    y: 4,
                    button: MouseButton::Left,
                    pressed: true,
                },
            },
            TimelineEvent {
                offset: 0.0,
                action: EventKind::MouseScroll {
                    x: 3,
                    y: 4,
                    dx: 0,
                    dy: -1,
                },
            },
        ]));
        let sink = Arc::new(FakeSink::new());
        let mut engine = PlaybackEngine::new();
        engine
            .start(timeline, sink.clone(), PlaybackOptions::default(), None)
            .unwrap();
        engine.join().unwrap();

        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::PressKey(Key::Char('a')),
                SinkCall::MovePointer(3, 4),
                SinkCall::PressButton(MouseButton::Left),
                SinkCall::Scroll(0, -1),
            ]
        );
    }

    #[test]
    fn test_speed_scales_wall_clock() {
        let timeline = key_timeline(&[0.0, 0.5, 1.0]);
        let sink = Arc::new(FakeSink::new());
        let mut engine = PlaybackEngine::new();

        let started = Instant::now();
        engine
            .start(
                timeline,
                sink.clone(),
                PlaybackOptions {
                    speed: 2.0,
                    ..PlaybackOptions::default()
                },
                None,
            )
            .unwrap();
        engine.join().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(sink.calls().len(), 3);
        assert!(elapsed >= Duration::from_millis(400), "ran in {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(900), "ran in {:?}", elapsed);
    }

    #[test]
    fn test_stop_mid_wait_is_quantum_bounded() {
        // Second event is seconds away; a stop must not wait for it
        let timeline = key_timeline(&[0.0, 30.0]);
        let sink = Arc::new(FakeSink::new());
        let mut engine = PlaybackEngine::new();
        engine
            .start(timeline, sink.clone(), PlaybackOptions::default(), None)
            .unwrap();
        thread::sleep(Duration::from_millis(50));

        let stop_requested = Instant::now();
        engine.stop();
        engine.join().unwrap();
        let latency = stop_requested.elapsed();

        assert!(latency < Duration::from_millis(200), "took {:?}", latency);
        // The pending event was never executed
        assert_eq!(sink.calls().len(), 1);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_looping_replays_until_stopped() {
        let timeline = key_timeline(&[0.0, 0.02]);
        let sink = Arc::new(FakeSink::new());
        let mut engine = PlaybackEngine::new();
        engine
            .start(
                timeline,
                sink.clone(),
                PlaybackOptions {
                    looped: true,
                    ..PlaybackOptions::default()
                },
                None,
            )
            .unwrap();

        thread::sleep(Duration::from_millis(250));
        assert!(engine.is_running());
        engine.stop();
        engine.join().unwrap();

        // Far more executions than one pass of two events
        assert!(sink.calls().len() > 4, "only {} calls", sink.calls().len());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_synthesis_failure_aborts_session() {
        let timeline = key_timeline(&[0.0, 0.0, 0.0]);
        let sink = Arc::new(FakeSink::failing_from(2));
        let mut engine = PlaybackEngine::new();
        engine
            .start(timeline, sink.clone(), PlaybackOptions::default(), None)
            .unwrap();

        let result = engine.join();
        assert!(matches!(result, Err(Error::Synthesis(_))));
        assert_eq!(sink.calls().len(), 2);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_progress_reaches_one_hundred() {
        let timeline = key_timeline(&[0.0, 0.05, 0.1]);
        let sink = Arc::new(FakeSink::new());
        let reports: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let reports = reports.clone();
            Box::new(move |percent: f64| reports.lock().unwrap().push(percent))
        };

        let mut engine = PlaybackEngine::new();
        engine
            .start(
                timeline,
                sink,
                PlaybackOptions::default(),
                Some(observer),
            )
            .unwrap();
        engine.join().unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.first(), Some(&0.0));
        assert_eq!(reports.last(), Some(&100.0));
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_engine_restarts_after_stop() {
        let timeline = key_timeline(&[0.0]);
        let sink = Arc::new(FakeSink::new());
        let mut engine = PlaybackEngine::new();

        engine
            .start(
                timeline.clone(),
                sink.clone(),
                PlaybackOptions::default(),
                None,
            )
            .unwrap();
        engine.join().unwrap();
        engine.stop();

        engine
            .start(timeline, sink.clone(), PlaybackOptions::default(), None)
            .unwrap();
        engine.join().unwrap();
        assert_eq!(sink.calls().len(), 2);
    }
}
