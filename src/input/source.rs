//! Input source collaborator interface
//!
//! The engine never talks to an OS hook directly. A platform backend
//! implements [`InputSource`] and fans raw notifications out to every
//! registered handler; registration is non-exclusive, so the recorder and
//! any number of hotkey matchers can observe the same stream concurrently.
//! Callbacks arrive on uncontrolled backend threads.

use std::sync::Arc;

use crate::data::{Key, MouseButton};

/// Identifies one subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type KeyCallback = dyn Fn(Key) + Send + Sync;
type MoveCallback = dyn Fn(i32, i32) + Send + Sync;
type ClickCallback = dyn Fn(i32, i32, MouseButton, bool) + Send + Sync;
type ScrollCallback = dyn Fn(i32, i32, i32, i32) + Send + Sync;

/// Bundle of notification callbacks for one subscriber.
///
/// Every callback is optional; a handler only pays for what it observes.
#[derive(Default, Clone)]
pub struct InputHandler {
    pub(crate) on_key_press: Option<Arc<KeyCallback>>,
    pub(crate) on_key_release: Option<Arc<KeyCallback>>,
    pub(crate) on_mouse_move: Option<Arc<MoveCallback>>,
    pub(crate) on_mouse_click: Option<Arc<ClickCallback>>,
    pub(crate) on_mouse_scroll: Option<Arc<ScrollCallback>>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_press(mut self, f: impl Fn(Key) + Send + Sync + 'static) -> Self {
        self.on_key_press = Some(Arc::new(f));
        self
    }

    pub fn on_key_release(mut self, f: impl Fn(Key) + Send + Sync + 'static) -> Self {
        self.on_key_release = Some(Arc::new(f));
        self
    }

    pub fn on_mouse_move(mut self, f: impl Fn(i32, i32) + Send + Sync + 'static) -> Self {
        self.on_mouse_move = Some(Arc::new(f));
        self
    }

    pub fn on_mouse_click(
        mut self,
        f: impl Fn(i32, i32, MouseButton, bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_mouse_click = Some(Arc::new(f));
        self
    }

    pub fn on_mouse_scroll(
        mut self,
        f: impl Fn(i32, i32, i32, i32) + Send + Sync + 'static,
    ) -> Self {
        self.on_mouse_scroll = Some(Arc::new(f));
        self
    }

    pub(crate) fn key_press(&self, key: Key) {
        if let Some(f) = &self.on_key_press {
            f(key);
        }
    }

    pub(crate) fn key_release(&self, key: Key) {
        if let Some(f) = &self.on_key_release {
            f(key);
        }
    }

    pub(crate) fn mouse_move(&self, x: i32, y: i32) {
        if let Some(f) = &self.on_mouse_move {
            f(x, y);
        }
    }

    pub(crate) fn mouse_click(&self, x: i32, y: i32, button: MouseButton, pressed: bool) {
        if let Some(f) = &self.on_mouse_click {
            f(x, y, button, pressed);
        }
    }

    pub(crate) fn mouse_scroll(&self, x: i32, y: i32, dx: i32, dy: i32) {
        if let Some(f) = &self.on_mouse_scroll {
            f(x, y, dx, dy);
        }
    }
}

/// Source of raw input notifications
pub trait InputSource: Send + Sync {
    /// Register a handler; it observes the stream until unsubscribed
    fn subscribe(&self, handler: InputHandler) -> SubscriptionId;

    /// Remove a previously registered handler; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}
