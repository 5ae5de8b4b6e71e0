//! Input abstraction layer.
//!
//! Normalizes DOM pointer, wheel and keyboard events into a unified
//! `InputEvent` consumed by the editor. Pointer positions arrive in client
//! space together with the canvas bounding-box origin; the editor maps them
//! to logical space through the viewport.

use rel_core::Point;

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on Windows/Linux, ⌘ on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A normalized input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        client: Point,
        /// Top-left of the canvas element's bounding box.
        origin: Point,
        modifiers: Modifiers,
        /// Event timestamp, used for double-hit detection on bend points.
        time_ms: f64,
    },

    /// Pointer moved. Delivered from window-level listeners while a
    /// gesture is active so drags survive leaving the canvas.
    PointerMove { client: Point, origin: Point },

    PointerUp { client: Point, origin: Point },

    DoubleClick { client: Point, origin: Point },

    /// One wheel notch; negative `delta_y` scrolls up.
    Wheel { client: Point, delta_y: f64 },

    Key { key: String, modifiers: Modifiers },
}

impl InputEvent {
    /// Client position if this is a pointer event.
    pub fn client(&self) -> Option<Point> {
        match self {
            Self::PointerDown { client, .. }
            | Self::PointerMove { client, .. }
            | Self::PointerUp { client, .. }
            | Self::DoubleClick { client, .. }
            | Self::Wheel { client, .. } => Some(*client),
            Self::Key { .. } => None,
        }
    }
}
