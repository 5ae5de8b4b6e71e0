//! Zoom/pan state and the client → logical coordinate transform.
//!
//! The canvas element is transformed visually (`translate(pan) scale(zoom)`
//! with a top-left origin), so the element's bounding box already includes
//! the pan. Mapping a pointer to logical space only needs the bounding-box
//! origin and a division by the zoom level.

use crate::config::ZoomConfig;
use crate::model::{GraphRecord, Point, Rect};

/// Logical canvas dimensions (the drawing surface, not the window).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 1500.0,
        }
    }
}

impl CanvasSize {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Current zoom level and pan offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f64,
    pan: Point,
    limits: ZoomConfig,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}

impl Viewport {
    pub fn new(limits: ZoomConfig) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ORIGIN,
            limits,
        }
    }

    /// Restore from the persisted graph record (zoom is re-clamped).
    pub fn from_record(record: &GraphRecord, limits: ZoomConfig) -> Self {
        let mut vp = Self::new(limits);
        vp.zoom = record.zoom_level.clamp(limits.min, limits.max);
        vp.pan = Point::new(record.pan_offset_x, record.pan_offset_y);
        vp
    }

    /// Write zoom and pan back into the graph record.
    pub fn write_to(&self, record: &mut GraphRecord) {
        record.zoom_level = self.zoom;
        record.pan_offset_x = self.pan.x;
        record.pan_offset_y = self.pan.y;
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan_offset(&self) -> Point {
        self.pan
    }

    pub fn limits(&self) -> ZoomConfig {
        self.limits
    }

    /// Map a client-space pointer to logical canvas space. `origin` is the
    /// top-left of the canvas element's bounding box.
    pub fn to_logical(&self, client: Point, origin: Point) -> Point {
        Point::new(
            (client.x - origin.x) / self.zoom,
            (client.y - origin.y) / self.zoom,
        )
    }

    /// Inverse of [`Viewport::to_logical`].
    pub fn to_client(&self, logical: Point, origin: Point) -> Point {
        Point::new(
            logical.x * self.zoom + origin.x,
            logical.y * self.zoom + origin.y,
        )
    }

    /// Set the zoom level, clamped to the configured limits and rounded to
    /// hundredths. Returns `false` if the level did not change.
    pub fn set_zoom(&mut self, level: f64) -> bool {
        if !level.is_finite() {
            return false;
        }
        let level = ((level * 100.0).round() / 100.0).clamp(self.limits.min, self.limits.max);
        if (level - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        log::debug!("zoom {:.2} -> {:.2}", self.zoom, level);
        self.zoom = level;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + self.limits.step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - self.limits.step)
    }

    /// One wheel notch: negative `delta_y` (scroll up) zooms in.
    ///
    /// Ignored when the pointer is over any of `reserved` (client-space UI
    /// panels layered over the canvas).
    pub fn wheel(&mut self, delta_y: f64, client: Point, reserved: &[Rect]) -> bool {
        if reserved.iter().any(|r| r.contains(client)) {
            return false;
        }
        if delta_y < 0.0 {
            self.zoom_in()
        } else if delta_y > 0.0 {
            self.zoom_out()
        } else {
            false
        }
    }

    /// Accumulate a client-space pan delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan + Point::new(dx, dy);
    }

    /// Back to zoom 1.0 and pan origin. Returns `false` if already there.
    pub fn reset(&mut self) -> bool {
        let changed = self.zoom != 1.0 || self.pan != Point::ORIGIN;
        self.zoom = 1.0;
        self.pan = Point::ORIGIN;
        changed
    }
}
