//! Single-flight frame scheduling.
//!
//! Any number of redraw requests between two frames collapse into one
//! callback. The host only schedules an animation frame when
//! [`FrameScheduler::request`] returns `true`.

#[derive(Debug, Default, Clone)]
pub struct FrameScheduler {
    pending: bool,
    requested: u64,
    rendered: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a redraw. Returns `true` only for the first request since
    /// the last frame began.
    pub fn request(&mut self) -> bool {
        self.requested += 1;
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Called from the frame callback before drawing. Re-arms scheduling.
    /// Returns `false` for a spurious callback with nothing pending.
    pub fn begin_frame(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.rendered += 1;
        log::trace!("frame {} ({} requests)", self.rendered, self.requested);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Frames drawn so far.
    pub fn frames(&self) -> u64 {
        self.rendered
    }
}
