//! Progress reporting and cooperative cancellation.
//!
//! A progress callback receives the completed fraction of a read in `[0, 1]`
//! and returns `true` to request an abort. It is called synchronously from
//! inside the read and never retained past it.
//!
//! ```rust
//! let mut calls = 0;
//! let mut cb = |done: f32| {
//!     calls += 1;
//!     done > 0.5 // stop past halfway
//! };
//! # let _ = &mut cb;
//! ```

use crate::{IoError, IoResult};

/// Progress callback: `fraction_done -> should_abort`.
pub type ProgressCallback<'a> = dyn FnMut(f32) -> bool + 'a;

/// Drives an optional callback with clamped, non-decreasing fractions.
pub(crate) struct Progress<'a, 'b> {
    callback: Option<&'a mut ProgressCallback<'b>>,
    last: f32,
}

impl<'a, 'b> Progress<'a, 'b> {
    pub(crate) fn new(callback: Option<&'a mut ProgressCallback<'b>>) -> Self {
        Self { callback, last: 0.0 }
    }

    /// Reports `done / total`. Returns [`IoError::Aborted`] if the callback asks to stop.
    pub(crate) fn report(&mut self, done: u64, total: u64) -> IoResult<()> {
        let Some(cb) = self.callback.as_deref_mut() else {
            return Ok(());
        };
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0) as f32
        };
        self.last = self.last.max(fraction);
        if cb(self.last) {
            return Err(IoError::Aborted);
        }
        Ok(())
    }
}
