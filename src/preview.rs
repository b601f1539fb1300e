use log::debug;

use crate::audio::AudioBuffer;
use crate::Result;

/// Longest slice played when auditioning from a point in the source.
pub const PREVIEW_SECONDS: f64 = 5.0;

/// The slice heard when previewing from `from_time`: up to
/// `PREVIEW_SECONDS`, cut short by the end of the buffer.
pub fn preview_window(buffer: &AudioBuffer, from_time: f64) -> &[f32] {
    let start = buffer.index_at(from_time);
    let play_for = PREVIEW_SECONDS.min((buffer.duration() - from_time).max(0.0));
    let end = buffer.index_at(from_time + play_for).max(start);
    &buffer.samples()[start..end]
}

/// Something playing audio that can be told to stop. Implemented by
/// whatever drives the output device.
pub trait PreviewHandle {
    fn stop(&mut self);
}

/// Holds at most one playing preview. Starting another stops and releases
/// the previous one first, so outputs never overlap.
pub struct Previewer<P: PreviewHandle> {
    current: Option<P>,
}

impl<P: PreviewHandle> Default for Previewer<P> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<P: PreviewHandle> Previewer<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the current preview, then starts a new one with `launch`.
    pub fn start<F>(&mut self, launch: F) -> Result<()>
    where
        F: FnOnce() -> Result<P>,
    {
        self.stop();
        self.current = Some(launch()?);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut handle) = self.current.take() {
            handle.stop();
            debug!("Stopped preview");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }
}

impl<P: PreviewHandle> Drop for Previewer<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
