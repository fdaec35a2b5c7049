//! Oscilloscope-style consumer of the visualization queue

use banddrive_core::domain::scope::ScopeConsumer;
use tracing::trace;

/// Collects mirrored audio into fixed-size frames
///
/// Meant to be polled from a display timer. Each [`ScopeDisplay::poll`]
/// drains whatever the audio thread has published; once a frame is full it
/// becomes the visible frame and a new one starts filling.
pub struct ScopeDisplay {
    consumer: ScopeConsumer,
    pending: Vec<f32>,
    filled: usize,
    visible: Vec<f32>,
    frames_completed: u64,
}

impl ScopeDisplay {
    pub fn new(consumer: ScopeConsumer, frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            consumer,
            pending: vec![0.0; frame_len],
            filled: 0,
            visible: vec![0.0; frame_len],
            frames_completed: 0,
        }
    }

    /// Drain the queue; returns true if at least one new frame completed
    pub fn poll(&mut self) -> bool {
        let mut completed = false;

        loop {
            let n = self.consumer.pop(&mut self.pending[self.filled..]);
            self.filled += n;

            if self.filled == self.pending.len() {
                std::mem::swap(&mut self.pending, &mut self.visible);
                self.filled = 0;
                self.frames_completed += 1;
                completed = true;
                trace!("Scope frame {} ready", self.frames_completed);
            } else if n == 0 {
                break;
            }
        }

        completed
    }

    /// Most recently completed frame (silence until the first one)
    pub fn frame(&self) -> &[f32] {
        &self.visible
    }

    /// Peak magnitude of the visible frame
    pub fn peak(&self) -> f32 {
        self.visible.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Samples the display missed because it polled too slowly
    pub fn dropped(&self) -> u64 {
        self.consumer.dropped()
    }
}
