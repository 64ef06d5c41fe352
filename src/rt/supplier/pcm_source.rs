//! Bottom of the supplier chain: a fully-buffered, already-decoded loop.
//!
//! Every loop is fully buffered in memory, so this supplier is a pure function from a
//! fractional frame position to an interpolated sample — no internal read cursor, no
//! bookkeeping about how much of a request was fulfilled.

use crate::loader::PcmBuffer;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PcmSource {
    buffer: Arc<PcmBuffer>,
}

impl PcmSource {
    pub fn new(buffer: Arc<PcmBuffer>) -> Self {
        Self { buffer }
    }

    pub fn channel_count(&self) -> usize {
        self.buffer.channel_count as usize
    }

    pub fn frame_count(&self) -> usize {
        self.buffer.frame_count()
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    /// Linearly interpolated read at `pos`, which must already be wrapped into
    /// `[0, frame_count)` by the caller (the looper stage).
    pub fn read(&self, pos: f64, out: &mut [f32]) {
        let frame_count = self.frame_count();
        let i0 = pos.floor() as usize % frame_count;
        let i1 = (i0 + 1) % frame_count;
        let frac = (pos - pos.floor()) as f32;
        for (c, slot) in out.iter_mut().enumerate() {
            let channel = &self.buffer.channels[c.min(self.channel_count() - 1)];
            let s0 = channel[i0];
            let s1 = channel[i1];
            *slot = s0 + (s1 - s0) * frac;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(samples: Vec<f32>) -> PcmSource {
        PcmSource::new(Arc::new(PcmBuffer {
            sample_rate: 48000,
            channel_count: 1,
            channels: vec![samples],
        }))
    }

    #[test]
    fn interpolates_between_samples() {
        let src = source(vec![0.0, 1.0, 0.0, -1.0]);
        let mut out = [0.0f32];
        src.read(0.5, &mut out);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wraps_at_end_for_ceil_index() {
        let src = source(vec![0.0, 1.0, 0.0, 2.0]);
        let mut out = [0.0f32];
        src.read(3.5, &mut out);
        assert!((out[0] - 1.0).abs() < 1e-6);
    }
}
