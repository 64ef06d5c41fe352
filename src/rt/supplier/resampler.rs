//! Varispeed rate stage: cheap, ratio-driven resampling that changes pitch along with
//! tempo. Since this engine's material is fully buffered, reading it at a non-unit
//! step is enough to resample it — no batch pull protocol needed, just a fractional
//! read position that advances by a configurable step each frame.

use crate::rt::supplier::looper::Looper;

#[derive(Debug, Clone)]
pub struct Resampler {
    /// Current fractional read position, in the looper's native frame domain.
    position: f64,
    /// Frames of native material advanced per emitted output frame.
    step: f64,
}

impl Resampler {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            step: 1.0,
        }
    }

    pub fn seek(&mut self, native_position: f64) {
        self.position = native_position;
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// `step` is the effective input rate: `native_sample_rate * rate / device_sample_rate`.
    pub fn set_step(&mut self, step: f64) {
        self.step = step;
    }

    pub fn render_frame(&mut self, looper: &Looper, out: &mut [f32]) {
        looper.read(self.position, out);
        self.position += self.step;
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::supplier::pcm_source::PcmSource;
    use std::sync::Arc;

    fn looper() -> Looper {
        Looper::new(PcmSource::new(Arc::new(crate::loader::PcmBuffer {
            sample_rate: 48000,
            channel_count: 1,
            channels: vec![vec![0.0, 1.0, 2.0, 3.0]],
        })))
    }

    #[test]
    fn advances_position_by_step_each_frame() {
        let looper = looper();
        let mut r = Resampler::new();
        r.set_step(0.5);
        let mut out = [0.0f32];
        r.render_frame(&looper, &mut out);
        r.render_frame(&looper, &mut out);
        assert!((r.position() - 1.0).abs() < 1e-9);
    }
}
