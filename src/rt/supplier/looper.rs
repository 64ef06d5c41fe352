//! Wraps a [`PcmSource`] so any fractional position is folded into the material's
//! natural extent before it's read. Every loop repeats indefinitely while its voice
//! is active, so there's no one-shot "last cycle" behavior to track here.

use crate::rt::supplier::pcm_source::PcmSource;

#[derive(Debug, Clone)]
pub struct Looper {
    source: PcmSource,
}

impl Looper {
    pub fn new(source: PcmSource) -> Self {
        Self { source }
    }

    pub fn channel_count(&self) -> usize {
        self.source.channel_count()
    }

    pub fn frame_count(&self) -> usize {
        self.source.frame_count()
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.source.native_sample_rate()
    }

    pub fn read(&self, pos: f64, out: &mut [f32]) {
        let wrapped = pos.rem_euclid(self.frame_count() as f64);
        self.source.read(wrapped, out);
    }
}
