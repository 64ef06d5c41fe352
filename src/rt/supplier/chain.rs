//! Assembles the per-voice supplier chain: loop wraparound, rate/pitch conversion,
//! persistent gain, and the join/leave fade, in that order from source to output.

use crate::rt::supplier::amplifier::Amplifier;
use crate::rt::supplier::fader::Fader;
use crate::rt::supplier::looper::Looper;
use crate::rt::supplier::resampler::Resampler;
use crate::rt::supplier::time_stretcher::TimeStretcher;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RateMode {
    Varispeed,
    PitchLocked,
}

#[derive(Debug, Clone)]
enum RateStage {
    Varispeed(Resampler),
    PitchLocked(TimeStretcher),
}

impl RateStage {
    fn render_frame(&mut self, looper: &Looper, out: &mut [f32]) {
        match self {
            RateStage::Varispeed(r) => r.render_frame(looper, out),
            RateStage::PitchLocked(t) => t.render_frame(looper, out),
        }
    }

    fn seek(&mut self, native_position: f64) {
        match self {
            RateStage::Varispeed(r) => r.seek(native_position),
            RateStage::PitchLocked(t) => t.seek(native_position),
        }
    }

    fn position(&self) -> f64 {
        match self {
            RateStage::Varispeed(r) => r.position(),
            RateStage::PitchLocked(t) => t.native_position(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupplierChain {
    looper: Looper,
    rate_stage: RateStage,
    amplifier: Amplifier,
    fader: Fader,
    channel_count: usize,
    pitch_locked_overlap_windows: usize,
}

impl SupplierChain {
    pub fn new(
        looper: Looper,
        channel_count: usize,
        rate_mode: RateMode,
        pitch_locked_overlap_windows: usize,
        ramp_len_frames: u32,
        initial_gain: f32,
    ) -> Self {
        let rate_stage = Self::build_stage(rate_mode, channel_count, pitch_locked_overlap_windows);
        Self {
            looper,
            rate_stage,
            amplifier: Amplifier::new(initial_gain),
            fader: Fader::new(ramp_len_frames),
            channel_count,
            pitch_locked_overlap_windows,
        }
    }

    fn build_stage(mode: RateMode, channel_count: usize, pitch_locked_overlap_windows: usize) -> RateStage {
        match mode {
            RateMode::Varispeed => RateStage::Varispeed(Resampler::new()),
            RateMode::PitchLocked => {
                RateStage::PitchLocked(TimeStretcher::new(channel_count, pitch_locked_overlap_windows))
            }
        }
    }

    /// Switches rate mode in place, carrying the current read position over so the
    /// voice doesn't audibly jump when toggled between varispeed and pitch-locked.
    pub fn set_rate_mode(&mut self, mode: RateMode) {
        let current_mode = match &self.rate_stage {
            RateStage::Varispeed(_) => RateMode::Varispeed,
            RateStage::PitchLocked(_) => RateMode::PitchLocked,
        };
        if current_mode == mode {
            return;
        }
        let position = self.rate_stage.position();
        self.rate_stage = Self::build_stage(mode, self.channel_count, self.pitch_locked_overlap_windows);
        self.rate_stage.seek(position);
    }

    /// `step` feeds the varispeed resampler, `stretch_rate` feeds the pitch-locked
    /// time-stretcher; only the active stage's value is used.
    pub fn set_effective_rate(&mut self, step: f64, stretch_rate: f64) {
        match &mut self.rate_stage {
            RateStage::Varispeed(r) => r.set_step(step),
            RateStage::PitchLocked(t) => t.set_rate(stretch_rate),
        }
    }

    pub fn seek(&mut self, native_position: f64) {
        self.rate_stage.seek(native_position);
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.amplifier.set_gain(gain);
    }

    pub fn begin_release(&mut self) {
        self.fader.begin_release();
    }

    pub fn is_released(&self) -> bool {
        self.fader.is_done()
    }

    pub fn render_frame(&mut self, out: &mut [f32]) {
        self.rate_stage.render_frame(&self.looper, out);
        self.amplifier.apply(out);
        self.fader.apply(out);
    }

    pub fn native_position(&self) -> f64 {
        self.rate_stage.position()
    }

    pub fn buffer_frames(&self) -> usize {
        self.looper.frame_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PcmBuffer;
    use crate::rt::supplier::pcm_source::PcmSource;
    use std::sync::Arc;

    fn chain(mode: RateMode) -> SupplierChain {
        let looper = Looper::new(PcmSource::new(Arc::new(PcmBuffer {
            sample_rate: 48000,
            channel_count: 1,
            channels: vec![vec![1.0; 4096]],
        })));
        SupplierChain::new(looper, 1, mode, 8, 4, 1.0)
    }

    #[test]
    fn varispeed_chain_renders_without_panicking() {
        let mut c = chain(RateMode::Varispeed);
        c.set_effective_rate(1.0, 1.0);
        let mut out = [0.0f32];
        for _ in 0..16 {
            c.render_frame(&mut out);
        }
    }

    #[test]
    fn switching_rate_mode_preserves_position() {
        let mut c = chain(RateMode::Varispeed);
        c.set_effective_rate(2.0, 1.0);
        let mut out = [0.0f32];
        for _ in 0..10 {
            c.render_frame(&mut out);
        }
        let position_before = c.rate_stage.position();
        c.set_rate_mode(RateMode::PitchLocked);
        assert!((c.rate_stage.position() - position_before).abs() < 1.0);
    }

    #[test]
    fn release_eventually_reports_done() {
        let mut c = chain(RateMode::Varispeed);
        c.set_effective_rate(1.0, 1.0);
        c.begin_release();
        let mut out = [0.0f32];
        for _ in 0..8 {
            c.render_frame(&mut out);
        }
        assert!(c.is_released());
    }
}
