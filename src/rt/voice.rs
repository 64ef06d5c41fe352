//! One active loop: its lifecycle state, its rate/pitch configuration, and the
//! supplier chain that actually produces samples for it.

use crate::loader::PcmBuffer;
use crate::rt::supplier::chain::{RateMode, SupplierChain};
use crate::rt::supplier::looper::Looper;
use crate::rt::supplier::pcm_source::PcmSource;
use crate::telemetry::VoiceTelemetry;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum VoiceState {
    Scheduled,
    Playing,
    Stopping,
    Removed,
}

pub struct Voice {
    id: u32,
    native_bpm: f64,
    native_sample_rate: u32,
    state: VoiceState,
    start_frame: Option<i64>,
    rate_mode: RateMode,
    rate: f64,
    input_rate: f64,
    chain: SupplierChain,
    telemetry: Arc<VoiceTelemetry>,
}

impl Voice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        native_bpm: f64,
        buffer: Arc<PcmBuffer>,
        channel_count: usize,
        rate_mode: RateMode,
        pitch_locked_overlap_windows: usize,
        ramp_len_frames: u32,
        initial_gain: f32,
    ) -> Self {
        let native_sample_rate = buffer.sample_rate;
        let buffer_frames = buffer.frame_count();
        let looper = Looper::new(PcmSource::new(buffer));
        let chain = SupplierChain::new(
            looper,
            channel_count,
            rate_mode,
            pitch_locked_overlap_windows,
            ramp_len_frames,
            initial_gain,
        );
        Self {
            id,
            native_bpm,
            native_sample_rate,
            state: VoiceState::Scheduled,
            start_frame: None,
            rate_mode,
            rate: 1.0,
            input_rate: 1.0,
            chain,
            telemetry: VoiceTelemetry::new(id, buffer_frames, native_sample_rate),
        }
    }

    pub fn telemetry(&self) -> Arc<VoiceTelemetry> {
        self.telemetry.clone()
    }

    pub fn buffer_frames(&self) -> usize {
        self.chain.buffer_frames()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Scheduled | VoiceState::Playing | VoiceState::Stopping)
    }

    pub fn start_frame(&self) -> Option<i64> {
        self.start_frame
    }

    pub fn set_start_frame(&mut self, frame: i64) {
        self.start_frame = Some(frame);
        self.telemetry.publish_schedule(frame, self.input_rate);
    }

    /// Reseeds the supplier chain's read position directly, for the case where a host
    /// cannot schedule a start frame in the past, or as a drift correction.
    pub fn seek_to_phase(&mut self, phase: f64, buffer_frames: usize) {
        self.chain.seek(phase * buffer_frames as f64);
    }

    pub fn rate_mode(&self) -> RateMode {
        self.rate_mode
    }

    pub fn set_rate_mode(&mut self, mode: RateMode) {
        self.rate_mode = mode;
        self.chain.set_rate_mode(mode);
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Recomputes the native-to-output consumption ratio from the current tempo and
    /// device sample rate, folding sample-rate conversion and tempo-driven rate change
    /// into one combined ratio regardless of which rate mode is active.
    pub fn reconfigure_rate(&mut self, tempo_bpm: f64, device_sample_rate: f64) {
        self.rate = tempo_bpm / self.native_bpm;
        let native_to_device = self.native_sample_rate as f64 / device_sample_rate;
        let combined = native_to_device * self.rate;
        self.input_rate = combined;
        self.chain.set_effective_rate(combined, combined);
        if let Some(start) = self.start_frame {
            self.telemetry.publish_schedule(start, self.input_rate);
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.chain.set_gain(gain.clamp(0.0, 1.0));
    }

    /// Cancels a not-yet-started voice silently, or begins the fade-out for a playing
    /// one. Idempotent: calling this on an already stopping/removed voice is a no-op.
    pub fn request_remove(&mut self) {
        match self.state {
            VoiceState::Scheduled => self.state = VoiceState::Removed,
            VoiceState::Playing => {
                self.state = VoiceState::Stopping;
                self.chain.begin_release();
            }
            VoiceState::Stopping | VoiceState::Removed => {}
        }
    }

    /// Renders one output frame at `device_frame` into `out`, or leaves `out`
    /// untouched if the voice has nothing to contribute this frame.
    pub fn render_frame(&mut self, device_frame: i64, out: &mut [f32]) {
        match self.state {
            VoiceState::Removed => return,
            VoiceState::Scheduled => match self.start_frame {
                Some(start) if device_frame >= start => self.state = VoiceState::Playing,
                _ => return,
            },
            VoiceState::Playing | VoiceState::Stopping => {}
        }
        self.chain.render_frame(out);
        if self.state == VoiceState::Stopping && self.chain.is_released() {
            self.state = VoiceState::Removed;
        }
        self.telemetry.publish(self.chain.native_position(), self.state);
    }
}
