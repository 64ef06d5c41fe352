//! Per-voice state published by the audio thread and read off it — by queries, by the
//! drift monitor — without involving the audio path in the read.

use crate::rt::voice::VoiceState;
use atomic::Atomic;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Shared between the audio thread (which publishes per-voice telemetry), the drift
/// monitor (which reads it), and the control surface (which reads it for queries).
pub type VoiceRegistry = Arc<Mutex<HashMap<u32, Arc<VoiceTelemetry>>>>;

const ORD: Ordering = Ordering::SeqCst;

#[derive(Debug)]
pub struct VoiceTelemetry {
    id: u32,
    buffer_frames: usize,
    native_sample_rate: u32,
    /// Last native-domain read position published by the audio thread, in frames.
    native_position: Atomic<f64>,
    /// Combined native-frames-consumed-per-device-frame ratio currently in effect.
    input_rate: Atomic<f64>,
    start_frame: AtomicI64,
    state: AtomicU8,
    unrecoverable_drift: AtomicU8,
}

impl VoiceTelemetry {
    pub fn new(id: u32, buffer_frames: usize, native_sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            id,
            buffer_frames,
            native_sample_rate,
            native_position: Atomic::new(0.0),
            input_rate: Atomic::new(1.0),
            start_frame: AtomicI64::new(0),
            state: AtomicU8::new(VoiceState::Scheduled.into()),
            unrecoverable_drift: AtomicU8::new(0),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn publish(&self, native_position: f64, state: VoiceState) {
        self.native_position.store(native_position, ORD);
        self.state.store(state.into(), ORD);
    }

    pub fn publish_schedule(&self, start_frame: i64, input_rate: f64) {
        self.start_frame.store(start_frame, ORD);
        self.input_rate.store(input_rate, ORD);
    }

    pub fn native_position(&self) -> f64 {
        self.native_position.load(ORD)
    }

    pub fn start_frame(&self) -> i64 {
        self.start_frame.load(ORD)
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate.load(ORD)
    }

    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    pub fn native_sample_rate(&self) -> u32 {
        self.native_sample_rate
    }

    /// Falls back to [`VoiceState::Removed`] if the stored discriminant is ever stale
    /// relative to this build (should not happen in practice: writer and reader share
    /// the same binary).
    pub fn state(&self) -> VoiceState {
        VoiceState::try_from(self.state.load(ORD)).unwrap_or(VoiceState::Removed)
    }

    pub fn mark_unrecoverable_drift(&self) {
        self.unrecoverable_drift.store(1, ORD);
    }

    pub fn has_unrecoverable_drift(&self) -> bool {
        self.unrecoverable_drift.load(ORD) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_and_reads_back_state() {
        let telemetry = VoiceTelemetry::new(7, 768000, 48000);
        telemetry.publish(123.5, VoiceState::Playing);
        assert_eq!(telemetry.native_position(), 123.5);
        assert_eq!(telemetry.state(), VoiceState::Playing);
    }

    #[test]
    fn unrecoverable_drift_flag_latches() {
        let telemetry = VoiceTelemetry::new(1, 768000, 48000);
        assert!(!telemetry.has_unrecoverable_drift());
        telemetry.mark_unrecoverable_drift();
        assert!(telemetry.has_unrecoverable_drift());
    }
}
