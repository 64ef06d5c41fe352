//! Embedder-supplied configuration.
//!
//! No file-based config: loading and persisting preferences belongs to the embedding
//! application. This is a plain struct the embedder constructs and passes in.

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Used when an embedder builds [`crate::rt::mix_graph::MixGraph`] directly against
    /// its own host transport. [`crate::engine::Engine::start`]'s `cpal` path ignores
    /// this in favor of the device's actual reported channel count.
    pub channel_count: u16,
    pub command_queue_capacity: usize,
    /// Per-voice gain ramp length on add/remove, in milliseconds. Clamped to 250ms max.
    pub gain_ramp_ms: f64,
    /// Drift correction threshold, in milliseconds of frames. Recommended default 15,
    /// absolute minimum 1.
    pub drift_threshold_ms: f64,
    /// Drift monitor polling cadence, in milliseconds. Recommended ~500.
    pub drift_poll_interval_ms: u64,
    /// Minimum time between successful corrections for the same voice, in
    /// milliseconds.
    pub drift_correction_throttle_ms: u64,
    /// Overlap-add window count for the pitch-locked time-stretch stage.
    pub pitch_locked_overlap_windows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_count: 2,
            command_queue_capacity: 64,
            gain_ramp_ms: 250.0,
            drift_threshold_ms: 15.0,
            drift_poll_interval_ms: 500,
            drift_correction_throttle_ms: 1000,
            pitch_locked_overlap_windows: 8,
        }
    }
}
