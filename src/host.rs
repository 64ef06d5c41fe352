//! Connects the engine to a real output device.
//!
//! The engine itself is host-agnostic — [`crate::rt::audio_hook::AudioHook`] only needs
//! a device frame index and a buffer. [`AudioHostContract`] is the seam an embedder
//! implements to supply those from whatever transport it has (a plugin host's callback,
//! a game engine's mixer tick, or, via [`CpalHost`], a standalone OS device).

use crate::diagnostics::DiagnosticEvent;
use crate::rt::audio_hook::AudioHook;
use crossbeam_channel::Sender;

/// What the engine needs from whatever is driving its audio callback.
pub trait AudioHostContract: Send {
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> u16;
}

/// Default standalone host adapter, backed by `cpal`'s default output device.
pub struct CpalHost {
    sample_rate: u32,
    channel_count: u16,
    _stream: cpal::Stream,
}

impl CpalHost {
    /// Opens the system's default output device, lets `build_hook` construct the engine
    /// against that device's actual sample rate and channel count, then starts driving
    /// it from the stream callback. The returned value must be kept alive for as long
    /// as playback should continue; dropping it stops the stream. Stream-level errors
    /// (backend-reported hiccups, not render-path ones) are forwarded to
    /// `diagnostics_tx` in addition to being logged; the render callback itself is the
    /// stream's only owner, so there is nothing to lock on the hot path.
    pub fn spawn(
        build_hook: impl FnOnce(u32, u16) -> AudioHook,
        diagnostics_tx: Sender<DiagnosticEvent>,
    ) -> Result<Self, HostError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(HostError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| HostError::Config(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let channel_count = config.channels();
        let stream_config: cpal::StreamConfig = config.into();

        let mut hook = build_hook(sample_rate, channel_count);
        let mut frame_cursor: i64 = 0;
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frame_count = data.len() / channel_count as usize;
                    hook.render(frame_cursor, data, frame_count, channel_count as usize);
                    frame_cursor += frame_count as i64;
                },
                move |err| {
                    let _ = diagnostics_tx.try_send(DiagnosticEvent::StreamError(err.to_string()));
                    crate::rt_error!(%err, "cpal stream error");
                },
                None,
            )
            .map_err(|e| HostError::BuildStream(e.to_string()))?;
        stream.play().map_err(|e| HostError::BuildStream(e.to_string()))?;

        Ok(Self {
            sample_rate,
            channel_count,
            _stream: stream,
        })
    }
}

// `cpal::Stream` is `!Send` on some backends; the engine never touches it after
// construction, only keeps it alive, so this mirrors the pattern used by other
// cpal-backed hosts in this ecosystem.
unsafe impl Send for CpalHost {}

impl AudioHostContract for CpalHost {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("no output device is available on this system")]
    NoOutputDevice,
    #[error("failed to read the output device's default config: {0}")]
    Config(String),
    #[error("failed to build the output stream: {0}")]
    BuildStream(String),
}
