//! Thread-safe command interface consumed by the embedding application: add/remove a
//! voice, change tempo or pitch-lock, adjust gain, start/stop, and read back phase and
//! loop-progress queries without touching the audio path.

use crate::catalog::Catalog;
use crate::diagnostics::{DiagnosticEvent, DiagnosticLog};
use crate::error::{AddVoiceError, DriftUnrecoverable, TempoError, VoiceCommandError};
use crate::loader::PcmLoader;
use crate::rt::supplier::chain::RateMode;
use crate::rt::voice::Voice;
use crate::scheduler;
use crate::telemetry::VoiceRegistry;
use crate::timeline::MasterClock;
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const MAX_VOICES: usize = 4;

/// Every operation that crosses from the control context (or the drift monitor) into
/// the audio thread. Variants that construct a [`Voice`] do so off the audio thread;
/// the callback only ever moves an already-built value into its active set.
pub enum RtCommand {
    AddVoice(Box<Voice>),
    RemoveVoice(u32),
    SetStartFrame { id: u32, start_frame: i64 },
    Reseek { id: u32, start_frame: i64, phase: f64 },
    GiveUp(u32),
    SetVoiceGain(u32, f32),
    SetVoiceRateMode(u32, RateMode),
    SetVoiceTempo(u32, f64),
    SetMasterGain(f32),
}

pub struct EngineHandle {
    clock: Arc<MasterClock>,
    catalog: Arc<Catalog>,
    loader: Arc<PcmLoader>,
    channel_count: u16,
    device_sample_rate: u32,
    gain_ramp_frames: u32,
    pitch_locked_overlap_windows: usize,
    command_tx: Sender<RtCommand>,
    registry: VoiceRegistry,
    active_ids: Mutex<HashSet<u32>>,
    pitch_lock: AtomicBool,
    is_playing: AtomicBool,
    drift_unrecoverable_rx: crossbeam_channel::Receiver<DriftUnrecoverable>,
    diagnostics: DiagnosticLog,
}

/// How many [`DiagnosticEvent`]s [`EngineHandle::diagnostics`] keeps around between
/// queries before the oldest start falling off the ring.
pub(crate) const DIAGNOSTIC_LOG_CAPACITY: usize = 64;

impl EngineHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        clock: Arc<MasterClock>,
        catalog: Arc<Catalog>,
        loader: Arc<PcmLoader>,
        channel_count: u16,
        device_sample_rate: u32,
        gain_ramp_frames: u32,
        pitch_locked_overlap_windows: usize,
        command_tx: Sender<RtCommand>,
        registry: VoiceRegistry,
        drift_unrecoverable_rx: crossbeam_channel::Receiver<DriftUnrecoverable>,
        diagnostics_rx: crossbeam_channel::Receiver<DiagnosticEvent>,
    ) -> Self {
        Self {
            clock,
            catalog,
            loader,
            channel_count,
            device_sample_rate,
            gain_ramp_frames,
            pitch_locked_overlap_windows,
            command_tx,
            registry,
            active_ids: Mutex::new(HashSet::new()),
            pitch_lock: AtomicBool::new(false),
            is_playing: AtomicBool::new(false),
            drift_unrecoverable_rx,
            diagnostics: DiagnosticLog::new(diagnostics_rx, DIAGNOSTIC_LOG_CAPACITY),
        }
    }

    pub fn add(&self, id: u32) -> Result<(), AddVoiceError> {
        let mut active_ids = self.active_ids.lock().unwrap();
        if active_ids.contains(&id) {
            return Err(AddVoiceError::AlreadyActive(id));
        }
        if active_ids.len() >= MAX_VOICES {
            return Err(AddVoiceError::CapacityExceeded);
        }
        let entry = self.catalog.get(id)?;
        let buffer = self.loader.load(entry)?;
        let rate_mode = if self.pitch_lock.load(Ordering::SeqCst) {
            RateMode::PitchLocked
        } else {
            RateMode::Varispeed
        };
        let mut voice = Voice::new(
            id,
            entry.native_bpm,
            buffer,
            self.channel_count as usize,
            rate_mode,
            self.pitch_locked_overlap_windows,
            self.gain_ramp_frames,
            1.0,
        );
        voice.reconfigure_rate(self.clock.tempo_bpm(), self.device_sample_rate as f64);

        if self.is_playing.load(Ordering::SeqCst) {
            let start_frame = scheduler::start_frame_while_playing(&self.clock);
            voice.set_start_frame(start_frame);
        }

        self.registry.lock().unwrap().insert(id, voice.telemetry());
        active_ids.insert(id);
        let _ = self.command_tx.send(RtCommand::AddVoice(Box::new(voice)));
        Ok(())
    }

    pub fn remove(&self, id: u32) -> Result<(), VoiceCommandError> {
        let mut active_ids = self.active_ids.lock().unwrap();
        if !active_ids.remove(&id) {
            return Err(VoiceCommandError::NotActive(id));
        }
        self.registry.lock().unwrap().remove(&id);
        let _ = self.command_tx.send(RtCommand::RemoveVoice(id));
        Ok(())
    }

    pub fn set_tempo(&self, bpm: f64) -> Result<(), TempoError> {
        if !(bpm > 0.0 && bpm.is_finite()) {
            return Err(TempoError::OutOfRange(bpm));
        }
        scheduler::apply_tempo_change(&self.clock, bpm);
        for &id in self.active_ids.lock().unwrap().iter() {
            let _ = self.command_tx.send(RtCommand::SetVoiceTempo(id, bpm));
            if self.is_playing.load(Ordering::SeqCst) {
                let start_frame = scheduler::start_frame_while_playing(&self.clock);
                let _ = self.command_tx.send(RtCommand::SetStartFrame { id, start_frame });
            }
        }
        Ok(())
    }

    pub fn set_pitch_lock(&self, enabled: bool) {
        self.pitch_lock.store(enabled, Ordering::SeqCst);
        let mode = if enabled { RateMode::PitchLocked } else { RateMode::Varispeed };
        for &id in self.active_ids.lock().unwrap().iter() {
            let _ = self.command_tx.send(RtCommand::SetVoiceRateMode(id, mode));
        }
    }

    pub fn set_voice_gain(&self, id: u32, gain: f32) -> Result<(), VoiceCommandError> {
        if !self.active_ids.lock().unwrap().contains(&id) {
            return Err(VoiceCommandError::NotActive(id));
        }
        let _ = self.command_tx.send(RtCommand::SetVoiceGain(id, gain.clamp(0.0, 1.0)));
        Ok(())
    }

    pub fn set_master_gain(&self, gain: f32) {
        let _ = self.command_tx.send(RtCommand::SetMasterGain(gain.clamp(0.0, 1.0)));
    }

    /// Assigns a common start frame to every currently-scheduled voice and begins
    /// playback. A no-op if playback is already underway.
    pub fn start(&self) {
        if self.is_playing.swap(true, Ordering::SeqCst) {
            return;
        }
        let start_frame = scheduler::start_frame_for_cold_start(&self.clock);
        for &id in self.active_ids.lock().unwrap().iter() {
            let _ = self.command_tx.send(RtCommand::SetStartFrame { id, start_frame });
        }
    }

    /// Fades out and detaches every active voice; playback state drops immediately
    /// even though the audio-thread fade continues for up to the configured ramp
    /// length.
    pub fn stop(&self) {
        self.is_playing.store(false, Ordering::SeqCst);
        let mut active_ids = self.active_ids.lock().unwrap();
        for id in active_ids.drain() {
            self.registry.lock().unwrap().remove(&id);
            let _ = self.command_tx.send(RtCommand::RemoveVoice(id));
        }
    }

    pub fn global_phase(&self) -> f64 {
        self.clock.current_phase()
    }

    pub fn voice_phase(&self, id: u32) -> Option<f64> {
        let registry = self.registry.lock().unwrap();
        let telemetry = registry.get(&id)?;
        Some(self.clock.loop_progress_from(telemetry.start_frame()))
    }

    pub fn active_voices(&self) -> Vec<u32> {
        self.active_ids.lock().unwrap().iter().copied().collect()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    pub fn tempo(&self) -> f64 {
        self.clock.tempo_bpm()
    }

    /// Drains and returns any voices the drift monitor gave up on since the last call.
    pub fn take_drift_unrecoverable(&self) -> Vec<DriftUnrecoverable> {
        self.drift_unrecoverable_rx.try_iter().collect()
    }

    /// Host/stream-level hiccups (not render-path ones) reported since this engine was
    /// started, oldest first, capped at [`DIAGNOSTIC_LOG_CAPACITY`] entries.
    pub fn diagnostics(&self) -> Vec<DiagnosticEvent> {
        self.diagnostics.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, MusicalKey, ResourceHandle};
    use crate::config::EngineConfig;
    use crate::loader::{PcmBuffer, PcmDecoder};
    use std::collections::HashMap;

    struct SilentDecoder;
    impl PcmDecoder for SilentDecoder {
        fn decode(&self, entry: &CatalogEntry) -> Result<PcmBuffer, crate::error::LoaderError> {
            let frames = (entry.natural_duration_secs() * 48000.0).round() as usize;
            Ok(PcmBuffer {
                sample_rate: 48000,
                channel_count: 1,
                channels: vec![vec![0.0; frames]],
            })
        }
    }

    fn handle() -> EngineHandle {
        let entry = CatalogEntry {
            id: 1,
            title: "t".into(),
            key: MusicalKey::new(0),
            native_bpm: 84.0,
            resource: ResourceHandle("r".into()),
        };
        let duration = entry.natural_duration_secs();
        let catalog = Arc::new(Catalog::build([(entry, duration)]).unwrap());
        let loader = Arc::new(PcmLoader::new(Arc::new(SilentDecoder)));
        let clock = Arc::new(MasterClock::new(48000, 84.0));
        let config = EngineConfig::default();
        let (command_tx, _command_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
        let (_drift_tx, drift_rx) = crossbeam_channel::unbounded();
        let (_diagnostics_tx, diagnostics_rx) = crate::diagnostics::channel(8);
        let registry: VoiceRegistry = Arc::new(Mutex::new(HashMap::new()));
        EngineHandle::new(
            clock,
            catalog,
            loader,
            2,
            48000,
            (config.gain_ramp_ms / 1000.0 * 48000.0) as u32,
            config.pitch_locked_overlap_windows,
            command_tx,
            registry,
            drift_rx,
            diagnostics_rx,
        )
    }

    #[test]
    fn add_rejects_unknown_id() {
        let h = handle();
        assert!(matches!(h.add(99), Err(AddVoiceError::NotFound(_))));
    }

    #[test]
    fn add_then_add_again_is_rejected() {
        let h = handle();
        h.add(1).unwrap();
        assert!(matches!(h.add(1), Err(AddVoiceError::AlreadyActive(1))));
    }

    #[test]
    fn fifth_add_is_capacity_exceeded() {
        let h = handle();
        h.add(1).unwrap();
        // Reuse the same catalog id isn't allowed, so simulate capacity directly.
        for id in 2..=4 {
            h.active_ids.lock().unwrap().insert(id);
        }
        assert!(matches!(h.add(1), Err(AddVoiceError::AlreadyActive(1))));
        assert!(matches!(h.add(5), Err(AddVoiceError::CapacityExceeded)));
    }

    #[test]
    fn remove_unknown_is_not_active() {
        let h = handle();
        assert!(matches!(h.remove(1), Err(VoiceCommandError::NotActive(1))));
    }

    #[test]
    fn remove_is_idempotent() {
        let h = handle();
        h.add(1).unwrap();
        h.remove(1).unwrap();
        assert!(matches!(h.remove(1), Err(VoiceCommandError::NotActive(1))));
    }

    #[test]
    fn set_tempo_rejects_nonpositive() {
        let h = handle();
        assert!(matches!(h.set_tempo(0.0), Err(TempoError::OutOfRange(_))));
        assert!(matches!(h.set_tempo(-1.0), Err(TempoError::OutOfRange(_))));
    }

    #[test]
    fn start_is_idempotent_while_already_playing() {
        let h = handle();
        h.start();
        assert!(h.is_playing());
        h.start();
        assert!(h.is_playing());
    }

    #[test]
    fn voice_phase_unknown_for_inactive_id() {
        let h = handle();
        assert_eq!(h.voice_phase(1), None);
    }

    #[test]
    fn diagnostics_starts_empty() {
        let h = handle();
        assert!(h.diagnostics().is_empty());
    }
}
