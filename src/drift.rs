//! Off-audio-thread worker that watches each playing voice's rendered position against
//! where it should be, and issues a reschedule when the two diverge too far.

use crate::control::RtCommand;
use crate::rt::voice::VoiceState;
use crate::scheduler;
use crate::telemetry::{VoiceRegistry, VoiceTelemetry};
use crate::timeline::MasterClock;
use crate::{rt_debug, rt_warn};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MAX_CONSECUTIVE_FAILURES: u8 = 3;

#[derive(Debug, Default)]
struct DriftRecord {
    last_correction_at: Option<Instant>,
    consecutive_failed_corrections: u8,
}

pub struct DriftMonitor {
    clock: Arc<MasterClock>,
    registry: VoiceRegistry,
    command_tx: Sender<RtCommand>,
    threshold_ms: f64,
    poll_interval: Duration,
    correction_throttle: Duration,
    records: HashMap<u32, DriftRecord>,
}

impl DriftMonitor {
    pub fn new(
        clock: Arc<MasterClock>,
        registry: VoiceRegistry,
        command_tx: Sender<RtCommand>,
        threshold_ms: f64,
        poll_interval: Duration,
        correction_throttle: Duration,
    ) -> Self {
        Self {
            clock,
            registry,
            command_tx,
            threshold_ms: threshold_ms.max(1.0),
            poll_interval,
            correction_throttle,
            records: HashMap::new(),
        }
    }

    /// Spawns the worker as a named background thread and returns its join handle.
    pub fn spawn(mut self) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("loopmix drift monitor".into())
            .spawn(move || loop {
                self.poll_once();
                std::thread::sleep(self.poll_interval);
            })
            .expect("failed to spawn drift monitor thread")
    }

    fn poll_once(&mut self) {
        let entries: Vec<Arc<VoiceTelemetry>> = match self.registry.lock() {
            Ok(guard) => guard.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for telemetry in entries {
            self.check_voice(&telemetry);
        }
    }

    fn check_voice(&mut self, telemetry: &VoiceTelemetry) {
        if telemetry.state() != VoiceState::Playing {
            return;
        }
        let buffer_frames = telemetry.buffer_frames() as f64;
        if buffer_frames <= 0.0 {
            return;
        }
        let now_frame = self.clock.now_frame();
        let elapsed = (now_frame - telemetry.start_frame()) as f64;
        let expected = (elapsed * telemetry.input_rate()).rem_euclid(buffer_frames);
        let actual = telemetry.native_position().rem_euclid(buffer_frames);
        let raw_diff = (expected - actual).abs();
        let circular_diff = raw_diff.min(buffer_frames - raw_diff);
        let drift_ms = circular_diff / telemetry.native_sample_rate() as f64 * 1000.0;

        let record = self.records.entry(telemetry.id()).or_default();

        if drift_ms <= self.threshold_ms {
            record.consecutive_failed_corrections = 0;
            return;
        }
        let throttled = record
            .last_correction_at
            .map(|at| at.elapsed() < self.correction_throttle)
            .unwrap_or(false);
        if throttled {
            return;
        }

        record.last_correction_at = Some(Instant::now());
        let phase = self.clock.current_phase();
        let new_start_frame = scheduler::start_frame_while_playing(&self.clock);
        rt_debug!(voice_id = telemetry.id(), drift_ms, "correcting voice drift");
        if self
            .command_tx
            .send(RtCommand::Reseek {
                id: telemetry.id(),
                start_frame: new_start_frame,
                phase,
            })
            .is_err()
        {
            return;
        }
        record.consecutive_failed_corrections += 1;
        if record.consecutive_failed_corrections >= MAX_CONSECUTIVE_FAILURES {
            rt_warn!(voice_id = telemetry.id(), "drift unrecoverable, giving up");
            telemetry.mark_unrecoverable_drift();
            let _ = self.command_tx.send(RtCommand::GiveUp(telemetry.id()));
            record.consecutive_failed_corrections = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn registry_with(telemetry: Arc<VoiceTelemetry>) -> VoiceRegistry {
        Arc::new(Mutex::new(HashMap::from([(telemetry.id(), telemetry)])))
    }

    #[test]
    fn no_correction_when_within_threshold() {
        let clock = Arc::new(MasterClock::new(48000, 84.0));
        clock.publish_now_frame(1000);
        let telemetry = VoiceTelemetry::new(1, 48000 * 16, 48000);
        telemetry.publish_schedule(1000, 1.0);
        telemetry.publish(0.0, VoiceState::Playing);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut monitor = DriftMonitor::new(
            clock,
            registry_with(telemetry),
            tx,
            15.0,
            Duration::from_millis(500),
            Duration::from_millis(1000),
        );
        monitor.poll_once();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn large_drift_triggers_a_reseek() {
        let clock = Arc::new(MasterClock::new(48000, 84.0));
        clock.publish_now_frame(48000);
        let telemetry = VoiceTelemetry::new(1, 48000 * 16, 48000);
        telemetry.publish_schedule(0, 1.0);
        telemetry.publish(0.0, VoiceState::Playing);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut monitor = DriftMonitor::new(
            clock,
            registry_with(telemetry),
            tx,
            15.0,
            Duration::from_millis(500),
            Duration::from_millis(1000),
        );
        monitor.poll_once();
        assert!(matches!(rx.try_recv(), Ok(RtCommand::Reseek { id: 1, .. })));
    }
}
