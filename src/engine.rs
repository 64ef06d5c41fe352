//! Top-level orchestrator. Wires the catalog, the PCM loader, the master clock, the
//! drift monitor, the mix graph, and (optionally) a real output device into one handle
//! an embedder can hold onto.

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::control::{EngineHandle, DIAGNOSTIC_LOG_CAPACITY};
use crate::diagnostics;
use crate::drift::DriftMonitor;
use crate::host::{AudioHostContract, CpalHost, HostError};
use crate::loader::{PcmDecoder, PcmLoader};
use crate::rt::audio_hook::AudioHook;
use crate::rt::mix_graph::MixGraph;
use crate::telemetry::VoiceRegistry;
use crate::timeline::MasterClock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Owns every long-lived piece of the engine. Dropping it stops the output stream and
/// leaves the drift monitor thread running in the background (it exits silently once
/// its command channel's receiver is gone).
pub struct Engine {
    handle: Arc<EngineHandle>,
    _drift_thread: JoinHandle<()>,
    _host: CpalHost,
}

impl Engine {
    /// Starts the engine against the system's default output device.
    pub fn start(
        config: EngineConfig,
        catalog: Catalog,
        decoder: Arc<dyn PcmDecoder>,
        initial_tempo_bpm: f64,
    ) -> Result<Self, HostError> {
        let catalog = Arc::new(catalog);
        let loader = Arc::new(PcmLoader::new(decoder));
        let registry: VoiceRegistry = Arc::new(Mutex::new(HashMap::new()));
        let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
        let (drift_unrecoverable_tx, drift_unrecoverable_rx) = crossbeam_channel::bounded(16);
        let (diagnostics_tx, diagnostics_rx) = diagnostics::channel(DIAGNOSTIC_LOG_CAPACITY);

        // The device's actual sample rate is only known once `CpalHost::spawn` opens
        // it below; this placeholder is corrected inside `build_hook`, before the
        // stream starts and before the drift monitor thread is spawned.
        let clock = Arc::new(MasterClock::new(44100, initial_tempo_bpm));

        let drift_monitor = DriftMonitor::new(
            Arc::clone(&clock),
            Arc::clone(&registry),
            command_tx.clone(),
            config.drift_threshold_ms,
            Duration::from_millis(config.drift_poll_interval_ms),
            Duration::from_millis(config.drift_correction_throttle_ms),
        );

        let clock_for_hook = Arc::clone(&clock);
        let host = CpalHost::spawn(
            move |device_sample_rate, device_channel_count| {
                clock_for_hook.set_device_sample_rate(device_sample_rate);
                let graph = MixGraph::new(
                    clock_for_hook,
                    command_rx,
                    drift_unrecoverable_tx,
                    device_channel_count as usize,
                );
                AudioHook::new(graph)
            },
            diagnostics_tx,
        )?;

        let handle = Arc::new(EngineHandle::new(
            clock,
            catalog,
            loader,
            host.channel_count(),
            host.sample_rate(),
            (config.gain_ramp_ms / 1000.0 * host.sample_rate() as f64) as u32,
            config.pitch_locked_overlap_windows,
            command_tx,
            registry,
            drift_unrecoverable_rx,
            diagnostics_rx,
        ));

        let drift_thread = drift_monitor.spawn();

        Ok(Self {
            handle,
            _drift_thread: drift_thread,
            _host: host,
        })
    }

    pub fn handle(&self) -> Arc<EngineHandle> {
        Arc::clone(&self.handle)
    }
}
