//! Opt-in callback-duration metrics, recorded off the audio thread.
//!
//! Metrics are collected only when `LOOPMIX_METRICS` is set. Recording is deferred to a
//! background thread because the `metrics` crate's recorder can allocate, and the audio
//! callback that measures the duration must not.

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;
use std::thread;
use std::time::{Duration, Instant};

static METRICS_ENABLED: Lazy<bool> = Lazy::new(|| std::env::var("LOOPMIX_METRICS").is_ok());
static METRICS_CHANNEL: Lazy<MetricsChannel> = Lazy::new(MetricsChannel::default);

/// Must be called once, as early as possible, before the audio callback starts running.
pub fn init_metrics() {
    if !*METRICS_ENABLED {
        return;
    }
    let _ = &*METRICS_CHANNEL;
    thread::Builder::new()
        .name(String::from("loopmix metrics"))
        .spawn(move || keep_recording_metrics(METRICS_CHANNEL.receiver.clone()))
        .expect("failed to spawn metrics thread");
}

/// Measures `f` and, if metrics are enabled, records the duration under `id`.
pub fn measure_time<R>(id: &'static str, f: impl FnOnce() -> R) -> R {
    if !*METRICS_ENABLED {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let task = MetricsTask::Histogram {
        id,
        delta: start.elapsed(),
    };
    if METRICS_CHANNEL.sender.try_send(task).is_err() {
        crate::rt_debug!("metrics channel is full, dropping sample");
    }
    result
}

struct MetricsChannel {
    sender: Sender<MetricsTask>,
    receiver: Receiver<MetricsTask>,
}

impl Default for MetricsChannel {
    fn default() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(5000);
        Self { sender, receiver }
    }
}

enum MetricsTask {
    Histogram { id: &'static str, delta: Duration },
}

fn keep_recording_metrics(receiver: Receiver<MetricsTask>) {
    while let Ok(task) = receiver.recv() {
        match task {
            MetricsTask::Histogram { id, delta } => {
                metrics::histogram!(id, delta);
            }
        }
    }
}
