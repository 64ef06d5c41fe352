pub mod catalog;
pub mod config;
pub mod control;
pub mod conversion_util;
pub mod diagnostics;
pub mod drift;
pub mod engine;
pub mod error;
pub mod host;
pub mod loader;
pub mod metrics_util;
pub mod rt;
pub mod scheduler;
pub mod telemetry;
pub mod timeline;
pub mod tracing_util;

pub use catalog::{Catalog, CatalogEntry, MusicalKey, ResourceHandle};
pub use config::EngineConfig;
pub use control::EngineHandle;
pub use diagnostics::DiagnosticEvent;
pub use engine::Engine;
pub use error::{AddVoiceError, CatalogError, DriftUnrecoverable, LoaderError, TempoError, VoiceCommandError};
pub use loader::{PcmBuffer, PcmDecoder};

/// Must be called once, before the first [`Engine::start`], if the embedder wants
/// render-path metrics recorded (gated on the `LOOPMIX_METRICS` environment variable).
pub fn init() {
    metrics_util::init_metrics();
}
