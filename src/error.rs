//! Error types for every fallible boundary in the engine.
//!
//! Boundary-facing errors (what `add`, `remove`, `set_tempo` etc. can return) are
//! `thiserror` enums so embedders can match on them. Errors that never leave the
//! supplier chain use a terse `&'static str`-based result — there's no embedder-facing
//! contract to keep stable for those, so a heavier enum would just be ceremony.

pub type InternalResult<T> = Result<T, &'static str>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("no catalog entry with id {0}")]
    NotFound(u32),
    #[error("catalog entry {id} declares a duration that doesn't match 16 bars at {native_bpm} bpm (expected {expected:.3}s, got {actual:.3}s)")]
    DurationMismatch {
        id: u32,
        native_bpm: f64,
        expected: f64,
        actual: f64,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoaderError {
    #[error("resource for catalog entry {0} could not be located")]
    MissingResource(u32),
    #[error("resource for catalog entry {0} is not in a supported PCM format")]
    UnsupportedFormat(u32),
    #[error("decoded frame count for catalog entry {id} deviates from the expected 16-bar length by more than tolerance (expected {expected} frames, got {actual} frames)")]
    LengthMismatch {
        id: u32,
        expected: u64,
        actual: u64,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AddVoiceError {
    #[error("voice for catalog id {0} is already active")]
    AlreadyActive(u32),
    #[error("mix graph is at capacity (4 active voices)")]
    CapacityExceeded,
    #[error(transparent)]
    NotFound(#[from] CatalogError),
    #[error(transparent)]
    Decode(#[from] LoaderError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VoiceCommandError {
    #[error("no active voice with catalog id {0}")]
    NotActive(u32),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TempoError {
    #[error("tempo {0} bpm is out of range")]
    OutOfRange(f64),
}

/// Surfaced only through [`crate::control::EngineHandle::take_drift_unrecoverable`];
/// never returned synchronously from a command.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DriftUnrecoverable {
    pub loop_id: u32,
}
