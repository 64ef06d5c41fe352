//! The immutable table of loop metadata.
//!
//! The catalog never changes after construction; lookups require no coordination
//! between threads since the table is only ever read.

use crate::error::CatalogError;
use std::collections::HashMap;

pub const BEATS_PER_BAR: u32 = 4;
pub const BARS_PER_LOOP: u32 = 16;
pub const BEATS_PER_LOOP: u32 = BEATS_PER_BAR * BARS_PER_LOOP;

/// One of the twelve chromatic pitch classes, C = 0.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, serde::Serialize, serde::Deserialize)]
pub struct MusicalKey(u8);

impl MusicalKey {
    pub fn new(chroma: u8) -> Self {
        assert!(chroma < 12, "chroma must be in 0..=11, got {chroma}");
        Self(chroma)
    }

    pub fn chroma(self) -> u8 {
        self.0
    }
}

/// An opaque handle the [`crate::loader::PcmLoader`] can resolve into PCM data. The
/// catalog never interprets it; how it resolves is entirely up to the loader.
#[derive(Clone, Eq, PartialEq, Debug, Hash, derive_more::Display, serde::Serialize, serde::Deserialize)]
pub struct ResourceHandle(pub String);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub title: String,
    pub key: MusicalKey,
    pub native_bpm: f64,
    pub resource: ResourceHandle,
}

impl CatalogEntry {
    /// The natural duration of this entry's 16-bar, 4-beats-per-bar loop.
    pub fn natural_duration_secs(&self) -> f64 {
        BEATS_PER_LOOP as f64 * 60.0 / self.native_bpm
    }
}

/// Read-only table of catalog entries, keyed by their stable integer id.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<u32, CatalogEntry>,
}

/// Entries must match the 16-bar-at-native-tempo duration invariant within this
/// tolerance before they are accepted into the catalog.
const DURATION_TOLERANCE_SECS: f64 = 0.1;

/// Convenience for embedders that keep their loop metadata as a JSON array of
/// [`CatalogEntry`] on disk rather than constructing entries in code. Parsing is the
/// only thing this does — duration validation still happens in [`Catalog::build`],
/// since that needs an actually-decoded duration this function has no way to produce.
pub fn parse_catalog_entries(json: &str) -> serde_json::Result<Vec<CatalogEntry>> {
    serde_json::from_str(json)
}

impl Catalog {
    /// Builds a catalog from entries, validating each against the duration invariant
    /// using its caller-supplied actual duration (typically obtained once at startup
    /// from file metadata, without a full decode).
    pub fn build(
        entries: impl IntoIterator<Item = (CatalogEntry, f64)>,
    ) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for (entry, actual_duration_secs) in entries {
            let expected = entry.natural_duration_secs();
            if (actual_duration_secs - expected).abs() > DURATION_TOLERANCE_SECS {
                return Err(CatalogError::DurationMismatch {
                    id: entry.id,
                    native_bpm: entry.native_bpm,
                    expected,
                    actual: actual_duration_secs,
                });
            }
            map.insert(entry.id, entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, id: u32) -> Result<&CatalogEntry, CatalogError> {
        self.entries.get(&id).ok_or(CatalogError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
