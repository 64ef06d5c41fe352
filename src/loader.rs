//! Produces a decoded PCM buffer for a catalog entry.
//!
//! Decoding compressed source files into raw PCM is out of scope here; this module
//! only defines the buffer shape and the loader contract, plus a deterministic cache
//! so repeated `load` calls on the same entry return byte-identical data without
//! re-decoding.

use crate::catalog::CatalogEntry;
use crate::conversion_util::seconds_to_frames;
use crate::error::LoaderError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Decoded audio, either interleaved or planar, at a known sample rate.
#[derive(Clone, Debug)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Planar: `channels[c][frame]`.
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn duration_secs(&self) -> f64 {
        crate::conversion_util::frames_to_seconds(self.frame_count() as i64, self.sample_rate as f64)
    }
}

/// Given a catalog entry, produces PCM matching its resource handle. Implemented by
/// the embedder's decoder; this crate treats it as a primitive.
pub trait PcmDecoder: Send + Sync {
    fn decode(&self, entry: &CatalogEntry) -> Result<PcmBuffer, LoaderError>;
}

const LENGTH_TOLERANCE_SECS: f64 = 0.1;

/// Caches decoded buffers so repeated `load` calls are deterministic and cheap.
pub struct PcmLoader {
    decoder: Arc<dyn PcmDecoder>,
    cache: Mutex<HashMap<u32, Arc<PcmBuffer>>>,
}

impl PcmLoader {
    pub fn new(decoder: Arc<dyn PcmDecoder>) -> Self {
        Self {
            decoder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn load(&self, entry: &CatalogEntry) -> Result<Arc<PcmBuffer>, LoaderError> {
        if let Some(cached) = self.cache.lock().unwrap().get(&entry.id) {
            return Ok(Arc::clone(cached));
        }
        let buffer = self.decoder.decode(entry)?;
        let expected_frames =
            seconds_to_frames(entry.natural_duration_secs(), buffer.sample_rate as f64) as u64;
        let actual_frames = buffer.frame_count() as u64;
        let tolerance_frames = seconds_to_frames(LENGTH_TOLERANCE_SECS, buffer.sample_rate as f64) as u64;
        if actual_frames.abs_diff(expected_frames) > tolerance_frames {
            return Err(LoaderError::LengthMismatch {
                id: entry.id,
                expected: expected_frames,
                actual: actual_frames,
            });
        }
        let buffer = Arc::new(buffer);
        self.cache
            .lock()
            .unwrap()
            .insert(entry.id, Arc::clone(&buffer));
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MusicalKey, ResourceHandle};

    struct FixedDecoder {
        frame_count: usize,
        sample_rate: u32,
    }

    impl PcmDecoder for FixedDecoder {
        fn decode(&self, _entry: &CatalogEntry) -> Result<PcmBuffer, LoaderError> {
            Ok(PcmBuffer {
                sample_rate: self.sample_rate,
                channel_count: 1,
                channels: vec![vec![0.0; self.frame_count]],
            })
        }
    }

    fn entry(bpm: f64) -> CatalogEntry {
        CatalogEntry {
            id: 1,
            title: "t".into(),
            key: MusicalKey::new(0),
            native_bpm: bpm,
            resource: ResourceHandle("r".into()),
        }
    }

    #[test]
    fn loads_matching_length() {
        let e = entry(84.0);
        let expected_frames = (e.natural_duration_secs() * 48000.0).round() as usize;
        let loader = PcmLoader::new(Arc::new(FixedDecoder {
            frame_count: expected_frames,
            sample_rate: 48000,
        }));
        let buf = loader.load(&e).unwrap();
        assert_eq!(buf.frame_count(), expected_frames);
    }

    #[test]
    fn rejects_length_mismatch() {
        let e = entry(84.0);
        let loader = PcmLoader::new(Arc::new(FixedDecoder {
            frame_count: 10,
            sample_rate: 48000,
        }));
        assert!(matches!(
            loader.load(&e).unwrap_err(),
            LoaderError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn caches_result() {
        let e = entry(84.0);
        let expected_frames = (e.natural_duration_secs() * 48000.0).round() as usize;
        let loader = PcmLoader::new(Arc::new(FixedDecoder {
            frame_count: expected_frames,
            sample_rate: 48000,
        }));
        let a = loader.load(&e).unwrap();
        let b = loader.load(&e).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
