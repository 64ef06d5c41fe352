//! Pitch-locked rate stage: overlap-add time-stretching that changes tempo without
//! changing pitch. A small, single-purpose transform sitting in the supplier chain
//! with a quality knob, in the same shape as the other stages in this module.
//!
//! Quality knob: `overlap_windows` grains overlap at any position. Higher values cost
//! more CPU per frame but smooth out the seams between grains.

use crate::rt::supplier::looper::Looper;

const GRAIN_LEN: usize = 2048;

#[derive(Debug, Clone)]
pub struct TimeStretcher {
    channel_count: usize,
    hop_out: usize,
    hop_in: f64,
    window: Vec<f32>,
    acc: Vec<Vec<f32>>,
    norm: Vec<f32>,
    pending: Vec<Vec<f32>>,
    pending_pos: usize,
    native_pos: f64,
    grain: Vec<f32>,
}

impl TimeStretcher {
    pub fn new(channel_count: usize, overlap_windows: usize) -> Self {
        let overlap_windows = overlap_windows.max(1);
        let hop_out = (GRAIN_LEN / overlap_windows).max(1);
        let window = hann_window(GRAIN_LEN);
        Self {
            channel_count,
            hop_out,
            hop_in: hop_out as f64,
            window,
            acc: vec![vec![0.0; GRAIN_LEN]; channel_count],
            norm: vec![0.0; GRAIN_LEN],
            pending: vec![vec![0.0; hop_out]; channel_count],
            pending_pos: hop_out,
            native_pos: 0.0,
            grain: vec![0.0; channel_count],
        }
    }

    /// `rate` is the amount of native material consumed per unit of output time
    /// (`tempo_bpm / native_bpm`).
    pub fn set_rate(&mut self, rate: f64) {
        self.hop_in = self.hop_out as f64 * rate.max(0.0001);
    }

    pub fn native_position(&self) -> f64 {
        self.native_pos
    }

    pub fn seek(&mut self, native_position: f64) {
        self.native_pos = native_position;
        for channel in &mut self.acc {
            channel.fill(0.0);
        }
        self.norm.fill(0.0);
        self.pending_pos = self.hop_out;
    }

    pub fn render_frame(&mut self, looper: &Looper, out: &mut [f32]) {
        if self.pending_pos >= self.hop_out {
            self.run_grain_cycle(looper);
        }
        for (c, slot) in out.iter_mut().enumerate() {
            *slot = self.pending[c.min(self.channel_count - 1)][self.pending_pos];
        }
        self.pending_pos += 1;
    }

    fn run_grain_cycle(&mut self, looper: &Looper) {
        let hop_out = self.hop_out;
        for c in 0..self.channel_count {
            let acc = &mut self.acc[c];
            let emitted = &mut self.pending[c];
            for i in 0..hop_out {
                let denom = self.norm[i].max(1e-6);
                emitted[i] = acc[i] / denom;
            }
            acc.copy_within(hop_out.., 0);
            acc[GRAIN_LEN - hop_out..].fill(0.0);
        }
        self.norm.copy_within(hop_out.., 0);
        self.norm[GRAIN_LEN - hop_out..].fill(0.0);

        for i in 0..GRAIN_LEN {
            looper.read(self.native_pos + i as f64, &mut self.grain);
            let w = self.window[i];
            for c in 0..self.channel_count {
                self.acc[c][i] += self.grain[c] * w;
            }
            self.norm[i] += w * w;
        }
        self.native_pos += self.hop_in;
        self.pending_pos = 0;
    }
}

fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|n| {
            let x = std::f32::consts::PI * 2.0 * n as f32 / (len - 1) as f32;
            0.5 - 0.5 * x.cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::supplier::pcm_source::PcmSource;
    use std::sync::Arc;

    fn constant_looper(value: f32, len: usize) -> Looper {
        Looper::new(PcmSource::new(Arc::new(crate::loader::PcmBuffer {
            sample_rate: 48000,
            channel_count: 1,
            channels: vec![vec![value; len]],
        })))
    }

    #[test]
    fn passes_through_constant_signal_near_unity_gain() {
        let looper = constant_looper(1.0, GRAIN_LEN * 4);
        let mut stretcher = TimeStretcher::new(1, 8);
        stretcher.set_rate(1.0);
        let mut out = [0.0f32];
        // Skip the first grain, whose accumulation hasn't stabilized yet.
        for _ in 0..(GRAIN_LEN * 2) {
            stretcher.render_frame(&looper, &mut out);
        }
        assert!((out[0] - 1.0).abs() < 0.05);
    }

    #[test]
    fn seek_resets_accumulation() {
        let looper = constant_looper(1.0, GRAIN_LEN * 4);
        let mut stretcher = TimeStretcher::new(1, 8);
        let mut out = [0.0f32];
        stretcher.render_frame(&looper, &mut out);
        stretcher.seek(0.0);
        assert_eq!(stretcher.pending_pos, stretcher.hop_out);
    }
}
