//! The master clock.
//!
//! Owns the single time base the whole engine reasons about: the device's own render
//! frame counter. Derives a fluent beat/phase position from an atomically-advanced
//! sample counter plus the tempo/position pair recorded at the last tempo change,
//! rather than trusting any wall-clock or host-transport reading. The "position
//! recorded at the last tempo change" is `frame_origin` (musical frame 0 on the device
//! timeline); everything else is frames-per-beat and frames-per-loop arithmetic on top
//! of that one reference point.

use crate::catalog::BEATS_PER_LOOP;
use atomic::Atomic;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

static_assertions::assert_impl_all!(Atomic<f64>: Send, Sync);

const ORD: Ordering = Ordering::SeqCst;

#[derive(Debug)]
pub struct MasterClock {
    device_sample_rate: AtomicU32,
    /// Last frame index observed by the audio callback. Off-callback readers get this
    /// snapshot rather than a live value — there is no "more current" answer for them.
    now_frame: AtomicI64,
    tempo_bpm: Atomic<f64>,
    frame_origin: AtomicI64,
}

impl MasterClock {
    pub fn new(device_sample_rate: u32, initial_tempo_bpm: f64) -> Self {
        Self {
            device_sample_rate: AtomicU32::new(device_sample_rate),
            now_frame: AtomicI64::new(0),
            tempo_bpm: Atomic::new(initial_tempo_bpm),
            frame_origin: AtomicI64::new(0),
        }
    }

    /// Called by the audio callback only, once per block, with the frame index the
    /// host reports for the start of that block.
    pub fn publish_now_frame(&self, device_frame: i64) {
        self.now_frame.store(device_frame, ORD);
    }

    pub fn now_frame(&self) -> i64 {
        self.now_frame.load(ORD)
    }

    pub fn device_sample_rate(&self) -> f64 {
        self.device_sample_rate.load(ORD) as f64
    }

    /// Corrects the device sample rate used for every frames-per-beat/phase
    /// computation. Meant to be called once, before playback starts, once the actual
    /// host device's rate is known (it may differ from whatever rate the clock was
    /// constructed with as a placeholder).
    pub fn set_device_sample_rate(&self, sample_rate: u32) {
        self.device_sample_rate.store(sample_rate, ORD);
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm.load(ORD)
    }

    pub fn frame_origin(&self) -> i64 {
        self.frame_origin.load(ORD)
    }

    pub fn frames_per_beat(&self) -> f64 {
        self.device_sample_rate() * 60.0 / self.tempo_bpm()
    }

    pub fn frames_per_loop(&self) -> f64 {
        self.frames_per_beat() * BEATS_PER_LOOP as f64
    }

    pub fn current_beat(&self) -> f64 {
        (self.now_frame() - self.frame_origin()) as f64 / self.frames_per_beat()
    }

    /// Fractional position within the loop, in `[0, 1)`. A phase that lands exactly on
    /// an integer is folded to `0.0`, never `1.0`.
    pub fn current_phase(&self) -> f64 {
        phase_of_beat(self.current_beat())
    }

    pub fn frame_for_beat(&self, beat: f64) -> i64 {
        self.frame_origin() + (beat * self.frames_per_beat()).round() as i64
    }

    /// Smallest frame `>= now_frame` whose beat position is an integer multiple of
    /// `division` beats (`division = 64.0` for a whole-loop boundary).
    pub fn next_beat_boundary(&self, division: f64) -> i64 {
        let now = self.now_frame();
        let current_beat = self.current_beat();
        let next_multiple = (current_beat / division).floor() * division + division;
        let candidate = self.frame_for_beat(next_multiple);
        if candidate > now {
            candidate
        } else {
            self.frame_for_beat(next_multiple + division)
        }
    }

    /// Repoints `frame_origin` so that the musical phase observed at `now_frame` does
    /// not jump across the tempo change. Returns `(f_now, phi_old)` so the caller (the
    /// scheduler) can reschedule every active voice from the same snapshot.
    pub fn set_tempo(&self, new_bpm: f64) -> (i64, f64) {
        let f_now = self.now_frame();
        let phi_old = self.current_phase();
        self.tempo_bpm.store(new_bpm, ORD);
        let frames_per_loop_new = self.frames_per_loop();
        let new_origin = f_now - (phi_old * frames_per_loop_new).round() as i64;
        self.frame_origin.store(new_origin, ORD);
        (f_now, phi_old)
    }

    /// Used only when the mix graph transitions from silent to playing: pins
    /// `frame_origin` to `frame`. Only valid while no voice is scheduled yet.
    pub fn set_frame_origin(&self, frame: i64) {
        self.frame_origin.store(frame, ORD);
    }

    /// `((now_frame - start_frame) mod frames_per_loop) / frames_per_loop`.
    pub fn loop_progress_from(&self, start_frame: i64) -> f64 {
        let frames_per_loop = self.frames_per_loop();
        let elapsed = (self.now_frame() - start_frame) as f64;
        rem_euclid(elapsed, frames_per_loop) / frames_per_loop
    }
}

fn phase_of_beat(beat: f64) -> f64 {
    let loop_pos = beat / BEATS_PER_LOOP as f64;
    let phase = loop_pos.fract();
    if phase < 0.0 {
        phase + 1.0
    } else if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

fn rem_euclid(value: f64, modulus: f64) -> f64 {
    let r = value % modulus;
    if r < 0.0 {
        r + modulus
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_is_zero_at_origin() {
        let clock = MasterClock::new(48000, 84.0);
        clock.publish_now_frame(0);
        assert_eq!(clock.current_phase(), 0.0);
    }

    #[test]
    fn phase_advances_with_frames() {
        let clock = MasterClock::new(48000, 84.0);
        let frames_per_beat = clock.frames_per_beat();
        clock.publish_now_frame(frames_per_beat.round() as i64);
        assert!((clock.current_beat() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn next_beat_boundary_is_strictly_ahead() {
        let clock = MasterClock::new(48000, 84.0);
        clock.publish_now_frame(10);
        let boundary = clock.next_beat_boundary(1.0);
        assert!(boundary > 10);
    }

    #[test]
    fn set_tempo_preserves_phase_at_f_now() {
        let clock = MasterClock::new(48000, 84.0);
        let frames_per_beat = clock.frames_per_beat();
        clock.publish_now_frame((frames_per_beat * 10.0).round() as i64);
        let phi_before = clock.current_phase();
        clock.set_tempo(102.0);
        let phi_after = clock.current_phase();
        assert!((phi_before - phi_after).abs() < 1.0 / clock.frames_per_loop());
    }
}
