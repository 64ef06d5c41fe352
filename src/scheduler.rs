//! Decides the start frame for a voice joining the mix, or rejoining it after a tempo
//! or pitch-lock change, so its musical phase lands exactly on the global phase.

use crate::timeline::MasterClock;

/// Frame to pin every currently-scheduled voice to when transitioning the graph from
/// silent to playing: `frame_origin` is reset to `now_frame`, so phase 0 starts now.
pub fn start_frame_for_cold_start(clock: &MasterClock) -> i64 {
    let frame = clock.now_frame();
    clock.set_frame_origin(frame);
    frame
}

/// Start frame for a voice joining (or rejoining after a rate/tempo change) while the
/// graph is already playing: solves for the `start_frame` whose phase at `now_frame`
/// equals the clock's current phase. May land in the past — the voice begins mid-loop
/// at the right offset and wraps normally from there.
pub fn start_frame_while_playing(clock: &MasterClock) -> i64 {
    let phi = clock.current_phase();
    let f_now = clock.now_frame();
    f_now - (phi * clock.frames_per_loop()).round() as i64
}

/// Applies a tempo change and returns the snapshot `(f_now, phi_old)` the caller used
/// to recompute every active voice's rate and start frame from the same instant.
pub fn apply_tempo_change(clock: &MasterClock, new_bpm: f64) -> (i64, f64) {
    clock.set_tempo(new_bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_pins_origin_to_now() {
        let clock = MasterClock::new(48000, 84.0);
        clock.publish_now_frame(12345);
        let start = start_frame_for_cold_start(&clock);
        assert_eq!(start, 12345);
        assert_eq!(clock.frame_origin(), 12345);
    }

    #[test]
    fn joining_while_playing_matches_current_phase() {
        let clock = MasterClock::new(48000, 84.0);
        let frames_per_beat = clock.frames_per_beat();
        clock.publish_now_frame((frames_per_beat * 17.5).round() as i64);
        let start = start_frame_while_playing(&clock);
        let implied_phase = clock.loop_progress_from(start);
        assert!((implied_phase - clock.current_phase()).abs() < 1.0 / clock.frames_per_loop());
    }
}
