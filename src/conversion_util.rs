//! Small, pure frame/second conversions shared by the clock, loader, and supplier
//! chain. Kept free of any state so they're trivial to reason about from inside the
//! audio callback.

pub fn seconds_to_frames(seconds: f64, sample_rate: f64) -> i64 {
    (seconds * sample_rate).round() as i64
}

pub fn frames_to_seconds(frames: i64, sample_rate: f64) -> f64 {
    frames as f64 / sample_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_seconds_and_frames() {
        let f = seconds_to_frames(1.5, 48000.0);
        assert_eq!(f, 72000);
        assert!((frames_to_seconds(f, 48000.0) - 1.5).abs() < 1e-9);
    }
}
