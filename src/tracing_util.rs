//! Logging from real-time contexts.
//!
//! The audio callback is not allowed to allocate. `tracing`'s formatting machinery
//! sometimes does, so every log statement reachable from the callback goes through
//! these macros, which wrap the call in [`assert_no_alloc::permit_alloc`] to make the
//! exception explicit rather than silently widening the allocation guard.

#[macro_export]
macro_rules! rt_debug {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::debug!($($tts)*);
        });
    };
}

#[macro_export]
macro_rules! rt_warn {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::warn!($($tts)*);
        });
    };
}

#[macro_export]
macro_rules! rt_error {
    ($($tts:tt)*) => {
        assert_no_alloc::permit_alloc(|| {
            tracing::error!($($tts)*);
        });
    };
}
