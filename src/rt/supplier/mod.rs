pub mod amplifier;
pub mod chain;
pub mod fader;
pub mod looper;
pub mod pcm_source;
pub mod resampler;
pub mod time_stretcher;

pub use chain::{RateMode, SupplierChain};
