pub mod error;
pub mod fft;
pub mod filter;
pub mod imaging;
pub mod spectrogram;
pub mod tdoa;
pub mod trigger;

/// Added to every magnitude before taking a log so silence maps to a deep
/// but finite floor instead of `-inf`.
pub(crate) const LOG_EPSILON: f32 = 1e-12;
