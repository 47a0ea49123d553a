//! Hann STFT magnitude spectrogram in dB.

use crate::fft::{self, FftEngine};
use crate::LOG_EPSILON;
use std::ops::Range;

/// Magnitude spectrogram in dB, time-major (`frames[t][bin]`).
///
/// Only the `nfft / 2` lowest bins are kept; the Nyquist bin is dropped so
/// the bin grid matches an `nfft`-point half-spectrum exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    n_bins: usize,
    bin_hz: f32,
}

impl Spectrogram {
    /// STFT of `signal` with an `nfft`-point Hann window and a hop of
    /// `nfft * (1 - overlap)` samples. A signal shorter than one window
    /// yields a spectrogram with zero frames rather than an error.
    pub fn compute(
        engine: &mut FftEngine,
        signal: &[f32],
        sample_rate: u32,
        nfft: usize,
        overlap: f32,
    ) -> Self {
        let n_bins = nfft / 2;
        let bin_hz = sample_rate as f32 / nfft as f32;
        let hop = ((nfft as f32 * (1.0 - overlap)).round() as usize).max(1);
        let window = fft::hann(nfft);

        let mut frames = Vec::new();
        if signal.len() >= nfft {
            let mut segment = vec![0.0f32; nfft];
            let mut start = 0;
            while start + nfft <= signal.len() {
                for (dst, (sample, w)) in segment
                    .iter_mut()
                    .zip(signal[start..start + nfft].iter().zip(&window))
                {
                    *dst = sample * w;
                }
                let spectrum = engine.forward(&segment, nfft);
                let frame: Vec<f32> = spectrum[..n_bins]
                    .iter()
                    .map(|bin| 20.0 * (bin.norm() + LOG_EPSILON).log10())
                    .collect();
                frames.push(frame);
                start += hop;
            }
        }

        Self {
            frames,
            n_bins,
            bin_hz,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    pub fn value(&self, frame: usize, bin: usize) -> f32 {
        self.frames[frame][bin]
    }

    /// Bin index range covering `[min_hz, max_hz]`: the lower bound is the
    /// first bin at or above `min_hz`, the upper bound the first bin above
    /// `max_hz`, both clamped to the kept bins.
    pub fn band_bins(&self, min_hz: f32, max_hz: f32) -> Range<usize> {
        let lo = (0..self.n_bins).position(|i| i as f32 * self.bin_hz >= min_hz);
        let Some(lo) = lo else {
            return self.n_bins..self.n_bins;
        };
        let hi = (lo..self.n_bins)
            .position(|i| i as f32 * self.bin_hz > max_hz)
            .map(|offset| lo + offset)
            .unwrap_or(self.n_bins);
        lo..hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn frame_count_follows_hop() {
        let mut engine = FftEngine::new();
        let signal = sine(1000.0, 48_000, 48_000);
        let spec = Spectrogram::compute(&mut engine, &signal, 48_000, 512, 0.5);
        // starts at 0, 256, ... while start + 512 <= len
        assert_eq!(spec.n_frames(), (48_000 - 512) / 256 + 1);
        assert_eq!(spec.n_bins(), 256);
    }

    #[test]
    fn short_signal_yields_no_frames() {
        let mut engine = FftEngine::new();
        let spec = Spectrogram::compute(&mut engine, &[0.0; 100], 48_000, 512, 0.5);
        assert_eq!(spec.n_frames(), 0);
        assert_eq!(spec.n_bins(), 256);
    }

    #[test]
    fn tone_peaks_in_matching_bin() {
        let mut engine = FftEngine::new();
        let sample_rate = 192_000;
        let signal = sine(12_000.0, sample_rate, 8192);
        let spec = Spectrogram::compute(&mut engine, &signal, sample_rate, 512, 0.5);
        let expected_bin = (12_000.0 / spec.bin_hz()).round() as usize;
        let frame = 0;
        let peak_bin = (0..spec.n_bins())
            .max_by(|&a, &b| {
                spec.value(frame, a)
                    .partial_cmp(&spec.value(frame, b))
                    .unwrap()
            })
            .unwrap();
        assert_eq!(peak_bin, expected_bin);
    }

    #[test]
    fn band_bins_bounds_are_inclusive() {
        let mut engine = FftEngine::new();
        let spec = Spectrogram::compute(&mut engine, &[0.0; 1024], 192_000, 512, 0.5);
        // bin spacing is 375 Hz
        let band = spec.band_bins(5000.0, 25_000.0);
        assert_eq!(band.start, 14); // 14 * 375 = 5250, first bin >= 5000
        assert_eq!(band.end, 67); // 66 * 375 = 24750 is kept, 67 * 375 > 25000
        let empty = spec.band_bins(97_000.0, 98_000.0);
        assert!(empty.is_empty());
    }
}
