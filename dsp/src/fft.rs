//! Real-valued FFT plumbing shared by the spectrogram, trigger and TDOA
//! paths. Plans are cached inside the engine so repeated transforms of the
//! same length reuse them.

use num_complex::Complex;
use realfft::RealFftPlanner;

pub struct FftEngine {
    planner: RealFftPlanner<f32>,
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FftEngine {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    /// Forward rFFT of `input`, zero-padded (or truncated) to `nfft` points.
    /// Returns the `nfft / 2 + 1` unique spectrum bins.
    pub fn forward(&mut self, input: &[f32], nfft: usize) -> Vec<Complex<f32>> {
        let fft = self.planner.plan_fft_forward(nfft);
        let mut time = fft.make_input_vec();
        let copied = input.len().min(nfft);
        time[..copied].copy_from_slice(&input[..copied]);
        let mut spectrum = fft.make_output_vec();
        fft.process(&mut time, &mut spectrum)
            .expect("buffers are sized by the planner");
        spectrum
    }

    /// Inverse rFFT back to `nfft` real samples, normalized by `1 / nfft`.
    pub fn inverse(&mut self, spectrum: &[Complex<f32>], nfft: usize) -> Vec<f32> {
        let ifft = self.planner.plan_fft_inverse(nfft);
        let mut input = ifft.make_input_vec();
        let copied = spectrum.len().min(input.len());
        input[..copied].copy_from_slice(&spectrum[..copied]);
        // realfft rejects spectra whose DC or Nyquist bins carry residual
        // imaginary parts; those of a real signal are zero up to rounding
        if let Some(first) = input.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = input.last_mut() {
            last.im = 0.0;
        }
        let mut time = ifft.make_output_vec();
        ifft.process(&mut input, &mut time)
            .expect("buffers are sized by the planner");
        let scale = 1.0 / nfft as f32;
        for sample in &mut time {
            *sample *= scale;
        }
        time
    }
}

/// Symmetric Hann window of `len` points.
pub fn hann(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => apodize::hanning_iter(len).map(|w| w as f32).collect(),
    }
}

/// Center frequency in Hz of rFFT bin `index` for an `nfft`-point transform.
pub fn bin_frequency(index: usize, nfft: usize, sample_rate: u32) -> f32 {
    index as f32 * sample_rate as f32 / nfft as f32
}
