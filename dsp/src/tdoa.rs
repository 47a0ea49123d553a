//! GCC-PHAT time-difference-of-arrival estimation for a two-hydrophone
//! array.

use crate::error::DspError;
use crate::fft::{self, FftEngine};
use crate::filter::Highpass;
use delfi_types::tdoa::{Direction, TdoaEstimate};
use num_complex::Complex;

/// Floor added to the cross-spectrum magnitude before PHAT whitening.
const PHAT_EPSILON: f32 = 1e-10;

#[derive(Debug, Clone, Copy)]
pub struct TdoaParams {
    /// Speed of sound in the medium, m/s (approx. 1460 in seawater).
    pub speed_of_sound: f32,
    /// Hydrophone spacing in meters.
    pub mic_distance: f32,
    /// Cross-spectrum bins outside this band are zeroed.
    pub band_min_hz: f32,
    pub band_max_hz: f32,
    /// Highpass cutoff applied to both channels before correlation.
    pub highpass_cutoff_hz: f32,
    /// Delays smaller than this count as a frontal source.
    pub center_threshold_sec: f32,
    /// Negate the right channel to undo a reversed hydrophone polarity.
    pub invert_phase: bool,
}

pub struct TdoaEstimator {
    sample_rate: u32,
    params: TdoaParams,
    highpass: Highpass,
    fft: FftEngine,
}

impl TdoaEstimator {
    pub fn new(sample_rate: u32, params: TdoaParams) -> Self {
        let highpass = Highpass::new(sample_rate, params.highpass_cutoff_hz);
        Self {
            sample_rate,
            params,
            highpass,
            fft: FftEngine::new(),
        }
    }

    /// Largest physically possible delay in samples, plus one lag of slack
    /// for quantization.
    fn max_lag_samples(&self) -> usize {
        let lag = (self.sample_rate as f32 * self.params.mic_distance / self.params.speed_of_sound)
            .floor();
        if lag.is_finite() && lag >= 0.0 {
            lag as usize + 1
        } else {
            usize::MAX
        }
    }

    /// GCC-PHAT over two equal-length slices.
    ///
    /// The cross-spectrum is `conj(X) * Y`, which puts the correlation peak
    /// at a positive lag when the left channel leads, so a positive
    /// `tdoa_sec` always means the source sits to the left.
    #[tracing::instrument(skip_all)]
    pub fn estimate(&mut self, left: &[f32], right: &[f32]) -> Result<TdoaEstimate, DspError> {
        if left.len() != right.len() {
            return Err(DspError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let m = left.len();
        if m < 2 {
            return Err(DspError::WindowTooShort(m));
        }

        let left = self.highpass.filtfilt(left);
        let mut right = self.highpass.filtfilt(right);
        if self.params.invert_phase {
            for sample in &mut right {
                *sample = -*sample;
            }
        }

        let window = fft::hann(m);
        let windowed_left: Vec<f32> = left.iter().zip(&window).map(|(s, w)| s * w).collect();
        let windowed_right: Vec<f32> = right.iter().zip(&window).map(|(s, w)| s * w).collect();

        let nfft = (2 * m).next_power_of_two();
        let mut x = self.fft.forward(&windowed_left, nfft);
        let mut y = self.fft.forward(&windowed_right, nfft);

        for i in 0..x.len() {
            let freq = fft::bin_frequency(i, nfft, self.sample_rate);
            if freq < self.params.band_min_hz || freq > self.params.band_max_hz {
                x[i] = Complex::new(0.0, 0.0);
                y[i] = Complex::new(0.0, 0.0);
            }
        }

        let cross: Vec<_> = x
            .iter()
            .zip(&y)
            .map(|(xi, yi)| {
                let r = xi.conj() * yi;
                r / (r.norm() + PHAT_EPSILON)
            })
            .collect();

        let mut cc = self.fft.inverse(&cross, nfft);
        // fftshift: zero lag moves to the center of the buffer
        cc.rotate_left(nfft / 2);
        let center = nfft / 2;
        let max_lag = self.max_lag_samples().min(center);

        let lags = &cc[center - max_lag..center + max_lag];
        let peak = lags
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(max_lag);
        let delay_samples = peak as i64 - max_lag as i64;
        let tdoa_sec = delay_samples as f32 / self.sample_rate as f32;

        let sin_arg = (tdoa_sec * self.params.speed_of_sound / self.params.mic_distance)
            .clamp(-1.0, 1.0);
        let angle_deg = sin_arg.asin().to_degrees();

        let estimate = if tdoa_sec.abs() < self.params.center_threshold_sec {
            TdoaEstimate {
                direction: Direction::Center,
                angle_deg: 0.0,
                tdoa_sec,
            }
        } else if tdoa_sec > 0.0 {
            TdoaEstimate {
                direction: Direction::Left,
                angle_deg,
                tdoa_sec,
            }
        } else {
            TdoaEstimate {
                direction: Direction::Right,
                angle_deg: angle_deg.abs(),
                tdoa_sec,
            }
        };
        Ok(estimate)
    }
}
