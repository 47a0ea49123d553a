//! Spectral-prominence power trigger: a cheap band-limited energy test that
//! gates the expensive TDOA and inference stages.

use crate::fft::{self, FftEngine};
use crate::LOG_EPSILON;
use delfi_types::trigger::{ChannelTrigger, TriggerReport};

pub struct PowerTrigger {
    sample_rate: u32,
    band_min_hz: f32,
    band_max_hz: f32,
    threshold_db: f32,
    fft: FftEngine,
}

impl PowerTrigger {
    pub fn new(sample_rate: u32, band_min_hz: f32, band_max_hz: f32, threshold_db: f32) -> Self {
        Self {
            sample_rate,
            band_min_hz,
            band_max_hz,
            threshold_db,
            fft: FftEngine::new(),
        }
    }

    /// Prominence of the spectral peak in the configured band: the dB gap
    /// between the band maximum and the band median of a Hann-windowed
    /// full-window rFFT. Stateless across windows, no latching.
    ///
    /// An empty signal or an empty band reports `-inf` prominence and never
    /// triggers.
    #[tracing::instrument(skip_all)]
    pub fn evaluate(&mut self, signal: &[f32]) -> ChannelTrigger {
        let n = signal.len();
        if n == 0 {
            return Self::silent();
        }
        let window = fft::hann(n);
        let windowed: Vec<f32> = signal.iter().zip(&window).map(|(s, w)| s * w).collect();
        let spectrum = self.fft.forward(&windowed, n);

        let mut band_db: Vec<f32> = Vec::new();
        let mut peak_db = f32::NEG_INFINITY;
        let mut peak_freq = 0.0f32;
        for (i, bin) in spectrum.iter().enumerate() {
            let freq = fft::bin_frequency(i, n, self.sample_rate);
            if freq < self.band_min_hz || freq > self.band_max_hz {
                continue;
            }
            let db = 20.0 * (bin.norm() + LOG_EPSILON).log10();
            if db > peak_db {
                peak_db = db;
                peak_freq = freq;
            }
            band_db.push(db);
        }
        if band_db.is_empty() {
            return Self::silent();
        }

        let prominence_db = peak_db - median(&mut band_db);
        ChannelTrigger {
            triggered: prominence_db >= self.threshold_db,
            prominence_db,
            peak_freq,
        }
    }

    /// Evaluates both channels and logs the per-channel outcome.
    pub fn process_stereo(&mut self, left: &[f32], right: &[f32]) -> TriggerReport {
        let left = self.evaluate(left);
        let right = self.evaluate(right);
        log::debug!(
            "trigger [left] peak {:.1} Hz prominence {:.2} dB triggered {} [right] peak {:.1} Hz prominence {:.2} dB triggered {}",
            left.peak_freq,
            left.prominence_db,
            left.triggered,
            right.peak_freq,
            right.prominence_db,
            right.triggered,
        );
        TriggerReport { left, right }
    }

    fn silent() -> ChannelTrigger {
        ChannelTrigger {
            triggered: false,
            prominence_db: f32::NEG_INFINITY,
            peak_freq: 0.0,
        }
    }
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delfi_types::trigger::TriggerAction;

    const SAMPLE_RATE: u32 = 192_000;

    fn trigger() -> PowerTrigger {
        PowerTrigger::new(SAMPLE_RATE, 3000.0, 25_000.0, 12.0)
    }

    fn tone(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn silence_does_not_trigger() {
        let mut trigger = trigger();
        let report = trigger.evaluate(&vec![0.0; 38_400]);
        assert!(!report.triggered);
        // flat spectrum: peak equals median
        assert!(report.prominence_db.abs() < 1e-3);
    }

    #[test]
    fn empty_signal_reports_neg_infinity() {
        let mut trigger = trigger();
        let report = trigger.evaluate(&[]);
        assert!(!report.triggered);
        assert_eq!(report.prominence_db, f32::NEG_INFINITY);
        assert_eq!(report.peak_freq, 0.0);
    }

    #[test]
    fn in_band_tone_triggers_with_matching_peak() {
        let mut trigger = trigger();
        let report = trigger.evaluate(&tone(12_000.0, 0.2, 38_400));
        assert!(report.triggered);
        assert!(report.prominence_db > 50.0);
        assert!((report.peak_freq - 12_000.0).abs() < 50.0);
    }

    #[test]
    fn out_of_band_tone_stays_quiet() {
        let mut trigger = trigger();
        // 40 kHz sits above the 3-25 kHz band; in-band content is leakage only
        let report = trigger.evaluate(&tone(40_000.0, 0.5, 38_400));
        assert!(!report.triggered);
    }

    #[test]
    fn band_outside_spectrum_reports_neg_infinity() {
        // at 4 kHz sampling the 3-25 kHz band is beyond Nyquist
        let mut trigger = PowerTrigger::new(4000, 3000.0, 25_000.0, 12.0);
        let report = trigger.evaluate(&tone(500.0, 0.5, 4000));
        // bins up to 2 kHz only: band is empty... except 3000 > 2000, so no bins
        assert!(!report.triggered);
        assert_eq!(report.prominence_db, f32::NEG_INFINITY);
    }

    #[test]
    fn evaluation_is_pure() {
        let mut trigger = trigger();
        let signal = tone(12_000.0, 0.2, 38_400);
        let first = trigger.evaluate(&signal);
        let second = trigger.evaluate(&signal);
        assert_eq!(first, second);
    }

    #[test]
    fn stereo_report_actions() {
        let mut trigger = trigger();
        let loud = tone(12_000.0, 0.2, 38_400);
        let quiet = vec![0.0f32; 38_400];

        assert_eq!(
            trigger.process_stereo(&loud, &loud).action(),
            TriggerAction::Tdoa
        );
        assert_eq!(
            trigger.process_stereo(&loud, &quiet).action(),
            TriggerAction::LeftOnly
        );
        assert_eq!(
            trigger.process_stereo(&quiet, &loud).action(),
            TriggerAction::RightOnly
        );
        assert_eq!(
            trigger.process_stereo(&quiet, &quiet).action(),
            TriggerAction::None
        );
    }
}
