//! Orchestrates the per-hop pipeline: fetch, window, trigger, TDOA,
//! inference and persistence, paced to one hop per half window.

use crate::cli::{DetectorConfig, WindowSaveMode};
use crate::errors::{DetectorError, RingError};
use crate::inference::InferenceClient;
use crate::persistence::DetectionStore;
use crate::ring::RingClient;
use crate::window::WindowBuffer;
use chrono::Local;
use delfi_dsp::fft::FftEngine;
use delfi_dsp::imaging;
use delfi_dsp::spectrogram::Spectrogram;
use delfi_dsp::tdoa::{TdoaEstimator, TdoaParams};
use delfi_dsp::trigger::PowerTrigger;
use delfi_types::audio::{AnalysisWindow, Channel};
use delfi_types::detection::{DetectionRecord, TriggerSummary};
use delfi_types::tdoa::TdoaEstimate;
use delfi_types::trigger::{TriggerAction, TriggerReport};
use image::GrayImage;
use std::path::PathBuf;
use std::time::Instant;
use task_manager::TaskGuard;

pub struct Detector {
    config: DetectorConfig,
    ring: RingClient,
    inference: InferenceClient,
    store: DetectionStore,
    windows: WindowBuffer,
    trigger: PowerTrigger,
    tdoa: TdoaEstimator,
    fft: FftEngine,
}

/// What one hop did. Detections are observable through the filesystem; this
/// summary exists for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct HopSummary {
    pub seq: u64,
    pub warmup: bool,
    pub action: TriggerAction,
    pub tdoa: Option<TdoaEstimate>,
    pub score: Option<f32>,
    pub saved: Option<PathBuf>,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        let ring = RingClient::new(
            config.ring_host.as_str(),
            config.ring_port,
            config.ring_timeout(),
        );
        let inference = InferenceClient::new(
            config.ring_host.as_str(),
            config.server_port_base,
            config.inference_timeout(),
        );
        let store = DetectionStore::new(
            &config.logs_dir,
            config.detection_threshold,
            config.detection_min_threshold,
        );
        let (windows, trigger, tdoa) = Self::analysis_state(&config, config.sample_rate);
        Ok(Self {
            config,
            ring,
            inference,
            store,
            windows,
            trigger,
            tdoa,
            fft: FftEngine::new(),
        })
    }

    fn analysis_state(
        config: &DetectorConfig,
        sample_rate: u32,
    ) -> (WindowBuffer, PowerTrigger, TdoaEstimator) {
        let windows = WindowBuffer::new(sample_rate, config.window_sec, config.window_sec / 2.0);
        let trigger = PowerTrigger::new(
            sample_rate,
            config.prominence_band_min_hz,
            config.prominence_band_max_hz,
            config.prominence_threshold_db,
        );
        let tdoa = TdoaEstimator::new(
            sample_rate,
            TdoaParams {
                speed_of_sound: config.speed_of_sound,
                mic_distance: config.microphone_distance,
                band_min_hz: config.min_freq,
                band_max_hz: config.max_freq,
                highpass_cutoff_hz: config.high_pass_cutoff_hz,
                center_threshold_sec: config.tdoa_center_threshold_sec,
                invert_phase: config.invert_phase,
            },
        );
        (windows, trigger, tdoa)
    }

    /// Startup reachability check of the ring endpoint.
    pub async fn probe(&self) -> Result<(), RingError> {
        self.ring.probe().await
    }

    /// Runs hops until cancelled. One hop at a time; overlap lives in the
    /// rolling window state, never in concurrent hops.
    pub async fn run(mut self, guard: TaskGuard) {
        log::info!(
            "starting detector: ring {}:{}, task servers from port {}, hop {:?}",
            self.config.ring_host,
            self.config.ring_port,
            self.config.server_port_base,
            self.config.half_window(),
        );
        loop {
            let hop_started = Instant::now();
            tokio::select! {
                biased;
                _ = guard.cancelled() => break,
                outcome = self.hop() => {
                    if let Err(error) = outcome {
                        log::warn!("hop failed, backing off one hop: {error}");
                    }
                }
            }
            let budget = self.config.half_window();
            let elapsed = hop_started.elapsed();
            match budget.checked_sub(elapsed) {
                Some(pacing) => {
                    tokio::select! {
                        biased;
                        _ = guard.cancelled() => break,
                        _ = tokio::time::sleep(pacing) => {}
                    }
                }
                None => log::warn!(
                    "hop took {elapsed:?}, over its {budget:?} budget; starting next fetch immediately"
                ),
            }
        }
        log::info!("detector loop stopped");
    }

    /// One pass through the pipeline. Only a ring failure surfaces as an
    /// error (the caller backs off); everything downstream degrades to
    /// "no score / no save this hop" per policy.
    #[tracing::instrument(skip_all)]
    pub async fn hop(&mut self) -> Result<HopSummary, RingError> {
        let block = self.ring.fetch().await?;
        if block.sample_rate() != self.windows.sample_rate() {
            log::warn!(
                "sample rate changed from {} to {} Hz, resetting analysis state",
                self.windows.sample_rate(),
                block.sample_rate()
            );
            let (windows, trigger, tdoa) = Self::analysis_state(&self.config, block.sample_rate());
            self.windows = windows;
            self.trigger = trigger;
            self.tdoa = tdoa;
        }

        let window = self.windows.push(&block);
        let report = self.trigger.process_stereo(&window.left, &window.right);
        let action = report.action();
        let warmup = self.windows.is_warmup(&window);
        let mut summary = HopSummary {
            seq: window.seq,
            warmup,
            action,
            tdoa: None,
            score: None,
            saved: None,
        };

        if self.should_save_window(&report) {
            let record = self.record(&report, None, None, false);
            let image = self.render_image(&window, &report);
            if let Err(error) = self.store.save_window_debug(&record, &window, Some(&image)) {
                log::warn!("window debug save failed: {error}");
            }
        }

        if warmup {
            log::debug!(
                "window {} is warm-up ({} of {} samples), skipping analysis",
                window.seq,
                window.len(),
                self.windows.window_len()
            );
            return Ok(summary);
        }

        let channel = match action {
            TriggerAction::None => return Ok(summary),
            TriggerAction::LeftOnly => Channel::Left,
            TriggerAction::RightOnly => Channel::Right,
            TriggerAction::Tdoa => {
                let span = self
                    .config
                    .tdoa_samples(window.sample_rate)
                    .min(window.len());
                let start = window.len() - span;
                match self
                    .tdoa
                    .estimate(&window.left[start..], &window.right[start..])
                {
                    Ok(estimate) => {
                        log::info!(
                            "tdoa: {} at {:.2} deg (delay {:.2} us)",
                            estimate.direction,
                            estimate.angle_deg,
                            estimate.tdoa_sec * 1e6,
                        );
                        summary.tdoa = Some(estimate);
                        estimate.near_channel()
                    }
                    Err(error) => {
                        log::warn!("tdoa failed, skipping inference: {error}");
                        return Ok(summary);
                    }
                }
            }
        };

        let slot = (window.seq % u64::from(self.config.inference_workers)) as u16;
        let score = match self
            .inference
            .score(slot, window.sample_rate, window.channel(channel))
            .await
        {
            Ok(score) => score,
            Err(error) => {
                log::warn!("no score for window {}: {error}", window.seq);
                return Ok(summary);
            }
        };
        summary.score = Some(score);
        let detected = score >= self.config.detection_threshold;
        log::info!(
            "window {} scored {score:.3} on the {channel} channel (detected: {detected})",
            window.seq
        );

        let record = self.record(&report, summary.tdoa.as_ref(), Some(score), detected);
        match self.store.save_detection(&record, &window) {
            Ok(Some(path)) => {
                log::info!("saved {}", path.display());
                summary.saved = Some(path);
            }
            Ok(None) => {}
            Err(error) => log::error!("record dropped, could not persist: {error}"),
        }
        Ok(summary)
    }

    fn should_save_window(&self, report: &TriggerReport) -> bool {
        match self.config.window_save_mode {
            WindowSaveMode::None => false,
            WindowSaveMode::All => true,
            WindowSaveMode::Trigger => report.any_triggered(),
        }
    }

    fn record(
        &self,
        report: &TriggerReport,
        tdoa: Option<&TdoaEstimate>,
        score: Option<f32>,
        detected: bool,
    ) -> DetectionRecord {
        DetectionRecord {
            timestamp: Local::now().to_rfc3339(),
            trigger: TriggerSummary::from(report),
            direction: tdoa.map(|estimate| estimate.direction),
            angle_deg: tdoa.map(|estimate| estimate.angle_deg),
            detected,
            score,
        }
    }

    /// Canonical grayscale spectrogram of the more prominent channel.
    fn render_image(&mut self, window: &AnalysisWindow, report: &TriggerReport) -> GrayImage {
        let channel = if report.right.prominence_db > report.left.prominence_db {
            Channel::Right
        } else {
            Channel::Left
        };
        let spec = Spectrogram::compute(
            &mut self.fft,
            window.channel(channel),
            window.sample_rate,
            self.config.nfft,
            self.config.overlap,
        );
        let image = imaging::spectrogram_image(
            &spec,
            self.config.min_freq,
            self.config.max_freq,
            self.config.img_width,
            self.config.img_height,
        );
        if self.config.sobel {
            imaging::sobel_vertical(&image)
        } else {
            image
        }
    }
}
