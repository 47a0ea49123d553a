//! `test-trigger`: runs the trigger (and optionally TDOA and inference)
//! over WAV input for quick checks from a terminal.

use crate::cli::TestTriggerArgs;
use crate::errors::DetectorError;
use crate::inference::InferenceClient;
use delfi_dsp::tdoa::{TdoaEstimator, TdoaParams};
use delfi_dsp::trigger::PowerTrigger;
use delfi_types::audio::Channel;
use delfi_types::tdoa::TdoaEstimate;
use delfi_types::trigger::{ChannelTrigger, TriggerAction};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct TriggerProbeReport {
    pub sample_rate: u32,
    pub frames: usize,
    pub left: ChannelTrigger,
    pub right: ChannelTrigger,
    pub action: TriggerAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tdoa: Option<TdoaEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

pub async fn run(args: &TestTriggerArgs) -> Result<TriggerProbeReport, DetectorError> {
    let config = &args.config;
    config.validate()?;
    let (sample_rate, left, right) = load_inputs(args)?;

    let mut trigger = PowerTrigger::new(
        sample_rate,
        config.prominence_band_min_hz,
        config.prominence_band_max_hz,
        config.prominence_threshold_db,
    );
    let report = trigger.process_stereo(&left, &right);
    let action = report.action();
    let mut probe = TriggerProbeReport {
        sample_rate,
        frames: left.len(),
        left: report.left,
        right: report.right,
        action,
        tdoa: None,
        score: None,
    };

    if args.tdoa && action == TriggerAction::Tdoa {
        let mut estimator = TdoaEstimator::new(
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
        match estimator.estimate(&left, &right) {
            Ok(estimate) => probe.tdoa = Some(estimate),
            Err(error) => log::warn!("tdoa failed: {error}"),
        }
    }

    if args.detect && action != TriggerAction::None {
        let channel = match (probe.tdoa.as_ref(), action) {
            (Some(estimate), _) => estimate.near_channel(),
            (None, TriggerAction::RightOnly) => Channel::Right,
            (None, _) => Channel::Left,
        };
        let samples = match channel {
            Channel::Left => &left,
            Channel::Right => &right,
        };
        let client = InferenceClient::new(
            config.ring_host.as_str(),
            config.server_port_base,
            config.inference_timeout(),
        );
        probe.score = Some(client.score(0, sample_rate, samples).await?);
    }

    Ok(probe)
}

fn load_inputs(args: &TestTriggerArgs) -> Result<(u32, Vec<f32>, Vec<f32>), DetectorError> {
    if let Some(path) = &args.stereo {
        return load_stereo(path);
    }
    if let (Some(left), Some(right)) = (&args.left, &args.right) {
        return load_mono_pair(left, right);
    }
    Err(DetectorError::Config(
        "specify --stereo <wav> or --left <wav> --right <wav>".to_string(),
    ))
}

fn load_stereo(path: &Path) -> Result<(u32, Vec<f32>, Vec<f32>), DetectorError> {
    let (spec, samples) = read_wav(path)?;
    if spec.channels != 2 {
        return Err(DetectorError::WavShape {
            path: path.to_path_buf(),
            reason: format!("expected 2 channels, found {}", spec.channels),
        });
    }
    let mut left = Vec::with_capacity(samples.len() / 2);
    let mut right = Vec::with_capacity(samples.len() / 2);
    for frame in samples.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    Ok((spec.sample_rate, left, right))
}

fn load_mono_pair(
    left_path: &Path,
    right_path: &Path,
) -> Result<(u32, Vec<f32>, Vec<f32>), DetectorError> {
    let (left_spec, left) = read_wav(left_path)?;
    let (right_spec, right) = read_wav(right_path)?;
    if left_spec.sample_rate != right_spec.sample_rate {
        return Err(DetectorError::WavShape {
            path: right_path.to_path_buf(),
            reason: format!(
                "sample rate {} does not match the left channel's {}",
                right_spec.sample_rate, left_spec.sample_rate
            ),
        });
    }
    let left = first_channel(left, left_spec.channels);
    let right = first_channel(right, right_spec.channels);
    let frames = left.len().min(right.len());
    Ok((
        left_spec.sample_rate,
        left[..frames].to_vec(),
        right[..frames].to_vec(),
    ))
}

fn first_channel(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .into_iter()
        .step_by(channels as usize)
        .collect()
}

fn read_wav(path: &Path) -> Result<(hound::WavSpec, Vec<f32>), DetectorError> {
    let wav_error = |source: hound::Error| DetectorError::WavInput {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(wav_error)?
        }
    };
    Ok((spec, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DetectorConfig;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[Vec<f32>]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for sample in frame {
                writer
                    .write_sample((sample * 32767.0).round() as i16)
                    .unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn tone_frames(freq: f32, sample_rate: u32, len: usize, channels: usize) -> Vec<Vec<f32>> {
        (0..len)
            .map(|i| {
                let value = 0.2
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin();
                vec![value; channels]
            })
            .collect()
    }

    #[tokio::test]
    async fn stereo_tone_triggers_both_channels() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 192_000, 2, &tone_frames(12_000.0, 192_000, 38_400, 2));

        let args = TestTriggerArgs {
            stereo: Some(path),
            left: None,
            right: None,
            tdoa: true,
            detect: false,
            config: DetectorConfig::default(),
        };
        let report = run(&args).await.unwrap();
        assert_eq!(report.sample_rate, 192_000);
        assert_eq!(report.action, TriggerAction::Tdoa);
        assert!(report.left.triggered);
        assert!(report.right.triggered);
        let tdoa = report.tdoa.expect("tdoa ran on both-triggered input");
        assert_eq!(tdoa.direction, delfi_types::tdoa::Direction::Center);
        assert!(report.score.is_none());
    }

    #[tokio::test]
    async fn mono_pair_with_mismatched_rates_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let left = dir.path().join("left.wav");
        let right = dir.path().join("right.wav");
        write_wav(&left, 192_000, 1, &tone_frames(12_000.0, 192_000, 4800, 1));
        write_wav(&right, 96_000, 1, &tone_frames(12_000.0, 96_000, 4800, 1));

        let args = TestTriggerArgs {
            stereo: None,
            left: Some(left),
            right: Some(right),
            tdoa: false,
            detect: false,
            config: DetectorConfig::default(),
        };
        assert!(matches!(
            run(&args).await,
            Err(DetectorError::WavShape { .. })
        ));
    }

    #[tokio::test]
    async fn missing_inputs_are_a_config_error() {
        let args = TestTriggerArgs {
            stereo: None,
            left: None,
            right: None,
            tdoa: false,
            detect: false,
            config: DetectorConfig::default(),
        };
        assert!(matches!(run(&args).await, Err(DetectorError::Config(_))));
    }
}
