//! Persists detections as a stereo 16-bit WAV plus a JSON sidecar sharing
//! the same filename stem. Writes land on a temp path first and are renamed
//! into place so a crash can never leave a torn record.

use crate::errors::PersistenceError;
use chrono::{DateTime, Local};
use delfi_types::audio::AnalysisWindow;
use delfi_types::detection::DetectionRecord;
use image::GrayImage;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const DETECTIONS_DIR: &str = "Detections";
const BELOW_THRESHOLD_DIR: &str = "Detections_below_threshold";
const WINDOW_SAVES_DIR: &str = "window_saves";

#[derive(Debug)]
pub struct DetectionStore {
    detections_dir: PathBuf,
    below_dir: PathBuf,
    window_saves_dir: PathBuf,
    detection_threshold: f32,
    min_threshold: f32,
}

impl DetectionStore {
    pub fn new(logs_dir: &Path, detection_threshold: f32, min_threshold: f32) -> Self {
        Self {
            detections_dir: logs_dir.join(DETECTIONS_DIR),
            below_dir: logs_dir.join(BELOW_THRESHOLD_DIR),
            window_saves_dir: logs_dir.join(WINDOW_SAVES_DIR),
            detection_threshold,
            min_threshold,
        }
    }

    /// Directory a score routes to: `Detections` at or above the detection
    /// threshold, the below-threshold bucket between the two thresholds,
    /// nothing below the minimum.
    fn bucket(&self, score: f32) -> Option<&Path> {
        if score >= self.detection_threshold {
            Some(&self.detections_dir)
        } else if score >= self.min_threshold {
            Some(&self.below_dir)
        } else {
            None
        }
    }

    /// Writes the record if its score clears the minimum threshold. Returns
    /// the WAV path when something was written.
    #[tracing::instrument(skip_all)]
    pub fn save_detection(
        &self,
        record: &DetectionRecord,
        window: &AnalysisWindow,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        let Some(score) = record.score else {
            return Ok(None);
        };
        let Some(dir) = self.bucket(score) else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let stem = unique_stem(dir, &Local::now());
        let wav_path = dir.join(format!("{stem}.wav"));
        write_wav_atomic(&wav_path, window)?;
        write_json_atomic(&dir.join(format!("{stem}.json")), record)?;
        Ok(Some(wav_path))
    }

    /// Debug path: saves any analyzed window, indexed by its sequence
    /// number, together with the canonical spectrogram image when given.
    #[tracing::instrument(skip_all)]
    pub fn save_window_debug(
        &self,
        record: &DetectionRecord,
        window: &AnalysisWindow,
        image: Option<&GrayImage>,
    ) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.window_saves_dir)?;
        let stem = format!(
            "window_{}_{:06}",
            Local::now().format("%Y%m%d-%H%M%S"),
            window.seq
        );
        let wav_path = self.window_saves_dir.join(format!("{stem}.wav"));
        write_wav_atomic(&wav_path, window)?;
        write_json_atomic(
            &self.window_saves_dir.join(format!("{stem}.json")),
            record,
        )?;
        if let Some(image) = image {
            write_png_atomic(&self.window_saves_dir.join(format!("{stem}.png")), image)?;
        }
        Ok(wav_path)
    }
}

/// Local-time stem with a numeric suffix when a second record lands within
/// the same second.
fn unique_stem(dir: &Path, now: &DateTime<Local>) -> String {
    let base = now.format("%Y-%m-%d_%H-%M-%S").to_string();
    if !dir.join(format!("{base}.wav")).exists() && !dir.join(format!("{base}.json")).exists() {
        return base;
    }
    let mut counter = 1u64;
    loop {
        let candidate = format!("{base}_{counter}");
        if !dir.join(format!("{candidate}.wav")).exists()
            && !dir.join(format!("{candidate}.json")).exists()
        {
            return candidate;
        }
        counter += 1;
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn sample_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

fn write_wav_atomic(path: &Path, window: &AnalysisWindow) -> Result<(), PersistenceError> {
    let tmp = temp_path(path);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: window.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    let mut writer = hound::WavWriter::new(BufWriter::new(file), spec)?;
    for (left, right) in window.left.iter().zip(&window.right) {
        writer.write_sample(sample_to_i16(*left))?;
        writer.write_sample(sample_to_i16(*right))?;
    }
    writer.finalize()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json_atomic(path: &Path, record: &DetectionRecord) -> Result<(), PersistenceError> {
    let tmp = temp_path(path);
    let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
    file.write_all(&serde_json::to_vec_pretty(record)?)?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_png_atomic(path: &Path, image: &GrayImage) -> Result<(), PersistenceError> {
    let tmp = temp_path(path);
    {
        let file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        let mut writer = BufWriter::new(file);
        image.write_to(&mut writer, image::ImageFormat::Png)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
