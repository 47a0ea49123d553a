use crate::errors::DetectorError;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Starts the real-time detector loop
    Run(DetectorConfig),
    /// Runs the trigger (and optionally TDOA and inference) over WAV input
    TestTrigger(TestTriggerArgs),
    /// Prints the version
    Version,
}

/// Which analyzed windows to persist through the debug path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum WindowSaveMode {
    /// Keep nothing
    None,
    /// Keep every analyzed window
    All,
    /// Keep windows where at least one channel triggered
    Trigger,
}

#[derive(Args, Debug, Clone)]
pub struct DetectorConfig {
    /// Ring server host (also used for the task servers)
    #[arg(long, default_value_t = String::from("127.0.0.1"))]
    pub ring_host: String,
    /// Ring server port
    #[arg(long, default_value_t = 8888)]
    pub ring_port: u16,
    /// First task server port; worker n listens on base + n
    #[arg(long, default_value_t = 12001)]
    pub server_port_base: u16,
    /// Number of task servers to round-robin over
    #[arg(long, default_value_t = 1)]
    pub inference_workers: u16,
    /// Deadline for each ring protocol step in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub ring_timeout_ms: u64,
    /// Deadline for each inference protocol step in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub inference_timeout_ms: u64,

    /// Expected capture sample rate; the ring-reported rate wins at runtime
    #[arg(long, default_value_t = 192_000)]
    pub sample_rate: u32,
    /// Analysis window length in seconds; the hop is half of it
    #[arg(long, default_value_t = 0.8)]
    pub window_sec: f32,

    /// STFT size
    #[arg(long, default_value_t = 512)]
    pub nfft: usize,
    /// STFT window overlap as a fraction in [0, 1)
    #[arg(long, default_value_t = 0.5)]
    pub overlap: f32,
    /// Lower edge of the imaging / TDOA band in Hz
    #[arg(long, default_value_t = 5000.0)]
    pub min_freq: f32,
    /// Upper edge of the imaging / TDOA band in Hz
    #[arg(long, default_value_t = 25_000.0)]
    pub max_freq: f32,
    /// Canonical spectrogram image width
    #[arg(long, default_value_t = 300)]
    pub img_width: u32,
    /// Canonical spectrogram image height
    #[arg(long, default_value_t = 150)]
    pub img_height: u32,
    /// Applies a vertical Sobel filter to the spectrogram image
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub sobel: bool,

    /// Lower edge of the trigger prominence band in Hz
    #[arg(long, default_value_t = 3000.0)]
    pub prominence_band_min_hz: f32,
    /// Upper edge of the trigger prominence band in Hz
    #[arg(long, default_value_t = 25_000.0)]
    pub prominence_band_max_hz: f32,
    /// Prominence a band peak needs to trigger, in dB
    #[arg(long, default_value_t = 12.0)]
    pub prominence_threshold_db: f32,

    /// Speed of sound in m/s (approx. 1460 in seawater)
    #[arg(long, default_value_t = 1460.0)]
    pub speed_of_sound: f32,
    /// Hydrophone spacing in meters
    #[arg(long, default_value_t = 0.46)]
    pub microphone_distance: f32,
    /// Highpass cutoff applied before cross correlation, in Hz
    #[arg(long, default_value_t = 1000.0)]
    pub high_pass_cutoff_hz: f32,
    /// Negate the right channel to undo reversed hydrophone polarity
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub invert_phase: bool,
    /// Slice of the window (seconds, taken from its end) used for TDOA
    #[arg(long, default_value_t = 0.2)]
    pub tdoa_win_sec: f32,
    /// Delays below this count as a frontal source, in seconds
    #[arg(long, default_value_t = 0.000061)]
    pub tdoa_center_threshold_sec: f32,

    /// Scores at or above this are detections
    #[arg(long, default_value_t = 0.5)]
    pub detection_threshold: f32,
    /// Scores in [min, detection) land in the below-threshold bucket
    #[arg(long, default_value_t = 0.3)]
    pub detection_min_threshold: f32,

    /// Root directory for detections and debug window saves
    #[arg(long, default_value = "data")]
    pub logs_dir: PathBuf,
    /// Which analyzed windows to persist for debugging
    #[arg(long, value_enum, default_value_t = WindowSaveMode::None)]
    pub window_save_mode: WindowSaveMode,

    /// Log level
    #[arg(long, default_value_t = String::from("info"))]
    pub log_level: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ring_host: String::from("127.0.0.1"),
            ring_port: 8888,
            server_port_base: 12001,
            inference_workers: 1,
            ring_timeout_ms: 5000,
            inference_timeout_ms: 5000,
            sample_rate: 192_000,
            window_sec: 0.8,
            nfft: 512,
            overlap: 0.5,
            min_freq: 5000.0,
            max_freq: 25_000.0,
            img_width: 300,
            img_height: 150,
            sobel: false,
            prominence_band_min_hz: 3000.0,
            prominence_band_max_hz: 25_000.0,
            prominence_threshold_db: 12.0,
            speed_of_sound: 1460.0,
            microphone_distance: 0.46,
            high_pass_cutoff_hz: 1000.0,
            invert_phase: false,
            tdoa_win_sec: 0.2,
            tdoa_center_threshold_sec: 0.000061,
            detection_threshold: 0.5,
            detection_min_threshold: 0.3,
            logs_dir: PathBuf::from("data"),
            window_save_mode: WindowSaveMode::None,
            log_level: String::from("info"),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        let fail = |reason: &str| Err(DetectorError::Config(reason.to_string()));
        if self.sample_rate == 0 {
            return fail("sample_rate must be positive");
        }
        if !(self.window_sec.is_finite() && self.window_sec > 0.0) {
            return fail("window_sec must be positive");
        }
        if self.nfft < 2 {
            return fail("nfft must be at least 2");
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return fail("overlap must be within [0, 1)");
        }
        if self.min_freq >= self.max_freq {
            return fail("min_freq must be below max_freq");
        }
        if self.prominence_band_min_hz >= self.prominence_band_max_hz {
            return fail("prominence_band_min_hz must be below prominence_band_max_hz");
        }
        if self.img_width == 0 || self.img_height == 0 {
            return fail("image dimensions must be positive");
        }
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return fail("speed_of_sound must be positive");
        }
        if !(self.microphone_distance.is_finite() && self.microphone_distance > 0.0) {
            return fail("microphone_distance must be positive");
        }
        if !(self.tdoa_win_sec > 0.0 && self.tdoa_win_sec <= self.window_sec) {
            return fail("tdoa_win_sec must be positive and at most window_sec");
        }
        if self.detection_min_threshold > self.detection_threshold {
            return fail("detection_min_threshold must not exceed detection_threshold");
        }
        if self.inference_workers == 0 {
            return fail("inference_workers must be at least 1");
        }
        Ok(())
    }

    /// The hop between successive analysis windows.
    pub fn half_window(&self) -> Duration {
        Duration::from_secs_f32(self.window_sec / 2.0)
    }

    pub fn ring_timeout(&self) -> Duration {
        Duration::from_millis(self.ring_timeout_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn tdoa_samples(&self, sample_rate: u32) -> usize {
        (self.tdoa_win_sec * sample_rate as f32).round() as usize
    }

    pub fn logs_dir(mut self, dir: PathBuf) -> Self {
        self.logs_dir = dir;
        self
    }

    pub fn thresholds(mut self, detection: f32, minimum: f32) -> Self {
        self.detection_threshold = detection;
        self.detection_min_threshold = minimum;
        self
    }

    pub fn endpoints(mut self, host: &str, ring_port: u16, server_port_base: u16) -> Self {
        self.ring_host = host.to_string();
        self.ring_port = ring_port;
        self.server_port_base = server_port_base;
        self
    }

    pub fn window_save_mode(mut self, mode: WindowSaveMode) -> Self {
        self.window_save_mode = mode;
        self
    }
}

#[derive(Args, Debug, Clone)]
pub struct TestTriggerArgs {
    /// Stereo WAV input
    #[arg(long, conflicts_with_all = ["left", "right"])]
    pub stereo: Option<PathBuf>,
    /// Mono WAV for the left channel
    #[arg(long, requires = "right")]
    pub left: Option<PathBuf>,
    /// Mono WAV for the right channel
    #[arg(long, requires = "left")]
    pub right: Option<PathBuf>,
    /// Also run TDOA when both channels trigger
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub tdoa: bool,
    /// Also score the chosen channel against a live task server
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub detect: bool,
    #[clap(flatten)]
    pub config: DetectorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_validates() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let config = DetectorConfig::default().thresholds(0.3, 0.7);
        assert!(matches!(
            config.validate(),
            Err(DetectorError::Config(_))
        ));
    }

    #[test]
    fn oversized_tdoa_window_is_rejected() {
        let mut config = DetectorConfig::default();
        config.tdoa_win_sec = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn run_parses_with_overrides() {
        let cli = Cli::try_parse_from([
            "delfi-detector",
            "run",
            "--ring-port",
            "9000",
            "--window-save-mode",
            "trigger",
            "--sobel",
        ])
        .unwrap();
        let Commands::Run(config) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(config.ring_port, 9000);
        assert_eq!(config.window_save_mode, WindowSaveMode::Trigger);
        assert!(config.sobel);
    }

    #[test]
    fn test_trigger_requires_both_mono_files() {
        let result = Cli::try_parse_from([
            "delfi-detector",
            "test-trigger",
            "--left",
            "l.wav",
        ]);
        assert!(result.is_err());
    }
}
