mod detector;

pub use detector::{Cli, Commands, DetectorConfig, TestTriggerArgs, WindowSaveMode};
