use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    #[error("channel length mismatch: left {left} samples, right {right} samples")]
    ChannelLengthMismatch { left: usize, right: usize },
    #[error("window of {0} samples is too short for cross correlation")]
    WindowTooShort(usize),
}
