use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RingError {
    #[error("ring server unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        source: std::io::Error,
    },
    #[error("ring protocol error: {0}")]
    Protocol(String),
    #[error("ring request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("task server unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        source: std::io::Error,
    },
    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),
    #[error("inference protocol error: {0}")]
    Protocol(String),
    #[error("could not parse inference reply {0:?}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode sidecar json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not write wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("could not write image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("could not read wav input {path}: {source}")]
    WavInput {
        path: PathBuf,
        source: hound::Error,
    },
    #[error("wav input {path}: {reason}")]
    WavShape { path: PathBuf, reason: String },
}
