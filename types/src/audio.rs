use serde::{Deserialize, Serialize};

/// Stereo channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Left,
    Right,
}

/// One chunk of stereo audio as fetched from the ring server.
///
/// Both channels always hold the same number of frames; the constructor is
/// the only way to build one so the invariant cannot be broken downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBlock {
    sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoBlock {
    pub fn new(sample_rate: u32, left: Vec<f32>, right: Vec<f32>) -> Self {
        assert_eq!(
            left.len(),
            right.len(),
            "stereo block channels must hold the same number of frames"
        );
        Self {
            sample_rate,
            left,
            right,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }
}

/// A rolling analysis window over both channels, emitted once per hop.
///
/// `seq` increases monotonically per emitted window and is used to index
/// debug window saves. A window shorter than the configured length is a
/// warm-up window: the buffer has not seen enough input yet.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    pub sample_rate: u32,
    pub seq: u64,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl AnalysisWindow {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }
}
