use crate::audio::Channel;
use serde::{Deserialize, Serialize};

/// Resolved source direction relative to the hydrophone pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Center,
}

/// A successful GCC-PHAT estimate. Estimation failures are carried as errors
/// by the estimator itself, never as sentinel values in here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TdoaEstimate {
    pub direction: Direction,
    /// Bearing in degrees within [-90, 90]; 0 for center. Reported as a
    /// magnitude for right-side sources.
    pub angle_deg: f32,
    /// Positive when the left channel leads, i.e. the source sits to the
    /// left of the array.
    pub tdoa_sec: f32,
}

impl TdoaEstimate {
    /// Channel closest to the source; center falls back to left.
    pub fn near_channel(&self) -> Channel {
        match self.direction {
            Direction::Right => Channel::Right,
            Direction::Left | Direction::Center => Channel::Left,
        }
    }
}
