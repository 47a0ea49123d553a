use crate::tdoa::Direction;
use crate::trigger::{TriggerAction, TriggerReport};
use serde::{Deserialize, Serialize};

/// Trigger portion of the JSON sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerSummary {
    pub left: bool,
    pub right: bool,
    pub action: TriggerAction,
}

impl From<&TriggerReport> for TriggerSummary {
    fn from(report: &TriggerReport) -> Self {
        Self {
            left: report.left.triggered,
            right: report.right.triggered,
            action: report.action(),
        }
    }
}

/// One persisted detection, serialized verbatim as the `.json` sidecar next
/// to the stereo `.wav` capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// ISO-8601, local time.
    pub timestamp: String,
    pub trigger: TriggerSummary,
    pub direction: Option<Direction>,
    pub angle_deg: Option<f32>,
    pub detected: bool,
    pub score: Option<f32>,
}
