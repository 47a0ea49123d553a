use serde::{Deserialize, Serialize};

/// Outcome of the spectral prominence check for a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelTrigger {
    pub triggered: bool,
    /// Gap in dB between the band peak and the band median. `-inf` when the
    /// band holds no bins.
    pub prominence_db: f32,
    /// Frequency of the band peak in Hz, `0.0` when the band holds no bins.
    pub peak_freq: f32,
}

/// What the orchestrator should do with a window, derived from which
/// channels triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriggerAction {
    None,
    LeftOnly,
    RightOnly,
    Tdoa,
}

/// Per-window trigger outcome for both channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    pub left: ChannelTrigger,
    pub right: ChannelTrigger,
}

impl TriggerReport {
    /// The action is a pure function of the two triggered bits.
    pub fn action(&self) -> TriggerAction {
        match (self.left.triggered, self.right.triggered) {
            (true, true) => TriggerAction::Tdoa,
            (true, false) => TriggerAction::LeftOnly,
            (false, true) => TriggerAction::RightOnly,
            (false, false) => TriggerAction::None,
        }
    }

    pub fn any_triggered(&self) -> bool {
        self.left.triggered || self.right.triggered
    }
}
