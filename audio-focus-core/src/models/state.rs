use serde::{Deserialize, Serialize};

/// Stream session state machine.
///
/// State transitions:
/// ```text
/// new → prepared → running ↔ paused
///                     ↓        ↓
///                   stopped → running
///        (any) → released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererState {
    New,
    Prepared,
    Running,
    Paused,
    Stopped,
    Released,
}

impl RendererState {
    pub fn can_start(self) -> bool {
        matches!(self, Self::Prepared | Self::Stopped | Self::Paused)
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_released(self) -> bool {
        matches!(self, Self::Released)
    }
}

/// Who caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChangeCmd {
    /// The application called start/pause/stop/release.
    Request,
    /// The policy service forced the change.
    Interrupt,
}
