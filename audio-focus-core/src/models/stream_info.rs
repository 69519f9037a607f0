use serde::{Deserialize, Serialize};

/// Sentinel for a session that has not been assigned an id.
pub const INVALID_SESSION_ID: u32 = 0xFFFF_FFFF;

/// First id handed out by the session id allocator.
pub const MIN_SESSION_ID: u32 = 100_000;

/// Pid value meaning "unknown / not a real process".
pub const DEFAULT_APP_PID: i32 = -1;

/// What the application says the stream is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamUsage {
    Unknown,
    Music,
    VoiceCommunication,
    VoiceAssistant,
    Alarm,
    VoiceMessage,
    Ringtone,
    Notification,
    Accessibility,
    System,
    Movie,
    Game,
    Audiobook,
    Navigation,
    Dtmf,
    EnforcedTone,
    VoiceModemCommunication,
}

impl StreamUsage {
    /// Usages that only system components may open.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::System | Self::VoiceModemCommunication)
    }
}

/// Coarse category used as the focus table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamCategory {
    Music,
    VoiceCommunication,
    Ringtone,
    Alarm,
    Notification,
    System,
    Dtmf,
    Accessibility,
    EnforcedTone,
    Navigation,
    VoiceAssistant,
    VoiceMessage,
    VoiceModemCommunication,
    Audiobook,
    Game,
    Movie,
}

impl StreamCategory {
    pub const ALL: [StreamCategory; 16] = [
        Self::Music,
        Self::VoiceCommunication,
        Self::Ringtone,
        Self::Alarm,
        Self::Notification,
        Self::System,
        Self::Dtmf,
        Self::Accessibility,
        Self::EnforcedTone,
        Self::Navigation,
        Self::VoiceAssistant,
        Self::VoiceMessage,
        Self::VoiceModemCommunication,
        Self::Audiobook,
        Self::Game,
        Self::Movie,
    ];

    pub fn from_usage(usage: StreamUsage) -> Self {
        match usage {
            StreamUsage::Unknown | StreamUsage::Music => Self::Music,
            StreamUsage::VoiceCommunication => Self::VoiceCommunication,
            StreamUsage::VoiceAssistant => Self::VoiceAssistant,
            StreamUsage::Alarm => Self::Alarm,
            StreamUsage::VoiceMessage => Self::VoiceMessage,
            StreamUsage::Ringtone => Self::Ringtone,
            StreamUsage::Notification => Self::Notification,
            StreamUsage::Accessibility => Self::Accessibility,
            StreamUsage::System => Self::System,
            StreamUsage::Movie => Self::Movie,
            StreamUsage::Game => Self::Game,
            StreamUsage::Audiobook => Self::Audiobook,
            StreamUsage::Navigation => Self::Navigation,
            StreamUsage::Dtmf => Self::Dtmf,
            StreamUsage::EnforcedTone => Self::EnforcedTone,
            StreamUsage::VoiceModemCommunication => Self::VoiceModemCommunication,
        }
    }

    /// Call categories get their own rows in the focus table.
    pub fn is_call(self) -> bool {
        matches!(self, Self::VoiceCommunication | Self::VoiceModemCommunication)
    }

    /// Long-form media that the user expects to resume later.
    pub fn is_media(self) -> bool {
        matches!(self, Self::Music | Self::Movie | Self::Game | Self::Audiobook)
    }
}

/// Finer classification carried alongside the usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Unknown,
    Speech,
    Music,
    Movie,
    Sonification,
    Ringtone,
    Ultrasonic,
}

/// Whether sessions of the same process merge their focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptMode {
    Share,
    Independent,
}

/// Renderer (playback) or capturer (record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamDirection {
    Playback,
    Capture,
}

/// Identity of the process owning a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub pid: i32,
    pub uid: i32,
    /// Set by the composition root after verifying the caller.
    pub system_permission: bool,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            pid: DEFAULT_APP_PID,
            uid: 0,
            system_permission: false,
        }
    }
}
