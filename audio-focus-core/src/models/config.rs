use super::stream_info::{AppInfo, ContentType, InterruptMode, StreamDirection, StreamUsage};

/// Configuration for an `InterruptArbiter`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterConfig {
    /// Re-run arbitration and send RESUME/UNDUCK hints when a session
    /// deactivates (default: false, paused sessions stay paused).
    pub resume_on_deactivate: bool,

    /// Instance volume a ducked session is asked to drop to (default: 0.2).
    pub duck_volume: f32,

    /// Maximum number of live sessions across all clients (default: 128).
    pub max_session_instances: usize,

    /// Capacity of each session's event mailbox (default: 64).
    pub mailbox_capacity: usize,
}

impl ArbiterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.duck_volume) {
            return Err(format!("duck volume out of range: {}", self.duck_volume));
        }
        if self.max_session_instances == 0 {
            return Err("max session instances must be positive".into());
        }
        if self.mailbox_capacity == 0 {
            return Err("mailbox capacity must be positive".into());
        }
        Ok(())
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            resume_on_deactivate: false,
            duck_volume: 0.2,
            max_session_instances: 128,
            mailbox_capacity: 64,
        }
    }
}

/// Options for creating a `StreamSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub usage: StreamUsage,
    pub content_type: ContentType,
    pub mode: InterruptMode,
    pub direction: StreamDirection,

    /// Sample rate in Hz (default: 48000).
    pub sample_rate: u32,

    /// Interleaved channel count, 1..=16 (default: 2).
    pub channels: u16,

    /// Bytes per sample: 1, 2, 3 or 4 (default: 2).
    pub bytes_per_sample: u16,

    pub app: AppInfo,
}

impl SessionOptions {
    pub fn playback(usage: StreamUsage) -> Self {
        Self {
            usage,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if !(1..=16).contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if ![1, 2, 3, 4].contains(&self.bytes_per_sample) {
            return Err(format!("unsupported sample width: {}", self.bytes_per_sample));
        }
        Ok(())
    }

    /// Whether creating this session needs system permission.
    pub fn requires_system_permission(&self) -> bool {
        self.usage.is_privileged() || self.content_type == ContentType::Ultrasonic
    }

    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.bytes_per_sample as usize
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            usage: StreamUsage::Music,
            content_type: ContentType::Unknown,
            mode: InterruptMode::Share,
            direction: StreamDirection::Playback,
            sample_rate: 48000,
            channels: 2,
            bytes_per_sample: 2,
            app: AppInfo::default(),
        }
    }
}
