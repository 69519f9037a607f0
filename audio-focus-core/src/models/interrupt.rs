use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stream_info::{
    ContentType, InterruptMode, StreamCategory, StreamUsage, DEFAULT_APP_PID, INVALID_SESSION_ID,
};

/// A session's request for audio focus.
///
/// Built once per `start()` from the session's configuration and never
/// mutated after it has been handed to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptRequest {
    pub session_id: u32,
    pub category: StreamCategory,
    pub usage: StreamUsage,
    pub content_type: ContentType,
    pub mode: InterruptMode,
    pub pid: i32,
    pub uid: i32,
}

impl InterruptRequest {
    /// Request with the category derived from `usage` and no owning process.
    pub fn new(session_id: u32, usage: StreamUsage) -> Self {
        Self {
            session_id,
            category: StreamCategory::from_usage(usage),
            usage,
            content_type: ContentType::Unknown,
            mode: InterruptMode::Share,
            pid: DEFAULT_APP_PID,
            uid: 0,
        }
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_mode(mut self, mode: InterruptMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn has_valid_session(&self) -> bool {
        self.session_id != INVALID_SESSION_ID
    }

    /// Two requests from the same real process, both in share mode, never
    /// arbitrate against each other.
    pub fn is_same_app_in_share_mode(&self, other: &InterruptRequest) -> bool {
        if self.mode != InterruptMode::Share || other.mode != InterruptMode::Share {
            return false;
        }
        if self.pid <= 0 || other.pid <= 0 {
            return false;
        }
        self.pid == other.pid
    }
}

/// Effect the arbiter currently applies to a focus entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusEffect {
    Active,
    Paused,
    Ducked,
}

/// One row of a zone's focus set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusEntry {
    pub request: InterruptRequest,
    pub effect: FocusEffect,
    pub activated_at: DateTime<Utc>,
}

impl FocusEntry {
    pub fn new(request: InterruptRequest, effect: FocusEffect) -> Self {
        Self {
            request,
            effect,
            activated_at: Utc::now(),
        }
    }

    pub fn session_id(&self) -> u32 {
        self.request.session_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptType {
    Begin,
    End,
}

/// FORCE: the arbiter already changed the session's state.
/// SHARE: the application decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptForceType {
    Force,
    Share,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptHint {
    None,
    Resume,
    Pause,
    Stop,
    Duck,
    Unduck,
}

/// Notification delivered to a session whose focus changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterruptEvent {
    pub event_type: InterruptType,
    pub force_type: InterruptForceType,
    pub hint: InterruptHint,
    /// Target instance volume while ducked, `0.0..=1.0`. `1.0` otherwise.
    pub duck_volume: f32,
}

impl InterruptEvent {
    pub fn force(event_type: InterruptType, hint: InterruptHint) -> Self {
        Self {
            event_type,
            force_type: InterruptForceType::Force,
            hint,
            duck_volume: 1.0,
        }
    }

    pub fn share(event_type: InterruptType, hint: InterruptHint) -> Self {
        Self {
            event_type,
            force_type: InterruptForceType::Share,
            hint,
            duck_volume: 1.0,
        }
    }

    pub fn force_duck(event_type: InterruptType, duck_volume: f32) -> Self {
        Self {
            duck_volume,
            ..Self::force(event_type, InterruptHint::Duck)
        }
    }

    pub fn is_forced(&self) -> bool {
        self.force_type == InterruptForceType::Force
    }
}
