use std::io::{self, Read, Write};

use audio_focus_core::{FocusEntry, FocusError, InterruptEvent, InterruptRequest, SessionCapacity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;

/// Frames larger than this are treated as corrupt.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Hello {
        version: u32,
        client_id: String,
        pid: i32,
    },
    Activate {
        request: InterruptRequest,
    },
    Deactivate {
        session_id: u32,
    },
    SetInterruptCallback {
        session_id: u32,
    },
    UnsetInterruptCallback {
        session_id: u32,
    },
    FocusInfoList {
        zone_id: i32,
    },
    CreateZone {
        zone_id: i32,
        pids: Vec<i32>,
    },
    AddZonePids {
        zone_id: i32,
        pids: Vec<i32>,
    },
    RemoveZonePids {
        zone_id: i32,
        pids: Vec<i32>,
    },
    ReleaseZone {
        zone_id: i32,
    },
    AllocateSessionId,
    SessionCapacity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    HelloOk { version: u32 },
    Ok,
    SessionId { session_id: u32 },
    FocusList { entries: Vec<FocusEntry> },
    Capacity { capacity: SessionCapacity },
    Err { code: i32, message: String },
}

impl Response {
    pub fn from_error(err: &FocusError) -> Self {
        let message = match err {
            FocusError::InvalidParam(m) | FocusError::IllegalState(m) | FocusError::Operation(m) => {
                m.clone()
            }
            other => other.to_string(),
        };
        Self::Err {
            code: err.status_code(),
            message,
        }
    }

    /// Turn an `Err` reply back into the error the server returned.
    pub fn into_result(self) -> Result<Response, FocusError> {
        match self {
            Self::Err { code, message } => Err(FocusError::from_status(code, &message)
                .unwrap_or_else(|| FocusError::Operation("error reply with success code".into()))),
            other => Ok(other),
        }
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub seq: u64,
    pub request: Request,
}

/// Server → client. Replies carry the request's `seq`; events are unsolicited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Reply { seq: u64, response: Response },
    Event { session_id: u32, event: InterruptEvent },
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(Response),
}

impl ProtoError {
    /// Peer closed the connection cleanly between frames.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl From<ProtoError> for FocusError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Io(e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                FocusError::Timeout
            }
            ProtoError::Io(_) => FocusError::ServiceDied,
            ProtoError::Json(e) => FocusError::Operation(format!("malformed message: {}", e)),
            ProtoError::UnexpectedResponse(r) => {
                FocusError::Operation(format!("unexpected response: {:?}", r))
            }
        }
    }
}

/// Write one message: 4-byte little-endian length, then JSON.
pub fn write_frame<W: Write, T: Serialize>(mut w: W, msg: &T) -> Result<(), ProtoError> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large").into());
    }
    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&payload)?;
    w.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(mut r: R) -> Result<T, ProtoError> {
    let mut len_bytes = [0u8; 4];
    r.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large").into());
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(serde_json::from_slice(&payload)?)
}
