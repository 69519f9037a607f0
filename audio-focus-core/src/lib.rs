//! # audio-focus-core
//!
//! Transport-agnostic audio focus core.
//!
//! Decides which streams may play when several want to at once, and drives
//! the client-side stream session lifecycle around those decisions. Backends
//! implement `AudioStream`; the policy service is reached through a
//! `PolicyTransport` (in-process here, RPC in `audio-focus-rpc`).
//!
//! ## Architecture
//!
//! ```text
//! audio-focus-core (this crate)
//! ├── models/     ← FocusError, InterruptRequest, InterruptEvent, RendererState, configs
//! ├── policy/     ← FocusPolicyTable (directional rules), JSON overrides
//! ├── arbiter/    ← InterruptArbiter (focus sets, zones)
//! ├── dispatch/   ← CallbackDispatcher (per-session mailboxes)
//! ├── session/    ← StreamSession (generic lifecycle + interrupt reactions)
//! ├── traits/     ← AudioStream, PolicyTransport, SessionEventSink
//! └── transport/  ← InProcessTransport, PolicyServiceFacade
//! ```

pub mod arbiter;
pub mod dispatch;
pub mod models;
pub mod policy;
pub mod session;
pub mod traits;
pub mod transport;

pub use arbiter::interrupt_arbiter::InterruptArbiter;
pub use arbiter::zone::{ZoneTable, DEFAULT_ZONE_ID};
pub use dispatch::callback_dispatcher::{CallbackDispatcher, SessionEvent};
pub use models::config::{ArbiterConfig, SessionOptions};
pub use models::error::{status_of, FocusError, SUCCESS};
pub use models::interrupt::{
    FocusEffect, FocusEntry, InterruptEvent, InterruptForceType, InterruptHint, InterruptRequest,
    InterruptType,
};
pub use models::state::{RendererState, StateChangeCmd};
pub use models::stream_info::{
    AppInfo, ContentType, InterruptMode, StreamCategory, StreamDirection, StreamUsage,
    DEFAULT_APP_PID, INVALID_SESSION_ID, MIN_SESSION_ID,
};
pub use policy::focus_table::{Decision, FocusPolicyTable};
pub use policy::table_config::{load_policy_table, PolicyRule, PolicyTableConfig};
pub use session::stream_session::StreamSession;
pub use traits::audio_stream::AudioStream;
pub use traits::event_sink::SessionEventSink;
pub use traits::policy_transport::{PolicyTransport, SessionCapacity};
pub use transport::facade::PolicyServiceFacade;
pub use transport::in_process::InProcessTransport;
