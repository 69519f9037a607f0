//! # audio-focus-rpc
//!
//! Cross-process transport for `audio-focus-core`.
//!
//! A `PolicyServer` hosts one `InterruptArbiter` and serves clients over
//! TCP; `RpcTransport` is the client-side `PolicyTransport`. Messages are
//! JSON in 4-byte length-prefixed frames.
//!
//! ```text
//! StreamSession ─▶ PolicyServiceFacade ─▶ RpcTransport ══TCP══▶ PolicyServer ─▶ InterruptArbiter
//!        ▲                                     │                      │
//!        └──── CallbackDispatcher ◀── Event ───┘◀──── RemoteSink ─────┘
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod zone_cli;

pub use client::RpcTransport;
pub use config::{ClientConfig, ServerConfig, DEFAULT_SERVER_ADDR};
pub use protocol::{
    read_frame, write_frame, ClientMessage, ProtoError, Request, Response, ServerMessage,
    PROTOCOL_VERSION,
};
pub use server::{PolicyServer, ServerHandle};
pub use zone_cli::run_zone_repl;
