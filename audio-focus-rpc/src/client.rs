use std::collections::HashMap;
use std::io::BufReader;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use audio_focus_core::{
    CallbackDispatcher, FocusEntry, FocusError, InterruptRequest, PolicyTransport,
    SessionCapacity, SessionEventSink,
};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::protocol::{
    read_frame, write_frame, ClientMessage, ProtoError, Request, Response, ServerMessage,
    PROTOCOL_VERSION,
};

/// Sequence number used for handshake traffic, before the reader runs.
const HANDSHAKE_SEQ: u64 = 0;

/// Mailbox size for client-side event delivery.
const CLIENT_MAILBOX_CAPACITY: usize = 64;

struct Link {
    stream: TcpStream,
    generation: u64,
}

struct ClientShared {
    config: ClientConfig,
    client_id: String,
    link: Mutex<Option<Link>>,
    generation: AtomicU64,
    /// Highest link generation whose death has been announced.
    dead_generation: AtomicU64,
    next_seq: AtomicU64,
    pending: Mutex<HashMap<u64, (u64, Sender<Response>)>>,
    /// Registered sinks, replayed to the server after a reconnect.
    sinks: Mutex<HashMap<u32, Arc<dyn SessionEventSink>>>,
    dispatcher: CallbackDispatcher,
    closing: AtomicBool,
}

impl ClientShared {
    /// Close the link if it is still the one with `generation`.
    fn drop_link(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.as_ref().map(|l| l.generation) == Some(generation) {
            if let Some(l) = link.take() {
                let _ = l.stream.shutdown(Shutdown::Both);
            }
        }
    }

    /// Called once by the reader thread of a link when that link ends.
    fn on_link_lost(&self, generation: u64) {
        self.drop_link(generation);
        self.pending.lock().retain(|_, (g, _)| *g != generation);

        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        if self.dead_generation.fetch_max(generation, Ordering::SeqCst) < generation {
            let notified = self.dispatcher.broadcast_service_died();
            log::error!(
                "{}: lost policy service connection, notified {} sessions",
                self.client_id,
                notified
            );
        }
    }

    fn reader_loop(self: Arc<Self>, stream: TcpStream, generation: u64) {
        let mut reader = BufReader::new(stream);
        loop {
            match read_frame::<_, ServerMessage>(&mut reader) {
                Ok(ServerMessage::Reply { seq, response }) => {
                    match self.pending.lock().remove(&seq) {
                        Some((_, tx)) => {
                            let _ = tx.send(response);
                        }
                        None => log::debug!("late reply for request {}", seq),
                    }
                }
                Ok(ServerMessage::Event { session_id, event }) => {
                    self.dispatcher.post_interrupt(session_id, event);
                }
                Err(e) => {
                    if !e.is_eof() && !self.closing.load(Ordering::SeqCst) {
                        log::warn!("{}: read failed: {}", self.client_id, e);
                    }
                    break;
                }
            }
        }
        self.on_link_lost(generation);
    }
}

/// `PolicyTransport` over a framed TCP connection to a `PolicyServer`.
///
/// Requests are matched to replies by sequence number; interrupt events
/// pushed by the server are delivered through a local `CallbackDispatcher`.
/// When the connection drops every registered sink gets `on_service_died`
/// once; the next call reconnects (one attempt plus `retry_count` retries,
/// waiting `retry_backoff` before each retry) and re-registers the sinks.
pub struct RpcTransport {
    shared: Arc<ClientShared>,
}

impl RpcTransport {
    pub fn connect(config: ClientConfig) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::InvalidParam)?;
        let transport = Self {
            shared: Arc::new(ClientShared {
                config,
                client_id: format!("focus-client-{}", Uuid::new_v4()),
                link: Mutex::new(None),
                generation: AtomicU64::new(0),
                dead_generation: AtomicU64::new(0),
                next_seq: AtomicU64::new(HANDSHAKE_SEQ + 1),
                pending: Mutex::new(HashMap::new()),
                sinks: Mutex::new(HashMap::new()),
                dispatcher: CallbackDispatcher::new(CLIENT_MAILBOX_CAPACITY),
                closing: AtomicBool::new(false),
            }),
        };
        transport.ensure_connected()?;
        Ok(transport)
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.link.lock().is_some()
    }

    fn ensure_connected(&self) -> Result<(), FocusError> {
        let mut link = self.shared.link.lock();
        if link.is_some() {
            return Ok(());
        }

        let stream = self.connect_with_retry()?;
        self.handshake(&stream).map_err(|e| {
            let _ = stream.shutdown(Shutdown::Both);
            e
        })?;

        let reader = stream.try_clone().map_err(|e| {
            FocusError::Operation(format!("failed to clone socket: {}", e))
        })?;
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("focus-rpc-reader-{}", generation))
            .spawn(move || shared.reader_loop(reader, generation))
            .map_err(|e| FocusError::Operation(format!("failed to spawn reader: {}", e)))?;

        *link = Some(Link { stream, generation });
        log::info!(
            "{}: connected to {} (link {})",
            self.shared.client_id,
            self.shared.config.server_addr,
            generation
        );
        Ok(())
    }

    fn connect_with_retry(&self) -> Result<TcpStream, FocusError> {
        let config = &self.shared.config;
        let attempts = config.connect_attempts();
        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(config.retry_backoff);
            }
            match TcpStream::connect(config.server_addr.as_str()) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    stream
                        .set_write_timeout(Some(config.io_timeout))
                        .map_err(|e| FocusError::Operation(e.to_string()))?;
                    return Ok(stream);
                }
                Err(e) => log::warn!(
                    "connect {}/{} to {} failed: {}",
                    attempt,
                    attempts,
                    config.server_addr,
                    e
                ),
            }
        }
        Err(FocusError::ServiceDied)
    }

    /// Say hello and replay sink registrations, synchronously.
    fn handshake(&self, stream: &TcpStream) -> Result<(), FocusError> {
        stream
            .set_read_timeout(Some(self.shared.config.io_timeout))
            .map_err(|e| FocusError::Operation(e.to_string()))?;

        let hello = Request::Hello {
            version: PROTOCOL_VERSION,
            client_id: self.shared.client_id.clone(),
            pid: self.shared.config.pid,
        };
        match self.handshake_call(stream, hello)? {
            Response::HelloOk { .. } => {}
            other => return Err(ProtoError::UnexpectedResponse(other).into()),
        }

        let session_ids: Vec<u32> = self.shared.sinks.lock().keys().copied().collect();
        for session_id in session_ids {
            if let Err(e) = self.handshake_call(stream, Request::SetInterruptCallback { session_id }) {
                log::warn!("failed to re-register session {}: {}", session_id, e);
            }
        }
        if !self.shared.sinks.lock().is_empty() {
            log::info!("{}: re-registered interrupt callbacks", self.shared.client_id);
        }

        stream
            .set_read_timeout(None)
            .map_err(|e| FocusError::Operation(e.to_string()))?;
        Ok(())
    }

    fn handshake_call(&self, stream: &TcpStream, request: Request) -> Result<Response, FocusError> {
        write_frame(
            stream,
            &ClientMessage {
                seq: HANDSHAKE_SEQ,
                request,
            },
        )?;
        loop {
            match read_frame::<_, ServerMessage>(stream)? {
                ServerMessage::Reply { response, .. } => return response.into_result(),
                ServerMessage::Event { session_id, event } => {
                    self.shared.dispatcher.post_interrupt(session_id, event);
                }
            }
        }
    }

    fn call(&self, request: Request) -> Result<Response, FocusError> {
        self.ensure_connected()?;

        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(1);
        {
            let link = self.shared.link.lock();
            let Some(l) = link.as_ref() else {
                return Err(FocusError::ServiceDied);
            };
            let generation = l.generation;
            self.shared.pending.lock().insert(seq, (generation, tx));

            if let Err(e) = write_frame(&l.stream, &ClientMessage { seq, request }) {
                log::error!("{}: send failed: {}", self.shared.client_id, e);
                self.shared.pending.lock().remove(&seq);
                drop(link);
                self.shared.drop_link(generation);
                return Err(e.into());
            }
        }

        match rx.recv_timeout(self.shared.config.io_timeout) {
            Ok(response) => response.into_result(),
            Err(RecvTimeoutError::Timeout) => {
                self.shared.pending.lock().remove(&seq);
                log::error!("{}: request {} timed out", self.shared.client_id, seq);
                Err(FocusError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(FocusError::ServiceDied),
        }
    }

    fn call_ok(&self, request: Request) -> Result<(), FocusError> {
        match self.call(request)? {
            Response::Ok => Ok(()),
            other => Err(ProtoError::UnexpectedResponse(other).into()),
        }
    }
}

impl PolicyTransport for RpcTransport {
    fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError> {
        self.call_ok(Request::Activate { request: *request })
    }

    fn deactivate(&self, session_id: u32) -> Result<(), FocusError> {
        self.call_ok(Request::Deactivate { session_id })
    }

    fn set_interrupt_callback(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError> {
        self.shared.dispatcher.register(session_id, Arc::clone(&sink))?;
        if let Err(e) = self.call_ok(Request::SetInterruptCallback { session_id }) {
            self.shared.dispatcher.unregister(session_id);
            return Err(e);
        }
        self.shared.sinks.lock().insert(session_id, sink);
        Ok(())
    }

    fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError> {
        self.shared.sinks.lock().remove(&session_id);
        self.shared.dispatcher.unregister(session_id);
        self.call_ok(Request::UnsetInterruptCallback { session_id })
    }

    fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError> {
        match self.call(Request::FocusInfoList { zone_id })? {
            Response::FocusList { entries } => Ok(entries),
            other => Err(ProtoError::UnexpectedResponse(other).into()),
        }
    }

    fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.call_ok(Request::CreateZone {
            zone_id,
            pids: pids.to_vec(),
        })
    }

    fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.call_ok(Request::AddZonePids {
            zone_id,
            pids: pids.to_vec(),
        })
    }

    fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.call_ok(Request::RemoveZonePids {
            zone_id,
            pids: pids.to_vec(),
        })
    }

    fn release_zone(&self, zone_id: i32) -> Result<(), FocusError> {
        self.call_ok(Request::ReleaseZone { zone_id })
    }

    fn allocate_session_id(&self) -> Result<u32, FocusError> {
        match self.call(Request::AllocateSessionId)? {
            Response::SessionId { session_id } => Ok(session_id),
            other => Err(ProtoError::UnexpectedResponse(other).into()),
        }
    }

    fn session_capacity(&self) -> Result<SessionCapacity, FocusError> {
        match self.call(Request::SessionCapacity)? {
            Response::Capacity { capacity } => Ok(capacity),
            other => Err(ProtoError::UnexpectedResponse(other).into()),
        }
    }
}

impl Drop for RpcTransport {
    fn drop(&mut self) {
        self.shared.closing.store(true, Ordering::SeqCst);
        if let Some(link) = self.shared.link.lock().take() {
            let _ = link.stream.shutdown(Shutdown::Both);
        }
    }
}
