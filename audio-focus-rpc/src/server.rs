use std::collections::HashMap;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use audio_focus_core::{
    load_policy_table, FocusError, FocusPolicyTable, InterruptArbiter, InterruptEvent,
    SessionEventSink,
};
use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::protocol::{
    read_frame, write_frame, ClientMessage, ProtoError, Request, Response, ServerMessage,
    PROTOCOL_VERSION,
};

/// Which connection owns which session, for cleanup when a client dies.
#[derive(Default)]
struct SessionOwners {
    owners: Mutex<HashMap<u32, u64>>,
}

impl SessionOwners {
    fn claim(&self, session_id: u32, conn_id: u64) {
        self.owners.lock().insert(session_id, conn_id);
    }

    fn forget(&self, session_id: u32, conn_id: u64) {
        let mut owners = self.owners.lock();
        if owners.get(&session_id) == Some(&conn_id) {
            owners.remove(&session_id);
        }
    }

    /// Run `register` and record ownership without letting a concurrent
    /// `release_all` slip in between.
    fn claim_with<F>(&self, session_id: u32, conn_id: u64, register: F) -> Result<(), FocusError>
    where
        F: FnOnce() -> Result<(), FocusError>,
    {
        let mut owners = self.owners.lock();
        register()?;
        owners.insert(session_id, conn_id);
        Ok(())
    }

    /// Hand every session owned by `conn_id` to `release`.
    fn release_all<F>(&self, conn_id: u64, release: F) -> usize
    where
        F: FnOnce(&[u32]),
    {
        let mut owners = self.owners.lock();
        let ids: Vec<u32> = owners
            .iter()
            .filter(|(_, owner)| **owner == conn_id)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            owners.remove(id);
        }
        release(&ids);
        ids.len()
    }
}

/// Open client sockets, so the server can cut them off.
type ConnectionMap = Arc<Mutex<HashMap<u64, TcpStream>>>;

fn close_all(connections: &ConnectionMap) -> usize {
    let connections = connections.lock();
    for stream in connections.values() {
        let _ = stream.shutdown(Shutdown::Both);
    }
    connections.len()
}

/// Pushes a session's interrupts down the owning client's socket.
struct RemoteSink {
    conn_id: u64,
    writer: Arc<Mutex<TcpStream>>,
    session_id: u32,
}

impl SessionEventSink for RemoteSink {
    fn on_interrupt(&self, event: &InterruptEvent) {
        let msg = ServerMessage::Event {
            session_id: self.session_id,
            event: *event,
        };
        let mut writer = self.writer.lock();
        if let Err(e) = write_frame(&mut *writer, &msg) {
            log::warn!(
                "conn {}: failed to deliver event for session {}: {}",
                self.conn_id,
                self.session_id,
                e
            );
        }
    }
}

/// Hosts an `InterruptArbiter` behind a TCP listener.
///
/// One thread per client connection; requests on a connection are handled
/// in order. When a connection drops, every session it owned loses its
/// focus and callback.
pub struct PolicyServer {
    listener: TcpListener,
    arbiter: Arc<InterruptArbiter>,
    owners: Arc<SessionOwners>,
    connections: ConnectionMap,
    running: Arc<AtomicBool>,
    next_conn_id: AtomicU64,
}

impl PolicyServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, arbiter: Arc<InterruptArbiter>) -> Result<Self, ProtoError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            arbiter,
            owners: Arc::new(SessionOwners::default()),
            connections: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(true)),
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Build the arbiter (and optional policy overrides) from `config` and bind.
    pub fn from_config(config: &ServerConfig) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::InvalidParam)?;
        let table = match &config.policy_file {
            Some(path) => load_policy_table(path)?,
            None => FocusPolicyTable::new(),
        };
        let arbiter = Arc::new(InterruptArbiter::new(config.arbiter.clone(), table)?);
        Self::bind(config.bind_addr(), arbiter).map_err(|e| {
            FocusError::Operation(format!("failed to bind {}: {}", config.bind_addr(), e))
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtoError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn arbiter(&self) -> &Arc<InterruptArbiter> {
        &self.arbiter
    }

    /// Accept clients until shut down. Blocks the calling thread.
    pub fn serve(&self) -> Result<(), ProtoError> {
        log::info!("policy server listening on {}", self.listener.local_addr()?);
        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    continue;
                }
            };
            let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
            if let Ok(clone) = stream.try_clone() {
                self.connections.lock().insert(conn_id, clone);
            }
            let handler = ConnectionHandler {
                conn_id,
                arbiter: Arc::clone(&self.arbiter),
                owners: Arc::clone(&self.owners),
                connections: Arc::clone(&self.connections),
            };
            let spawned = thread::Builder::new()
                .name(format!("focus-conn-{}", conn_id))
                .spawn(move || handler.serve(stream));
            if let Err(e) = spawned {
                log::error!("failed to spawn connection thread: {}", e);
            }
        }
        log::info!("policy server stopped");
        Ok(())
    }

    /// Run `serve` on a background thread.
    pub fn spawn(self) -> Result<ServerHandle, ProtoError> {
        let addr = self.local_addr()?;
        let running = Arc::clone(&self.running);
        let arbiter = Arc::clone(&self.arbiter);
        let connections = Arc::clone(&self.connections);
        let handle = thread::Builder::new()
            .name("focus-policy-server".into())
            .spawn(move || {
                if let Err(e) = self.serve() {
                    log::error!("policy server failed: {}", e);
                }
            })?;
        Ok(ServerHandle {
            addr,
            running,
            arbiter,
            connections,
            handle: Some(handle),
        })
    }
}

/// A server running on its own thread.
pub struct ServerHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    arbiter: Arc<InterruptArbiter>,
    connections: ConnectionMap,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn arbiter(&self) -> &Arc<InterruptArbiter> {
        &self.arbiter
    }

    /// Cut every connected client off while still accepting new ones.
    /// Clients see this as the service dying.
    pub fn drop_connections(&self) -> usize {
        let count = close_all(&self.connections);
        log::info!("dropped {} client connections", count);
        count
    }

    /// Stop accepting and close every client connection.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Wake the accept loop.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        close_all(&self.connections);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ConnectionHandler {
    conn_id: u64,
    arbiter: Arc<InterruptArbiter>,
    owners: Arc<SessionOwners>,
    connections: ConnectionMap,
}

impl ConnectionHandler {
    /// Request loop for one client. Returns when the client goes away.
    fn serve(self, stream: TcpStream) {
        let conn_id = self.conn_id;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        let writer = match stream.try_clone() {
            Ok(w) => Arc::new(Mutex::new(w)),
            Err(e) => {
                log::error!("conn {}: failed to clone socket: {}", conn_id, e);
                self.connections.lock().remove(&conn_id);
                return;
            }
        };
        let _ = stream.set_nodelay(true);
        let mut reader = BufReader::new(stream);
        log::info!("conn {}: client connected from {}", conn_id, peer);

        loop {
            let msg: ClientMessage = match read_frame(&mut reader) {
                Ok(m) => m,
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    log::warn!("conn {}: read failed: {}", conn_id, e);
                    break;
                }
            };

            let response = self.handle(msg.request, &writer);
            let reply = ServerMessage::Reply {
                seq: msg.seq,
                response,
            };
            let mut w = writer.lock();
            if let Err(e) = write_frame(&mut *w, &reply) {
                log::warn!("conn {}: failed to reply: {}", conn_id, e);
                break;
            }
        }

        self.connections.lock().remove(&conn_id);
        let arbiter = &self.arbiter;
        let released = self.owners.release_all(conn_id, |ids| {
            arbiter.release_client_sessions(ids);
        });
        log::info!(
            "conn {}: client {} gone, released {} sessions",
            conn_id,
            peer,
            released
        );
    }

    fn handle(&self, request: Request, writer: &Arc<Mutex<TcpStream>>) -> Response {
        let result = match request {
            Request::Hello {
                version,
                client_id,
                pid,
            } => {
                if version != PROTOCOL_VERSION {
                    return Response::from_error(&FocusError::InvalidParam(format!(
                        "protocol version mismatch: client={}, server={}",
                        version, PROTOCOL_VERSION
                    )));
                }
                log::info!("conn {}: hello from {} (pid {})", self.conn_id, client_id, pid);
                return Response::HelloOk {
                    version: PROTOCOL_VERSION,
                };
            }
            Request::Activate { request } => {
                let result = self.arbiter.activate(&request);
                if result.is_ok() {
                    self.owners.claim(request.session_id, self.conn_id);
                }
                result.map(|_| Response::Ok)
            }
            Request::Deactivate { session_id } => {
                self.arbiter.deactivate(session_id).map(|_| Response::Ok)
            }
            Request::SetInterruptCallback { session_id } => {
                let sink = Arc::new(RemoteSink {
                    conn_id: self.conn_id,
                    writer: Arc::clone(writer),
                    session_id,
                });
                self.owners
                    .claim_with(session_id, self.conn_id, || {
                        self.arbiter.set_interrupt_callback(session_id, sink)
                    })
                    .map(|_| Response::Ok)
            }
            Request::UnsetInterruptCallback { session_id } => {
                self.owners.forget(session_id, self.conn_id);
                self.arbiter
                    .unset_interrupt_callback(session_id)
                    .map(|_| Response::Ok)
            }
            Request::FocusInfoList { zone_id } => self
                .arbiter
                .focus_info_list(zone_id)
                .map(|entries| Response::FocusList { entries }),
            Request::CreateZone { zone_id, pids } => {
                self.arbiter.create_zone(zone_id, &pids).map(|_| Response::Ok)
            }
            Request::AddZonePids { zone_id, pids } => {
                self.arbiter.add_zone_pids(zone_id, &pids).map(|_| Response::Ok)
            }
            Request::RemoveZonePids { zone_id, pids } => self
                .arbiter
                .remove_zone_pids(zone_id, &pids)
                .map(|_| Response::Ok),
            Request::ReleaseZone { zone_id } => {
                self.arbiter.release_zone(zone_id).map(|_| Response::Ok)
            }
            Request::AllocateSessionId => Ok(Response::SessionId {
                session_id: self.arbiter.allocate_session_id(),
            }),
            Request::SessionCapacity => Ok(Response::Capacity {
                capacity: self.arbiter.session_capacity(),
            }),
        };

        match result {
            Ok(response) => response,
            Err(e) => Response::from_error(&e),
        }
    }
}
