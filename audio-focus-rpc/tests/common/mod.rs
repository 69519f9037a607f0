#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use audio_focus_core::{
    AudioStream, FocusError, InterruptArbiter, InterruptEvent, PolicyServiceFacade,
    PolicyTransport, SessionEventSink, SessionOptions, StreamSession, StreamUsage,
};
use audio_focus_rpc::{ClientConfig, PolicyServer, RpcTransport, ServerHandle};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// Stream stand-in; clones share state so the test can look inside.
#[derive(Clone)]
pub struct FakeStream {
    running: Arc<Mutex<bool>>,
    volume: Arc<Mutex<f32>>,
}

impl Default for FakeStream {
    fn default() -> Self {
        Self {
            running: Arc::new(Mutex::new(false)),
            volume: Arc::new(Mutex::new(1.0)),
        }
    }
}

impl FakeStream {
    pub fn running(&self) -> bool {
        *self.running.lock()
    }
}

impl AudioStream for FakeStream {
    fn start(&mut self) -> bool {
        *self.running.lock() = true;
        true
    }

    fn pause(&mut self) -> bool {
        *self.running.lock() = false;
        true
    }

    fn stop(&mut self) -> bool {
        *self.running.lock() = false;
        true
    }

    fn release(&mut self) -> bool {
        *self.running.lock() = false;
        true
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, FocusError> {
        Ok(buffer.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FocusError> {
        Ok(buffer.len())
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_volume(&mut self, volume: f32) -> bool {
        *self.volume.lock() = volume;
        true
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Interrupt(InterruptEvent),
    ServiceDied,
}

struct ChannelSink {
    tx: Sender<Seen>,
}

impl SessionEventSink for ChannelSink {
    fn on_interrupt(&self, event: &InterruptEvent) {
        let _ = self.tx.send(Seen::Interrupt(*event));
    }

    fn on_service_died(&self) {
        let _ = self.tx.send(Seen::ServiceDied);
    }
}

pub struct RemoteSession {
    pub session: StreamSession<FakeStream>,
    pub stream: FakeStream,
    pub events: Receiver<Seen>,
}

impl RemoteSession {
    pub fn next_interrupt(&self) -> InterruptEvent {
        loop {
            match self.events.recv_timeout(Duration::from_secs(3)) {
                Ok(Seen::Interrupt(ev)) => return ev,
                Ok(Seen::ServiceDied) => continue,
                Err(e) => panic!("session {}: no interrupt: {}", self.session.session_id(), e),
            }
        }
    }

    pub fn wait_service_died(&self) -> bool {
        while let Ok(seen) = self.events.recv_timeout(Duration::from_secs(3)) {
            if seen == Seen::ServiceDied {
                return true;
            }
        }
        false
    }
}

pub fn spawn_server() -> ServerHandle {
    let _ = env_logger::builder().is_test(true).try_init();
    PolicyServer::bind("127.0.0.1:0", Arc::new(InterruptArbiter::with_defaults()))
        .and_then(PolicyServer::spawn)
        .expect("server start failed")
}

pub fn client(server: &ServerHandle) -> (Arc<RpcTransport>, PolicyServiceFacade) {
    let transport = Arc::new(
        RpcTransport::connect(ClientConfig::new(server.addr().to_string()))
            .expect("connect failed"),
    );
    let shared: Arc<dyn PolicyTransport> = transport.clone();
    let facade = PolicyServiceFacade::new(shared);
    (transport, facade)
}

pub fn open(facade: &PolicyServiceFacade, usage: StreamUsage) -> RemoteSession {
    let mut options = SessionOptions::playback(usage);
    options.app.system_permission = true;
    let stream = FakeStream::default();
    let session = StreamSession::create(options, facade.clone(), stream.clone())
        .expect("session create failed");
    let (tx, events) = unbounded();
    session.set_event_sink(Arc::new(ChannelSink { tx }));
    RemoteSession {
        session,
        stream,
        events,
    }
}

/// Poll `cond` for up to three seconds.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
