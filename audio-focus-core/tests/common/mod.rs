#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use audio_focus_core::{
    AudioStream, FocusError, InterruptEvent, PolicyServiceFacade, RendererState, SessionEventSink,
    SessionOptions, StateChangeCmd, StreamSession, StreamUsage,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// In-memory stream whose state tests can inspect after handing it over.
#[derive(Clone)]
pub struct FakeStream {
    inner: Arc<Mutex<FakeState>>,
}

struct FakeState {
    running: bool,
    volume: f32,
    bytes: usize,
}

impl FakeStream {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                running: false,
                volume: 1.0,
                bytes: 0,
            })),
        }
    }

    pub fn running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn bytes_written(&self) -> usize {
        self.inner.lock().bytes
    }
}

impl AudioStream for FakeStream {
    fn start(&mut self) -> bool {
        self.inner.lock().running = true;
        true
    }

    fn pause(&mut self) -> bool {
        self.inner.lock().running = false;
        true
    }

    fn stop(&mut self) -> bool {
        self.inner.lock().running = false;
        true
    }

    fn release(&mut self) -> bool {
        self.inner.lock().running = false;
        true
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize, FocusError> {
        self.inner.lock().bytes += buffer.len();
        Ok(buffer.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FocusError> {
        Ok(buffer.len())
    }

    fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    fn set_volume(&mut self, volume: f32) -> bool {
        self.inner.lock().volume = volume;
        true
    }

    fn is_running(&self) -> bool {
        self.inner.lock().running
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Interrupt(InterruptEvent),
    State(RendererState, StateChangeCmd),
    ServiceDied,
    Mark(u64),
}

pub struct RecordingSink {
    tx: Sender<Observed>,
}

impl SessionEventSink for RecordingSink {
    fn on_interrupt(&self, event: &InterruptEvent) {
        let _ = self.tx.send(Observed::Interrupt(*event));
    }

    fn on_state_change(&self, state: RendererState, cmd: StateChangeCmd) {
        let _ = self.tx.send(Observed::State(state, cmd));
    }

    fn on_service_died(&self) {
        let _ = self.tx.send(Observed::ServiceDied);
    }

    fn on_mark_reached(&self, frame: u64) {
        let _ = self.tx.send(Observed::Mark(frame));
    }
}

pub struct Harness {
    pub session: StreamSession<FakeStream>,
    pub stream: FakeStream,
    pub events: Receiver<Observed>,
}

impl Harness {
    pub fn next_interrupt(&self) -> InterruptEvent {
        loop {
            match self.events.recv_timeout(Duration::from_secs(3)) {
                Ok(Observed::Interrupt(ev)) => return ev,
                Ok(_) => continue,
                Err(e) => panic!("no interrupt for session {}: {}", self.session.session_id(), e),
            }
        }
    }

    pub fn no_interrupt(&self) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_millis(150);
        while let Some(left) = deadline.checked_duration_since(std::time::Instant::now()) {
            match self.events.recv_timeout(left) {
                Ok(Observed::Interrupt(_)) => return false,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        true
    }

    pub fn wait_for(&self, wanted: &Observed) -> bool {
        while let Ok(seen) = self.events.recv_timeout(Duration::from_secs(3)) {
            if &seen == wanted {
                return true;
            }
        }
        false
    }
}

pub fn open(facade: &PolicyServiceFacade, options: SessionOptions) -> Harness {
    let stream = FakeStream::new();
    let session = StreamSession::create(options, facade.clone(), stream.clone())
        .expect("session create failed");
    let (tx, events) = unbounded();
    session.set_event_sink(Arc::new(RecordingSink { tx }));
    Harness {
        session,
        stream,
        events,
    }
}

pub fn open_usage(facade: &PolicyServiceFacade, usage: StreamUsage) -> Harness {
    let mut options = SessionOptions::playback(usage);
    options.app.system_permission = true;
    open(facade, options)
}
