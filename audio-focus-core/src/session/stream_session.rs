use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::config::SessionOptions;
use crate::models::error::FocusError;
use crate::models::interrupt::{InterruptEvent, InterruptHint, InterruptRequest};
use crate::models::state::{RendererState, StateChangeCmd};
use crate::models::stream_info::{InterruptMode, StreamCategory, StreamDirection};
use crate::traits::audio_stream::AudioStream;
use crate::traits::event_sink::SessionEventSink;
use crate::transport::facade::PolicyServiceFacade;

struct MarkPosition {
    frame: u64,
    reached: bool,
}

/// Mutable session state, protected by `parking_lot::Mutex`.
struct SessionInner<S> {
    stream: S,
    state: RendererState,
    mode: InterruptMode,
    /// Instance volume to restore on UNDUCK. `Some` while ducked.
    volume_before_duck: Option<f32>,
    mark: Option<MarkPosition>,
    /// Running byte total; frames are derived from it so partial frames
    /// carry over between writes.
    bytes_written: u64,
    /// Set between asking for focus and the stream actually running.
    starting: bool,
    /// FORCE pause/stop that arrived while `starting`, applied once the
    /// stream is up.
    pending_force: Option<InterruptHint>,
}

impl<S> SessionInner<S> {
    fn ensure_alive(&self) -> Result<(), FocusError> {
        if self.state.is_released() {
            return Err(FocusError::IllegalState("session already released".into()));
        }
        Ok(())
    }
}

/// State shared between the session handle and its interrupt handler.
struct SessionShared<S> {
    session_id: u32,
    inner: Mutex<SessionInner<S>>,
    sink: Mutex<Option<Arc<dyn SessionEventSink>>>,
}

impl<S: AudioStream> SessionShared<S> {
    fn app_sink(&self) -> Option<Arc<dyn SessionEventSink>> {
        self.sink.lock().clone()
    }

    fn notify_state(&self, state: RendererState, cmd: StateChangeCmd) {
        if let Some(sink) = self.app_sink() {
            sink.on_state_change(state, cmd);
        }
    }

    /// Apply a FORCE hint locally, then tell the application.
    fn handle_interrupt(&self, event: &InterruptEvent) {
        let mut state_change = None;
        let forward = {
            let mut inner = self.inner.lock();
            if inner.state.is_released() {
                return;
            }
            if !event.is_forced() {
                Some(*event)
            } else {
                match event.hint {
                    InterruptHint::Pause => {
                        if inner.starting {
                            inner.pending_force = Some(InterruptHint::Pause);
                        } else if inner.state.is_running() {
                            if !inner.stream.pause() {
                                log::warn!("session {}: stream refused forced pause", self.session_id);
                            }
                            inner.state = RendererState::Paused;
                            state_change = Some(RendererState::Paused);
                        }
                        Some(*event)
                    }
                    // The service never restarts a stream; the app decides.
                    InterruptHint::Resume => {
                        Some(InterruptEvent::share(event.event_type, InterruptHint::Resume))
                    }
                    InterruptHint::Stop => {
                        if inner.starting {
                            inner.pending_force = Some(InterruptHint::Stop);
                        } else if matches!(inner.state, RendererState::Running | RendererState::Paused) {
                            if !inner.stream.stop() {
                                log::warn!("session {}: stream refused forced stop", self.session_id);
                            }
                            inner.state = RendererState::Stopped;
                            state_change = Some(RendererState::Stopped);
                        }
                        Some(*event)
                    }
                    InterruptHint::Duck => {
                        let current = inner.stream.volume();
                        if current <= event.duck_volume {
                            log::debug!(
                                "session {}: volume {} already at or below duck target {}",
                                self.session_id,
                                current,
                                event.duck_volume
                            );
                            None
                        } else {
                            inner.volume_before_duck = Some(current);
                            if !inner.stream.set_volume(event.duck_volume) {
                                log::warn!("session {}: failed to apply duck volume", self.session_id);
                            }
                            Some(*event)
                        }
                    }
                    InterruptHint::Unduck => {
                        if let Some(volume) = inner.volume_before_duck.take() {
                            if !inner.stream.set_volume(volume) {
                                log::warn!("session {}: failed to restore volume", self.session_id);
                            }
                        }
                        Some(*event)
                    }
                    InterruptHint::None => Some(*event),
                }
            }
        };

        if let Some(sink) = self.app_sink() {
            if let Some(state) = state_change {
                sink.on_state_change(state, StateChangeCmd::Interrupt);
            }
            if let Some(event) = forward {
                sink.on_interrupt(&event);
            }
        }
    }
}

/// Registered with the policy service on behalf of one session.
struct InterruptHandler<S> {
    shared: Weak<SessionShared<S>>,
}

impl<S: AudioStream> SessionEventSink for InterruptHandler<S> {
    fn on_interrupt(&self, event: &InterruptEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_interrupt(event);
        }
    }

    fn on_service_died(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        log::warn!("session {}: policy service died", shared.session_id);
        if let Some(sink) = shared.app_sink() {
            sink.on_service_died();
        }
    }
}

/// One renderer or capturer instance.
///
/// Generic over the audio backend via the `AudioStream` trait. Owns the
/// lifecycle state machine, requests focus on start and gives it back on
/// pause/stop/release, and reacts to FORCE interrupts from the arbiter.
///
/// ```text
/// create ─▶ prepared ─start─▶ running ─pause─▶ paused
///                               │  ▲              │
///                             stop └────start─────┘
///                               ▼
///                            stopped ─start─▶ running
/// (any) ─release─▶ released
/// ```
pub struct StreamSession<S: AudioStream> {
    options: SessionOptions,
    facade: PolicyServiceFacade,
    shared: Arc<SessionShared<S>>,
}

impl<S: AudioStream> StreamSession<S> {
    /// Validate options, check permission and capacity, register the
    /// interrupt handler. The session starts out prepared.
    pub fn create(
        options: SessionOptions,
        facade: PolicyServiceFacade,
        stream: S,
    ) -> Result<Self, FocusError> {
        options.validate().map_err(FocusError::InvalidParam)?;

        if options.requires_system_permission() && !options.app.system_permission {
            log::warn!(
                "pid {} lacks permission for {:?}/{:?}",
                options.app.pid,
                options.usage,
                options.content_type
            );
            return Err(FocusError::PermissionDenied);
        }

        let capacity = facade.session_capacity()?;
        if capacity.is_full() {
            log::error!("session limit reached ({}/{})", capacity.live, capacity.max);
            return Err(FocusError::Overflow);
        }

        let session_id = facade.allocate_session_id()?;
        let shared = Arc::new(SessionShared {
            session_id,
            inner: Mutex::new(SessionInner {
                stream,
                state: RendererState::New,
                mode: options.mode,
                volume_before_duck: None,
                mark: None,
                bytes_written: 0,
                starting: false,
                pending_force: None,
            }),
            sink: Mutex::new(None),
        });

        let handler = Arc::new(InterruptHandler {
            shared: Arc::downgrade(&shared),
        });
        facade.set_interrupt_callback(session_id, handler)?;

        shared.inner.lock().state = RendererState::Prepared;
        log::info!("created session {} for {:?}", session_id, options.usage);

        Ok(Self {
            options,
            facade,
            shared,
        })
    }

    pub fn session_id(&self) -> u32 {
        self.shared.session_id
    }

    pub fn state(&self) -> RendererState {
        self.shared.inner.lock().state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn set_event_sink(&self, sink: Arc<dyn SessionEventSink>) {
        *self.shared.sink.lock() = Some(sink);
    }

    /// Only allowed before the first start.
    pub fn set_interrupt_mode(&self, mode: InterruptMode) -> Result<(), FocusError> {
        let mut inner = self.shared.inner.lock();
        inner.ensure_alive()?;
        if !matches!(inner.state, RendererState::New | RendererState::Prepared) {
            return Err(FocusError::IllegalState(format!(
                "interrupt mode is fixed once started ({:?})",
                inner.state
            )));
        }
        inner.mode = mode;
        Ok(())
    }

    /// The focus request this session sends on start.
    pub fn interrupt_request(&self) -> InterruptRequest {
        let mode = self.shared.inner.lock().mode;
        self.build_request(mode)
    }

    /// Request focus, then start the stream. A rejected request leaves the
    /// session where it was.
    pub fn start(&self) -> Result<(), FocusError> {
        let request = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_alive()?;
            if !inner.state.can_start() {
                return Err(FocusError::IllegalState(format!(
                    "cannot start from {:?}",
                    inner.state
                )));
            }
            inner.starting = true;
            inner.pending_force = None;
            self.build_request(inner.mode)
        };

        if let Err(e) = self.facade.activate(&request) {
            self.shared.inner.lock().starting = false;
            return Err(e);
        }

        let (started, forced) = {
            let mut inner = self.shared.inner.lock();
            inner.starting = false;
            let pending = inner.pending_force.take();
            if inner.state.is_released() {
                drop(inner);
                let _ = self.facade.deactivate(request.session_id);
                return Err(FocusError::IllegalState("session released during start".into()));
            }
            if inner.stream.start() {
                inner.state = RendererState::Running;
                let forced = match pending {
                    Some(InterruptHint::Pause) => {
                        inner.stream.pause();
                        Some(RendererState::Paused)
                    }
                    Some(InterruptHint::Stop) => {
                        inner.stream.stop();
                        Some(RendererState::Stopped)
                    }
                    _ => None,
                };
                if let Some(state) = forced {
                    inner.state = state;
                }
                (true, forced)
            } else {
                (false, None)
            }
        };

        if !started {
            let _ = self.facade.deactivate(request.session_id);
            return Err(FocusError::Operation("stream failed to start".into()));
        }

        log::info!("session {} started", request.session_id);
        self.shared
            .notify_state(RendererState::Running, StateChangeCmd::Request);
        if let Some(state) = forced {
            log::info!(
                "session {}: applying {:?} forced during start",
                request.session_id,
                state
            );
            self.shared.notify_state(state, StateChangeCmd::Interrupt);
        }
        Ok(())
    }

    /// Pause the stream and give focus back.
    pub fn pause(&self) -> Result<(), FocusError> {
        let paused = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_alive()?;
            if !inner.state.is_running() {
                return Err(FocusError::IllegalState(format!(
                    "cannot pause from {:?}",
                    inner.state
                )));
            }
            let paused = inner.stream.pause();
            if paused {
                inner.state = RendererState::Paused;
            }
            paused
        };

        let _ = self.facade.deactivate(self.session_id());
        if !paused {
            return Err(FocusError::Operation("stream failed to pause".into()));
        }
        self.shared
            .notify_state(RendererState::Paused, StateChangeCmd::Request);
        Ok(())
    }

    /// Stop the stream and give focus back.
    pub fn stop(&self) -> Result<(), FocusError> {
        let stopped = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_alive()?;
            if !matches!(inner.state, RendererState::Running | RendererState::Paused) {
                return Err(FocusError::IllegalState(format!(
                    "cannot stop from {:?}",
                    inner.state
                )));
            }
            let stopped = inner.stream.stop();
            if stopped {
                inner.state = RendererState::Stopped;
            }
            stopped
        };

        let _ = self.facade.deactivate(self.session_id());
        if !stopped {
            return Err(FocusError::Operation("stream failed to stop".into()));
        }
        self.shared
            .notify_state(RendererState::Stopped, StateChangeCmd::Request);
        Ok(())
    }

    /// Returns `Ok(false)` if the session was already released.
    pub fn release(&self) -> Result<bool, FocusError> {
        if self.state().is_released() {
            return Ok(false);
        }

        let session_id = self.session_id();
        if let Err(e) = self.facade.deactivate(session_id) {
            log::warn!("session {}: deactivate on release failed: {}", session_id, e);
        }
        if let Err(e) = self.facade.unset_interrupt_callback(session_id) {
            log::warn!("session {}: failed to unset interrupt callback: {}", session_id, e);
        }

        {
            let mut inner = self.shared.inner.lock();
            if inner.state.is_released() {
                return Ok(false);
            }
            if !inner.stream.release() {
                log::warn!("session {}: stream release reported failure", session_id);
            }
            inner.state = RendererState::Released;
            inner.volume_before_duck = None;
            inner.mark = None;
        }

        log::info!("session {} released", session_id);
        self.shared
            .notify_state(RendererState::Released, StateChangeCmd::Request);
        Ok(true)
    }

    /// Queue playback data. Only while running.
    pub fn write(&self, buffer: &[u8]) -> Result<usize, FocusError> {
        let frame_size = self.options.frame_size() as u64;
        let (written, mark_hit) = {
            let mut inner = self.shared.inner.lock();
            inner.ensure_alive()?;
            if self.options.direction != StreamDirection::Playback {
                return Err(FocusError::IllegalState("write on a capture session".into()));
            }
            if !inner.state.is_running() {
                return Err(FocusError::IllegalState(format!(
                    "cannot write while {:?}",
                    inner.state
                )));
            }
            let written = inner.stream.write(buffer)?;
            inner.bytes_written += written as u64;

            let frames = inner.bytes_written / frame_size;
            let mark_hit = match inner.mark.as_mut() {
                Some(mark) if !mark.reached && frames >= mark.frame => {
                    mark.reached = true;
                    Some(mark.frame)
                }
                _ => None,
            };
            (written, mark_hit)
        };

        if let Some(frame) = mark_hit {
            if let Some(sink) = self.shared.app_sink() {
                sink.on_mark_reached(frame);
            }
        }
        Ok(written)
    }

    /// Pull captured data. Only while running.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize, FocusError> {
        let mut inner = self.shared.inner.lock();
        inner.ensure_alive()?;
        if self.options.direction != StreamDirection::Capture {
            return Err(FocusError::IllegalState("read on a playback session".into()));
        }
        if !inner.state.is_running() {
            return Err(FocusError::IllegalState(format!(
                "cannot read while {:?}",
                inner.state
            )));
        }
        inner.stream.read(buffer)
    }

    /// Set the instance volume. While ducked this only changes the volume
    /// restored on unduck.
    pub fn set_volume(&self, volume: f32) -> Result<(), FocusError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(FocusError::InvalidParam(format!("volume out of range: {}", volume)));
        }
        let mut inner = self.shared.inner.lock();
        inner.ensure_alive()?;
        if inner.volume_before_duck.is_some() {
            inner.volume_before_duck = Some(volume);
            return Ok(());
        }
        if !inner.stream.set_volume(volume) {
            return Err(FocusError::Operation("stream rejected volume".into()));
        }
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.shared.inner.lock().stream.volume()
    }

    pub fn is_ducked(&self) -> bool {
        self.shared.inner.lock().volume_before_duck.is_some()
    }

    /// Fire `on_mark_reached` once written frames reach `frame`.
    pub fn set_mark_position(&self, frame: i64) -> Result<(), FocusError> {
        if frame <= 0 {
            return Err(FocusError::InvalidParam(format!("mark position must be positive: {}", frame)));
        }
        let mut inner = self.shared.inner.lock();
        inner.ensure_alive()?;
        inner.mark = Some(MarkPosition {
            frame: frame as u64,
            reached: false,
        });
        Ok(())
    }

    pub fn unset_mark_position(&self) {
        self.shared.inner.lock().mark = None;
    }

    pub fn frames_written(&self) -> u64 {
        self.shared.inner.lock().bytes_written / self.options.frame_size() as u64
    }

    fn build_request(&self, mode: InterruptMode) -> InterruptRequest {
        InterruptRequest {
            session_id: self.shared.session_id,
            category: StreamCategory::from_usage(self.options.usage),
            usage: self.options.usage,
            content_type: self.options.content_type,
            mode,
            pid: self.options.app.pid,
            uid: self.options.app.uid,
        }
    }
}

impl<S: AudioStream> Drop for StreamSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("session {}: release on drop failed: {}", self.session_id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use approx::assert_relative_eq;
    use crossbeam_channel::{unbounded, Receiver, Sender};

    use super::*;
    use crate::arbiter::interrupt_arbiter::InterruptArbiter;
    use crate::models::config::ArbiterConfig;
    use crate::models::interrupt::InterruptForceType;
    use crate::models::stream_info::{AppInfo, StreamUsage};
    use crate::policy::focus_table::FocusPolicyTable;
    use crate::models::interrupt::FocusEntry;
    use crate::traits::policy_transport::{PolicyTransport, SessionCapacity};
    use crate::transport::in_process::InProcessTransport;

    #[derive(Default)]
    struct MockState {
        running: bool,
        volume: f32,
        fail_start: bool,
        released: bool,
    }

    #[derive(Clone)]
    struct MockStream {
        state: Arc<Mutex<MockState>>,
    }

    impl MockStream {
        fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState {
                    volume: 1.0,
                    ..Default::default()
                })),
            }
        }
    }

    impl AudioStream for MockStream {
        fn start(&mut self) -> bool {
            let mut s = self.state.lock();
            if s.fail_start {
                return false;
            }
            s.running = true;
            true
        }

        fn pause(&mut self) -> bool {
            self.state.lock().running = false;
            true
        }

        fn stop(&mut self) -> bool {
            self.state.lock().running = false;
            true
        }

        fn release(&mut self) -> bool {
            let mut s = self.state.lock();
            s.running = false;
            s.released = true;
            true
        }

        fn write(&mut self, buffer: &[u8]) -> Result<usize, FocusError> {
            Ok(buffer.len())
        }

        fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FocusError> {
            buffer.fill(0);
            Ok(buffer.len())
        }

        fn volume(&self) -> f32 {
            self.state.lock().volume
        }

        fn set_volume(&mut self, volume: f32) -> bool {
            self.state.lock().volume = volume;
            true
        }

        fn is_running(&self) -> bool {
            self.state.lock().running
        }
    }

    enum Seen {
        Interrupt(InterruptEvent),
        State(RendererState, StateChangeCmd),
        Mark(u64),
    }

    struct AppSink {
        tx: Sender<Seen>,
    }

    impl SessionEventSink for AppSink {
        fn on_interrupt(&self, event: &InterruptEvent) {
            let _ = self.tx.send(Seen::Interrupt(*event));
        }

        fn on_state_change(&self, state: RendererState, cmd: StateChangeCmd) {
            let _ = self.tx.send(Seen::State(state, cmd));
        }

        fn on_mark_reached(&self, frame: u64) {
            let _ = self.tx.send(Seen::Mark(frame));
        }
    }

    fn facade() -> (Arc<InterruptArbiter>, PolicyServiceFacade) {
        let arbiter = Arc::new(InterruptArbiter::with_defaults());
        (Arc::clone(&arbiter), PolicyServiceFacade::in_process(arbiter))
    }

    fn new_session(facade: &PolicyServiceFacade, usage: StreamUsage) -> (StreamSession<MockStream>, MockStream) {
        let stream = MockStream::new();
        let session =
            StreamSession::create(SessionOptions::playback(usage), facade.clone(), stream.clone()).unwrap();
        (session, stream)
    }

    fn with_sink<S: AudioStream>(session: &StreamSession<S>) -> Receiver<Seen> {
        let (tx, rx) = unbounded();
        session.set_event_sink(Arc::new(AppSink { tx }));
        rx
    }

    fn next_interrupt(rx: &Receiver<Seen>) -> InterruptEvent {
        loop {
            match rx.recv_timeout(Duration::from_secs(2)).expect("no event") {
                Seen::Interrupt(ev) => return ev,
                _ => continue,
            }
        }
    }

    #[test]
    fn lifecycle_happy_path() {
        let (arbiter, facade) = facade();
        let (session, stream) = new_session(&facade, StreamUsage::Music);
        assert_eq!(session.state(), RendererState::Prepared);

        session.start().unwrap();
        assert_eq!(session.state(), RendererState::Running);
        assert!(stream.is_running());
        assert!(arbiter.focus_entry(session.session_id()).is_some());

        session.pause().unwrap();
        assert_eq!(session.state(), RendererState::Paused);
        assert!(arbiter.focus_entry(session.session_id()).is_none());

        session.start().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), RendererState::Stopped);

        assert_eq!(session.release(), Ok(true));
        assert_eq!(session.release(), Ok(false));
        assert!(stream.state.lock().released);
        assert_eq!(arbiter.session_count(), 0);
    }

    #[test]
    fn operations_after_release_are_illegal() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        session.release().unwrap();

        assert!(matches!(session.start(), Err(FocusError::IllegalState(_))));
        assert!(matches!(session.pause(), Err(FocusError::IllegalState(_))));
        assert!(matches!(session.stop(), Err(FocusError::IllegalState(_))));
        assert!(matches!(session.write(&[0; 4]), Err(FocusError::IllegalState(_))));
        assert!(matches!(session.set_volume(0.5), Err(FocusError::IllegalState(_))));
    }

    #[test]
    fn illegal_transitions() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        assert!(matches!(session.pause(), Err(FocusError::IllegalState(_))));
        assert!(matches!(session.stop(), Err(FocusError::IllegalState(_))));
        session.start().unwrap();
        assert!(matches!(session.start(), Err(FocusError::IllegalState(_))));
        assert!(matches!(
            session.set_interrupt_mode(InterruptMode::Independent),
            Err(FocusError::IllegalState(_))
        ));
    }

    #[test]
    fn privileged_usage_needs_permission() {
        let (_arbiter, facade) = facade();
        let opts = SessionOptions::playback(StreamUsage::VoiceModemCommunication);
        assert!(matches!(
            StreamSession::create(opts.clone(), facade.clone(), MockStream::new()),
            Err(FocusError::PermissionDenied)
        ));

        let allowed = SessionOptions {
            app: AppInfo {
                system_permission: true,
                ..Default::default()
            },
            ..opts
        };
        assert!(StreamSession::create(allowed, facade, MockStream::new()).is_ok());
    }

    #[test]
    fn session_limit_overflows() {
        let config = ArbiterConfig {
            max_session_instances: 1,
            ..Default::default()
        };
        let arbiter = Arc::new(InterruptArbiter::new(config, FocusPolicyTable::new()).unwrap());
        let facade = PolicyServiceFacade::in_process(arbiter);
        let (_first, _stream) = new_session(&facade, StreamUsage::Music);
        assert!(matches!(
            StreamSession::create(SessionOptions::default(), facade, MockStream::new()),
            Err(FocusError::Overflow)
        ));
    }

    #[test]
    fn failed_stream_start_releases_focus() {
        let (arbiter, facade) = facade();
        let (session, stream) = new_session(&facade, StreamUsage::Music);
        stream.state.lock().fail_start = true;

        assert!(matches!(session.start(), Err(FocusError::Operation(_))));
        assert_eq!(session.state(), RendererState::Prepared);
        assert!(arbiter.focus_entry(session.session_id()).is_none());
    }

    #[test]
    fn forced_pause_pauses_without_deactivating() {
        let (arbiter, facade) = facade();
        let (music, music_stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&music);
        let (call, _call_stream) = new_session(&facade, StreamUsage::VoiceCommunication);

        music.start().unwrap();
        call.start().unwrap();

        let ev = next_interrupt(&rx);
        assert_eq!(ev.hint, InterruptHint::Pause);
        assert_eq!(ev.force_type, InterruptForceType::Force);
        assert_eq!(music.state(), RendererState::Paused);
        assert!(!music_stream.is_running());
        assert!(arbiter.focus_entry(music.session_id()).is_some());
    }

    #[test]
    fn forced_duck_and_unduck_restore_volume() {
        let config = ArbiterConfig {
            resume_on_deactivate: true,
            ..Default::default()
        };
        let arbiter = Arc::new(InterruptArbiter::new(config, FocusPolicyTable::new()).unwrap());
        let facade = PolicyServiceFacade::in_process(arbiter);

        let (music, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&music);
        music.set_volume(0.8).unwrap();
        music.start().unwrap();

        let (nav, _nav_stream) = new_session(&facade, StreamUsage::Navigation);
        nav.start().unwrap();
        let ev = next_interrupt(&rx);
        assert_eq!(ev.hint, InterruptHint::Duck);
        assert_relative_eq!(music.volume(), 0.2);
        assert!(music.is_ducked());

        nav.stop().unwrap();
        assert_eq!(next_interrupt(&rx).hint, InterruptHint::Unduck);
        assert_relative_eq!(music.volume(), 0.8);
        assert!(!music.is_ducked());
    }

    #[test]
    fn duck_skipped_when_already_quiet() {
        let (_arbiter, facade) = facade();
        let (music, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&music);
        music.set_volume(0.1).unwrap();

        music
            .shared
            .handle_interrupt(&InterruptEvent::force_duck(crate::models::interrupt::InterruptType::Begin, 0.2));
        assert_relative_eq!(music.volume(), 0.1);
        assert!(!music.is_ducked());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn forced_resume_is_forwarded_as_share() {
        let (_arbiter, facade) = facade();
        let (music, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&music);
        music.shared.handle_interrupt(&InterruptEvent::force(
            crate::models::interrupt::InterruptType::End,
            InterruptHint::Resume,
        ));
        let ev = next_interrupt(&rx);
        assert_eq!(ev.hint, InterruptHint::Resume);
        assert_eq!(ev.force_type, InterruptForceType::Share);
    }

    #[test]
    fn mark_fires_once() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&session);
        assert!(matches!(session.set_mark_position(0), Err(FocusError::InvalidParam(_))));
        session.set_mark_position(10).unwrap();
        session.start().unwrap();

        // 4 bytes per frame with the default options.
        session.write(&[0u8; 32]).unwrap();
        session.write(&[0u8; 32]).unwrap();
        session.write(&[0u8; 32]).unwrap();
        assert_eq!(session.frames_written(), 24);

        let marks: Vec<u64> = rx
            .try_iter()
            .filter_map(|seen| match seen {
                Seen::Mark(frame) => Some(frame),
                _ => None,
            })
            .collect();
        assert_eq!(marks, vec![10]);
    }

    #[test]
    fn partial_frames_carry_over_between_writes() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&session);
        session.set_mark_position(6).unwrap();
        session.start().unwrap();

        // 6-byte writes against 4-byte frames.
        for _ in 0..3 {
            session.write(&[0u8; 6]).unwrap();
        }
        assert_eq!(session.frames_written(), 4);
        session.write(&[0u8; 6]).unwrap();
        assert_eq!(session.frames_written(), 6);

        let marks: Vec<u64> = rx
            .try_iter()
            .filter_map(|seen| match seen {
                Seen::Mark(frame) => Some(frame),
                _ => None,
            })
            .collect();
        assert_eq!(marks, vec![6]);
    }

    /// Delivers a FORCE/PAUSE to the requester from inside `activate`,
    /// before `start` has brought the stream up.
    struct PauseOnActivate {
        inner: InProcessTransport,
        sinks: Mutex<HashMap<u32, Arc<dyn SessionEventSink>>>,
    }

    impl PolicyTransport for PauseOnActivate {
        fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError> {
            self.inner.activate(request)?;
            let sink = self.sinks.lock().get(&request.session_id).cloned();
            if let Some(sink) = sink {
                sink.on_interrupt(&InterruptEvent::force(
                    crate::models::interrupt::InterruptType::Begin,
                    InterruptHint::Pause,
                ));
            }
            Ok(())
        }

        fn deactivate(&self, session_id: u32) -> Result<(), FocusError> {
            self.inner.deactivate(session_id)
        }

        fn set_interrupt_callback(
            &self,
            session_id: u32,
            sink: Arc<dyn SessionEventSink>,
        ) -> Result<(), FocusError> {
            self.sinks.lock().insert(session_id, Arc::clone(&sink));
            self.inner.set_interrupt_callback(session_id, sink)
        }

        fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError> {
            self.sinks.lock().remove(&session_id);
            self.inner.unset_interrupt_callback(session_id)
        }

        fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError> {
            self.inner.focus_info_list(zone_id)
        }

        fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
            self.inner.create_zone(zone_id, pids)
        }

        fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
            self.inner.add_zone_pids(zone_id, pids)
        }

        fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
            self.inner.remove_zone_pids(zone_id, pids)
        }

        fn release_zone(&self, zone_id: i32) -> Result<(), FocusError> {
            self.inner.release_zone(zone_id)
        }

        fn allocate_session_id(&self) -> Result<u32, FocusError> {
            self.inner.allocate_session_id()
        }

        fn session_capacity(&self) -> Result<SessionCapacity, FocusError> {
            self.inner.session_capacity()
        }
    }

    #[test]
    fn pause_forced_during_start_is_applied() {
        let arbiter = Arc::new(InterruptArbiter::with_defaults());
        let transport: Arc<dyn PolicyTransport> = Arc::new(PauseOnActivate {
            inner: InProcessTransport::new(arbiter),
            sinks: Mutex::new(HashMap::new()),
        });
        let facade = PolicyServiceFacade::new(transport);
        let (session, stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&session);

        session.start().unwrap();
        assert_eq!(session.state(), RendererState::Paused);
        assert!(!stream.is_running());

        let states: Vec<(RendererState, StateChangeCmd)> = rx
            .try_iter()
            .filter_map(|seen| match seen {
                Seen::State(state, cmd) => Some((state, cmd)),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                (RendererState::Running, StateChangeCmd::Request),
                (RendererState::Paused, StateChangeCmd::Interrupt),
            ]
        );
    }

    #[test]
    fn read_requires_capture_direction() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        session.start().unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(session.read(&mut buf), Err(FocusError::IllegalState(_))));

        let capture = StreamSession::create(
            SessionOptions {
                direction: StreamDirection::Capture,
                usage: StreamUsage::VoiceCommunication,
                ..Default::default()
            },
            facade,
            MockStream::new(),
        )
        .unwrap();
        capture.start().unwrap();
        assert_eq!(capture.read(&mut buf).unwrap(), 8);
    }

    #[test]
    fn state_changes_reach_the_app() {
        let (_arbiter, facade) = facade();
        let (session, _stream) = new_session(&facade, StreamUsage::Music);
        let rx = with_sink(&session);
        session.start().unwrap();
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            Seen::State(state, cmd) => {
                assert_eq!(state, RendererState::Running);
                assert_eq!(cmd, StateChangeCmd::Request);
            }
            _ => panic!("expected a state change"),
        }
    }
}
