use std::sync::Arc;

use crate::arbiter::interrupt_arbiter::InterruptArbiter;
use crate::models::error::FocusError;
use crate::models::interrupt::{FocusEntry, InterruptRequest};
use crate::traits::event_sink::SessionEventSink;
use crate::traits::policy_transport::{PolicyTransport, SessionCapacity};
use crate::transport::in_process::InProcessTransport;

/// What stream sessions talk to.
///
/// Thin wrapper over a `PolicyTransport`; it logs failures so that the
/// session code can stay focused on its own state machine.
#[derive(Clone)]
pub struct PolicyServiceFacade {
    transport: Arc<dyn PolicyTransport>,
}

impl PolicyServiceFacade {
    pub fn new(transport: Arc<dyn PolicyTransport>) -> Self {
        Self { transport }
    }

    /// Facade over an arbiter in this process.
    pub fn in_process(arbiter: Arc<InterruptArbiter>) -> Self {
        Self::new(Arc::new(InProcessTransport::new(arbiter)))
    }

    pub fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError> {
        self.transport.activate(request).map_err(|e| {
            if !e.is_policy_decision() {
                log::error!("activate session {} failed: {}", request.session_id, e);
            }
            e
        })
    }

    pub fn deactivate(&self, session_id: u32) -> Result<(), FocusError> {
        self.transport.deactivate(session_id).map_err(|e| {
            log::error!("deactivate session {} failed: {}", session_id, e);
            e
        })
    }

    pub fn set_interrupt_callback(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError> {
        self.transport.set_interrupt_callback(session_id, sink)
    }

    pub fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError> {
        self.transport.unset_interrupt_callback(session_id)
    }

    pub fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError> {
        self.transport.focus_info_list(zone_id)
    }

    pub fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.transport.create_zone(zone_id, pids)
    }

    pub fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.transport.add_zone_pids(zone_id, pids)
    }

    pub fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.transport.remove_zone_pids(zone_id, pids)
    }

    pub fn release_zone(&self, zone_id: i32) -> Result<(), FocusError> {
        self.transport.release_zone(zone_id)
    }

    pub fn allocate_session_id(&self) -> Result<u32, FocusError> {
        self.transport.allocate_session_id()
    }

    pub fn session_capacity(&self) -> Result<SessionCapacity, FocusError> {
        self.transport.session_capacity()
    }
}
