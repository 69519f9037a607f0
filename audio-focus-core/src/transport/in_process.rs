use std::sync::Arc;

use crate::arbiter::interrupt_arbiter::InterruptArbiter;
use crate::models::error::FocusError;
use crate::models::interrupt::{FocusEntry, InterruptRequest};
use crate::traits::event_sink::SessionEventSink;
use crate::traits::policy_transport::{PolicyTransport, SessionCapacity};

/// Direct calls into an arbiter living in the same process.
#[derive(Clone)]
pub struct InProcessTransport {
    arbiter: Arc<InterruptArbiter>,
}

impl InProcessTransport {
    pub fn new(arbiter: Arc<InterruptArbiter>) -> Self {
        Self { arbiter }
    }

    pub fn arbiter(&self) -> &Arc<InterruptArbiter> {
        &self.arbiter
    }
}

impl PolicyTransport for InProcessTransport {
    fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError> {
        self.arbiter.activate(request)
    }

    fn deactivate(&self, session_id: u32) -> Result<(), FocusError> {
        self.arbiter.deactivate(session_id)
    }

    fn set_interrupt_callback(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError> {
        self.arbiter.set_interrupt_callback(session_id, sink)
    }

    fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError> {
        self.arbiter.unset_interrupt_callback(session_id)
    }

    fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError> {
        self.arbiter.focus_info_list(zone_id)
    }

    fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.arbiter.create_zone(zone_id, pids)
    }

    fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.arbiter.add_zone_pids(zone_id, pids)
    }

    fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        self.arbiter.remove_zone_pids(zone_id, pids)
    }

    fn release_zone(&self, zone_id: i32) -> Result<(), FocusError> {
        self.arbiter.release_zone(zone_id)
    }

    fn allocate_session_id(&self) -> Result<u32, FocusError> {
        Ok(self.arbiter.allocate_session_id())
    }

    fn session_capacity(&self) -> Result<SessionCapacity, FocusError> {
        Ok(self.arbiter.session_capacity())
    }
}
