use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::error::FocusError;
use crate::models::interrupt::{FocusEntry, InterruptRequest};
use crate::traits::event_sink::SessionEventSink;

/// Live session count against the service-wide instance cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCapacity {
    pub live: usize,
    pub max: usize,
}

impl SessionCapacity {
    pub fn is_full(&self) -> bool {
        self.live >= self.max
    }
}

/// How sessions reach the policy service.
///
/// Implemented by:
/// - `InProcessTransport` (arbiter in the same process)
/// - `RpcTransport` in `audio-focus-rpc` (framed socket to a policy server)
pub trait PolicyTransport: Send + Sync {
    fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError>;

    fn deactivate(&self, session_id: u32) -> Result<(), FocusError>;

    fn set_interrupt_callback(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError>;

    fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError>;

    fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError>;

    fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError>;

    fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError>;

    fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError>;

    fn release_zone(&self, zone_id: i32) -> Result<(), FocusError>;

    fn allocate_session_id(&self) -> Result<u32, FocusError>;

    fn session_capacity(&self) -> Result<SessionCapacity, FocusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_full_at_limit() {
        assert!(!SessionCapacity { live: 1, max: 2 }.is_full());
        assert!(SessionCapacity { live: 2, max: 2 }.is_full());
    }
}
