use crate::models::interrupt::InterruptEvent;
use crate::models::state::{RendererState, StateChangeCmd};

/// Receiver for session notifications.
///
/// Used both by applications (attached to a `StreamSession`) and by the
/// arbiter's callback registry, where the session's own interrupt handler is
/// the registered sink. Interrupt and service-death callbacks arrive on a
/// delivery thread; state and mark callbacks run on the calling thread.
pub trait SessionEventSink: Send + Sync {
    /// A focus change affecting this session.
    fn on_interrupt(&self, event: &InterruptEvent);

    fn on_state_change(&self, _state: RendererState, _cmd: StateChangeCmd) {}

    /// The policy service connection was lost. Focus bookkeeping for this
    /// session is gone until it is started again.
    fn on_service_died(&self) {}

    /// Written frames crossed the mark set with `set_mark_position`.
    fn on_mark_reached(&self, _frame: u64) {}
}
