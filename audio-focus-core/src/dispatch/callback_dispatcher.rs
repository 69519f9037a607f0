use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::error::FocusError;
use crate::models::interrupt::InterruptEvent;
use crate::traits::event_sink::SessionEventSink;

/// Event queued for one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Interrupt(InterruptEvent),
    ServiceDied,
}

struct Mailbox {
    tx: Sender<SessionEvent>,
}

/// Per-session bounded mailboxes with one delivery thread each.
///
/// ```text
/// post(id, ev) ──try_send──▶ [bounded queue] ──▶ "focus-cb-{id}" thread ──▶ sink
/// ```
///
/// `post` never blocks: a full mailbox drops the event with an error log.
/// Events for one session are delivered in post order; no ordering holds
/// across sessions. Unregistering drops the sender, and the delivery thread
/// exits after draining what is already queued.
pub struct CallbackDispatcher {
    capacity: usize,
    mailboxes: Mutex<HashMap<u32, Mailbox>>,
}

impl CallbackDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Attach `sink` to `session_id`, replacing any previous registration.
    pub fn register(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError> {
        let (tx, rx) = bounded::<SessionEvent>(self.capacity);

        thread::Builder::new()
            .name(format!("focus-cb-{}", session_id))
            .spawn(move || {
                for event in rx {
                    match event {
                        SessionEvent::Interrupt(ev) => sink.on_interrupt(&ev),
                        SessionEvent::ServiceDied => sink.on_service_died(),
                    }
                }
            })
            .map_err(|e| {
                FocusError::Operation(format!("failed to spawn delivery thread: {}", e))
            })?;

        if self
            .mailboxes
            .lock()
            .insert(session_id, Mailbox { tx })
            .is_some()
        {
            log::debug!("replaced interrupt callback for session {}", session_id);
        }
        Ok(())
    }

    /// Returns whether a registration existed.
    pub fn unregister(&self, session_id: u32) -> bool {
        self.mailboxes.lock().remove(&session_id).is_some()
    }

    pub fn is_registered(&self, session_id: u32) -> bool {
        self.mailboxes.lock().contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.mailboxes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue an event. Returns `false` if it was not queued.
    pub fn post(&self, session_id: u32, event: SessionEvent) -> bool {
        let mailboxes = self.mailboxes.lock();
        let Some(mailbox) = mailboxes.get(&session_id) else {
            log::debug!("no callback for session {}, dropping {:?}", session_id, event);
            return false;
        };
        match mailbox.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                log::error!("mailbox full for session {}, dropping {:?}", session_id, event);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("delivery thread for session {} is gone", session_id);
                false
            }
        }
    }

    pub fn post_interrupt(&self, session_id: u32, event: InterruptEvent) -> bool {
        self.post(session_id, SessionEvent::Interrupt(event))
    }

    /// Tell every registered session that the policy service died.
    pub fn broadcast_service_died(&self) -> usize {
        let ids: Vec<u32> = self.mailboxes.lock().keys().copied().collect();
        ids.into_iter()
            .filter(|id| self.post(*id, SessionEvent::ServiceDied))
            .count()
    }
}
