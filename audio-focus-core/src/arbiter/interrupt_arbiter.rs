use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::zone::{ZoneTable, DEFAULT_ZONE_ID};
use crate::dispatch::callback_dispatcher::CallbackDispatcher;
use crate::models::config::ArbiterConfig;
use crate::models::error::FocusError;
use crate::models::interrupt::{
    FocusEffect, FocusEntry, InterruptEvent, InterruptHint, InterruptRequest, InterruptType,
};
use crate::models::stream_info::{INVALID_SESSION_ID, MIN_SESSION_ID};
use crate::policy::focus_table::{Decision, FocusPolicyTable};
use crate::traits::event_sink::SessionEventSink;
use crate::traits::policy_transport::SessionCapacity;

/// Everything guarded by the arbiter lock.
struct ArbiterState {
    zones: ZoneTable,
    /// Focus set per zone, insertion order. The default zone is always present.
    focus: BTreeMap<i32, Vec<FocusEntry>>,
    next_session_id: u32,
}

impl ArbiterState {
    fn new() -> Self {
        let mut focus = BTreeMap::new();
        focus.insert(DEFAULT_ZONE_ID, Vec::new());
        Self {
            zones: ZoneTable::new(),
            focus,
            next_session_id: MIN_SESSION_ID,
        }
    }

    fn find(&self, session_id: u32) -> Option<(i32, usize)> {
        self.focus.iter().find_map(|(zone, entries)| {
            entries
                .iter()
                .position(|e| e.session_id() == session_id)
                .map(|idx| (*zone, idx))
        })
    }

    fn take(&mut self, session_id: u32) -> Option<(i32, FocusEntry)> {
        let (zone, idx) = self.find(session_id)?;
        let entries = self.focus.get_mut(&zone)?;
        Some((zone, entries.remove(idx)))
    }

    fn entry_mut(&mut self, session_id: u32) -> Option<&mut FocusEntry> {
        let (zone, idx) = self.find(session_id)?;
        self.focus.get_mut(&zone)?.get_mut(idx)
    }

    /// Move every entry owned by one of `pids` into `to_zone`, keeping order.
    fn move_entries(&mut self, pids: &[i32], to_zone: i32) {
        let mut moved = Vec::new();
        for (zone, entries) in self.focus.iter_mut() {
            if *zone == to_zone {
                continue;
            }
            let (keep, go): (Vec<_>, Vec<_>) = entries
                .drain(..)
                .partition(|e| !pids.contains(&e.request.pid));
            *entries = keep;
            moved.extend(go);
        }
        self.focus.entry(to_zone).or_default().extend(moved);
    }
}

/// Owns every zone's focus set and decides who gets to play.
///
/// One lock covers zones, focus sets and the id allocator; events are
/// queued on the dispatcher while it is held, so each session sees them in
/// decision order. Delivery happens on the dispatcher's threads.
///
/// ```text
/// activate(req) ─▶ evaluate vs. every entry of req's zone
///                    ├─ any RejectIncoming ─▶ Err(Rejected), nothing changes
///                    └─ otherwise ─▶ apply Stop/Pause/Duck/Share, append req
/// ```
pub struct InterruptArbiter {
    config: ArbiterConfig,
    table: FocusPolicyTable,
    state: Mutex<ArbiterState>,
    dispatcher: Arc<CallbackDispatcher>,
}

impl InterruptArbiter {
    pub fn new(config: ArbiterConfig, table: FocusPolicyTable) -> Result<Self, FocusError> {
        config.validate().map_err(FocusError::InvalidParam)?;
        let dispatcher = Arc::new(CallbackDispatcher::new(config.mailbox_capacity));
        Ok(Self {
            config,
            table,
            state: Mutex::new(ArbiterState::new()),
            dispatcher,
        })
    }

    /// Default configuration and the built-in table.
    pub fn with_defaults() -> Self {
        Self {
            config: ArbiterConfig::default(),
            table: FocusPolicyTable::new(),
            state: Mutex::new(ArbiterState::new()),
            dispatcher: Arc::new(CallbackDispatcher::new(ArbiterConfig::default().mailbox_capacity)),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn table(&self) -> &FocusPolicyTable {
        &self.table
    }

    pub fn dispatcher(&self) -> &Arc<CallbackDispatcher> {
        &self.dispatcher
    }

    /// Request focus for `request.session_id` in the zone of `request.pid`.
    pub fn activate(&self, request: &InterruptRequest) -> Result<(), FocusError> {
        if !request.has_valid_session() {
            return Err(FocusError::InvalidParam("invalid session id".into()));
        }

        let mut state = self.state.lock();
        let zone = state.zones.zone_of(request.pid);

        let mut decisions = Vec::new();
        if let Some(entries) = state.focus.get(&zone) {
            for entry in entries {
                if entry.session_id() == request.session_id
                    || entry.effect == FocusEffect::Paused
                    || request.is_same_app_in_share_mode(&entry.request)
                {
                    continue;
                }
                let decision = self.table.evaluate(request, &entry.request);
                if decision == Decision::RejectIncoming {
                    log::info!(
                        "session {} ({:?}) rejected by session {} ({:?})",
                        request.session_id,
                        request.category,
                        entry.session_id(),
                        entry.request.category
                    );
                    return Err(FocusError::Rejected);
                }
                decisions.push((entry.session_id(), decision));
            }
        }

        if state.take(request.session_id).is_some() {
            log::debug!("session {} re-activating", request.session_id);
        }

        // A newcomer that has to duck leaves every current entry alone.
        let duck_incoming = decisions
            .iter()
            .any(|(_, decision)| *decision == Decision::DuckIncoming);
        if duck_incoming {
            decisions.clear();
        }
        for (existing, decision) in decisions {
            match decision {
                Decision::StopExisting => {
                    state.take(existing);
                    self.send(existing, InterruptEvent::force(InterruptType::Begin, InterruptHint::Stop));
                }
                Decision::PauseExisting => {
                    if let Some(entry) = state.entry_mut(existing) {
                        let was = entry.effect;
                        entry.effect = FocusEffect::Paused;
                        self.transition(existing, was, FocusEffect::Paused);
                    }
                }
                Decision::DuckExisting => {
                    if let Some(entry) = state.entry_mut(existing) {
                        if entry.effect == FocusEffect::Active {
                            entry.effect = FocusEffect::Ducked;
                            self.transition(existing, FocusEffect::Active, FocusEffect::Ducked);
                        }
                    }
                }
                Decision::ShareExisting(hint) => {
                    self.send(existing, InterruptEvent::share(InterruptType::Begin, hint));
                }
                Decision::DuckIncoming | Decision::Coexist | Decision::RejectIncoming => {}
            }
        }

        let effect = if duck_incoming {
            FocusEffect::Ducked
        } else {
            FocusEffect::Active
        };
        state
            .focus
            .entry(zone)
            .or_default()
            .push(FocusEntry::new(*request, effect));
        if duck_incoming {
            self.transition(request.session_id, FocusEffect::Active, FocusEffect::Ducked);
        }

        log::info!(
            "session {} ({:?}) activated in zone {} as {:?}",
            request.session_id,
            request.category,
            zone,
            effect
        );
        Ok(())
    }

    /// Remove `session_id` from the focus set. Succeeds whether or not it
    /// was present.
    pub fn deactivate(&self, session_id: u32) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let Some((zone, entry)) = state.take(session_id) else {
            log::debug!("deactivate: session {} holds no focus", session_id);
            return Ok(());
        };
        log::info!(
            "session {} ({:?}) deactivated in zone {}",
            session_id,
            entry.request.category,
            zone
        );

        if self.config.resume_on_deactivate {
            self.resume_zone(&mut state, zone);
        }
        Ok(())
    }

    /// Snapshot of a zone's focus set in insertion order.
    pub fn focus_info_list(&self, zone_id: i32) -> Result<Vec<FocusEntry>, FocusError> {
        let state = self.state.lock();
        if !state.zones.contains(zone_id) {
            return Err(FocusError::InvalidParam(format!("no zone {}", zone_id)));
        }
        Ok(state.focus.get(&zone_id).cloned().unwrap_or_default())
    }

    pub fn focus_entry(&self, session_id: u32) -> Option<FocusEntry> {
        let state = self.state.lock();
        let (zone, idx) = state.find(session_id)?;
        state.focus.get(&zone)?.get(idx).cloned()
    }

    pub fn create_zone(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        state.zones.create(zone_id, pids)?;
        state.move_entries(pids, zone_id);
        log::info!("created zone {} with pids {:?}", zone_id, pids);
        Ok(())
    }

    pub fn add_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        state.zones.add(zone_id, pids)?;
        state.move_entries(pids, zone_id);
        log::info!("added pids {:?} to zone {}", pids, zone_id);
        Ok(())
    }

    pub fn remove_zone_pids(&self, zone_id: i32, pids: &[i32]) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let removed = state.zones.remove(zone_id, pids)?;
        state.move_entries(&removed, DEFAULT_ZONE_ID);
        log::info!("removed pids {:?} from zone {}", removed, zone_id);
        Ok(())
    }

    /// Release a zone; its pids and focus entries go back to the default
    /// zone. Releasing an unknown zone is a no-op.
    pub fn release_zone(&self, zone_id: i32) -> Result<(), FocusError> {
        let mut state = self.state.lock();
        let Some(pids) = state.zones.release(zone_id) else {
            log::debug!("release_zone: no zone {}", zone_id);
            return Ok(());
        };
        let entries = state.focus.remove(&zone_id).unwrap_or_default();
        state
            .focus
            .entry(DEFAULT_ZONE_ID)
            .or_default()
            .extend(entries);
        log::info!("released zone {} ({} pids)", zone_id, pids.len());
        Ok(())
    }

    pub fn zone_of_pid(&self, pid: i32) -> i32 {
        self.state.lock().zones.zone_of(pid)
    }

    pub fn set_interrupt_callback(
        &self,
        session_id: u32,
        sink: Arc<dyn SessionEventSink>,
    ) -> Result<(), FocusError> {
        if session_id == INVALID_SESSION_ID {
            return Err(FocusError::InvalidParam("invalid session id".into()));
        }
        self.dispatcher.register(session_id, sink)
    }

    pub fn unset_interrupt_callback(&self, session_id: u32) -> Result<(), FocusError> {
        if !self.dispatcher.unregister(session_id) {
            log::debug!("no interrupt callback registered for session {}", session_id);
        }
        Ok(())
    }

    /// Sessions with a registered callback.
    pub fn session_count(&self) -> usize {
        self.dispatcher.len()
    }

    pub fn session_capacity(&self) -> SessionCapacity {
        SessionCapacity {
            live: self.session_count(),
            max: self.config.max_session_instances,
        }
    }

    /// Hand out the next session id. Ids start at `MIN_SESSION_ID` and wrap
    /// back to it before reaching the invalid sentinel.
    pub fn allocate_session_id(&self) -> u32 {
        let mut state = self.state.lock();
        let id = state.next_session_id;
        state.next_session_id = match id.checked_add(1) {
            Some(next) if next != INVALID_SESSION_ID => next,
            _ => MIN_SESSION_ID,
        };
        id
    }

    /// Drop focus and callbacks of sessions whose client went away.
    pub fn release_client_sessions(&self, session_ids: &[u32]) -> usize {
        let mut released = 0;
        for id in session_ids {
            let had_focus = self.focus_entry(*id).is_some();
            if self.deactivate(*id).is_ok() && had_focus {
                released += 1;
            }
            self.dispatcher.unregister(*id);
        }
        if !session_ids.is_empty() {
            log::info!(
                "cleaned up {} sessions of a dead client ({} held focus)",
                session_ids.len(),
                released
            );
        }
        released
    }

    fn send(&self, session_id: u32, event: InterruptEvent) {
        log::debug!("session {} <- {:?}/{:?}", session_id, event.force_type, event.hint);
        self.dispatcher.post_interrupt(session_id, event);
    }

    /// Post the FORCE events that move a session from one effect to another.
    fn transition(&self, session_id: u32, from: FocusEffect, to: FocusEffect) {
        use FocusEffect::*;

        let duck = InterruptEvent::force_duck(InterruptType::Begin, self.config.duck_volume);
        let pause = InterruptEvent::force(InterruptType::Begin, InterruptHint::Pause);
        let resume = InterruptEvent::force(InterruptType::End, InterruptHint::Resume);
        let unduck = InterruptEvent::force(InterruptType::End, InterruptHint::Unduck);

        match (from, to) {
            (Active, Ducked) => self.send(session_id, duck),
            (Active, Paused) => self.send(session_id, pause),
            (Ducked, Active) => self.send(session_id, unduck),
            (Ducked, Paused) => {
                self.send(session_id, unduck);
                self.send(session_id, pause);
            }
            (Paused, Active) => self.send(session_id, resume),
            (Paused, Ducked) => {
                self.send(session_id, resume);
                self.send(session_id, duck);
            }
            _ => {}
        }
    }

    /// Replay the zone's focus set in order and move every entry to the
    /// effect it would have if the sessions had started in that order.
    fn resume_zone(&self, state: &mut ArbiterState, zone: i32) {
        let Some(entries) = state.focus.get_mut(&zone) else {
            return;
        };
        let effects = self.simulate(entries);
        for (entry, effect) in entries.iter_mut().zip(effects) {
            if entry.effect != effect {
                log::info!(
                    "session {} {:?} -> {:?} after deactivation",
                    entry.session_id(),
                    entry.effect,
                    effect
                );
                self.transition(entry.session_id(), entry.effect, effect);
                entry.effect = effect;
            }
        }
    }

    fn simulate(&self, entries: &[FocusEntry]) -> Vec<FocusEffect> {
        let mut effects = vec![FocusEffect::Active; entries.len()];
        for later in 0..entries.len() {
            let incoming = &entries[later].request;
            let mut decisions = Vec::new();
            let mut rejected = false;
            for earlier in 0..later {
                let existing = &entries[earlier].request;
                if effects[earlier] == FocusEffect::Paused
                    || incoming.is_same_app_in_share_mode(existing)
                {
                    continue;
                }
                let decision = self.table.evaluate(incoming, existing);
                if decision == Decision::RejectIncoming {
                    rejected = true;
                    break;
                }
                decisions.push((earlier, decision));
            }
            if rejected {
                effects[later] = FocusEffect::Paused;
                continue;
            }
            if decisions.iter().any(|(_, d)| *d == Decision::DuckIncoming) {
                effects[later] = FocusEffect::Ducked;
                continue;
            }
            for (earlier, decision) in decisions {
                match decision {
                    Decision::StopExisting | Decision::PauseExisting => {
                        effects[earlier] = FocusEffect::Paused
                    }
                    Decision::DuckExisting if effects[earlier] == FocusEffect::Active => {
                        effects[earlier] = FocusEffect::Ducked
                    }
                    _ => {}
                }
            }
        }
        effects
    }
}
