use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::interrupt::{InterruptHint, InterruptRequest};
use crate::models::stream_info::StreamCategory;

/// Outcome of evaluating an incoming request against one existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The incoming request is denied; nothing changes.
    RejectIncoming,
    /// The existing session is stopped and leaves the focus set.
    StopExisting,
    /// The existing session is paused.
    PauseExisting,
    /// The existing session keeps playing at reduced volume.
    DuckExisting,
    /// The incoming session is granted focus but starts ducked.
    DuckIncoming,
    /// The existing session is told about the conflict and decides itself.
    ShareExisting(InterruptHint),
    Coexist,
}

/// Directional focus policy: `(existing category, incoming category) → Decision`.
///
/// The built-in rules are an explicit lookup. Precedence:
/// 1. per-pair overrides (`with_overrides`, usually loaded from JSON);
/// 2. rows where the existing session is a call;
/// 3. rows where the incoming session is a call;
/// 4. per-existing-category rows;
/// 5. `Coexist`.
#[derive(Debug, Clone, Default)]
pub struct FocusPolicyTable {
    overrides: HashMap<(StreamCategory, StreamCategory), Decision>,
}

impl FocusPolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose overrides take precedence over the built-in rules.
    pub fn with_overrides(overrides: HashMap<(StreamCategory, StreamCategory), Decision>) -> Self {
        Self { overrides }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Decide what happens when `incoming` starts while `existing` holds focus.
    pub fn evaluate(&self, incoming: &InterruptRequest, existing: &InterruptRequest) -> Decision {
        self.decide(existing.category, incoming.category)
    }

    /// Category-level lookup used by `evaluate`.
    pub fn decide(&self, existing: StreamCategory, incoming: StreamCategory) -> Decision {
        if let Some(decision) = self.overrides.get(&(existing, incoming)) {
            return *decision;
        }
        builtin_decision(existing, incoming)
    }
}

fn builtin_decision(existing: StreamCategory, incoming: StreamCategory) -> Decision {
    use StreamCategory::*;

    if existing.is_call() {
        return existing_call_row(existing, incoming);
    }
    if incoming.is_call() {
        return incoming_call_row(existing, incoming);
    }

    match (existing, incoming) {
        // Media replaces media; everything short-lived ducks or pauses it.
        (e, i) if e.is_media() && i.is_media() => Decision::StopExisting,
        (e, VoiceMessage | Ringtone | Alarm | VoiceAssistant) if e.is_media() => {
            Decision::PauseExisting
        }
        (e, Navigation | Notification | System | Dtmf | Accessibility) if e.is_media() => {
            Decision::DuckExisting
        }
        (e, EnforcedTone) if e.is_media() => Decision::ShareExisting(InterruptHint::Duck),

        (Ringtone, Ringtone) => Decision::StopExisting,
        (Ringtone, i) if i.is_media() => Decision::RejectIncoming,

        (Alarm, Alarm) => Decision::StopExisting,
        (Alarm, Ringtone) => Decision::PauseExisting,
        (Alarm, i) if i.is_media() => Decision::DuckIncoming,

        (VoiceAssistant, VoiceAssistant | Ringtone) => Decision::StopExisting,
        (VoiceAssistant, i) if i.is_media() => Decision::DuckIncoming,

        (VoiceMessage, VoiceMessage | Ringtone) => Decision::StopExisting,
        (VoiceMessage, i) if i.is_media() => Decision::DuckIncoming,

        (Notification, Notification) => Decision::StopExisting,
        (Dtmf, Dtmf) => Decision::StopExisting,
        (Navigation, Navigation) => Decision::StopExisting,
        (Accessibility, Accessibility) => Decision::StopExisting,

        _ => Decision::Coexist,
    }
}

/// Existing session is VOICE_COMMUNICATION or VOICE_MODEM_COMMUNICATION.
fn existing_call_row(existing: StreamCategory, incoming: StreamCategory) -> Decision {
    use StreamCategory::*;

    match incoming {
        VoiceModemCommunication if existing == VoiceCommunication => Decision::StopExisting,
        VoiceCommunication | VoiceModemCommunication => Decision::RejectIncoming,
        Ringtone | Notification | VoiceAssistant => Decision::RejectIncoming,
        Navigation | Accessibility => Decision::DuckExisting,
        VoiceMessage | System | Music | Movie | Game | Audiobook | Alarm => Decision::DuckIncoming,
        EnforcedTone | Dtmf => Decision::Coexist,
    }
}

/// Incoming session is a call and the existing one is not.
fn incoming_call_row(existing: StreamCategory, _incoming: StreamCategory) -> Decision {
    use StreamCategory::*;

    match existing {
        VoiceMessage | System | Ringtone | Alarm | Notification | Dtmf | VoiceAssistant => {
            Decision::StopExisting
        }
        Music | Movie | Game | Audiobook => Decision::PauseExisting,
        Navigation => Decision::DuckExisting,
        Accessibility => Decision::DuckIncoming,
        EnforcedTone => Decision::Coexist,
        VoiceCommunication | VoiceModemCommunication => Decision::RejectIncoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StreamCategory::*;

    fn table() -> FocusPolicyTable {
        FocusPolicyTable::new()
    }

    #[test]
    fn incoming_voice_call_rows() {
        let t = table();
        assert_eq!(t.decide(VoiceModemCommunication, VoiceCommunication), Decision::RejectIncoming);
        for existing in [VoiceMessage, System, Ringtone, Alarm, Notification, Dtmf, VoiceAssistant] {
            assert_eq!(t.decide(existing, VoiceCommunication), Decision::StopExisting, "{existing:?}");
        }
        for existing in [Music, Movie, Game, Audiobook] {
            assert_eq!(t.decide(existing, VoiceCommunication), Decision::PauseExisting, "{existing:?}");
        }
        assert_eq!(t.decide(Navigation, VoiceCommunication), Decision::DuckExisting);
        assert_eq!(t.decide(EnforcedTone, VoiceCommunication), Decision::Coexist);
        assert_eq!(t.decide(Accessibility, VoiceCommunication), Decision::DuckIncoming);
    }

    #[test]
    fn existing_voice_call_rows() {
        let t = table();
        for incoming in [VoiceCommunication, Ringtone, Notification, VoiceAssistant] {
            assert_eq!(t.decide(VoiceCommunication, incoming), Decision::RejectIncoming, "{incoming:?}");
        }
        for incoming in [VoiceMessage, System, Music, Movie, Game, Audiobook, Alarm] {
            assert_eq!(t.decide(VoiceCommunication, incoming), Decision::DuckIncoming, "{incoming:?}");
        }
        assert_eq!(t.decide(VoiceCommunication, Navigation), Decision::DuckExisting);
        assert_eq!(t.decide(VoiceCommunication, Accessibility), Decision::DuckExisting);
        assert_eq!(t.decide(VoiceCommunication, EnforcedTone), Decision::Coexist);
        assert_eq!(t.decide(VoiceCommunication, Dtmf), Decision::Coexist);
        assert_eq!(t.decide(VoiceCommunication, VoiceModemCommunication), Decision::StopExisting);
    }

    #[test]
    fn table_is_direction_sensitive() {
        let t = table();
        assert_ne!(t.decide(Music, VoiceCommunication), t.decide(VoiceCommunication, Music));
        assert_eq!(t.decide(Accessibility, VoiceCommunication), Decision::DuckIncoming);
        assert_eq!(t.decide(VoiceCommunication, Accessibility), Decision::DuckExisting);
    }

    #[test]
    fn every_pair_resolves_deterministically() {
        let t = table();
        for existing in StreamCategory::ALL {
            for incoming in StreamCategory::ALL {
                assert_eq!(t.decide(existing, incoming), t.decide(existing, incoming));
            }
        }
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = HashMap::from([((Music, Game), Decision::Coexist)]);
        let t = FocusPolicyTable::with_overrides(overrides);
        assert_eq!(t.decide(Music, Game), Decision::Coexist);
        assert_eq!(t.decide(Music, Movie), Decision::StopExisting);
        assert_eq!(t.override_count(), 1);
    }

    #[test]
    fn evaluate_uses_request_categories() {
        use crate::models::stream_info::StreamUsage;
        let t = table();
        let existing = InterruptRequest::new(1, StreamUsage::Music);
        let incoming = InterruptRequest::new(2, StreamUsage::VoiceCommunication);
        assert_eq!(t.evaluate(&incoming, &existing), Decision::PauseExisting);
    }
}
