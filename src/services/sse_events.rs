use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::sse::{
        FormatChangedEvent, MatchChangedEvent, MatchFinishedEvent, OvertimeStartedEvent,
        RedemptionCancelledEvent, RedemptionStartedEvent, ReversalEvent, RosterUpdatedEvent,
        ServerEvent,
        StateRecoveredEvent, SystemStatus,
    },
    state::{SharedState, state_machine::MatchEvent},
};

const EVENT_SYSTEM_STATUS: &str = "system.status";
const EVENT_MATCH_CHANGED: &str = "match.changed";
const EVENT_REDEMPTION_STARTED: &str = "match.redemption_started";
const EVENT_REDEMPTION_CANCELLED: &str = "match.redemption_cancelled";
const EVENT_REVERSAL: &str = "match.reversal";
const EVENT_OVERTIME_STARTED: &str = "match.overtime_started";
const EVENT_FORMAT_CHANGED: &str = "match.format_changed";
const EVENT_MATCH_FINISHED: &str = "match.finished";
const EVENT_STATE_RECOVERED: &str = "match.state_recovered";
const EVENT_ROSTER_UPDATED: &str = "match.roster_updated";

/// Broadcast whether the backend is running without storage.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Broadcast that a match was persisted with a new version.
pub fn broadcast_match_changed(state: &SharedState, match_id: Uuid, version: u64) {
    let payload = MatchChangedEvent { match_id, version };
    send_public_event(state, EVENT_MATCH_CHANGED, &payload);
}

/// Broadcast one SSE event per rules engine event, in order.
pub fn broadcast_match_events(state: &SharedState, match_id: Uuid, events: &[MatchEvent]) {
    for event in events {
        match *event {
            MatchEvent::RedemptionStarted { team, shots } => send_public_event(
                state,
                EVENT_REDEMPTION_STARTED,
                &RedemptionStartedEvent {
                    match_id,
                    team,
                    shots,
                },
            ),
            MatchEvent::RedemptionCancelled { team } => send_public_event(
                state,
                EVENT_REDEMPTION_CANCELLED,
                &RedemptionCancelledEvent { match_id, team },
            ),
            MatchEvent::Reversal { team } => {
                send_public_event(state, EVENT_REVERSAL, &ReversalEvent { match_id, team })
            }
            MatchEvent::OvertimeStarted => send_public_event(
                state,
                EVENT_OVERTIME_STARTED,
                &OvertimeStartedEvent { match_id },
            ),
            MatchEvent::FormatChanged { team, format } => send_public_event(
                state,
                EVENT_FORMAT_CHANGED,
                &FormatChangedEvent {
                    match_id,
                    team,
                    format,
                },
            ),
            MatchEvent::Finished { winner } => send_public_event(
                state,
                EVENT_MATCH_FINISHED,
                &MatchFinishedEvent { match_id, winner },
            ),
            MatchEvent::StateRecovered { team } => send_public_event(
                state,
                EVENT_STATE_RECOVERED,
                &StateRecoveredEvent { match_id, team },
            ),
            MatchEvent::RosterUpdated => send_public_event(
                state,
                EVENT_ROSTER_UPDATED,
                &RosterUpdatedEvent { match_id },
            ),
        }
    }
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
