//! Application lifecycle state driven by recording-phase events.
//!
//! The mapping from phase strings to [`AppState`] is total in one direction only:
//! unknown phases leave the state as it was, so newer workers can add phases
//! without breaking older builds.

use tracing::debug;
use vocalis_core::types::{AppState, ErrorCode, ErrorEnvelope};

use crate::error_normalizer::local_error;

/// What a phase event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Changed { from: AppState, to: AppState },
    Unchanged,
    /// Phase string this build does not know.
    Unmapped,
    /// Event belongs to a session that is no longer active.
    StaleSession,
    /// Sequence number behind the last applied one.
    StaleSeq,
}

/// Current [`AppState`] plus the error detail and session that go with it.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: AppState,
    error: Option<ErrorEnvelope>,
    active_session: Option<String>,
    last_seq: Option<u64>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        self.error.as_ref()
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    /// Whether an event tagged with `session_id` belongs to an older session.
    ///
    /// Untagged events always belong to the current one.
    pub fn is_stale_session(&self, session_id: Option<&str>) -> bool {
        match (self.active_session.as_deref(), session_id) {
            (Some(active), Some(incoming)) => active != incoming,
            _ => false,
        }
    }

    /// Apply a recording phase.
    ///
    /// `detail` becomes the error message when the phase is `error`.
    pub fn apply_phase(
        &mut self,
        phase: &str,
        session_id: Option<&str>,
        seq: Option<u64>,
        detail: Option<&str>,
    ) -> PhaseOutcome {
        let Some(target) = AppState::from_phase(phase) else {
            debug!(phase, "Unmapped recording phase, state unchanged");
            return PhaseOutcome::Unmapped;
        };

        let starts_session = target == AppState::Recording
            && !self.state.is_busy()
            && session_id.is_some()
            && session_id != self.active_session.as_deref();

        if starts_session {
            self.active_session = session_id.map(ToOwned::to_owned);
            self.last_seq = None;
        } else if self.is_stale_session(session_id) {
            debug!(
                ?session_id,
                active = ?self.active_session,
                "Dropping phase from stale session"
            );
            return PhaseOutcome::StaleSession;
        }

        match (seq, self.last_seq) {
            (Some(seq), Some(last_seq)) if seq < last_seq => {
                debug!(seq, last_seq, "Dropping stale recording phase");
                return PhaseOutcome::StaleSeq;
            }
            (Some(seq), _) => self.last_seq = Some(seq),
            _ => {}
        }

        match target {
            AppState::Error => {
                let message = detail.unwrap_or("Recording failed");
                self.error = Some(local_error(ErrorCode::RecordingFailed, message));
                self.active_session = None;
            }
            AppState::Idle => {
                self.error = None;
                self.active_session = None;
            }
            _ => self.error = None,
        }
        if target == AppState::Recording && self.active_session.is_none() {
            self.active_session = session_id.map(ToOwned::to_owned);
        }

        self.transition(target)
    }

    /// Force the error state with a normalized envelope.
    pub fn fail(&mut self, envelope: ErrorEnvelope) -> PhaseOutcome {
        self.error = Some(envelope);
        self.active_session = None;
        self.transition(AppState::Error)
    }

    /// Move between non-error states outside a recording session.
    pub fn enter(&mut self, to: AppState) -> PhaseOutcome {
        if to == AppState::Error {
            return self.fail(local_error(ErrorCode::Internal, "Unexpected error"));
        }
        self.error = None;
        if to == AppState::Idle {
            self.active_session = None;
        }
        self.transition(to)
    }

    /// Leave the error state for idle. No effect in any other state.
    pub fn clear_error(&mut self) -> PhaseOutcome {
        if self.state != AppState::Error {
            return PhaseOutcome::Unchanged;
        }
        self.error = None;
        self.transition(AppState::Idle)
    }

    fn transition(&mut self, to: AppState) -> PhaseOutcome {
        let from = self.state;
        if from == to {
            return PhaseOutcome::Unchanged;
        }
        debug!("App state: {} -> {}", from, to);
        self.state = to;
        PhaseOutcome::Changed { from, to }
    }
}
