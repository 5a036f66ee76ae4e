//! The run-state machine
//!
//! Owns the authoritative [`RunState`] together with the dynamic "cannot run"
//! reason and the last user status the page reported. Every method is a
//! named transition; anything not listed below is rejected with
//! [`TransitionError::Illegal`] and leaves the machine untouched.
//!
//! ```text
//! unknown ──status──> waiting_injection | idle | running | injection_error | error
//! waiting_injection ──run──> setup ──ok──> running
//!                                  └─fail─> injection_error
//! running <──toggle──> idle        (bad reply or unreachable page -> error)
//! error ──toggle──> running | idle | error
//! any ──refresh──> unknown
//! ```

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::RunState;
use crate::protocol::{RunStateView, StatusReply, ToggleReply};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {event} while {from}")]
    Illegal { from: RunState, event: &'static str },

    #[error("page reported an invalid run state: {0}")]
    InvalidStatus(String),
}

/// States a toggle request may start from
const TOGGLE_SOURCES: [RunState; 3] = [RunState::Running, RunState::Idle, RunState::Error];

#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    reason: Option<String>,
    /// Set by the pre-run guard; shown in place of `reason` until cleared
    blocked: Option<&'static str>,
    user_status: Option<Value>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Guard reason, then the dynamic reason, then the state's static text
    pub fn cannot_run_reason(&self) -> Option<String> {
        self.blocked
            .map(str::to_string)
            .or_else(|| self.reason.clone())
            .or_else(|| self.state.static_reason().map(str::to_string))
    }

    /// Whether a toggle request is legal from the current state
    pub fn accepts_toggle(&self) -> bool {
        TOGGLE_SOURCES.contains(&self.state)
    }

    pub fn view(&self) -> RunStateView {
        RunStateView {
            state: self.state,
            label: self.state.label().to_string(),
            reason: self.cannot_run_reason(),
            user_status: self.user_status.clone(),
        }
    }

    fn require(&self, allowed: &[RunState], event: &'static str) -> Result<(), TransitionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TransitionError::Illegal { from: self.state, event })
        }
    }

    fn enter(&mut self, state: RunState, reason: Option<String>) {
        info!(from = %self.state, to = %state, ?reason, "run state changed");
        self.state = state;
        self.reason = if state.has_dynamic_reason() { reason } else { None };
    }

    /// Leave `unknown` based on the page's answer to a status query
    pub fn observe_status(&mut self, reply: &StatusReply) -> Result<RunState, TransitionError> {
        debug!(?reply, "observe_status: called");
        self.require(&[RunState::Unknown], "observe status")?;
        match reply {
            StatusReply::Report {
                run_state,
                last_error,
                user_status,
            } => match run_state {
                RunState::Unknown | RunState::Setup => Err(TransitionError::InvalidStatus(run_state.to_string())),
                state => {
                    let reason = match state {
                        RunState::WaitingInjection | RunState::InjectionError | RunState::Error => last_error.clone(),
                        _ => None,
                    };
                    self.user_status = user_status.clone();
                    self.enter(*state, reason);
                    Ok(self.state)
                }
            },
            StatusReply::Unrecognized(raw) => Err(TransitionError::InvalidStatus(raw.clone())),
            StatusReply::Malformed(value) => Err(TransitionError::InvalidStatus(value.to_string())),
        }
    }

    pub fn begin_setup(&mut self) -> Result<(), TransitionError> {
        debug!(state = %self.state, "begin_setup: called");
        self.require(&[RunState::WaitingInjection], "run")?;
        self.enter(RunState::Setup, None);
        Ok(())
    }

    pub fn injection_succeeded(&mut self) -> Result<(), TransitionError> {
        debug!(state = %self.state, "injection_succeeded: called");
        self.require(&[RunState::Setup], "finish injection")?;
        self.enter(RunState::Running, None);
        Ok(())
    }

    pub fn injection_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        debug!(state = %self.state, "injection_failed: called");
        self.require(&[RunState::Setup], "fail injection")?;
        self.enter(RunState::InjectionError, Some(reason.into()));
        Ok(())
    }

    /// Apply the page's answer to a toggle request
    ///
    /// Only `running` and `idle` are accepted as the new state. A failure
    /// object or anything unexpected moves the machine to `error`. Toggling
    /// again is the way out of `error`.
    pub fn apply_toggle(&mut self, reply: &ToggleReply) -> Result<RunState, TransitionError> {
        debug!(state = %self.state, ?reply, "apply_toggle: called");
        self.require(&TOGGLE_SOURCES, "toggle")?;
        match reply {
            ToggleReply::State(state) if state.is_toggleable() => self.enter(*state, None),
            ToggleReply::State(other) => {
                self.enter(RunState::Error, Some(format!("Unexpected toggle result: {}", other)));
            }
            ToggleReply::Failure(message) => self.enter(RunState::Error, Some(message.clone())),
            ToggleReply::Malformed(value) => {
                self.enter(RunState::Error, Some(format!("Malformed toggle result: {}", value)));
            }
        }
        Ok(self.state)
    }

    /// The page could not be reached for a toggle
    pub fn toggle_unanswered(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        debug!(state = %self.state, "toggle_unanswered: called");
        self.require(&TOGGLE_SOURCES, "toggle")?;
        self.enter(RunState::Error, Some(reason.into()));
        Ok(())
    }

    /// Record why a run was refused without changing the state
    pub fn block(&mut self, reason: &'static str) {
        debug!(state = %self.state, reason, "block: called");
        self.blocked = Some(reason);
    }

    /// Clear the guard reason once preferences pass again
    pub fn unblock(&mut self) {
        debug!(state = %self.state, "unblock: called");
        self.blocked = None;
    }

    /// Forget everything and go back to `unknown`
    pub fn reset(&mut self) {
        debug!(state = %self.state, "reset: called");
        self.state = RunState::Unknown;
        self.reason = None;
        self.blocked = None;
        self.user_status = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(state: RunState) -> StatusReply {
        StatusReply::Report {
            run_state: state,
            last_error: None,
            user_status: None,
        }
    }

    fn at(state: RunState) -> RunStateMachine {
        let mut machine = RunStateMachine::new();
        if state != RunState::Unknown {
            machine.state = state;
        }
        machine
    }

    #[test]
    fn test_starts_unknown_with_static_reason() {
        let machine = RunStateMachine::new();
        let view = machine.view();
        assert_eq!(view.state, RunState::Unknown);
        assert_eq!(view.label, "Unknown");
        assert_eq!(view.reason.as_deref(), Some("Bot state is unknown. Open or reload the page."));
    }

    #[test]
    fn test_status_query_leaves_unknown() {
        let mut machine = RunStateMachine::new();
        let reply = StatusReply::Report {
            run_state: RunState::WaitingInjection,
            last_error: Some("Open a channel first".to_string()),
            user_status: Some(json!({"dataType": "Map", "value": []})),
        };
        assert_eq!(machine.observe_status(&reply), Ok(RunState::WaitingInjection));
        assert_eq!(machine.cannot_run_reason().as_deref(), Some("Open a channel first"));
        assert!(machine.view().user_status.is_some());

        // A second report is not a legal transition
        assert!(matches!(
            machine.observe_status(&report(RunState::Idle)),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn test_status_query_rejects_invalid_states() {
        for reply in [
            report(RunState::Setup),
            report(RunState::Unknown),
            StatusReply::Unrecognized("sleeping".to_string()),
            StatusReply::Malformed(json!(7)),
        ] {
            let mut machine = RunStateMachine::new();
            assert!(matches!(machine.observe_status(&reply), Err(TransitionError::InvalidStatus(_))));
            assert_eq!(machine.state(), RunState::Unknown);
        }
    }

    #[test]
    fn test_run_success_path() {
        let mut machine = at(RunState::WaitingInjection);
        machine.begin_setup().unwrap();
        assert_eq!(machine.view().reason.as_deref(), Some("Bot is being set up."));
        machine.injection_succeeded().unwrap();
        assert_eq!(machine.state(), RunState::Running);
        assert_eq!(machine.cannot_run_reason(), None);
    }

    #[test]
    fn test_run_failure_sets_dynamic_reason() {
        let mut machine = at(RunState::WaitingInjection);
        machine.begin_setup().unwrap();
        machine.injection_failed("CSP blocked script").unwrap();
        assert_eq!(machine.state(), RunState::InjectionError);
        assert_eq!(machine.cannot_run_reason().as_deref(), Some("CSP blocked script"));
    }

    #[test]
    fn test_illegal_transition_keeps_state() {
        let mut machine = at(RunState::Running);
        let err = machine.begin_setup().unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: RunState::Running,
                event: "run"
            }
        );
        assert_eq!(machine.state(), RunState::Running);

        let mut machine = at(RunState::Setup);
        assert!(machine.apply_toggle(&ToggleReply::State(RunState::Idle)).is_err());
        assert_eq!(machine.state(), RunState::Setup);
    }

    #[test]
    fn test_toggle_replies() {
        let mut machine = at(RunState::Running);
        assert_eq!(machine.apply_toggle(&ToggleReply::State(RunState::Idle)), Ok(RunState::Idle));

        assert_eq!(
            machine.apply_toggle(&ToggleReply::Failure("x".to_string())),
            Ok(RunState::Error)
        );
        assert_eq!(machine.cannot_run_reason().as_deref(), Some("x"));

        let mut machine = at(RunState::Idle);
        machine.apply_toggle(&ToggleReply::Malformed(json!([1]))).unwrap();
        assert_eq!(machine.state(), RunState::Error);
        assert!(machine.cannot_run_reason().unwrap().contains("[1]"));

        let mut machine = at(RunState::Idle);
        machine.apply_toggle(&ToggleReply::State(RunState::Setup)).unwrap();
        assert_eq!(machine.state(), RunState::Error);
    }

    #[test]
    fn test_block_keeps_state() {
        let mut machine = at(RunState::Idle);
        machine.block("Token list is empty or contains an invalid token.");
        assert_eq!(machine.state(), RunState::Idle);
        assert_eq!(
            machine.view().reason.as_deref(),
            Some("Token list is empty or contains an invalid token.")
        );
        machine.unblock();
        assert_eq!(machine.cannot_run_reason(), None);
    }

    #[test]
    fn test_retoggle_leaves_error() {
        let mut machine = at(RunState::Running);
        machine.apply_toggle(&ToggleReply::Failure("x".to_string())).unwrap();
        assert_eq!(machine.state(), RunState::Error);
        assert!(machine.accepts_toggle());

        assert_eq!(
            machine.apply_toggle(&ToggleReply::State(RunState::Running)),
            Ok(RunState::Running)
        );
        assert_eq!(machine.cannot_run_reason(), None);

        let mut machine = at(RunState::Error);
        machine.toggle_unanswered("No page is connected.").unwrap();
        assert_eq!(machine.state(), RunState::Error);
        assert_eq!(machine.cannot_run_reason().as_deref(), Some("No page is connected."));

        let mut machine = at(RunState::Error);
        machine.apply_toggle(&ToggleReply::State(RunState::Setup)).unwrap();
        assert_eq!(machine.state(), RunState::Error);
    }

    #[test]
    fn test_toggle_sources() {
        for state in RunState::ALL {
            let expected = matches!(state, RunState::Running | RunState::Idle | RunState::Error);
            assert_eq!(at(state).accepts_toggle(), expected, "{}", state);
        }
    }

    #[test]
    fn test_guard_reason_does_not_replace_dynamic_reason() {
        let mut machine = at(RunState::WaitingInjection);
        machine.begin_setup().unwrap();
        machine.injection_failed("CSP").unwrap();

        machine.block("Token list is empty or contains an invalid token.");
        assert_eq!(
            machine.cannot_run_reason().as_deref(),
            Some("Token list is empty or contains an invalid token.")
        );
        assert_eq!(machine.state(), RunState::InjectionError);

        machine.unblock();
        assert_eq!(machine.cannot_run_reason().as_deref(), Some("CSP"));
    }

    #[test]
    fn test_reset_returns_to_unknown() {
        let mut machine = at(RunState::Error);
        machine.block("boom");
        machine.reset();
        assert_eq!(machine.state(), RunState::Unknown);
        assert_eq!(machine.observe_status(&report(RunState::Idle)), Ok(RunState::Idle));
    }
}
