use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingEmail,
    Active,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::AwaitingEmail => "awaiting-email",
            Phase::Active => "active",
            Phase::Ended => "ended",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    TurnInFlight,
    SessionEnded,
}

impl fmt::Display for StateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateViolation::TurnInFlight => f.write_str("a turn is already in flight"),
            StateViolation::SessionEnded => f.write_str("the session has ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid session state: {0}")]
    InvalidState(StateViolation),
}

#[derive(Debug)]
pub struct Session {
    phase: Phase,
    verified_email: Option<String>,
    input_locked: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingEmail,
            verified_email: None,
            input_locked: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.input_locked
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    pub fn verified_email(&self) -> Option<&str> {
        self.verified_email.as_deref()
    }

    pub(crate) fn begin_turn(&mut self) -> Result<(), SessionError> {
        if self.phase == Phase::Ended {
            return Err(SessionError::InvalidState(StateViolation::SessionEnded));
        }
        if self.input_locked {
            return Err(SessionError::InvalidState(StateViolation::TurnInFlight));
        }
        self.input_locked = true;
        Ok(())
    }

    // A positive verdict records the email once; an ended session stays locked.
    pub(crate) fn complete_turn(
        &mut self,
        verdict: Option<bool>,
        verified_email: Option<String>,
        ended: bool,
    ) {
        if verdict == Some(true) {
            match (self.phase, verified_email) {
                (Phase::AwaitingEmail, Some(email)) => {
                    debug!(target: "dockhand::session", email = %email, "email verified");
                    self.verified_email = Some(email);
                    self.phase = Phase::Active;
                }
                (Phase::AwaitingEmail, None) => {
                    warn!(
                        target: "dockhand::session",
                        "positive email verdict without an email; staying in email phase"
                    );
                }
                (phase, _) => {
                    debug!(
                        target: "dockhand::session",
                        %phase,
                        "ignoring email verdict outside the email phase"
                    );
                }
            }
        }

        if ended {
            self.phase = Phase::Ended;
            self.input_locked = true;
            debug!(target: "dockhand::session", "session ended by backend");
            return;
        }
        self.unlock();
    }

    pub(crate) fn fail_turn(&mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if self.phase != Phase::Ended {
            self.input_locked = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlocked_in_email_phase() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::AwaitingEmail);
        assert!(!session.is_locked());
        assert_eq!(session.verified_email(), None);
    }

    #[test]
    fn begin_turn_refuses_while_locked() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        assert_eq!(
            session.begin_turn(),
            Err(SessionError::InvalidState(StateViolation::TurnInFlight))
        );
    }

    #[test]
    fn positive_verdict_activates_and_stores_email() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.complete_turn(Some(true), Some("jane@example.com".into()), false);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.verified_email(), Some("jane@example.com"));
        assert!(!session.is_locked());
    }

    #[test]
    fn negative_verdict_keeps_email_phase_and_unlocks() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.complete_turn(Some(false), None, false);
        assert_eq!(session.phase(), Phase::AwaitingEmail);
        assert!(!session.is_locked());
    }

    #[test]
    fn verified_email_is_immutable_once_set() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.complete_turn(Some(true), Some("first@example.com".into()), false);
        session.begin_turn().unwrap();
        session.complete_turn(Some(true), Some("second@example.com".into()), false);
        assert_eq!(session.verified_email(), Some("first@example.com"));
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn ended_session_stays_locked() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.complete_turn(None, None, true);
        assert_eq!(session.phase(), Phase::Ended);
        assert!(session.is_locked());

        session.fail_turn();
        assert!(session.is_locked());
        assert_eq!(
            session.begin_turn(),
            Err(SessionError::InvalidState(StateViolation::SessionEnded))
        );
    }

    #[test]
    fn failed_turn_unlocks_without_touching_phase() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.complete_turn(Some(true), Some("jane@example.com".into()), false);
        session.begin_turn().unwrap();
        session.fail_turn();
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.verified_email(), Some("jane@example.com"));
        assert!(!session.is_locked());
    }
}
