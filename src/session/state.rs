//! Run state machine.

/// Phase of a supervised capture run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Init,
    Launching,
    Running,
    ShuttingDown,
    Done,
}

/// State machine tracking run progress.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_in_init() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::Init);
        assert!(!machine.is_done());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut machine = SessionStateMachine::new();
        machine.transition(SessionState::Launching);
        machine.transition(SessionState::Running);
        machine.transition(SessionState::ShuttingDown);
        machine.transition(SessionState::Done);
        assert!(machine.is_done());
    }
}
