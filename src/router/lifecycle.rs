use std::fmt;

/// Per-request pipeline state.
///
/// `Received → Validating → Authenticating → Dispatching → Completed`, with
/// `Rejected` reachable from any gate. A request never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Received,
    Validating,
    Authenticating,
    Dispatching,
    Completed,
    Rejected,
}

impl RequestState {
    fn rank(self) -> u8 {
        match self {
            RequestState::Received => 0,
            RequestState::Validating => 1,
            RequestState::Authenticating => 2,
            RequestState::Dispatching => 3,
            RequestState::Completed | RequestState::Rejected => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Rejected)
    }

    pub fn can_advance_to(self, next: RequestState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // Only a gate (or routing) can reject; a running handler always completes
            RequestState::Rejected => self != RequestState::Dispatching,
            RequestState::Completed => self == RequestState::Dispatching,
            // Several validators may run back to back
            RequestState::Validating => self.rank() <= next.rank(),
            _ => self.rank() < next.rank(),
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one request's walk through the states
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    state: RequestState,
    history: Vec<RequestState>,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Received,
            history: vec![RequestState::Received],
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: RequestState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::error!("Illegal request state transition {} -> {}", self.state, next);
            return false;
        }
        if next != self.state {
            tracing::debug!("Request state {} -> {}", self.state, next);
        }
        self.state = next;
        self.history.push(next);
        true
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
