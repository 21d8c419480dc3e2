//! Per-call operation context.
//!
//! Every inbound request may carry a relative deadline.  The dispatcher
//! checks the deadline exactly once, before handing the call to the active
//! strategy; cancellation of an already-dispatched backend operation is the
//! backend client's own business (this layer implements no internal
//! cancellation or retry).

use std::time::{Duration, Instant};

/// A cancellable operation context carrying an optional deadline.
#[derive(Debug, Clone, Copy)]
pub struct OpContext {
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Build a context from the optional relative deadline carried in a
    /// request envelope.  `Some(0)` yields an already-expired context.
    pub fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) => Self::with_timeout(Duration::from_millis(ms)),
            None => Self::background(),
        }
    }

    /// Whether the deadline has already passed.
    pub fn expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => deadline <= Instant::now(),
            None => false,
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}
