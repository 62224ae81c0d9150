use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared between a caller and running solvers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation plus an optional wall-clock limit, checked between
/// iterations or sweeps only
#[derive(Debug, Clone)]
pub struct RunBudget {
    token: CancelToken,
    deadline: Option<Instant>,
}

impl RunBudget {
    pub fn new(token: CancelToken, time_limit: Option<Duration>) -> Self {
        RunBudget {
            token,
            deadline: time_limit.map(|limit| Instant::now() + limit),
        }
    }

    pub fn unlimited() -> Self {
        RunBudget::new(CancelToken::new(), None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn exhausted(&self) -> bool {
        self.is_cancelled() || self.deadline_passed()
    }
}
