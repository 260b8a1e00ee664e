//! Per-submission completion
//!
//! `submit` hands back a [`Completion`] for exactly that submission. Waiting
//! on it claims the submission's outcome, so a launch synchronizes on its
//! own lanes even while other callers drain the same resource. Dropping a
//! completion without waiting leaves the outcome to
//! [`ExecutionResource::wait`](super::ExecutionResource::wait).

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Default)]
struct TicketState {
    /// Set once every lane has run and the kernel is dropped.
    outcome: Option<Result<()>>,
    /// A [`Completion::wait`] took the outcome.
    claimed: bool,
    /// The completion was dropped without waiting.
    detached: bool,
}

/// Shared between a [`Completion`] and the resource running the work
#[derive(Debug, Default)]
pub struct Ticket {
    state: Mutex<TicketState>,
    finished: Condvar,
}

impl Ticket {
    /// Record the outcome and wake the waiter.
    pub fn finish(&self, outcome: Result<()>) {
        let mut state = self.state.lock();
        state.outcome = Some(outcome);
        self.finished.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// True once a [`Completion::wait`] has taken the outcome.
    pub fn is_claimed(&self) -> bool {
        self.state.lock().claimed
    }

    /// Hand a finished outcome to the resource-wide wait.
    ///
    /// `None` while the work runs or while a [`Completion`] still holds the
    /// right to claim it. A claimed or already swept ticket yields `Ok`.
    pub fn sweep(&self) -> Option<Result<()>> {
        let mut state = self.state.lock();
        if state.outcome.is_none() {
            return None;
        }
        if state.claimed {
            return Some(Ok(()));
        }
        if !state.detached {
            return None;
        }
        state.claimed = true;
        state.outcome.take()
    }
}

/// Completion of one submission
///
/// ```rust
/// use lanemap_backends::Completion;
///
/// let done = Completion::done();
/// assert!(done.is_complete());
/// assert!(done.wait().is_ok());
/// ```
pub struct Completion {
    ticket: Arc<Ticket>,
}

impl Completion {
    /// A completion for work that already finished successfully.
    pub fn done() -> Self {
        let (completion, ticket) = Self::pending();
        ticket.finish(Ok(()));
        completion
    }

    /// A completion plus the ticket the resource finishes later.
    pub fn pending() -> (Self, Arc<Ticket>) {
        let ticket = Arc::new(Ticket::default());
        (
            Self {
                ticket: Arc::clone(&ticket),
            },
            ticket,
        )
    }

    pub fn is_complete(&self) -> bool {
        self.ticket.is_finished()
    }

    /// Block until every lane of this submission finished and return its outcome.
    pub fn wait(self) -> Result<()> {
        let mut state = self.ticket.state.lock();
        while state.outcome.is_none() {
            self.ticket.finished.wait(&mut state);
        }
        state.claimed = true;
        state.outcome.take().unwrap_or(Ok(()))
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let mut state = self.ticket.state.lock();
        if !state.claimed {
            state.detached = true;
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}
