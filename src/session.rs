//! Run sessions and cancellation
//!
//! Every orchestration run owns a [`SyncSession`] carrying its own
//! cancellation token. The [`SessionTracker`] remembers the most recently
//! started session; killing always targets that one and never a run the
//! user cannot see. Runs are not queued, so two runs may overlap.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::host::StatusIndicator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed | SessionState::Cancelled
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Running) => true,
            (Running, Succeeded | Failed | Cancelled) => true,
            (from, Idle) => from.is_final(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One orchestration run
#[derive(Debug)]
pub struct SyncSession {
    id: u64,
    token: CancellationToken,
    state: Mutex<SessionState>,
}

impl SyncSession {
    fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            let from = *state;
            tracing::debug!(session = self.id, %from, to = %next, "Ignoring session transition");
            return false;
        }
        *state = next;
        true
    }
}

/// Tracks the current session and drives the status indicator
pub struct SessionTracker {
    current: Mutex<Option<Arc<SyncSession>>>,
    next_id: AtomicU64,
    status: Arc<dyn StatusIndicator>,
}

impl SessionTracker {
    pub fn new(status: Arc<dyn StatusIndicator>) -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            status,
        }
    }

    /// Begin a run: a fresh, uncancelled session in `Running`
    pub fn start(&self) -> Arc<SyncSession> {
        let session = Arc::new(SyncSession::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
        ));
        session.transition(SessionState::Running);

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session.clone());
        if let Some(previous) = previous
            && previous.state() == SessionState::Running
        {
            tracing::warn!(
                running = previous.id(),
                started = session.id(),
                "Starting a sync while another is still running"
            );
        }

        self.status.set_state(SessionState::Running);
        session
    }

    /// End a run. A cancelled session ends in `Cancelled` whatever `success` says.
    pub fn finish(&self, session: &SyncSession, success: bool) -> SessionState {
        let next = if session.is_cancelled() {
            SessionState::Cancelled
        } else if success {
            SessionState::Succeeded
        } else {
            SessionState::Failed
        };
        if session.transition(next) {
            self.status.set_state(next);
        }
        session.state()
    }

    /// Cancel the most recently started session.
    ///
    /// Returns `false` when nothing is running.
    pub fn kill(&self) -> bool {
        let Some(session) = self.current() else {
            return false;
        };
        if session.state() != SessionState::Running {
            return false;
        }
        tracing::info!(session = session.id(), "Killing sync");
        session.token().cancel();
        true
    }

    /// Reset a finished current session back to `Idle`
    pub fn acknowledge(&self) {
        if let Some(session) = self.current()
            && session.transition(SessionState::Idle)
        {
            self.status.set_state(SessionState::Idle);
        }
    }

    pub fn current(&self) -> Option<Arc<SyncSession>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// State of the current session, `Idle` before the first run
    pub fn state(&self) -> SessionState {
        self.current()
            .map(|s| s.state())
            .unwrap_or(SessionState::Idle)
    }
}
