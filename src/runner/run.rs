//! Run lifecycle
//!
//! ```text
//! Created ──► Running ──┬──► Completed
//!                       └──► Failed
//! ```
//!
//! Completed and Failed are terminal.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::{ConductorError, Result};

/// State of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Created,
    Running,
    Completed,
    Failed,
}

impl RunState {
    /// No transitions leave a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Created, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Created => "CREATED",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
        };
        write!(f, "{}", label)
    }
}

/// One execution of a pipeline
#[derive(Debug, Clone)]
pub struct Run {
    id: Uuid,
    state: RunState,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,
}

impl Run {
    /// A new run in `Created`
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Created,
            started_at: None,
            finished_after: None,
        }
    }

    /// Unique run id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Time from start to the terminal state, once reached
    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_after
    }

    /// `Created → Running`
    pub fn start(&mut self) -> Result<()> {
        self.transition(RunState::Running)?;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// `Running → Completed`
    pub fn complete(&mut self) -> Result<()> {
        self.transition(RunState::Completed)
    }

    /// `Running → Failed`
    pub fn fail(&mut self) -> Result<()> {
        self.transition(RunState::Failed)
    }

    fn transition(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ConductorError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(run_id = %self.id, from = %self.state, to = %next, "run transition");
        self.state = next;
        if next.is_terminal() {
            self.finished_after = self.started_at.map(|t| t.elapsed());
        }
        Ok(())
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}
