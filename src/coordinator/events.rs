//! What the coordinator tells its collaborators.

use crate::compute::RenderResult;
use crate::timer::TimerState;

/// Events delivered to the UI collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// The render control is enabled
    Ready,
    /// New progress label (elapsed time or a notice)
    Progress(String),
    Result(RenderResult),
    /// Rendering will run on the calling thread from now on
    Degraded(String),
    Error(String),
    /// A worker reply that answered no outstanding request
    Warning(String),
}

/// Where a render executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Worker,
    MainThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Probing,
    /// A worker channel exists; rendering is possible once its init completes
    WorkerReady,
    MainThreadFallback,
    Rendering(ExecutionPath),
    Idle {
        path: ExecutionPath,
        outcome: RenderOutcome,
    },
    /// The inline compute module could not be loaded; nothing can render
    Unavailable,
}

impl CoordinatorState {
    pub fn is_rendering(&self) -> bool {
        matches!(self, Self::Rendering(_))
    }
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub timer: TimerState,
    pub elapsed_ms: f64,
    pub control_enabled: bool,
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self {
            state: CoordinatorState::Uninitialized,
            timer: TimerState::Idle,
            elapsed_ms: 0.0,
            control_enabled: false,
        }
    }
}
