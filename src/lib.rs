//! # render-dispatch - background rendering with transparent inline fallback
//!
//! Runs a long, CPU-bound render away from the thread that drives the UI, and falls back to
//! running it in place when the host cannot provide an isolated background worker.
//!
//! ## Architecture
//!
//! - [`timer`] - elapsed-time progress state machine driven by frame callbacks
//! - [`probe`] - one-shot detection of background worker support
//! - [`compute`] - the compute module contract and the built-in ray tracer
//! - [`worker`] - background contexts, the message protocol, and the coordinator's channel
//! - [`coordinator`] - the orchestrator choosing the execution path and reporting progress
//! - [`config`], [`error`], [`output`] - ambient support

// Core modules
pub mod config;
pub mod error;

// Components
pub mod compute;
pub mod coordinator;
pub mod output;
pub mod probe;
pub mod timer;
pub mod worker;

// Re-export commonly used types for convenience
pub use error::{DispatchError, Result};

pub use compute::{ComputeLoader, ComputeModule, RawFrame, RenderResult};
pub use config::DispatchConfig;
pub use coordinator::{
    CoordinatorEvent, CoordinatorHandle, CoordinatorState, DispatchEnv, RenderCoordinator,
};
pub use probe::CapabilityProbe;
pub use timer::{ProgressTimer, TimerState};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
