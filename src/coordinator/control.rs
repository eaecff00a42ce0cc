//! The render trigger's enabled flag, shared between the coordinator and its handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Starts disabled. A trigger must [`claim`](Self::claim) it, which disables it in the same
/// atomic step, so at most one trigger wins until the coordinator enables it again.
#[derive(Debug, Clone, Default)]
pub struct RenderControl {
    enabled: Arc<AtomicBool>,
}

impl RenderControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Disable the control if it is enabled. Returns whether this call did it.
    pub fn claim(&self) -> bool {
        self.enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
