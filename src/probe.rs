//! Detection of isolated-module background worker support.
//!
//! The probe constructs a throwaway background context whose options carry an observer, tears
//! it down immediately, and reports whether the host read the loading mode. Hosts without
//! support never read it; nothing relies on an error being raised.

use crate::worker::host::{BackgroundHost, ContextOptions, WorkerBody};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Answers whether the host can run isolated-module workers.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn probe(&self) -> bool {
        self()
    }
}

/// Probe a host by constructing and releasing an empty context.
pub fn probe_host(host: &dyn BackgroundHost) -> bool {
    let observed = Arc::new(AtomicBool::new(false));
    let options = ContextOptions::isolated("capability-probe").observed(Arc::clone(&observed));
    let body: WorkerBody = Box::new(|_, _| {});

    match host.spawn(&options, body) {
        Ok(context) => context.terminate(),
        Err(e) => log::debug!("probe context could not be constructed: {}", e),
    }

    let supported = observed.load(Ordering::SeqCst);
    log::debug!("isolated-module workers supported: {}", supported);
    supported
}

/// [`CapabilityProbe`] backed by a real host.
pub struct HostProbe {
    host: Arc<dyn BackgroundHost>,
}

impl HostProbe {
    pub fn new(host: Arc<dyn BackgroundHost>) -> Self {
        Self { host }
    }
}

impl CapabilityProbe for HostProbe {
    fn probe(&self) -> bool {
        probe_host(self.host.as_ref())
    }
}

/// Runs the inner probe at most once and remembers the answer.
pub struct CachedProbe<P> {
    inner: P,
    answer: OnceLock<bool>,
}

impl<P: CapabilityProbe> CachedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            answer: OnceLock::new(),
        }
    }
}

impl<P: CapabilityProbe> CapabilityProbe for CachedProbe<P> {
    fn probe(&self) -> bool {
        *self.answer.get_or_init(|| self.inner.probe())
    }
}
