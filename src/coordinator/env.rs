//! Everything the coordinator consumes from its environment.

use crate::compute::{ComputeLoader, TracerLoader};
use crate::config::DispatchConfig;
use crate::probe::{CapabilityProbe, HostProbe};
use crate::timer::{Clock, SystemClock};
use crate::worker::{BackgroundHost, ClassicHost, ThreadHost};
use std::sync::Arc;

pub struct DispatchEnv {
    pub probe: Box<dyn CapabilityProbe>,
    pub host: Arc<dyn BackgroundHost>,
    pub loader: Arc<dyn ComputeLoader>,
    pub clock: Arc<dyn Clock>,
}

impl DispatchEnv {
    pub fn new(
        probe: impl CapabilityProbe + 'static,
        host: Arc<dyn BackgroundHost>,
        loader: Arc<dyn ComputeLoader>,
    ) -> Self {
        Self {
            probe: Box::new(probe),
            host,
            loader,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Thread host (or classic host when `force_inline`), probed for real, with the tracer.
    pub fn from_config(config: &DispatchConfig) -> Self {
        let host: Arc<dyn BackgroundHost> = if config.force_inline {
            Arc::new(ClassicHost)
        } else {
            Arc::new(ThreadHost)
        };
        let probe = HostProbe::new(Arc::clone(&host));
        let loader = Arc::new(TracerLoader::new(config.tracer.clone()));
        Self::new(probe, host, loader)
    }
}
