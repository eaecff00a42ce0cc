//! Coordinator-side endpoint of the worker protocol.
//!
//! Only one request is ever outstanding, so replies are correlated by the kind of the pending
//! request alone. Anything that does not answer the pending request is reported as a failure
//! rather than dropped.

use crate::compute::{ComputeLoader, RawFrame};
use crate::error::{DispatchError, Result};
use crate::worker::host::{BackgroundContext, BackgroundHost, ContextOptions};
use crate::worker::protocol::{SuccessPayload, WorkerErrorKind, WorkerReply, WorkerRequest};
use crate::worker::runtime::module_worker_body;
use std::sync::Arc;

/// Name given to the render worker's context.
pub const WORKER_NAME: &str = "render-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Init,
    Render,
}

/// Demultiplexed reply.
#[derive(Debug)]
pub enum ChannelEvent {
    Initialized,
    /// The channel is dead; callers must not retry `init`.
    InitFailed(DispatchError),
    Rendered(RawFrame),
    RenderFailed(DispatchError),
}

pub struct WorkerChannel {
    context: BackgroundContext,
    pending: Option<PendingRequest>,
    initialized: bool,
    dead: bool,
    closed: bool,
}

impl WorkerChannel {
    /// Construct a background context running the module worker.
    pub fn open(host: &dyn BackgroundHost, loader: Arc<dyn ComputeLoader>) -> Result<Self> {
        let options = ContextOptions::isolated(WORKER_NAME);
        let context = host.spawn(&options, module_worker_body(loader))?;
        Ok(Self::from_context(context))
    }

    pub fn from_context(context: BackgroundContext) -> Self {
        Self {
            context,
            pending: None,
            initialized: false,
            dead: false,
            closed: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending
    }

    pub fn init(&mut self) -> Result<()> {
        if self.dead {
            return Err(DispatchError::worker_unavailable(
                "channel failed to initialize earlier",
            ));
        }
        if self.initialized {
            return Err(DispatchError::protocol("init sent twice"));
        }
        self.send(PendingRequest::Init, WorkerRequest::Init)
    }

    pub fn render(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(DispatchError::worker_unavailable("channel not initialized"));
        }
        self.send(PendingRequest::Render, WorkerRequest::Render)
    }

    fn send(&mut self, kind: PendingRequest, request: WorkerRequest) -> Result<()> {
        if let Some(pending) = self.pending {
            return Err(DispatchError::protocol(format!(
                "{:?} sent while {:?} is outstanding",
                request, pending
            )));
        }
        self.context.post(request)?;
        self.pending = Some(kind);
        Ok(())
    }

    /// Wait for the next reply and demultiplex it.
    ///
    /// When the context exits with a request outstanding, that request fails. Returns `None`
    /// once the context is gone and nothing is pending.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        match self.context.recv().await {
            Some(reply) => Some(self.demux(reply)),
            None => {
                self.closed = true;
                match self.pending.take() {
                    Some(PendingRequest::Init) => {
                        self.dead = true;
                        Some(ChannelEvent::InitFailed(DispatchError::import_failure(
                            "background context exited during init",
                        )))
                    }
                    Some(PendingRequest::Render) => Some(ChannelEvent::RenderFailed(
                        DispatchError::render_failure("background context exited during render"),
                    )),
                    None => None,
                }
            }
        }
    }

    /// Match a reply against the outstanding request.
    pub fn demux(&mut self, reply: WorkerReply) -> ChannelEvent {
        let pending = self.pending.take();
        match (pending, reply) {
            (Some(PendingRequest::Init), WorkerReply::Success(SuccessPayload::Initialized)) => {
                self.initialized = true;
                ChannelEvent::Initialized
            }
            (
                Some(PendingRequest::Init),
                WorkerReply::Error {
                    kind: WorkerErrorKind::ImportFailure,
                    detail,
                },
            ) => {
                self.dead = true;
                ChannelEvent::InitFailed(DispatchError::import_failure(detail))
            }
            (
                Some(PendingRequest::Render),
                WorkerReply::Success(SuccessPayload::Rendered(frame)),
            ) => ChannelEvent::Rendered(frame),
            (
                Some(PendingRequest::Render),
                WorkerReply::Error {
                    kind: WorkerErrorKind::RenderFailure,
                    detail,
                },
            ) => ChannelEvent::RenderFailed(DispatchError::render_failure(detail)),
            (pending, reply) => {
                let message = format!(
                    "unexpected protocol message {} (pending: {:?})",
                    reply.tag(),
                    pending
                );
                log::warn!("{}", message);
                if pending == Some(PendingRequest::Init) {
                    // a channel that cannot complete its handshake is not trusted again
                    self.dead = true;
                    ChannelEvent::InitFailed(DispatchError::protocol(message))
                } else {
                    ChannelEvent::RenderFailed(DispatchError::render_failure(message))
                }
            }
        }
    }

    pub fn terminate(self) {
        self.context.terminate();
    }
}
