//! Construction of background execution contexts.
//!
//! A host turns [`ContextOptions`] plus a [`WorkerBody`] into a running context. Hosts that
//! support isolated-module workers read [`ContextOptions::loading_mode`] while constructing the
//! context; hosts that do not simply never look at it. The capability probe relies on that
//! difference (see [`crate::probe`]).

use crate::error::{DispatchError, Result};
use crate::worker::protocol::{WorkerReply, WorkerRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How the background context loads the compute module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingMode {
    /// Plain context that cannot load modules
    Classic,
    /// Context that loads the compute module in isolation
    Isolated,
}

/// Configuration handed to [`BackgroundHost::spawn`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    name: String,
    mode: LoadingMode,
    observer: Option<Arc<AtomicBool>>,
}

impl ContextOptions {
    pub fn isolated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: LoadingMode::Isolated,
            observer: None,
        }
    }

    /// Attach a flag that is raised the first time the loading mode is read.
    pub fn observed(mut self, flag: Arc<AtomicBool>) -> Self {
        self.observer = Some(flag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requested loading mode. Reading it trips the observer, if any.
    pub fn loading_mode(&self) -> LoadingMode {
        if let Some(observer) = &self.observer {
            observer.store(true, Ordering::SeqCst);
        }
        self.mode
    }
}

/// Code run inside a background context.
pub type WorkerBody =
    Box<dyn FnOnce(UnboundedReceiver<WorkerRequest>, UnboundedSender<WorkerReply>) + Send>;

/// Constructs background execution contexts.
pub trait BackgroundHost: Send + Sync {
    fn spawn(&self, options: &ContextOptions, body: WorkerBody) -> Result<BackgroundContext>;
}

/// A running background context, seen from the coordinator.
///
/// Dropping the context closes its request channel, which ends the worker loop once any
/// in-progress request finishes; the thread is detached. [`terminate`](Self::terminate) also
/// waits for the thread.
pub struct BackgroundContext {
    requests: Option<UnboundedSender<WorkerRequest>>,
    replies: UnboundedReceiver<WorkerReply>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundContext {
    pub fn new(
        requests: UnboundedSender<WorkerRequest>,
        replies: UnboundedReceiver<WorkerReply>,
    ) -> Self {
        Self {
            requests: Some(requests),
            replies,
            thread: None,
        }
    }

    pub fn with_thread(mut self, thread: JoinHandle<()>) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Fire-and-forget send.
    pub fn post(&self, request: WorkerRequest) -> Result<()> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| DispatchError::worker_unavailable("context terminated"))?;
        requests
            .send(request)
            .map_err(|_| DispatchError::worker_unavailable("background context has exited"))
    }

    /// Next reply, or `None` once the context has exited and every reply was read.
    pub async fn recv(&mut self) -> Option<WorkerReply> {
        self.replies.recv().await
    }

    /// Close the request channel and wait for the thread to exit.
    pub fn terminate(mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("background context panicked before terminating");
            }
        }
    }
}

/// Runs each context on a dedicated OS thread with isolated module loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadHost;

impl BackgroundHost for ThreadHost {
    fn spawn(&self, options: &ContextOptions, body: WorkerBody) -> Result<BackgroundContext> {
        let mode = options.loading_mode();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(options.name().to_string())
            .spawn(move || body(request_rx, reply_tx))
            .map_err(|e| {
                DispatchError::worker_unavailable(format!("failed to spawn thread: {}", e))
            })?;
        log::debug!("spawned background context '{}' ({:?})", options.name(), mode);

        Ok(BackgroundContext::new(request_tx, reply_rx).with_thread(thread))
    }
}

/// Host without isolated-module support.
///
/// It ignores the loading mode and the supplied body; its contexts run a classic loop that
/// cannot load the compute module, so `Init` is answered with `ImportFailure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicHost;

impl BackgroundHost for ClassicHost {
    fn spawn(&self, options: &ContextOptions, _body: WorkerBody) -> Result<BackgroundContext> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(options.name().to_string())
            .spawn(move || {
                while let Some(request) = request_rx.blocking_recv() {
                    let reply = match request {
                        WorkerRequest::Init => {
                            WorkerReply::import_failure("host cannot load modules in workers")
                        }
                        WorkerRequest::Render => {
                            WorkerReply::render_failure("no compute module loaded")
                        }
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| {
                DispatchError::worker_unavailable(format!("failed to spawn thread: {}", e))
            })?;

        Ok(BackgroundContext::new(request_tx, reply_rx).with_thread(thread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_body() -> WorkerBody {
        Box::new(|mut rx, tx| {
            while let Some(request) = rx.blocking_recv() {
                let reply = match request {
                    WorkerRequest::Init => WorkerReply::initialized(),
                    WorkerRequest::Render => WorkerReply::render_failure("echo"),
                };
                if tx.send(reply).is_err() {
                    break;
                }
            }
        })
    }

    #[test]
    fn reading_loading_mode_trips_observer() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = ContextOptions::isolated("probe").observed(Arc::clone(&flag));
        assert!(!flag.load(Ordering::SeqCst));

        assert_eq!(options.loading_mode(), LoadingMode::Isolated);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn thread_host_reads_loading_mode() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = ContextOptions::isolated("t").observed(Arc::clone(&flag));
        let context = ThreadHost.spawn(&options, echo_body()).unwrap();
        context.terminate();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn classic_host_ignores_loading_mode() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = ContextOptions::isolated("c").observed(Arc::clone(&flag));
        let context = ClassicHost.spawn(&options, echo_body()).unwrap();
        context.terminate();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn thread_host_runs_body() {
        let mut context = ThreadHost
            .spawn(&ContextOptions::isolated("echo"), echo_body())
            .unwrap();
        context.post(WorkerRequest::Init).unwrap();
        assert_eq!(context.recv().await, Some(WorkerReply::initialized()));
        context.terminate();
    }

    #[tokio::test]
    async fn classic_host_answers_init_with_import_failure() {
        let mut context = ClassicHost
            .spawn(&ContextOptions::isolated("classic"), echo_body())
            .unwrap();
        context.post(WorkerRequest::Init).unwrap();
        match context.recv().await {
            Some(WorkerReply::Error { kind, .. }) => {
                assert_eq!(kind, crate::worker::WorkerErrorKind::ImportFailure)
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        context.terminate();
    }
}
