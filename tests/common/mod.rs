#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use render_dispatch::compute::{ComputeLoader, ComputeModule, RawFrame};
use render_dispatch::coordinator::CoordinatorEvent;
use render_dispatch::worker::{
    BackgroundContext, BackgroundHost, ContextOptions, WorkerBody, WorkerReply, WorkerRequest,
};
use render_dispatch::{DispatchConfig, DispatchError, Result};

pub const TIMEOUT_MS: u64 = 2000;

pub fn test_config() -> DispatchConfig {
    DispatchConfig {
        frame_interval_ms: 2,
        ..DispatchConfig::default()
    }
}

pub fn test_frame(width: u32, height: u32) -> RawFrame {
    let len = 4 * width as usize * height as usize;
    RawFrame {
        pixels: (0..len).map(|i| (i % 251) as u8).collect(),
        width,
        height,
        samples_per_pixel: 3,
        total_rays: u64::from(width * height * 3),
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>) -> CoordinatorEvent {
    timeout(Duration::from_millis(TIMEOUT_MS), rx.recv())
        .await
        .expect("coordinator event timed out")
        .expect("event channel closed unexpectedly")
}

/// Collect events up to and including the first one matching `done`.
pub async fn collect_until(
    rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>,
    done: impl Fn(&CoordinatorEvent) -> bool,
) -> Vec<CoordinatorEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let finished = done(&event);
        seen.push(event);
        if finished {
            return seen;
        }
    }
}

/// Everything that arrives within `window`.
pub async fn drain_for(
    rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>,
    window: Duration,
) -> Vec<CoordinatorEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(window, rx.recv()).await {
        seen.push(event);
    }
    seen
}

pub fn is_ready(event: &CoordinatorEvent) -> bool {
    matches!(event, CoordinatorEvent::Ready)
}

pub fn count(events: &[CoordinatorEvent], pred: impl Fn(&CoordinatorEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[derive(Default)]
pub struct Counters {
    pub loads: AtomicUsize,
    pub inits: AtomicUsize,
    pub renders: AtomicUsize,
}

impl Counters {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    FailLoad,
    FailRender,
    Panic,
    Malformed,
    SlowSucceed(u64),
}

struct FakeModule {
    frame: RawFrame,
    behavior: Behavior,
    counters: Arc<Counters>,
}

impl ComputeModule for FakeModule {
    fn init(&mut self) -> Result<()> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render(&mut self) -> Result<RawFrame> {
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::FailRender => Err(DispatchError::render_failure("scene exploded")),
            Behavior::Panic => panic!("compute module bug"),
            Behavior::Malformed => {
                let mut frame = self.frame.clone();
                frame.pixels.truncate(3);
                Ok(frame)
            }
            Behavior::SlowSucceed(ms) => {
                std::thread::sleep(std::time::Duration::from_millis(ms));
                Ok(self.frame.clone())
            }
            _ => Ok(self.frame.clone()),
        }
    }
}

/// Loader handing out fake modules that share one set of counters.
pub struct FakeLoader {
    pub counters: Arc<Counters>,
    frame: RawFrame,
    behavior: Behavior,
}

impl FakeLoader {
    pub fn new(frame: RawFrame, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(Counters::default()),
            frame,
            behavior,
        })
    }
}

impl ComputeLoader for FakeLoader {
    fn load(&self) -> Result<Box<dyn ComputeModule>> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailLoad {
            return Err(DispatchError::import_failure("module missing"));
        }
        Ok(Box::new(FakeModule {
            frame: self.frame.clone(),
            behavior: self.behavior,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Host whose contexts answer from a script instead of running the supplied body.
pub struct ScriptedHost {
    init_reply: WorkerReply,
    render_reply: WorkerReply,
    /// Sent right after the init reply, answering nothing
    unsolicited: Option<WorkerReply>,
    exit_after_init: bool,
    spawns: AtomicUsize,
    render_requests: Arc<AtomicUsize>,
}

impl ScriptedHost {
    pub fn new(init_reply: WorkerReply, render_reply: WorkerReply) -> Arc<Self> {
        Arc::new(Self::scripted(init_reply, render_reply))
    }

    /// Worker that follows a successful init with an extra reply.
    pub fn with_unsolicited(extra: WorkerReply, render_reply: WorkerReply) -> Arc<Self> {
        Arc::new(Self {
            unsolicited: Some(extra),
            ..Self::scripted(WorkerReply::initialized(), render_reply)
        })
    }

    /// Worker whose thread ends as soon as it has answered `Init`.
    pub fn exiting_after_init() -> Arc<Self> {
        Arc::new(Self {
            exit_after_init: true,
            ..Self::scripted(
                WorkerReply::initialized(),
                WorkerReply::render_failure("unreachable"),
            )
        })
    }

    fn scripted(init_reply: WorkerReply, render_reply: WorkerReply) -> Self {
        Self {
            init_reply,
            render_reply,
            unsolicited: None,
            exit_after_init: false,
            spawns: AtomicUsize::new(0),
            render_requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn render_requests(&self) -> usize {
        self.render_requests.load(Ordering::SeqCst)
    }
}

impl BackgroundHost for ScriptedHost {
    fn spawn(
        &self,
        options: &ContextOptions,
        _body: WorkerBody,
    ) -> Result<BackgroundContext> {
        options.loading_mode();
        self.spawns.fetch_add(1, Ordering::SeqCst);

        let (request_tx, mut request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let init_reply = self.init_reply.clone();
        let render_reply = self.render_reply.clone();
        let render_requests = Arc::clone(&self.render_requests);
        let unsolicited = self.unsolicited.clone();
        let exit_after_init = self.exit_after_init;

        let thread = std::thread::spawn(move || {
            while let Some(request) = request_rx.blocking_recv() {
                let reply = match request {
                    WorkerRequest::Init => init_reply.clone(),
                    WorkerRequest::Render => {
                        render_requests.fetch_add(1, Ordering::SeqCst);
                        render_reply.clone()
                    }
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
                if request == WorkerRequest::Init {
                    if let Some(extra) = &unsolicited {
                        let _ = reply_tx.send(extra.clone());
                    }
                    if exit_after_init {
                        break;
                    }
                }
            }
        });

        Ok(BackgroundContext::new(request_tx, reply_rx).with_thread(thread))
    }
}
