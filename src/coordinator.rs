//! Render-dispatch orchestrator.
//!
//! The coordinator runs as a single tokio task that owns all of its state. Collaborators
//! interact through a [`CoordinatorHandle`] (commands in) and an event receiver (events out).
//!
//! Lifecycle: `Uninitialized → Probing → {WorkerReady | MainThreadFallback} → Rendering →
//! Idle(success | error)`. A worker channel whose init fails demotes the coordinator to
//! `MainThreadFallback`. On the fallback path `render()` runs directly on the coordinator task
//! and blocks it for the whole computation; no timer frames are produced meanwhile.

pub mod control;
pub mod env;
pub mod events;

pub use control::RenderControl;
pub use env::DispatchEnv;
pub use events::{
    CoordinatorEvent, CoordinatorState, CoordinatorStatus, ExecutionPath, RenderOutcome,
};

use crate::compute::{self, ComputeModule, RawFrame, RenderResult};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::timer::{format_elapsed, FrameRequest, ProgressTimer};
use crate::worker::{ChannelEvent, WorkerChannel};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shown when rendering has to happen on the coordinator's own thread.
pub const DEGRADED_NOTICE: &str =
    "Background worker unavailable; rendering on the calling thread (expect the host to stall during render).";

#[derive(Debug)]
enum Command {
    Start,
    Shutdown,
}

/// Collaborator-facing handle. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    control: RenderControl,
    status: watch::Receiver<CoordinatorStatus>,
}

impl CoordinatorHandle {
    /// Trigger a render. Returns `false` when the render control is disabled (still probing,
    /// still initializing, or a render is in flight); the call is then a no-op.
    pub fn start(&self) -> bool {
        if !self.control.claim() {
            debug!("start rejected: render control disabled");
            return false;
        }
        self.commands.send(Command::Start).is_ok()
    }

    pub fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }

    pub fn status(&self) -> CoordinatorStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> CoordinatorState {
        self.status.borrow().state
    }

    /// Receiver that observes every published status.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.clone()
    }

    /// Stop the coordinator; the event stream closes once it has exited.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

pub struct RenderCoordinator {
    env: DispatchEnv,
    state: CoordinatorState,
    status: watch::Sender<CoordinatorStatus>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    control: RenderControl,
    channel: Option<WorkerChannel>,
    module: Option<Box<dyn ComputeModule>>,
    timer: ProgressTimer,
    frame_requested: bool,
    frame_interval: Duration,
    degraded_notified: bool,
}

impl RenderCoordinator {
    /// Spawn the coordinator task. Probing starts immediately.
    pub fn spawn(
        env: DispatchEnv,
        config: &DispatchConfig,
    ) -> (
        CoordinatorHandle,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CoordinatorStatus::default());
        let control = RenderControl::new();

        let coordinator = Self {
            timer: ProgressTimer::new(Arc::clone(&env.clock)),
            env,
            state: CoordinatorState::Uninitialized,
            status: status_tx,
            events: event_tx,
            control: control.clone(),
            channel: None,
            module: None,
            frame_requested: false,
            frame_interval: config.frame_interval(),
            degraded_notified: false,
        };
        let task = tokio::spawn(coordinator.run(command_rx));

        let handle = CoordinatorHandle {
            commands: command_tx,
            control,
            status: status_rx,
        };
        (handle, event_rx, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.initialize();

        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Start) => self.handle_start(),
                    Some(Command::Shutdown) | None => break,
                },
                event = next_channel_event(&mut self.channel) => match event {
                    Some(event) => self.handle_channel_event(event),
                    None => self.on_channel_closed(),
                },
                _ = frames.tick(), if self.frame_requested => self.on_frame(),
            }
        }

        self.teardown();
    }

    fn initialize(&mut self) {
        self.set_state(CoordinatorState::Probing);
        let capable = self.env.probe.probe();
        info!("background worker capability: {}", capable);

        if !capable {
            self.enter_fallback();
            return;
        }

        let opened = WorkerChannel::open(self.env.host.as_ref(), Arc::clone(&self.env.loader))
            .and_then(|mut channel| channel.init().map(|()| channel));
        match opened {
            Ok(channel) => {
                self.channel = Some(channel);
                self.set_state(CoordinatorState::WorkerReady);
            }
            Err(e) => {
                warn!("could not start background worker: {}", e);
                self.enter_fallback();
            }
        }
    }

    /// Switch to inline execution: notify once, then load and initialize the module here.
    fn enter_fallback(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.terminate();
        }
        self.set_state(CoordinatorState::MainThreadFallback);

        if !self.degraded_notified {
            self.degraded_notified = true;
            self.emit(CoordinatorEvent::Degraded(DEGRADED_NOTICE.to_string()));
            self.timer.set_label(DEGRADED_NOTICE);
            self.publish_label();
        }

        match compute::load_and_init(self.env.loader.as_ref()) {
            Ok(module) => {
                info!("compute module initialized on the coordinator thread");
                self.module = Some(module);
                self.enable_control();
            }
            Err(e) => {
                error!("compute module unavailable: {}", e);
                self.set_state(CoordinatorState::Unavailable);
                self.emit(CoordinatorEvent::Error(format!(
                    "Compute module unavailable: {}",
                    e
                )));
            }
        }
    }

    fn startable_path(&self) -> Option<ExecutionPath> {
        match self.state {
            CoordinatorState::WorkerReady
                if self.channel.as_ref().is_some_and(|c| c.is_initialized()) =>
            {
                Some(ExecutionPath::Worker)
            }
            CoordinatorState::MainThreadFallback => Some(ExecutionPath::MainThread),
            CoordinatorState::Idle { path, .. } => Some(path),
            _ => None,
        }
    }

    fn handle_start(&mut self) {
        let Some(path) = self.startable_path() else {
            debug!("start ignored in state {:?}", self.state);
            return;
        };
        self.control.disable();

        self.timer.reset();
        self.frame_requested = self.timer.start() == FrameRequest::Continue;
        self.set_state(CoordinatorState::Rendering(path));
        info!("render started on {:?} path", path);

        match path {
            ExecutionPath::Worker => {
                let sent = match self.channel.as_mut() {
                    Some(channel) => channel.render(),
                    None => Err(DispatchError::worker_unavailable("worker channel missing")),
                };
                if let Err(e) = sent {
                    self.finish_error(e);
                }
            }
            ExecutionPath::MainThread => {
                let outcome = match self.module.as_mut() {
                    Some(module) => compute::guarded_render(module.as_mut()),
                    None => Err(DispatchError::render_failure("compute module not loaded")),
                };
                match outcome {
                    Ok(frame) => self.finish_success(frame),
                    Err(e) => self.finish_error(e),
                }
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Initialized => {
                info!("background worker initialized");
                if self.state == CoordinatorState::WorkerReady {
                    self.enable_control();
                }
            }
            ChannelEvent::InitFailed(e) => {
                warn!("background worker init failed, falling back: {}", e);
                self.enter_fallback();
            }
            ChannelEvent::Rendered(frame) => {
                if self.state == CoordinatorState::Rendering(ExecutionPath::Worker) {
                    self.finish_success(frame);
                } else {
                    self.warn_stray(format!(
                        "render result arrived in state {:?}; discarded",
                        self.state
                    ));
                }
            }
            ChannelEvent::RenderFailed(e) => {
                if self.state == CoordinatorState::Rendering(ExecutionPath::Worker) {
                    self.finish_error(e);
                } else {
                    self.warn_stray(format!(
                        "worker failure outside a render ({:?}): {}",
                        self.state, e
                    ));
                }
            }
        }
    }

    /// The background context went away with nothing outstanding.
    fn on_channel_closed(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        // the thread has already dropped its reply sender, so this join is immediate
        channel.terminate();

        let on_worker_path = match self.state {
            CoordinatorState::WorkerReady => true,
            CoordinatorState::Idle { path, .. } => path == ExecutionPath::Worker,
            _ => false,
        };
        if on_worker_path {
            warn!("background worker exited; falling back to inline rendering");
            self.control.disable();
            self.enter_fallback();
        } else {
            debug!("background worker closed in state {:?}", self.state);
        }
    }

    fn finish_success(&mut self, frame: RawFrame) {
        let result = match RenderResult::from_frame(frame, 0.0) {
            Ok(result) => result,
            Err(e) => return self.finish_error(e),
        };

        self.timer.stop();
        self.publish_label();
        let result = result.with_duration(self.timer.elapsed_ms());
        info!(
            "render finished: {}x{}, {} rays in {}",
            result.width(),
            result.height(),
            result.total_rays(),
            format_elapsed(result.duration_ms())
        );

        let path = self.current_path();
        self.set_state(CoordinatorState::Idle {
            path,
            outcome: RenderOutcome::Success,
        });
        self.emit(CoordinatorEvent::Result(result));
        self.enable_control();
    }

    fn finish_error(&mut self, err: DispatchError) {
        self.timer.pause();
        self.timer.set_label(format!(
            "Error occurred during rendering (after {}).",
            format_elapsed(self.timer.elapsed_ms())
        ));
        self.publish_label();
        error!("render failed: {}", err);

        let path = self.current_path();
        self.set_state(CoordinatorState::Idle {
            path,
            outcome: RenderOutcome::Error,
        });
        self.emit(CoordinatorEvent::Error(err.to_string()));
        self.enable_control();
    }

    fn on_frame(&mut self) {
        if self.timer.tick() == FrameRequest::Stop {
            self.frame_requested = false;
        }
        self.publish_label();
        self.publish_status();
    }

    fn current_path(&self) -> ExecutionPath {
        match self.state {
            CoordinatorState::Rendering(path) | CoordinatorState::Idle { path, .. } => path,
            _ if self.module.is_some() => ExecutionPath::MainThread,
            _ => ExecutionPath::Worker,
        }
    }

    fn enable_control(&mut self) {
        self.control.enable();
        self.publish_status();
        self.emit(CoordinatorEvent::Ready);
    }

    fn set_state(&mut self, state: CoordinatorState) {
        debug!("coordinator state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.status.send_replace(CoordinatorStatus {
            state: self.state,
            timer: self.timer.state(),
            elapsed_ms: self.timer.elapsed_ms(),
            control_enabled: self.control.is_enabled(),
        });
    }

    fn publish_label(&mut self) {
        if let Some(label) = self.timer.take_label_update() {
            self.emit(CoordinatorEvent::Progress(label));
        }
    }

    fn warn_stray(&self, message: String) {
        warn!("{}", message);
        self.emit(CoordinatorEvent::Warning(message));
    }

    fn emit(&self, event: CoordinatorEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    fn teardown(&mut self) {
        self.control.disable();
        if let Some(channel) = self.channel.take() {
            if self.state.is_rendering() || channel.pending().is_some() {
                // no cancellation; the outstanding request finishes on its own
                drop(channel);
            } else {
                channel.terminate();
            }
        }
        self.publish_status();
        debug!("coordinator stopped");
    }
}

async fn next_channel_event(channel: &mut Option<WorkerChannel>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.next_event().await,
        None => std::future::pending().await,
    }
}
