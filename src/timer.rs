//! Elapsed-time progress widget.
//!
//! `ProgressTimer` is a small state machine driven by a frame scheduler: `start()` asks for a
//! frame loop, and every `tick()` while `Running` recomputes the elapsed time, refreshes the
//! label, and asks for the next frame. Once the state leaves `Running` the next tick answers
//! [`FrameRequest::Stop`] and the driver schedules nothing further, so the displayed time
//! never advances while frames are not being produced.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Source of monotonic timestamps in milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Monotonic clock anchored at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock() += ms;
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock() = ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Answer to the frame scheduler after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Schedule another frame callback
    Continue,
    /// The loop is over; schedule nothing
    Stop,
}

pub struct ProgressTimer {
    clock: Arc<dyn Clock>,
    state: TimerState,
    start_timestamp: Option<f64>,
    elapsed_ms: f64,
    label: String,
    label_dirty: bool,
}

impl ProgressTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: TimerState::Idle,
            start_timestamp: None,
            elapsed_ms: 0.0,
            label: String::new(),
            label_dirty: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn start_timestamp(&self) -> Option<f64> {
        self.start_timestamp
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Begin or resume timing.
    ///
    /// A paused timer keeps its origin timestamp; an idle or stopped one takes a fresh origin
    /// and its elapsed time restarts from zero. Returns the frame request for the driver.
    pub fn start(&mut self) -> FrameRequest {
        match self.state {
            TimerState::Paused if self.start_timestamp.is_some() => {}
            TimerState::Running => return FrameRequest::Continue,
            _ => {
                self.start_timestamp = Some(self.clock.now_ms());
                self.elapsed_ms = 0.0;
            }
        }
        self.state = TimerState::Running;
        FrameRequest::Continue
    }

    /// One frame callback.
    pub fn tick(&mut self) -> FrameRequest {
        if self.state != TimerState::Running {
            return FrameRequest::Stop;
        }
        self.update_label();
        FrameRequest::Continue
    }

    /// Sample the clock one last time, then freeze at `Paused`.
    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.update_label();
            self.state = TimerState::Paused;
        }
    }

    /// Final label update, then `Stopped`.
    pub fn stop(&mut self) {
        if self.start_timestamp.is_some() {
            self.update_label();
        }
        self.state = TimerState::Stopped;
    }

    /// Back to `Idle` with no origin, for a new attempt.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.start_timestamp = None;
        self.elapsed_ms = 0.0;
    }

    /// Replace the displayed text (degraded-mode notices, errors).
    pub fn set_label(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.label {
            self.label = text;
            self.label_dirty = true;
        }
    }

    /// The label, if it changed since the last call.
    pub fn take_label_update(&mut self) -> Option<String> {
        if self.label_dirty {
            self.label_dirty = false;
            Some(self.label.clone())
        } else {
            None
        }
    }

    fn update_label(&mut self) {
        if let Some(origin) = self.start_timestamp {
            // max() keeps the sequence non-decreasing even if the clock misbehaves
            self.elapsed_ms = (self.clock.now_ms() - origin).max(self.elapsed_ms);
            self.set_label(format_elapsed(self.elapsed_ms));
        }
    }
}

/// `1234.5ms`
pub fn format_elapsed(elapsed_ms: f64) -> String {
    format!("{:.1}ms", elapsed_ms)
}
