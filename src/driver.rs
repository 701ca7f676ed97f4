//! Frame driver
//!
//! Calls the guest's frame export once per display refresh with an
//! increasing frame counter.
//!
//! ```text
//! Idle --start()--> Running --cancel / source closed / failed tick--> Stopped
//! ```
//!
//! The loop is an ordinary async loop over a [`FrameSource`]. Every tick
//! runs to completion (guest export plus any nested color callback) before
//! the next frame is awaited, so guest calls never overlap.

use crate::config::HostConfig;
use crate::console_log;
use crate::guest::{Guest, TickError};
use crate::platform::FrameSource;
use serde::Deserialize;
use std::cell::Cell;
use std::rc::Rc;

/// What to do when a tick fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickFailurePolicy {
    /// Stop scheduling
    #[default]
    Halt,
    /// Log the failure and keep going
    Skip,
}

/// Why the driver stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The cancel token was set
    Cancelled,
    /// The frame source ran dry
    SourceClosed,
    /// A tick failed under [`TickFailurePolicy::Halt`]
    TickFailed(TickError),
}

/// Driver lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Stopped(StopReason),
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Schedule the next frame
    Continue,
    /// Do not schedule again
    Halt,
}

/// Shared stop flag, checked at every reschedule
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

pub struct FrameDriver<G> {
    guest: G,
    total_steps: Option<u32>,
    policy: TickFailurePolicy,
    state: DriverState,
    /// Counter value for the next tick
    frame: u64,
    failed_ticks: u64,
    cancel: CancelToken,
}

impl<G: Guest> FrameDriver<G> {
    pub fn new(guest: G, total_steps: Option<u32>, policy: TickFailurePolicy) -> Self {
        Self {
            guest,
            total_steps,
            policy,
            state: DriverState::Idle,
            frame: 0,
            failed_ticks: 0,
            cancel: CancelToken::new(),
        }
    }

    pub fn from_config(guest: G, config: &HostConfig) -> Self {
        Self::new(guest, config.total_steps, config.tick_failure)
    }

    /// A handle that stops the loop at the next reschedule
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    /// Number of ticks performed so far (also the next frame index)
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks
    }

    pub fn guest(&self) -> &G {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    /// Idle -> Running. Has no effect in any other state.
    pub fn start(&mut self) -> bool {
        match self.state {
            DriverState::Idle => {
                self.state = DriverState::Running;
                console_log!("[driver] Running");
                true
            }
            DriverState::Running => {
                console_log!("[driver] Already running");
                false
            }
            DriverState::Stopped(_) => {
                console_log!("[driver] Cannot restart a stopped driver");
                false
            }
        }
    }

    /// Stop with the given reason (no-op unless running or idle)
    pub fn stop(&mut self, reason: StopReason) {
        if !matches!(self.state, DriverState::Stopped(_)) {
            console_log!("[driver] Stopped after {} frames: {:?}", self.frame, reason);
            self.state = DriverState::Stopped(reason);
        }
    }

    /// Run one frame synchronously
    ///
    /// A cancelled driver stops here instead of entering the guest.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Halt;
        }
        if self.cancel.is_cancelled() {
            self.stop(StopReason::Cancelled);
            return TickOutcome::Halt;
        }

        let frame = self.frame;
        let result = self.guest.draw_frame(frame, self.total_steps);
        self.frame = frame.wrapping_add(1);

        match result {
            Ok(()) => TickOutcome::Continue,
            Err(err) => match self.policy {
                TickFailurePolicy::Halt => {
                    report_error(&format!("[driver] Frame {} failed: {}", frame, err));
                    self.stop(StopReason::TickFailed(err));
                    TickOutcome::Halt
                }
                TickFailurePolicy::Skip => {
                    self.failed_ticks += 1;
                    console_log!("[driver] Frame {} skipped: {}", frame, err);
                    TickOutcome::Continue
                }
            },
        }
    }

    /// Drive the guest until cancelled, the source closes, or a tick halts
    pub async fn run<S: FrameSource>(&mut self, frames: &mut S) -> &DriverState {
        if self.state == DriverState::Idle {
            self.start();
        }

        while self.is_running() {
            if self.cancel.is_cancelled() {
                self.stop(StopReason::Cancelled);
                break;
            }

            if frames.next_frame().await.is_none() {
                self.stop(StopReason::SourceClosed);
                break;
            }

            // Cancellation may have happened while waiting
            if self.cancel.is_cancelled() {
                self.stop(StopReason::Cancelled);
                break;
            }

            if self.tick() == TickOutcome::Halt {
                break;
            }
        }

        &self.state
    }
}

#[cfg(target_arch = "wasm32")]
fn report_error(msg: &str) {
    web_sys::console::error_1(&msg.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn report_error(msg: &str) {
    eprintln!("{}", msg);
}
