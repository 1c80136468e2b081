//! Repeated FastFrame acquisitions synchronized with a device under test.
//!
//! A trigger cycle arms the scope for `F` frames, runs `F` exchanges with the device (each one
//! fires the scope once) and then waits for the scope to report that the acquisition finished.
//! Cycles the scope never confirms are run again from the start; only confirmed cycles count
//! towards the requested number of acquisitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod controller;
mod error;
mod log_sink;
mod workspace;

pub use controller::{AcquisitionController, LoopOptions, SessionSummary};
pub use error::{AcquisitionError, Result};
pub use log_sink::{log_timestamp, LogSinks, CASE_ONLY_LOG_PREFIX, FULL_LOG_PREFIX};
pub use workspace::{prepare_session, AssumeYes, ConsoleOperator, Operator, PreparedSession, SETUP_FILE_NAME};

/// What happens to the frame records of a cycle the scope never confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryRecords {
    /// Records go to the logs as they arrive, so a failed cycle leaves its `F` records in the logs
    /// ahead of the records of its retry.
    KeepAll,
    /// Records are held back until the scope confirms the cycle and dropped if it doesn't.
    ConfirmedOnly,
}

/// How long to wait for the scope to report READY after arming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadyPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for ReadyPolicy {
    fn default() -> Self { Self{ interval: Duration::from_millis(100), timeout: Some(Duration::from_secs(60)) } }
}

/// How the end of a cycle is polled: one event-status query per `interval` until `ceiling` passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmPolicy {
    interval: Duration,
    ceiling: Duration,
}

impl ConfirmPolicy {

    pub fn new(interval:Duration, ceiling:Duration) -> Result<Self> {
        if interval == Duration::from_secs(0) {
            return Err(AcquisitionError::Config("confirmation poll interval must be positive".to_owned()));
        }
        Ok(Self{ interval, ceiling })
    }

    pub fn interval(&self) -> Duration { self.interval }
    pub fn ceiling(&self) -> Duration { self.ceiling }

    /// Number of status queries before a cycle counts as failed, never less than one.
    pub fn max_attempts(&self) -> u32 {
        let i = self.interval.as_nanos();
        let c = self.ceiling.as_nanos();
        (((c + i - 1) / i).max(1)).min(u32::MAX as u128) as u32
    }

}

impl Default for ConfirmPolicy {
    fn default() -> Self { Self{ interval: Duration::from_millis(500), ceiling: Duration::from_secs(20) } }
}

/// Progress of one measurement run. `completed` only moves in whole cycles of `F` acquisitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSession {
    target: u32,
    frames_per_trigger: u32,
    completed: u32,
    retry: bool,
    cycles: u32,
    failed_cycles: u32,
}

impl AcquisitionSession {

    pub fn new(target:u32, frames_per_trigger:u32) -> Result<Self> {
        if frames_per_trigger == 0 || target == 0 || target % frames_per_trigger != 0 {
            return Err(AcquisitionError::CountNotMultiple{ count: target, frames: frames_per_trigger });
        }
        Ok(Self{ target, frames_per_trigger, completed: 0, retry: false, cycles: 0, failed_cycles: 0 })
    }

    pub fn target(&self) -> u32 { self.target }
    pub fn frames_per_trigger(&self) -> u32 { self.frames_per_trigger }
    pub fn completed(&self) -> u32 { self.completed }
    pub fn cycles(&self) -> u32 { self.cycles }
    pub fn failed_cycles(&self) -> u32 { self.failed_cycles }

    /// Whether the next cycle repeats one the scope never confirmed.
    pub fn is_retry(&self) -> bool { self.retry }

    pub fn is_complete(&self) -> bool { self.completed >= self.target }

    fn confirm_cycle(&mut self) {
        self.completed += self.frames_per_trigger;
        self.retry = false;
        self.cycles += 1;
    }

    fn fail_cycle(&mut self) {
        self.retry = true;
        self.cycles += 1;
        self.failed_cycles += 1;
    }

}
