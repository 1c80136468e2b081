use std::io::Write;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::devices::tek_mso::{TekMso, TriggerState};
use crate::dut::{DutChannel, FrameRecord};
use crate::scpi::ScpiTransport;

use super::{AcquisitionError, AcquisitionSession, ConfirmPolicy, LogSinks, ReadyPolicy, Result, RetryRecords};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopOptions {
    pub ready: ReadyPolicy,
    pub confirm: ConfirmPolicy,
    /// Arm the scope again before repeating an unconfirmed cycle. When off, the repeat goes
    /// straight to the device exchanges and relies on the scope still being armed.
    pub rearm_on_retry: bool,
    pub retry_records: RetryRecords,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            ready: ReadyPolicy::default(),
            confirm: ConfirmPolicy::default(),
            rearm_on_retry: true,
            retry_records: RetryRecords::KeepAll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub completed: u32,
    pub cycles: u32,
    pub failed_cycles: u32,
    pub records_written: u64,
}

/// Owns the device channel and the logs for the length of a session and borrows the scope.
/// Both are released on every exit path, including errors.
pub struct AcquisitionController<'a, T: ScpiTransport, D: DutChannel, W: Write> {
    scope: &'a mut TekMso<T>,
    dut: D,
    sinks: LogSinks<W>,
    session: AcquisitionSession,
    options: LoopOptions,
    staged: Vec<FrameRecord>,
}

impl<'a, T: ScpiTransport, D: DutChannel, W: Write> AcquisitionController<'a, T, D, W> {

    pub fn new(scope:&'a mut TekMso<T>, dut:D, sinks:LogSinks<W>, session:AcquisitionSession, options:LoopOptions) -> Self {
        Self{ scope, dut, sinks, session, options, staged: Vec::new() }
    }

    pub fn session(&self) -> &AcquisitionSession { &self.session }

    /// Configures a single FastFrame sequence of `F` frames, starts it and waits for READY.
    pub fn arm(&mut self) -> Result<()> {
        let frames = self.session.frames_per_trigger();
        self.scope.enable_fastframe()?;
        self.scope.set_fastframe_count(frames)?;
        self.scope.enable_save_on_trigger()?;
        self.scope.enable_acq_mode_sequence()?;
        self.scope.start_acq()?;
        self.scope.set_opc()?;
        self.wait_ready()
    }

    fn wait_ready(&mut self) -> Result<()> {
        let policy = self.options.ready;
        let start = Instant::now();
        loop {
            let state = self.scope.get_trigger_state()?;
            if state == TriggerState::Ready {
                return Ok(());
            }
            if let Some(timeout) = policy.timeout {
                if start.elapsed() >= timeout {
                    return Err(AcquisitionError::ReadyTimeout(timeout));
                }
            }
            debug!("scope not ready ({:?})", state);
            thread::sleep(policy.interval);
        }
    }

    /// Runs `F` trigger/read exchanges with the device.
    pub fn exchange_frames(&mut self) -> Result<()> {
        let frames = self.session.frames_per_trigger();
        for i in 0..frames {
            debug!("frame {} of {}", i + 1, frames);
            self.dut.send_trigger()?;
            let record = self.dut.read_frame()?;
            match self.options.retry_records {
                RetryRecords::KeepAll => self.sinks.append(&record)?,
                RetryRecords::ConfirmedOnly => self.staged.push(record),
            }
        }
        Ok(())
    }

    /// Polls the event status register until the operation-complete bit shows up. Returns false
    /// when the ceiling passes first.
    pub fn await_confirmation(&mut self) -> Result<bool> {
        let policy = self.options.confirm;
        let attempts = policy.max_attempts();
        for attempt in 1..=attempts {
            if self.scope.operation_complete()? {
                debug!("cycle confirmed after {} status queries", attempt);
                return Ok(true);
            }
            if attempt < attempts {
                thread::sleep(policy.interval());
            }
        }
        Ok(false)
    }

    /// One arm, exchange, confirm cycle. Returns whether the scope confirmed it.
    pub fn run_cycle(&mut self) -> Result<bool> {
        if self.session.is_retry() {
            info!("repeating measurement");
        } else {
            info!("running acquisition [{} / {}]", self.session.completed() + 1, self.session.target());
        }

        if !self.session.is_retry() || self.options.rearm_on_retry {
            self.arm()?;
        }

        self.exchange_frames()?;

        debug!("waiting for scope to write");
        if self.await_confirmation()? {
            for record in self.staged.drain(..) {
                self.sinks.append(&record)?;
            }
            self.session.confirm_cycle();
            Ok(true)
        } else {
            if !self.staged.is_empty() {
                debug!("dropping {} unconfirmed records", self.staged.len());
                self.staged.clear();
            }
            warn!("scope did not confirm the acquisition within {:?}", self.options.confirm.ceiling());
            self.session.fail_cycle();
            Ok(false)
        }
    }

    /// Runs cycles until the requested number of acquisitions is confirmed, then flushes the logs
    /// and releases the device channel.
    pub fn run(mut self) -> Result<SessionSummary> {
        while !self.session.is_complete() {
            self.run_cycle()?;
        }
        self.finish()
    }

    fn finish(self) -> Result<SessionSummary> {
        let records_written = self.sinks.records();
        let summary = SessionSummary {
            completed: self.session.completed(),
            cycles: self.session.cycles(),
            failed_cycles: self.session.failed_cycles(),
            records_written,
        };
        self.sinks.finish()?;
        drop(self.dut);
        info!("done: {} acquisitions in {} cycles ({} repeated)", summary.completed, summary.cycles, summary.failed_cycles);
        Ok(summary)
    }

}
