//! Session configuration, loaded from a JSON file. Every field is optional in the file and falls
//! back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionError, ConfirmPolicy, ReadyPolicy, RetryRecords};
use crate::dut;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Network address of the oscilloscope.
    pub scope_host: String,
    /// Core channel port; when unset the port mapper is asked.
    pub scope_port: Option<u16>,
    /// Folder on the scope that receives one subfolder per session.
    pub scope_root: String,
    /// Local folder that receives one subfolder per session.
    pub local_root: PathBuf,

    pub serial_port: String,
    pub baud_rate: u32,
    pub serial_timeout_sec: f32,

    pub ready_poll_interval_sec: f32,
    /// `None` waits for the trigger to arm forever.
    pub ready_timeout_sec: Option<f32>,
    pub confirm_poll_interval_sec: f32,
    pub confirm_timeout_sec: f32,

    pub rearm_on_retry: bool,
    pub retry_records: RetryRecords,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scope_host: "141.83.62.51".to_owned(),
            scope_port: None,
            scope_root: "E:/Traces".to_owned(),
            local_root: PathBuf::from("traces"),
            serial_port: "/dev/ttyUSB0".to_owned(),
            baud_rate: dut::DEFAULT_BAUD_RATE,
            serial_timeout_sec: dut::DEFAULT_TIMEOUT_SEC,
            ready_poll_interval_sec: 0.1,
            ready_timeout_sec: Some(60.0),
            confirm_poll_interval_sec: 0.5,
            confirm_timeout_sec: 20.0,
            rearm_on_retry: true,
            retry_records: RetryRecords::KeepAll,
        }
    }
}

fn secs(x:f32, what:&str) -> Result<Duration, AcquisitionError> {
    Duration::try_from_secs_f32(x)
        .map_err(|_| AcquisitionError::Config(format!("{} must be a non-negative number of seconds, got {}", what, x)))
}

impl SessionConfig {

    pub fn load(path:&Path) -> Result<Self, AcquisitionError> {
        let text = fs::read_to_string(path)?;
        let cfg:Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AcquisitionError> {
        self.ready_policy()?;
        self.confirm_policy()?;
        self.serial_timeout()?;
        if self.baud_rate == 0 {
            return Err(AcquisitionError::Config("baud_rate must be positive".to_owned()));
        }
        Ok(())
    }

    pub fn serial_timeout(&self) -> Result<Duration, AcquisitionError> { secs(self.serial_timeout_sec, "serial_timeout_sec") }

    pub fn ready_policy(&self) -> Result<ReadyPolicy, AcquisitionError> {
        let timeout = match self.ready_timeout_sec {
            Some(t) => Some(secs(t, "ready_timeout_sec")?),
            None => None,
        };
        Ok(ReadyPolicy{ interval: secs(self.ready_poll_interval_sec, "ready_poll_interval_sec")?, timeout })
    }

    pub fn confirm_policy(&self) -> Result<ConfirmPolicy, AcquisitionError> {
        ConfirmPolicy::new(
            secs(self.confirm_poll_interval_sec, "confirm_poll_interval_sec")?,
            secs(self.confirm_timeout_sec, "confirm_timeout_sec")?,
        )
    }

    /// Destination folder for this session on the scope.
    pub fn scope_dir(&self, folder:&str) -> String {
        format!("{}/{}", self.scope_root.trim_end_matches('/'), folder)
    }

    /// Destination folder for this session on this machine.
    pub fn local_dir(&self, folder:&str) -> PathBuf { self.local_root.join(folder) }

}
