use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),

    #[error("unreadable configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("number of acquisitions ({count}) must be a positive multiple of the FastFrame size ({frames})")]
    CountNotMultiple { count: u32, frames: u32 },

    #[error("stopped by operator: {0}")]
    Declined(String),

    #[error("scope did not report READY within {0:?}")]
    ReadyTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
