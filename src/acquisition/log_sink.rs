use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use log::debug;

use crate::dut::FrameRecord;

pub const FULL_LOG_PREFIX:&str = "fullLog";
pub const CASE_ONLY_LOG_PREFIX:&str = "caseOnlyLog";

pub fn log_timestamp<Tz: TimeZone>(now:&DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y%m%d-%H%M_%S").to_string()
}

/// The two append-only logs of a session. Records land in the order they are appended and the
/// writers are only flushed when the session finishes.
pub struct LogSinks<W: Write = BufWriter<File>> {
    full: W,
    case_only: W,
    records: u64,
}

impl LogSinks<BufWriter<File>> {

    /// Creates `fullLog-<stamp>.txt` and `caseOnlyLog-<stamp>.txt` in `dir`. Existing files are
    /// never reused.
    pub fn create(dir:&Path, stamp:&str) -> io::Result<Self> {
        let (full_path, case_path) = Self::paths(dir, stamp);
        let open = |p:&Path| OpenOptions::new().write(true).create_new(true).open(p).map(BufWriter::new);
        let full = open(full_path.as_path())?;
        let case_only = open(case_path.as_path())?;
        debug!("logging to {} and {}", full_path.display(), case_path.display());
        Ok(Self::from_writers(full, case_only))
    }

    pub fn paths(dir:&Path, stamp:&str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}-{}.txt", FULL_LOG_PREFIX, stamp)),
            dir.join(format!("{}-{}.txt", CASE_ONLY_LOG_PREFIX, stamp)),
        )
    }

}

impl<W: Write> LogSinks<W> {

    pub fn from_writers(full:W, case_only:W) -> Self { Self{ full, case_only, records: 0 } }

    pub fn append(&mut self, record:&FrameRecord) -> io::Result<()> {
        self.full.write_all(&record.case_selector)?;
        self.full.write_all(&record.plaintext)?;
        self.full.write_all(&record.signature)?;
        self.case_only.write_all(&record.case_selector)?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 { self.records }

    /// Flushes both logs and hands the writers back.
    pub fn finish(mut self) -> io::Result<(W, W)> {
        self.full.flush()?;
        self.case_only.flush()?;
        Ok((self.full, self.case_only))
    }

}
