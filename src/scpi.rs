//! SCPI request/reply plumbing shared by the instrument drivers.
//!
//! Drivers talk to a [`ScpiTransport`] instead of a concrete link so the same driver runs over a
//! VXI-11 core channel or over a scripted transport in tests.

use std::io::{self, Error, ErrorKind};
use std::str;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::vxi11::CoreClient;

lazy_static! {
    static ref IDN_RE: Regex    = Regex::new(r"^([^,]+),([^,]+),([^,]+),([^,\s]+)").unwrap();
    static ref QUOTED_RE: Regex = Regex::new(r#"^"(.*)"$"#).unwrap();
}

fn err(msg:String) -> io::Error { Error::new(ErrorKind::InvalidData, msg) }

/// A synchronous, one-request-at-a-time command channel to an instrument.
pub trait ScpiTransport {
    /// Sends a command that produces no reply.
    fn write_str(&mut self, cmd:&str) -> io::Result<()>;

    /// Sends a query and returns the raw reply text, terminator included.
    fn query_str(&mut self, cmd:&str) -> io::Result<String>;
}

impl ScpiTransport for CoreClient {

    fn write_str(&mut self, cmd:&str) -> io::Result<()> {
        debug!("scpi write: {}", cmd);
        self.write(cmd.as_bytes())
    }

    fn query_str(&mut self, cmd:&str) -> io::Result<String> {
        let reply = self.ask(cmd.as_bytes())?;
        let ans = str::from_utf8(&reply)
            .map(|s| s.to_owned())
            .map_err(|_| err(format!("Reply to {} is not valid UTF-8", cmd)))?;
        debug!("scpi query: {} -> {}", cmd, ans.trim_end());
        Ok(ans)
    }

}

impl<T: ScpiTransport + ?Sized> ScpiTransport for Box<T> {
    fn write_str(&mut self, cmd:&str) -> io::Result<()> { (**self).write_str(cmd) }
    fn query_str(&mut self, cmd:&str) -> io::Result<String> { (**self).query_str(cmd) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial_num: String,
    pub fw_version: String,
}

pub fn parse_identity(reply:&str) -> io::Result<Identity> {
    let caps = IDN_RE.captures(reply.trim())
        .ok_or_else(|| err(format!("Unable to parse *IDN? reply {:?}", reply)))?;
    Ok(Identity {
        manufacturer: caps[1].trim().to_owned(),
        model: caps[2].trim().to_owned(),
        serial_num: caps[3].trim().to_owned(),
        fw_version: caps[4].trim().to_owned(),
    })
}

/// Drops the command header an instrument echoes in front of a reply while header mode is on,
/// e.g. `:ACQUIRE:STATE 1` becomes `1`.
pub fn strip_header(reply:&str) -> &str {
    let trimmed = reply.trim();
    if trimmed.starts_with(':') || trimmed.starts_with('*') {
        if let Some(i) = trimmed.find(char::is_whitespace) {
            return trimmed[i..].trim_start();
        }
    }
    trimmed
}

/// Strips the surrounding double quotes of a string reply, if present.
pub fn unquote(reply:&str) -> String {
    let trimmed = reply.trim();
    match QUOTED_RE.captures(trimmed) {
        Some(caps) => caps[1].replace("\"\"", "\""),
        None => trimmed.to_owned(),
    }
}

/// Formats a string argument the way the instrument expects it on the wire.
pub fn quote(arg:&str) -> String { format!("\"{}\"", arg.replace('"', "\"\"")) }

pub fn parse_int(reply:&str) -> io::Result<i64> {
    let trimmed = reply.trim();
    // Some firmware answers integer queries in NR3 form, e.g. 1.0E+3
    trimmed.parse::<i64>()
        .or_else(|_| trimmed.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64).ok_or(()))
        .map_err(|_| err(format!("Unable to parse {:?} as an integer", reply)))
}

pub fn parse_float(reply:&str) -> io::Result<f64> {
    reply.trim().parse::<f64>().map_err(|_| err(format!("Unable to parse {:?} as a float", reply)))
}

pub fn parse_bool(reply:&str) -> io::Result<bool> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "1" | "ON"  => Ok(true),
        "0" | "OFF" => Ok(false),
        _ => Err(err(format!("Unable to parse {:?} as a boolean", reply))),
    }
}
