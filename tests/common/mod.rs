#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Error, ErrorKind};

use tekmso::acquisition::Operator;
use tekmso::dut::DutChannel;
use tekmso::scpi::ScpiTransport;

/// Scope stand-in: answers the queries the acquisition code makes and records every command.
pub struct ScriptedScope {
    pub log: Vec<String>,
    pub max_frames: u32,
    pub ldir: String,
    pub trigger_replies: VecDeque<String>,
    pub trigger_default: String,
    pub esr_replies: VecDeque<String>,
    pub esr_default: String,
}

impl ScriptedScope {
    pub fn new(max_frames:u32) -> Self {
        Self {
            log: vec![],
            max_frames,
            ldir: "\"\"".to_owned(),
            trigger_replies: VecDeque::new(),
            trigger_default: "READY".to_owned(),
            esr_replies: VecDeque::new(),
            esr_default: "1".to_owned(),
        }
    }

    pub fn writes(&self) -> Vec<&str> {
        self.log.iter().filter(|l| !l.ends_with('?')).map(|l| l.as_str()).collect()
    }

    pub fn count(&self, entry:&str) -> usize {
        self.log.iter().filter(|l| l.as_str() == entry).count()
    }

    /// Quoted argument of the first write of `attr`.
    pub fn argument_of(&self, attr:&str) -> Option<String> {
        let prefix = format!("{} ", attr);
        self.log.iter()
            .find(|l| l.starts_with(&prefix))
            .map(|l| l[prefix.len()..].trim_matches('"').to_owned())
    }
}

impl ScpiTransport for ScriptedScope {
    fn write_str(&mut self, cmd:&str) -> io::Result<()> {
        self.log.push(cmd.to_owned());
        Ok(())
    }

    fn query_str(&mut self, cmd:&str) -> io::Result<String> {
        self.log.push(cmd.to_owned());
        let reply = match cmd {
            ":HORizontal:FASTframe:MAXFRames?" => self.max_frames.to_string(),
            ":FILESystem:LDIR?" => self.ldir.clone(),
            ":HORizontal:MODe:SAMPLERate?" => "6.25E+9".to_owned(),
            ":HORizontal:MODe:RECOrdlength?" => "10000".to_owned(),
            ":TRIGger:STATE?" => self.trigger_replies.pop_front().unwrap_or_else(|| self.trigger_default.clone()),
            "*ESR?" => self.esr_replies.pop_front().unwrap_or_else(|| self.esr_default.clone()),
            _ => return Err(Error::new(ErrorKind::Other, format!("unexpected query {}", cmd))),
        };
        Ok(format!("{}\n", reply))
    }
}

/// Device stand-in: frame n answers case `n % 2`, plaintext `n` and signature `!n`, all in hex.
#[derive(Default)]
pub struct ScriptedDut {
    pub triggers: u32,
    pending: VecDeque<Vec<u8>>,
}

impl ScriptedDut {
    pub fn frame_bytes(n:u32) -> Vec<u8> {
        format!("{}\n{:08x}\n{:08x}\n", n % 2, n, !n).into_bytes()
    }

    pub fn case_bytes(n:u32) -> Vec<u8> {
        format!("{}\n", n % 2).into_bytes()
    }
}

impl DutChannel for ScriptedDut {
    fn send_trigger(&mut self) -> io::Result<()> {
        self.triggers += 1;
        let n = self.triggers;
        self.pending.push_back(format!("{}\n", n % 2).into_bytes());
        self.pending.push_back(format!("{:08x}\n", n).into_bytes());
        self.pending.push_back(format!("{:08x}\n", !n).into_bytes());
        Ok(())
    }

    fn read_field(&mut self) -> io::Result<Vec<u8>> {
        self.pending.pop_front().ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, "device sent nothing"))
    }
}

/// Gives the scripted answers in order and remembers what it was asked.
pub struct ScriptedOperator {
    pub answers: VecDeque<bool>,
    pub prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(answers:&[bool]) -> Self {
        Self{ answers: answers.iter().cloned().collect(), prompts: vec![] }
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, prompt:&str) -> io::Result<bool> {
        self.prompts.push(prompt.to_owned());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}
