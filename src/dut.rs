//! Serial link to the device under test.
//!
//! The device answers every trigger byte with three newline-terminated text fields. Nothing about
//! their contents is interpreted here; they are passed on byte for byte.

use std::io::{self, BufRead, BufReader, Error, ErrorKind, Write};
use std::time::Duration;

use log::trace;
use serialport::SerialPort;

pub const TRIGGER_BYTE:u8 = b'a';
pub const FIELD_DELIMITER:u8 = b'\n';

pub const DEFAULT_BAUD_RATE:u32 = 115_200;
pub const DEFAULT_TIMEOUT_SEC:f32 = 200_000.0;

/// One device exchange: the three fields in the order the device sends them, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub case_selector: Vec<u8>,
    pub plaintext: Vec<u8>,
    pub signature: Vec<u8>,
}

impl FrameRecord {
    /// Bytes written to the full log for this frame.
    pub fn concat(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(self.case_selector.len() + self.plaintext.len() + self.signature.len());
        ans.extend_from_slice(&self.case_selector);
        ans.extend_from_slice(&self.plaintext);
        ans.extend_from_slice(&self.signature);
        ans
    }
}

pub trait DutChannel {
    /// Tells the device to run one case.
    fn send_trigger(&mut self) -> io::Result<()>;

    /// Reads one field up to and including the delimiter.
    fn read_field(&mut self) -> io::Result<Vec<u8>>;

    fn read_frame(&mut self) -> io::Result<FrameRecord> {
        let case_selector = self.read_field()?;
        let plaintext = self.read_field()?;
        let signature = self.read_field()?;
        Ok(FrameRecord{ case_selector, plaintext, signature })
    }
}

impl<D: DutChannel + ?Sized> DutChannel for Box<D> {
    fn send_trigger(&mut self) -> io::Result<()> { (**self).send_trigger() }
    fn read_field(&mut self) -> io::Result<Vec<u8>> { (**self).read_field() }
}

impl<'a, D: DutChannel + ?Sized> DutChannel for &'a mut D {
    fn send_trigger(&mut self) -> io::Result<()> { (**self).send_trigger() }
    fn read_field(&mut self) -> io::Result<Vec<u8>> { (**self).read_field() }
}

/// Reads one delimited field, treating end-of-stream before the delimiter as an error.
pub fn read_delimited<R: BufRead>(reader:&mut R) -> io::Result<Vec<u8>> {
    let mut field = Vec::new();
    reader.read_until(FIELD_DELIMITER, &mut field)?;
    if field.last() != Some(&FIELD_DELIMITER) {
        return Err(Error::new(ErrorKind::UnexpectedEof, "Device closed the channel in the middle of a field"));
    }
    Ok(field)
}

/// Any byte stream that speaks the device protocol, e.g. a serial port or a socket bridge.
pub struct StreamDut<S: io::Read + Write> {
    reader: BufReader<S>,
}

impl<S: io::Read + Write> StreamDut<S> {
    pub fn new(stream:S) -> Self { Self{ reader: BufReader::new(stream) } }

    pub fn get_ref(&self) -> &S { self.reader.get_ref() }

    pub fn into_inner(self) -> S { self.reader.into_inner() }
}

impl<S: io::Read + Write> DutChannel for StreamDut<S> {

    fn send_trigger(&mut self) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(&[TRIGGER_BYTE])?;
        stream.flush()?;
        trace!("trigger byte sent");
        Ok(())
    }

    fn read_field(&mut self) -> io::Result<Vec<u8>> {
        let field = read_delimited(&mut self.reader)?;
        trace!("field: {}", String::from_utf8_lossy(&field).trim_end());
        Ok(field)
    }

}

pub type SerialDut = StreamDut<Box<dyn SerialPort>>;

/// Opens the serial port the device under test hangs off. The port closes when the channel drops.
pub fn open_serial(path:&str, baud_rate:u32, timeout:Duration) -> Result<SerialDut, serialport::Error> {
    let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
    Ok(StreamDut::new(port))
}
