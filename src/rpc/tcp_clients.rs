
extern crate byteorder;

use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};
use log::trace;

use crate::xdr;
use super::LAST_FRAGMENT;
use super::xdr_pack::pack_callheader_no_auth;
use super::xdr_unpack;

// Record marking (RFC 5531, section 11): every fragment gets a 4-byte header holding its length,
// with the top bit set on the last fragment of the record
pub fn write_record<W: Write>(stream:&mut W, record:&[u8]) -> io::Result<()> {
	if record.len() > (!LAST_FRAGMENT) as usize {
		return Err(Error::new(ErrorKind::Other, "Record too long for a single fragment"));
	}

	let mut send_bytes:Vec<u8> = Vec::with_capacity(record.len() + 4);
	send_bytes.write_u32::<BigEndian>(record.len() as u32 | LAST_FRAGMENT)?;
	send_bytes.extend_from_slice(record);
	stream.write_all(&send_bytes)?;
	stream.flush()
}

// Largest reassembled record accepted from a peer
pub const MAX_RECORD_LEN:usize = 64 << 20;

pub fn read_record<R: Read>(stream:&mut R) -> io::Result<Vec<u8>> {
	let mut record:Vec<u8> = vec![];

	loop {
		let header:u32 = stream.read_u32::<BigEndian>()?;
		let n = (header & !LAST_FRAGMENT) as usize;
		if n > MAX_RECORD_LEN - record.len() {
			return Err(Error::new(ErrorKind::InvalidData, format!("RPC record longer than {} bytes", MAX_RECORD_LEN)));
		}

		let start = record.len();
		record.resize(start + n, 0);
		stream.read_exact(&mut record[start..])?;

		if header & LAST_FRAGMENT != 0 { return Ok(record); }
	}
}

pub struct TcpClient<S = TcpStream> {
	pub stream: S,
	pub prog: u32,
	pub vers: u32,
	pub lastxid: u32,
	pub packer: xdr::Packer,
	pub unpacker: xdr::Unpacker,
}

impl TcpClient<TcpStream> {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, io_timeout:Option<Duration>) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_nodelay(true)?;
		stream.set_read_timeout(io_timeout)?;
		stream.set_write_timeout(io_timeout)?;
		Ok(Self::with_stream(stream, prog, vers))
	}

}

impl<S: Read + Write> TcpClient<S> {

	pub fn with_stream(stream:S, prog:u32, vers:u32) -> Self {
		Self{ stream, prog, vers, lastxid: 0, packer: xdr::Packer::new(), unpacker: xdr::Unpacker::new() }
	}

	// Bumps the xid and leaves the packer holding a call header, ready for the procedure arguments
	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	// Sends whatever is in the packer and leaves the unpacker positioned just after the reply header
	pub fn do_call(&mut self) -> io::Result<()> {
		trace!("rpc call prog={:#x} xid={} ({} bytes)", self.prog, self.lastxid, self.packer.as_bytes().len());
		write_record(&mut self.stream, self.packer.as_bytes())?;

		loop {
			let reply = read_record(&mut self.stream)?;
			self.unpacker.reset(&reply);

			let (xid, _) = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				return Ok(());
			} else if xid < self.lastxid {
				// Stale reply to a call we already gave up on
				trace!("discarding stale rpc reply xid={}", xid);
				continue;
			} else {
				return Err(Error::new(ErrorKind::Other, "Somehow got a reply from the future"));
			}
		}
	}

}
