
pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_NULL:u32    = 0;     // (void) -> void
pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use log::debug;

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::xdr_pack;
use super::tcp_clients::TcpClient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug, Clone)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,				// XDR carries ports as u32 even though only 16 bits are meaningful
}

pub struct TcpPortMapperClient {
	pub host: String,
	client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, io_timeout:Option<Duration>) -> io::Result<Self> { Self::with_port(host, PMAP_PORT, io_timeout) }

	// For port mappers listening somewhere other than 111
	pub fn with_port(host:&str, port:u16, io_timeout:Option<Duration>) -> io::Result<Self> {
		let client = TcpClient::connect((host, port), PMAP_PROG, PMAP_VERS, io_timeout)?;
		Ok(Self{ host: host.to_owned(), client })
	}

	pub fn get_port(&mut self, m:&Mapping) -> io::Result<u16> {
		self.client.start_call(PMAPPROC_GETPORT)?;
		xdr_pack::pack_mapping(&mut self.client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;
		self.client.do_call()?;

		let port:u32 = self.client.unpacker.unpack_u32()?;
		if !self.client.unpacker.all_data_consumed() {
			return Err(Error::new(ErrorKind::Other, "Data unexpectedly left over in unpacker after unpacking port"));
		}

		match port {
			0 => Err(Error::new(ErrorKind::NotFound, format!("Program {:#x} v{} is not registered on {}", m.program, m.version, self.host))),
			p if p > u16::MAX as u32 => Err(Error::new(ErrorKind::Other, "Port mapper returned a port outside the 16-bit range")),
			p => {
				debug!("{} maps program {:#x} v{} to port {}", self.host, m.program, m.version, p);
				Ok(p as u16)
			},
		}
	}

}
