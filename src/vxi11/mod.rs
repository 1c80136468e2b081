
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DEVICE_CLEAR:u32      = 15;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_DEVICE_NAME:&str = "inst0";
pub const DEFAULT_LOCK_TIMEOUT:u32 = 10000;
pub const DEFAULT_IO_TIMEOUT:u32   = 10000;

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a DEVICE_READ response
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use log::{debug, error};

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

// Device error codes shared by every core procedure (VXI-11 B.5.2)
fn device_error(code:i32) -> io::Result<()> {
    match code {
        0  => Ok(()),
        1  => Err(err("Syntax error")),
        3  => Err(err("Device not accessible")),
        4  => Err(err("Invalid link identifier")),
        5  => Err(err("Parameter error")),
        6  => Err(err("Channel not established")),
        8  => Err(err("Operation not supported")),
        9  => Err(err("Out of resources")),
        11 => Err(err("Device locked by another link")),
        12 => Err(err("No lock held by this link")),
        15 => Err(Error::new(ErrorKind::TimedOut, "I/O timeout")),
        17 => Err(err("I/O error")),
        21 => Err(err("Invalid address")),
        23 => Err(err("Abort")),
        29 => Err(err("Channel already established")),
        x  => Err(Error::new(ErrorKind::Other, format!("Unknown device error {}", x))),
    }
}

pub mod xdr_pack;

#[derive(Debug, Clone)]
pub struct Link {
    pub link_id: i32,
    pub abort_port: u16,
    pub max_recv_size: u32,
}

pub struct CoreClient {
    client: TcpClient,
    opt_link: Option<Link>,
    io_timeout_ms: u32,
    lock_timeout_ms: u32,
}

impl CoreClient {

    fn get_link(&self) -> io::Result<i32> {
        match self.opt_link {
            Some(Link{ link_id, .. }) => Ok(link_id),
            None => Err(err("No link")),
        }
    }

    fn socket_timeout(&self) -> Option<Duration> {
        // Leave the socket some slack beyond what the instrument was told to wait
        Some(Duration::from_millis(self.io_timeout_ms as u64 + self.lock_timeout_ms as u64 + 1000))
    }

    // Looks up the core channel port through the host's port mapper
    pub fn new(host:&str) -> io::Result<Self> {
        let timeout = Some(Duration::from_millis(DEFAULT_IO_TIMEOUT as u64));
        let mut pmap_client = TcpPortMapperClient::new(host, timeout)?;

        let mapping = Mapping {
            program: DEVICE_CORE_PROG,
            version: DEVICE_CORE_VERS,
            protocol: Protocol::TCP,
            port: 0,
        };

        let port = pmap_client.get_port(&mapping)?;
        Self::connect(host, port)
    }

    // Connects straight to a known core channel port
    pub fn connect(host:&str, port:u16) -> io::Result<Self> {
        let mut ans = CoreClient {
            client: TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, None)?,
            opt_link: None,
            io_timeout_ms: DEFAULT_IO_TIMEOUT,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT,
        };
        ans.set_io_timeout(Duration::from_millis(DEFAULT_IO_TIMEOUT as u64))?;
        Ok(ans)
    }

    pub fn set_io_timeout(&mut self, timeout:Duration) -> io::Result<()> {
        self.io_timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        let socket_timeout = self.socket_timeout();
        self.client.stream.set_read_timeout(socket_timeout)?;
        self.client.stream.set_write_timeout(socket_timeout)
    }

    pub fn link(&self) -> Option<&Link> { self.opt_link.as_ref() }

    pub fn create_link(&mut self) -> io::Result<()> {
        if self.opt_link.is_some() {
            return Err(err("Already connected to a link"));
        }

        self.client.start_call(CREATE_LINK)?;
        xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, self.lock_timeout_ms, DEFAULT_DEVICE_NAME)?;
        self.client.do_call()?;

        let error:i32         = self.client.unpacker.unpack_i32()?;
        let link_id:i32       = self.client.unpacker.unpack_i32()?;
        let abort_port:u32    = self.client.unpacker.unpack_u32()?;
        let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;
        device_error(error)?;

        debug!("created vxi11 link {} (max_recv_size={})", link_id, max_recv_size);
        self.opt_link = Some(Link{ link_id, abort_port: abort_port as u16, max_recv_size });
        Ok(())
    }

    pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
        self.write(data)?;
        self.read()
    }

    pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
        let link_id:i32 = self.get_link()?;

        self.client.start_call(DEVICE_WRITE)?;
        xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, self.io_timeout_ms, self.lock_timeout_ms, OPERATION_FLAGS_END_ONLY, data)?;
        self.client.do_call()?;

        let error:i32 = self.client.unpacker.unpack_i32()?;
        let size:u32  = self.client.unpacker.unpack_u32()?;
        device_error(error)?;

        if size as usize != data.len() {
            return Err(err("Number of bytes in confirmation doesn't match number of bytes sent"));
        }
        Ok(())
    }

    // Keeps issuing DEVICE_READ until the device flags the end of its message
    pub fn read(&mut self) -> io::Result<Vec<u8>> {
        let link_id:i32 = self.get_link()?;
        let mut ans:Vec<u8> = vec![];

        loop {
            self.client.start_call(DEVICE_READ)?;
            xdr_pack::pack_device_read_parms(&mut self.client.packer, link_id, u32::MAX, self.io_timeout_ms, self.lock_timeout_ms, 0, 0)?;
            self.client.do_call()?;

            let error:i32  = self.client.unpacker.unpack_i32()?;
            let reason:i32 = self.client.unpacker.unpack_i32()?;
            let mut data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;
            device_error(error)?;

            ans.append(&mut data);
            if reason & REASON_END != 0 {
                return Ok(ans);
            }
            if reason & (REASON_REQCNT | REASON_CHR) == 0 {
                return Err(err("Read returned without any reason bit set"));
            }
        }
    }

    pub fn device_clear(&mut self) -> io::Result<()> {
        let link_id:i32 = self.get_link()?;

        self.client.start_call(DEVICE_CLEAR)?;
        xdr_pack::pack_device_generic_parms(&mut self.client.packer, link_id, 0, self.lock_timeout_ms, self.io_timeout_ms)?;
        self.client.do_call()?;

        device_error(self.client.unpacker.unpack_i32()?)
    }

    pub fn destroy_link(&mut self) -> io::Result<()> {
        let link_id:i32 = self.get_link()?;

        self.client.start_call(DESTROY_LINK)?;
        xdr_pack::pack_device_link(&mut self.client.packer, link_id)?;
        self.client.do_call()?;

        self.opt_link = None;
        device_error(self.client.unpacker.unpack_i32()?)
    }

}

impl Drop for CoreClient {

    fn drop(&mut self) {
        if self.opt_link.is_some() {
            if let Err(e) = self.destroy_link() {
                error!("Unable to destroy vxi11 link: {}", e);
            }
        }
    }

}
