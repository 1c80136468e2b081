
use std::io::{self, Error, ErrorKind};

use crate::xdr::Unpacker;
use crate::rpc::{CALL, REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn err(msg:String) -> io::Error { Error::new(ErrorKind::Other, msg) }

#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
	pub flavor: i32,
	pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallHeader {
	pub xid: u32,
	pub prog: u32,
	pub vers: u32,
	pub prc: u32,
	pub cred: Auth,
	pub verf: Auth,
}

pub fn unpack_auth(unpacker:&mut Unpacker) -> io::Result<Auth> {
	let flavor:i32   = unpacker.unpack_enum()?;
	let body:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok(Auth{ flavor, body })
}

pub fn unpack_callheader(unpacker:&mut Unpacker) -> io::Result<CallHeader> {
	let xid:u32 = unpacker.unpack_u32()?;

	let mtype:i32 = unpacker.unpack_enum()?;
	if mtype != CALL { return Err(err(format!("Expected CALL message type but got {}", mtype))); }

	let rpcvers:u32 = unpacker.unpack_u32()?;
	if rpcvers != super::RPCVERSION { return Err(err(format!("Unsupported RPC version {}", rpcvers))); }

	let prog:u32 = unpacker.unpack_u32()?;
	let vers:u32 = unpacker.unpack_u32()?;
	let prc:u32  = unpacker.unpack_u32()?;
	let cred = unpack_auth(unpacker)?;
	let verf = unpack_auth(unpacker)?;

	Ok(CallHeader{ xid, prog, vers, prc, cred, verf })
}

// Returns the xid and verifier of an accepted, successful reply; every other outcome is an error
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> io::Result<(u32, Auth)> {
	let xid:u32 = unpacker.unpack_u32()?;

	let mtype:i32 = unpacker.unpack_enum()?;
	if mtype != REPLY { return Err(err(format!("Expected REPLY message type but got {}", mtype))); }

	match unpacker.unpack_enum()? {
		MSG_ACCEPTED => { },
		MSG_DENIED => {
			return match unpacker.unpack_enum()? {
				RPC_MISMATCH => {
					let low:u32  = unpacker.unpack_u32()?;
					let high:u32 = unpacker.unpack_u32()?;
					Err(err(format!("Message denied, server supports RPC versions {} to {}", low, high)))
				},
				AUTH_ERROR => {
					let stat:u32 = unpacker.unpack_u32()?;
					Err(err(format!("Message denied due to authentication error {}", stat)))
				},
				other => Err(err(format!("Message denied for unknown reason {}", other))),
			};
		},
		other => return Err(err(format!("Neither MSG_DENIED nor MSG_ACCEPTED in reply, got {}", other))),
	}

	let verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => Ok((xid, verf)),
		PROG_UNAVAIL  => Err(err("Program unavailable".to_owned())),
		PROG_MISMATCH => {
			let low:u32  = unpacker.unpack_u32()?;
			let high:u32 = unpacker.unpack_u32()?;
			Err(err(format!("Program mismatch, server supports versions {} to {}", low, high)))
		},
		PROC_UNAVAIL  => Err(err("Procedure unavailable".to_owned())),
		GARBAGE_ARGS  => Err(err("Server could not decode the call arguments".to_owned())),
		other         => Err(err(format!("Call failed with accept status {}", other))),
	}
}
