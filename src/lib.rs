
// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes; it's what VISA calls TCPIP::<host>::INSTR
pub mod vxi11;

// Text commands and queries carried over an instrument link
pub mod scpi;

// Drivers for instruments that speak SCPI
pub mod devices;

// Serial link to the device under test
pub mod dut;

// Scope acquisitions driven in lockstep with the device under test
pub mod acquisition;

pub mod config;
