
use std::fmt;
use std::io::{self, Error, ErrorKind};
use std::thread;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::scpi::{self, Identity, ScpiTransport};
use crate::vxi11::CoreClient;

// General
pub const ON:u8  = 1;
pub const OFF:u8 = 0;

// Acquisition
pub const ACQ_STATE:&str         = ":ACQuire:STATE";
pub const ACQ_MODE:&str          = ":ACQuire:STOPAfter";
pub const ACQ_MODE_RUNSTOP:&str  = "RUNSTop";
pub const ACQ_MODE_SEQUENCE:&str = "SEQuence";

// Horizontal
pub const FASTFRAME_STATE:&str     = ":HORizontal:FASTframe:STATE";
pub const FASTFRAME_COUNT:&str     = ":HORizontal:FASTframe:COUNt";
pub const FASTFRAME_COUNT_MAX:&str = ":HORizontal:FASTframe:MAXFRames";
pub const HORIZONTAL_SAMPLERATE:&str = ":HORizontal:MODe:SAMPLERate";
pub const HORIZONTAL_LENGTH:&str     = ":HORizontal:MODe:RECOrdlength";

// Miscellaneous
pub const HEADER:&str = ":HEADer";
pub const IDN:&str    = "*IDN";

// Status and events
pub const ESE:&str = "*ESE";
pub const ESR:&str = "*ESR";
pub const CLS:&str = "*CLS";
pub const OPC:&str = "*OPC";
pub const ESR_OPC_BIT:u8 = 1;
pub const TRIGGER_STATE:&str = ":TRIGger:STATE";

// Save and Recall
pub const SAVE_SETUP:&str             = ":SAVe:SETUp";
pub const SAVE_SETUP_INCLUDEREFS:&str = ":SAVe:SETUp:INCLUDEREFs";
pub const LOAD_SETUP:&str             = ":RECAll:SETUp";
pub const FACTORY_SETUP:&str          = "FACtory";

// SaveOn
pub const SAVEON_TRIGGER:&str                 = ":SAVEON:TRIGger";
pub const SAVEON_TRIGGER_FILE_PATH:&str       = ":SAVEON:FILE:DEST";
pub const SAVEON_TRIGGER_FILE_NAME:&str       = ":SAVEON:FILE:NAME";
pub const SAVE_WAVEFORM_ON_TRIGGER:&str       = ":SAVEON:WAVEform";
pub const SAVEON_TRIGGER_WAVEFORM_SOURCE:&str = ":SAVEON:WAVEform:SOURce";

// File system
pub const FILESYSTEM_CWD:&str   = ":FILESystem:CWD";
pub const FILESYSTEM_LDIR:&str  = ":FILESystem:LDIR";
pub const FILESYSTEM_MKDIR:&str = ":FILESystem:MKDir";

// Where the scope keeps its own files; '/'-rooted paths given to the driver are resolved below this
pub const TEK_HOME_FOLDER_PATH:&str = "C:/Users/Public/Tektronix/TekScope";

// An empty directory listing comes back as a quoted empty string, not as an empty reply
pub const EMPTY_LDIR_REPLY:&str = "\"\"";

pub const DEFAULT_TX_THROTTLE_DURATION_SEC:f32 = 0.0;

fn err(msg:String) -> io::Error { Error::new(ErrorKind::InvalidData, msg) }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AcqMode { RunStop, Sequence }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TriggerState { Armed, Auto, Ready, Save, Trigger }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceType { Ch, Math, Ref, All }

impl fmt::Display for SourceType {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			SourceType::Ch   => "CH",
			SourceType::Math => "MATH",
			SourceType::Ref  => "REF",
			SourceType::All  => "ALL",
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
	pub identity: Identity,
	pub acq_mode: AcqMode,
	pub acq_running: bool,
	pub trigger_state: TriggerState,
	pub fastframe_enabled: bool,
	pub fastframe_count: u32,
	pub fastframe_count_max: u32,
	pub sample_rate: f64,
	pub record_length: u64,
	pub save_on_trigger: bool,
	pub save_on_trigger_path: String,
}

// Resolves a path handed to the driver the way the scope's own UI does: absolute drive paths are used
// as-is, '/'-rooted or empty ones land under the given folder of the scope's home directory
pub fn resolve_scope_path(path:&str, home_subfolder:&str) -> String {
	if path.is_empty() || path.starts_with('/') {
		let rest = path.trim_start_matches('/').trim_end_matches('/');
		if rest.is_empty() {
			format!("{}/{}", TEK_HOME_FOLDER_PATH, home_subfolder)
		} else {
			format!("{}/{}/{}", TEK_HOME_FOLDER_PATH, home_subfolder, rest)
		}
	} else {
		path.trim_end_matches('/').to_owned()
	}
}

fn setup_file_path(filename:&str, path:&str) -> String {
	let filename = if filename.ends_with(".set") { filename.to_owned() } else { format!("{}.set", filename) };
	format!("{}/{}", resolve_scope_path(path, "Setups"), filename)
}

pub struct TekMso<T: ScpiTransport = CoreClient> {
	core: T,
	tx_throttle_duration: Duration,
	pub state: Option<State>,
}

impl TekMso<CoreClient> {

	// Finds the core channel through the port mapper
	pub fn new(host:&str) -> io::Result<Self> { Self::open(CoreClient::new(host)?) }

	pub fn connect(host:&str, port:u16) -> io::Result<Self> { Self::open(CoreClient::connect(host, port)?) }

	fn open(mut core:CoreClient) -> io::Result<Self> {
		core.create_link()?;
		core.device_clear()?;

		let mut ans = Self::with_transport(core);
		let identity = ans.identify()?;
		if !identity.manufacturer.eq_ignore_ascii_case("TEKTRONIX") || !identity.model.to_ascii_uppercase().starts_with("MSO") {
			return Err(Error::new(ErrorKind::Other, format!("Connected to {} {}, which is not a Tektronix MSO", identity.manufacturer, identity.model)));
		}

		Ok(ans)
	}

}

impl<T: ScpiTransport> TekMso<T> {

	pub fn with_transport(core:T) -> Self {
		Self{ core, tx_throttle_duration: Duration::from_secs_f32(DEFAULT_TX_THROTTLE_DURATION_SEC), state: None }
	}

	pub fn set_tx_throttle(&mut self, d:Duration) { self.tx_throttle_duration = d; }

	pub fn transport(&self) -> &T { &self.core }
	pub fn transport_mut(&mut self) -> &mut T { &mut self.core }
	pub fn into_transport(self) -> T { self.core }

	fn throttle(&self) {
		if self.tx_throttle_duration > Duration::from_secs(0) {
			thread::sleep(self.tx_throttle_duration);
		}
	}

	// General query/set
	pub fn get(&mut self, attr:&str) -> io::Result<String> {
		self.throttle();
		self.core.query_str(&format!("{}?", attr)).map(|s| scpi::strip_header(&s).to_owned())
	}

	pub fn set<V: fmt::Display>(&mut self, attr:&str, val:V) -> io::Result<()> {
		self.throttle();
		self.core.write_str(&format!("{} {}", attr, val))
	}

	pub fn send(&mut self, cmd:&str) -> io::Result<()> {
		self.throttle();
		self.core.write_str(cmd)
	}

	fn get_int(&mut self, attr:&str) -> io::Result<i64> { scpi::parse_int(&self.get(attr)?) }
	fn get_bool(&mut self, attr:&str) -> io::Result<bool> { scpi::parse_bool(&self.get(attr)?) }
	fn get_string(&mut self, attr:&str) -> io::Result<String> { self.get(attr).map(|s| scpi::unquote(&s)) }

	fn get_u32(&mut self, attr:&str) -> io::Result<u32> {
		let x = self.get_int(attr)?;
		if x < 0 || x > u32::MAX as i64 { return Err(err(format!("{} reply {} out of range", attr, x))); }
		Ok(x as u32)
	}

	// Miscellaneous
	pub fn identify(&mut self) -> io::Result<Identity> { scpi::parse_identity(&self.get(IDN)?) }

	pub fn get_header_mode(&mut self) -> io::Result<bool> { self.get_bool(HEADER) }
	pub fn set_header_mode(&mut self, on:bool) -> io::Result<()> { self.set(HEADER, if on { ON } else { OFF }) }
	pub fn enable_header(&mut self) -> io::Result<()> { self.set_header_mode(true) }
	pub fn disable_header(&mut self) -> io::Result<()> { self.set_header_mode(false) }

	// Acquisition
	pub fn get_acq_state(&mut self) -> io::Result<bool> { self.get_bool(ACQ_STATE) }
	pub fn start_acq(&mut self) -> io::Result<()> { self.set(ACQ_STATE, ON) }
	pub fn stop_acq(&mut self) -> io::Result<()> { self.set(ACQ_STATE, OFF) }

	pub fn get_acq_mode(&mut self) -> io::Result<AcqMode> {
		let res = self.get_string(ACQ_MODE)?.to_ascii_uppercase();
		match res.as_str() {
			"RUNSTOP" | "RUNST"  => Ok(AcqMode::RunStop),
			"SEQUENCE" | "SEQ"   => Ok(AcqMode::Sequence),
			_ => Err(err(format!("Invalid acquisition mode {:?}", res))),
		}
	}

	pub fn set_acq_mode(&mut self, mode:AcqMode) -> io::Result<()> {
		match mode {
			AcqMode::RunStop  => self.set(ACQ_MODE, ACQ_MODE_RUNSTOP),
			AcqMode::Sequence => self.set(ACQ_MODE, ACQ_MODE_SEQUENCE),
		}
	}

	pub fn enable_acq_mode_runstop(&mut self) -> io::Result<()> { self.set_acq_mode(AcqMode::RunStop) }
	pub fn enable_acq_mode_sequence(&mut self) -> io::Result<()> { self.set_acq_mode(AcqMode::Sequence) }

	pub fn start_sequence_acq(&mut self) -> io::Result<()> {
		self.enable_acq_mode_sequence()?;
		self.start_acq()
	}

	pub fn start_runstop_acq(&mut self) -> io::Result<()> {
		self.enable_acq_mode_runstop()?;
		self.start_acq()
	}

	// Horizontal
	pub fn enable_fastframe(&mut self) -> io::Result<()> { self.set(FASTFRAME_STATE, ON) }
	pub fn disable_fastframe(&mut self) -> io::Result<()> { self.set(FASTFRAME_STATE, OFF) }
	pub fn get_fastframe_state(&mut self) -> io::Result<bool> { self.get_bool(FASTFRAME_STATE) }
	pub fn get_fastframe_count_max(&mut self) -> io::Result<u32> { self.get_u32(FASTFRAME_COUNT_MAX) }
	pub fn get_fastframe_count(&mut self) -> io::Result<u32> { self.get_u32(FASTFRAME_COUNT) }
	pub fn set_fastframe_count(&mut self, n:u32) -> io::Result<()> { self.set(FASTFRAME_COUNT, n) }

	pub fn set_fastframe_count_to_max(&mut self) -> io::Result<()> {
		let n = self.get_fastframe_count_max()?;
		self.set_fastframe_count(n)
	}

	pub fn get_horizontal_samplerate(&mut self) -> io::Result<f64> { scpi::parse_float(&self.get(HORIZONTAL_SAMPLERATE)?) }

	pub fn get_horizontal_length(&mut self) -> io::Result<u64> {
		let x = self.get_int(HORIZONTAL_LENGTH)?;
		if x < 0 { return Err(err(format!("Negative record length {}", x))); }
		Ok(x as u64)
	}

	// Status and events
	pub fn setup_opc(&mut self) -> io::Result<()> {
		self.set(ESE, ESR_OPC_BIT)?;
		self.send(CLS)
	}

	pub fn set_opc(&mut self) -> io::Result<()> { self.send(OPC) }

	// Reading the event status register clears it on the scope
	pub fn get_esr(&mut self) -> io::Result<u8> {
		let x = self.get_int(ESR)?;
		if x < 0 || x > 255 { return Err(err(format!("Event status register value {} out of range", x))); }
		Ok(x as u8)
	}

	pub fn operation_complete(&mut self) -> io::Result<bool> { Ok(self.get_esr()? & ESR_OPC_BIT != 0) }

	pub fn get_trigger_state(&mut self) -> io::Result<TriggerState> {
		let res = self.get_string(TRIGGER_STATE)?.to_ascii_uppercase();
		match res.as_str() {
			"ARMED"   => Ok(TriggerState::Armed),
			"AUTO"    => Ok(TriggerState::Auto),
			"READY"   => Ok(TriggerState::Ready),
			"SAVE"    => Ok(TriggerState::Save),
			"TRIGGER" => Ok(TriggerState::Trigger),
			_ => Err(err(format!("Invalid trigger state {:?}", res))),
		}
	}

	// Save and Recall
	pub fn reset_setup(&mut self) -> io::Result<()> { self.set(LOAD_SETUP, FACTORY_SETUP) }

	pub fn load_setup(&mut self, filename:&str, path:&str) -> io::Result<()> {
		self.set(LOAD_SETUP, scpi::quote(&setup_file_path(filename, path)))
	}

	// Returns the full path the setup was written to
	pub fn save_setup(&mut self, filename:&str, path:&str) -> io::Result<String> {
		let full = setup_file_path(filename, path);
		self.set(SAVE_SETUP, scpi::quote(&full))?;
		Ok(full)
	}

	pub fn enable_save_setup_includerefs(&mut self) -> io::Result<()> { self.set(SAVE_SETUP_INCLUDEREFS, ON) }
	pub fn disable_save_setup_includerefs(&mut self) -> io::Result<()> { self.set(SAVE_SETUP_INCLUDEREFS, OFF) }

	// SaveOn
	pub fn enable_save_on_trigger(&mut self) -> io::Result<()> { self.set(SAVEON_TRIGGER, ON) }
	pub fn disable_save_on_trigger(&mut self) -> io::Result<()> { self.set(SAVEON_TRIGGER, OFF) }
	pub fn get_save_on_trigger_mode(&mut self) -> io::Result<bool> { self.get_bool(SAVEON_TRIGGER) }

	pub fn get_save_on_trigger_file_path(&mut self) -> io::Result<String> { self.get_string(SAVEON_TRIGGER_FILE_PATH) }

	// Returns the resolved destination so callers can keep other files next to the waveforms
	pub fn set_save_on_trigger_file_path(&mut self, path:&str) -> io::Result<String> {
		let full = resolve_scope_path(path, "SaveOn");
		self.set(SAVEON_TRIGGER_FILE_PATH, scpi::quote(&full))?;
		Ok(full)
	}

	pub fn get_save_on_trigger_file_name(&mut self) -> io::Result<String> { self.get_string(SAVEON_TRIGGER_FILE_NAME) }
	pub fn set_save_on_trigger_file_name(&mut self, filename:&str) -> io::Result<()> { self.set(SAVEON_TRIGGER_FILE_NAME, scpi::quote(filename)) }

	pub fn enable_save_waveform_on_trigger(&mut self) -> io::Result<()> { self.set(SAVE_WAVEFORM_ON_TRIGGER, ON) }
	pub fn disable_save_waveform_on_trigger(&mut self) -> io::Result<()> { self.set(SAVE_WAVEFORM_ON_TRIGGER, OFF) }
	pub fn isset_save_waveform_on_trigger(&mut self) -> io::Result<bool> { self.get_bool(SAVE_WAVEFORM_ON_TRIGGER) }

	pub fn get_save_on_trigger_waveform_source(&mut self) -> io::Result<String> { self.get_string(SAVEON_TRIGGER_WAVEFORM_SOURCE) }

	pub fn set_save_on_trigger_waveform_source(&mut self, src_type:SourceType, src_idx:u8) -> io::Result<()> {
		match src_type {
			SourceType::All => self.set(SAVEON_TRIGGER_WAVEFORM_SOURCE, src_type),
			_ => self.set(SAVEON_TRIGGER_WAVEFORM_SOURCE, format!("{}{}", src_type, src_idx)),
		}
	}

	// File system
	pub fn get_cwd(&mut self) -> io::Result<String> { self.get_string(FILESYSTEM_CWD) }
	pub fn set_cwd(&mut self, path:&str) -> io::Result<()> { self.set(FILESYSTEM_CWD, scpi::quote(path)) }

	// Raw listing of the current directory, quotes included
	pub fn get_ldir(&mut self) -> io::Result<String> { self.get(FILESYSTEM_LDIR) }

	// The scope doesn't complain about creating a directory that already exists
	pub fn set_mkdir(&mut self, path:&str) -> io::Result<()> { self.set(FILESYSTEM_MKDIR, scpi::quote(path)) }

	pub fn is_dir_empty(&mut self, path:&str) -> io::Result<bool> {
		self.set_cwd(path)?;
		Ok(self.get_ldir()? == EMPTY_LDIR_REPLY)
	}

	pub fn get_full_state(&mut self) -> io::Result<State> {
		let state = State {
			identity: self.identify()?,
			acq_mode: self.get_acq_mode()?,
			acq_running: self.get_acq_state()?,
			trigger_state: self.get_trigger_state()?,
			fastframe_enabled: self.get_fastframe_state()?,
			fastframe_count: self.get_fastframe_count()?,
			fastframe_count_max: self.get_fastframe_count_max()?,
			sample_rate: self.get_horizontal_samplerate()?,
			record_length: self.get_horizontal_length()?,
			save_on_trigger: self.get_save_on_trigger_mode()?,
			save_on_trigger_path: self.get_save_on_trigger_file_path()?,
		};
		self.state = Some(state.clone());
		Ok(state)
	}

}
