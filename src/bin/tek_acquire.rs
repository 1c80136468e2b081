// Records FastFrame acquisitions on a Tektronix MSO while a device under test, attached over a
// serial port, runs one case per trigger.  Every case the device reports goes to two log files:
//
//   fullLog-<timestamp>.txt      case selector, plaintext and signature lines of every frame
//   caseOnlyLog-<timestamp>.txt  only the case selector lines
//
// The scope saves its waveforms into <scope_root>/<folder> next to a setup.set snapshot; the logs
// go to <local_root>/<folder>.

use std::path::PathBuf;
use std::process;

use chrono::Local;
use clap::Parser;
use log::{error, info, warn};

use tekmso::acquisition::{self, AcquisitionController, AcquisitionError, LogSinks, LoopOptions, Operator, SessionSummary};
use tekmso::config::SessionConfig;
use tekmso::devices::tek_mso::TekMso;
use tekmso::dut;

#[derive(Debug, Parser)]
#[command(name = "tek_acquire", version, about = "Scope acquisitions synchronized with a serial device under test")]
struct Args {
    /// Subfolder created below the scope and local roots for this measurement
    folder: String,

    /// Number of acquisitions, a multiple of the scope's FastFrame size
    count: u32,

    /// JSON session configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scope address, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Serial port of the device under test, overrides the configuration
    #[arg(long)]
    serial: Option<String>,

    /// Answer every confirmation with yes
    #[arg(short, long)]
    yes: bool,
}

fn run(args:Args) -> Result<SessionSummary, AcquisitionError> {
    let mut cfg = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(host) = args.host { cfg.scope_host = host; }
    if let Some(serial) = args.serial { cfg.serial_port = serial; }
    cfg.validate()?;

    info!("connecting to scope at {}", cfg.scope_host);
    let mut scope = match cfg.scope_port {
        Some(port) => TekMso::connect(&cfg.scope_host, port)?,
        None => TekMso::new(&cfg.scope_host)?,
    };

    let mut operator:Box<dyn Operator> = if args.yes { Box::new(acquisition::AssumeYes) } else { Box::new(acquisition::ConsoleOperator) };
    let prepared = acquisition::prepare_session(
        &mut scope,
        operator.as_mut(),
        &cfg.scope_dir(&args.folder),
        &cfg.local_dir(&args.folder),
        args.count,
    )?;

    match scope.get_full_state() {
        Ok(state) => info!("scope state: {}", serde_json::to_string(&state).unwrap_or_default()),
        Err(e) => warn!("unable to read back the scope state: {}", e),
    }

    let dut = dut::open_serial(&cfg.serial_port, cfg.baud_rate, cfg.serial_timeout()?)?;
    let sinks = LogSinks::create(&prepared.local_dir, &acquisition::log_timestamp(&Local::now()))?;

    let options = LoopOptions {
        ready: cfg.ready_policy()?,
        confirm: cfg.confirm_policy()?,
        rearm_on_retry: cfg.rearm_on_retry,
        retry_records: cfg.retry_records,
    };

    AcquisitionController::new(&mut scope, dut, sinks, prepared.session, options).run()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(summary) => {
            info!("{} frame records logged", summary.records_written);
        },
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    }
}
