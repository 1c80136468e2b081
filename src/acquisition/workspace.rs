use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::devices::tek_mso::{self, TekMso};
use crate::scpi::ScpiTransport;

use super::{AcquisitionError, AcquisitionSession, Result};

pub const SETUP_FILE_NAME:&str = "setup.set";

/// Whoever runs the measurement and gets asked before anything surprising happens.
pub trait Operator {
    fn confirm(&mut self, prompt:&str) -> io::Result<bool>;
}

/// Asks on stdout and takes a literal `y` on stdin as consent.
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn confirm(&mut self, prompt:&str) -> io::Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{} [y/n]? ", prompt)?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim() == "y")
    }
}

/// Consents to everything, for unattended runs.
pub struct AssumeYes;

impl Operator for AssumeYes {
    fn confirm(&mut self, prompt:&str) -> io::Result<bool> {
        info!("{} [y/n]? y (assumed)", prompt);
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedSession {
    pub session: AcquisitionSession,
    /// Save-on-trigger destination on the scope.
    pub scope_dir: String,
    pub local_dir: PathBuf,
    /// Where the scope setup snapshot was written.
    pub setup_path: String,
}

fn ask<O: Operator + ?Sized>(operator:&mut O, prompt:String) -> Result<()> {
    if operator.confirm(&prompt)? { Ok(()) } else { Err(AcquisitionError::Declined(prompt)) }
}

fn local_dir_is_empty(dir:&Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// Everything that happens once before the first trigger cycle: validate the acquisition count,
/// make sure both destination folders exist and are empty (or the operator accepts mixing data),
/// configure the scope, get the go-ahead and keep a copy of the scope setup next to the waveforms.
///
/// Nothing on the scope is changed before both folder checks have passed, apart from creating
/// the scope folder itself.
pub fn prepare_session<T, O>(scope:&mut TekMso<T>, operator:&mut O, scope_dir:&str, local_dir:&Path, count:u32) -> Result<PreparedSession>
where
    T: ScpiTransport,
    O: Operator + ?Sized,
{
    let frames = scope.get_fastframe_count_max()?;
    let session = AcquisitionSession::new(count, frames)?;
    info!("setting fast frame to {} measurements", frames);

    // Same folder the save-on-trigger destination resolves to
    let scope_dir = tek_mso::resolve_scope_path(scope_dir, "SaveOn");
    scope.set_mkdir(&scope_dir)?;
    if !scope.is_dir_empty(&scope_dir)? {
        ask(operator, format!("Scope dir {} is not empty. Are you sure you want to mix data sets", scope_dir))?;
    }

    if !local_dir.exists() {
        fs::create_dir_all(local_dir)?;
    }
    if !local_dir_is_empty(local_dir)? {
        ask(operator, format!("PC dir {} is not empty. Are you sure you want to mix data sets", local_dir.display()))?;
    }

    scope.disable_header()?;
    scope.setup_opc()?;
    let dest = scope.set_save_on_trigger_file_path(&scope_dir)?;
    info!("setting save path to {}", dest);

    let sample_rate = scope.get_horizontal_samplerate()?;
    let record_length = scope.get_horizontal_length()?;
    ask(operator, format!(
        "Sample rate is {}, record length {}. Also check you save the correct channel! Start measurement",
        sample_rate, record_length,
    ))?;

    let setup_path = scope.save_setup(SETUP_FILE_NAME, &dest)?;
    info!("saved setup to {} for later reference", setup_path);

    Ok(PreparedSession{ session, scope_dir: dest, local_dir: local_dir.to_path_buf(), setup_path })
}
