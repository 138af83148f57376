//! `llvm-dlltool` import library emitter.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::implib::{EmitError, ImportLibEmitter};
use crate::target::MachineType;
use crate::tools::command::run_checked;

#[derive(Debug, Clone)]
pub struct DllToolEmitter {
  dlltool: PathBuf,
}

impl DllToolEmitter {
  pub fn new(dlltool: impl Into<PathBuf>) -> Self {
    Self { dlltool: dlltool.into() }
  }
}

/// Machine name accepted by `dlltool -m`.
pub fn machine_name(machine: MachineType) -> &'static str {
  match machine {
    MachineType::I386 => "i386",
    MachineType::Amd64 => "i386:x86-64",
    MachineType::ArmNt => "arm",
    MachineType::Arm64 => "arm64",
  }
}

pub fn dlltool_args(def_path: &Path, machine: MachineType, dest: &Path) -> Vec<OsString> {
  vec![
    "-d".into(),
    def_path.into(),
    "-l".into(),
    dest.into(),
    "-m".into(),
    machine_name(machine).into(),
    // strip @N stdcall suffixes from the exported names
    "-k".into(),
  ]
}

impl ImportLibEmitter for DllToolEmitter {
  fn emit(&self, def_path: &Path, machine: MachineType, dest: &Path) -> Result<(), EmitError> {
    run_checked(&self.dlltool, &dlltool_args(def_path, machine, dest)).map_err(|e| EmitError(e.to_string()))?;
    Ok(())
  }
}
