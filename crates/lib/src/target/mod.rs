//! Target descriptors for Windows artifact builds.

pub mod arch;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use arch::{Arch, MachineType, UnknownArch, UnwindTables};

/// ABI flavour of the Windows target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abi {
  #[default]
  Gnu,
  Msvc,
}

impl Abi {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gnu => "gnu",
      Self::Msvc => "msvc",
    }
  }
}

/// Architecture plus ABI of the artifact being requested (e.g., "x86_64-windows-gnu")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
  pub arch: Arch,
  pub abi: Abi,
}

impl Target {
  pub fn new(arch: Arch, abi: Abi) -> Self {
    Self { arch, abi }
  }

  /// Shorthand for the common MinGW target of an architecture.
  pub fn gnu(arch: Arch) -> Self {
    Self::new(arch, Abi::Gnu)
  }

  /// Returns the target triple string (e.g., "aarch64-windows-gnu")
  pub fn triple(&self) -> String {
    format!("{}-windows-{}", self.arch, self.abi.as_str())
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_triple_format() {
    let target = Target::gnu(Arch::X86_64);
    assert_eq!(target.triple(), "x86_64-windows-gnu");

    let target = Target::new(Arch::Aarch64, Abi::Msvc);
    assert_eq!(target.triple(), "aarch64-windows-msvc");
  }
}
