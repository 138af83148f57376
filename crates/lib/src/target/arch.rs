use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CPU architectures a Windows target can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
  X86,
  X86_64,
  Arm,
  Thumb,
  Aarch64,
}

/// COFF machine type handed to the import library emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
  I386,
  Amd64,
  ArmNt,
  Arm64,
}

/// Unwind table policy requested from the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwindTables {
  None,
  Async,
}

impl Arch {
  /// Lowercase identifier used in cache keys and target triples.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X86_64 => "x86_64",
      Self::Arm => "arm",
      Self::Thumb => "thumb",
      Self::Aarch64 => "aarch64",
    }
  }

  /// Name of the architecture-specific definition directory.
  pub fn lib_dir(&self) -> &'static str {
    match self {
      Self::X86 => "lib32",
      Self::X86_64 => "lib64",
      Self::Arm | Self::Thumb => "libarm32",
      Self::Aarch64 => "libarm64",
    }
  }

  pub fn machine_type(&self) -> MachineType {
    match self {
      Self::X86 => MachineType::I386,
      Self::X86_64 => MachineType::Amd64,
      Self::Arm | Self::Thumb => MachineType::ArmNt,
      Self::Aarch64 => MachineType::Arm64,
    }
  }

  /// 32-bit x86 Windows uses SEH frame chains instead of table-based unwinding.
  pub fn unwind_tables(&self) -> UnwindTables {
    match self {
      Self::X86 => UnwindTables::None,
      _ => UnwindTables::Async,
    }
  }

  pub fn is_64bit(&self) -> bool {
    matches!(self, Self::X86_64 | Self::Aarch64)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tag())
  }
}

/// Error returned when an architecture name has no Windows mapping.
#[derive(Debug, thiserror::Error)]
#[error("unsupported architecture: {0} (expected one of x86, x86_64, arm, thumb, aarch64)")]
pub struct UnknownArch(pub String);

impl FromStr for Arch {
  type Err = UnknownArch;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "x86" | "i386" | "i486" | "i586" | "i686" => Ok(Self::X86),
      "x86_64" | "x86-64" | "amd64" | "x64" => Ok(Self::X86_64),
      "arm" | "armv7" | "armv7a" => Ok(Self::Arm),
      "thumb" | "thumbv7" | "thumbv7a" => Ok(Self::Thumb),
      "aarch64" | "arm64" => Ok(Self::Aarch64),
      _ => Err(UnknownArch(s.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn each_arch_maps_to_one_lib_dir() {
    assert_eq!(Arch::X86.lib_dir(), "lib32");
    assert_eq!(Arch::X86_64.lib_dir(), "lib64");
    assert_eq!(Arch::Arm.lib_dir(), "libarm32");
    assert_eq!(Arch::Thumb.lib_dir(), "libarm32");
    assert_eq!(Arch::Aarch64.lib_dir(), "libarm64");
  }

  #[test]
  fn only_x86_disables_unwind_tables() {
    assert_eq!(Arch::X86.unwind_tables(), UnwindTables::None);
    for arch in [Arch::X86_64, Arch::Arm, Arch::Thumb, Arch::Aarch64] {
      assert_eq!(arch.unwind_tables(), UnwindTables::Async, "{arch}");
    }
  }

  #[test]
  fn parse_aliases() {
    assert_eq!("i686".parse::<Arch>().unwrap(), Arch::X86);
    assert_eq!("AMD64".parse::<Arch>().unwrap(), Arch::X86_64);
    assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Aarch64);
    assert!("riscv64".parse::<Arch>().is_err());
  }

  #[test]
  fn machine_types() {
    assert_eq!(Arch::X86_64.machine_type(), MachineType::Amd64);
    assert_eq!(Arch::Thumb.machine_type(), MachineType::ArmNt);
  }
}
