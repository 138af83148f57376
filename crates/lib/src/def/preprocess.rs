//! Template definition expansion.
//!
//! `.def.in` files use C preprocessor conditionals and macros (`F64(...)`,
//! `F_X86_ANY(...)`, ...) to describe per-architecture exports. The expansion
//! is delegated to a [`Preprocessor`]; this module decides what it is asked
//! for and what counts as failure.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::def::locate::DefinitionSource;
use crate::error::BuildError;
use crate::target::{Abi, Arch, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
  Note,
  Warning,
  Error,
  Fatal,
}

impl Severity {
  pub fn is_error(&self) -> bool {
    *self >= Severity::Error
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Note => "note",
      Self::Warning => "warning",
      Self::Error => "error",
      Self::Fatal => "fatal error",
    }
  }
}

/// A message reported by the preprocessing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub severity: Severity,
  pub message: String,
  /// `file:line[:col]`, when the engine knows it.
  pub location: Option<String>,
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.location {
      Some(location) => write!(f, "{}: {}: {}", location, self.severity.as_str(), self.message),
      None => write!(f, "{}: {}", self.severity.as_str(), self.message),
    }
  }
}

/// Which compiler-provided macros the engine should predefine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMacroMode {
  NoSystemDefines,
  IncludeSystemDefines,
}

/// Shape of the expanded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
  pub preserve_whitespace: bool,
  pub line_markers: bool,
  pub keep_comments: bool,
}

impl OutputOptions {
  /// Export-name parsing downstream is whitespace-sensitive and cannot cope
  /// with line markers or comments.
  pub fn def_file() -> Self {
    Self {
      preserve_whitespace: true,
      line_markers: false,
      keep_comments: false,
    }
  }
}

pub struct PreprocessRequest<'a> {
  pub source: &'a Path,
  pub include_dirs: &'a [PathBuf],
  pub builtins: BuiltinMacroMode,
  pub target: Target,
  /// `(name, value)` pairs; `None` defines the macro as `1`.
  pub defines: Vec<(String, Option<String>)>,
  pub output: OutputOptions,
}

pub struct PreprocessOutput {
  pub text: String,
  pub diagnostics: Vec<Diagnostic>,
}

/// The engine could not run at all.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PreprocessError(pub String);

/// External macro preprocessing engine.
pub trait Preprocessor: Send + Sync {
  fn preprocess(&self, request: &PreprocessRequest<'_>) -> Result<PreprocessOutput, PreprocessError>;
}

/// Macros selecting the export set in `def-include/func.def.in`.
pub fn target_defines(target: Target) -> Vec<(String, Option<String>)> {
  let arch_define = match target.arch {
    Arch::X86 => "DEF_I386",
    Arch::X86_64 => "DEF_X64",
    Arch::Arm | Arch::Thumb => "DEF_ARM32",
    Arch::Aarch64 => "DEF_ARM64",
  };

  let mut defines = vec![(arch_define.to_string(), None), ("_WIN32".to_string(), None)];
  if target.arch.is_64bit() {
    defines.push(("_WIN64".to_string(), None));
  }
  match target.abi {
    Abi::Gnu => {
      defines.push(("__MINGW32__".to_string(), None));
      if target.arch.is_64bit() {
        defines.push(("__MINGW64__".to_string(), None));
      }
    }
    Abi::Msvc => defines.push(("_MSC_VER".to_string(), Some("1930".to_string()))),
  }
  defines
}

/// Remove `# <line> "file"` and `#line` directives an engine may leave behind.
pub fn strip_line_markers(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for line in text.split_inclusive('\n') {
    let trimmed = line.trim_start();
    let is_marker = trimmed.starts_with("#line")
      || trimmed
        .strip_prefix('#')
        .map(|rest| rest.trim_start().starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(false);
    if !is_marker {
      out.push_str(line);
    }
  }
  out
}

/// Expand the template `source` for `target` into `dest`.
///
/// Any error or fatal diagnostic fails the request with
/// [`BuildError::PreprocessFailed`]; lesser diagnostics are only logged.
pub fn preprocess_def(
  preprocessor: &dyn Preprocessor,
  name: &str,
  source: &DefinitionSource,
  include_dirs: &[PathBuf],
  target: Target,
  dest: &Path,
) -> Result<(), BuildError> {
  let request = PreprocessRequest {
    source: &source.path,
    include_dirs,
    builtins: BuiltinMacroMode::IncludeSystemDefines,
    target,
    defines: target_defines(target),
    output: OutputOptions::def_file(),
  };

  let failed = |message: String| BuildError::PreprocessFailed {
    name: name.to_string(),
    path: source.path.clone(),
    message,
  };

  let output = preprocessor.preprocess(&request).map_err(|e| failed(e.to_string()))?;

  let errors: Vec<String> = output
    .diagnostics
    .iter()
    .filter(|d| d.severity.is_error())
    .map(ToString::to_string)
    .collect();
  for diagnostic in output.diagnostics.iter().filter(|d| !d.severity.is_error()) {
    debug!(name = %name, diagnostic = %diagnostic, "preprocessor diagnostic");
  }
  if !errors.is_empty() {
    return Err(failed(errors.join("\n")));
  }

  fs::write(dest, strip_line_markers(&output.text)).map_err(BuildError::cache_io("preprocessed definition write", dest))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::def::locate::DefTier;
  use crate::testutil::FakePreprocessor;
  use tempfile::TempDir;

  fn template(dir: &Path) -> DefinitionSource {
    let path = dir.join("foo.def.in");
    fs::write(&path, "EXPORTS\nfoo\n").unwrap();
    DefinitionSource {
      path,
      tier: DefTier::CommonTemplate,
    }
  }

  #[test]
  fn arch_defines() {
    let x64 = target_defines(Target::gnu(Arch::X86_64));
    assert!(x64.contains(&("DEF_X64".to_string(), None)));
    assert!(x64.contains(&("_WIN64".to_string(), None)));
    assert!(x64.contains(&("__MINGW64__".to_string(), None)));

    let x86 = target_defines(Target::gnu(Arch::X86));
    assert!(x86.contains(&("DEF_I386".to_string(), None)));
    assert!(!x86.iter().any(|(name, _)| name == "_WIN64"));

    let thumb = target_defines(Target::gnu(Arch::Thumb));
    assert!(thumb.contains(&("DEF_ARM32".to_string(), None)));
  }

  #[test]
  fn line_markers_are_removed() {
    let text = "# 1 \"foo.def.in\"\nLIBRARY foo\n#line 4\nEXPORTS\n  foo @1\n";
    assert_eq!(strip_line_markers(text), "LIBRARY foo\nEXPORTS\n  foo @1\n");
  }

  #[test]
  fn expansion_written_with_whitespace_intact() {
    let temp = TempDir::new().unwrap();
    let source = template(temp.path());
    let dest = temp.path().join("out.def");
    let pp = FakePreprocessor::expanding_to("EXPORTS\n  foo   @1\n\tbar\n");

    preprocess_def(&pp, "foo", &source, &[], Target::gnu(Arch::X86_64), &dest).unwrap();

    assert_eq!(fs::read_to_string(&dest).unwrap(), "EXPORTS\n  foo   @1\n\tbar\n");
    let seen = pp.last_request().unwrap();
    assert_eq!(seen.source, source.path);
    assert_eq!(seen.output, OutputOptions::def_file());
    assert_eq!(seen.builtins, BuiltinMacroMode::IncludeSystemDefines);
    assert!(seen.defines.iter().any(|(name, _)| name == "DEF_X64"));
  }

  #[test]
  fn warnings_do_not_fail() {
    let temp = TempDir::new().unwrap();
    let source = template(temp.path());
    let dest = temp.path().join("out.def");
    let pp = FakePreprocessor::expanding_to("EXPORTS\n").with_diagnostic(Severity::Warning, "unused macro");

    assert!(preprocess_def(&pp, "foo", &source, &[], Target::gnu(Arch::X86), &dest).is_ok());
  }

  #[test]
  fn errors_fail_with_rendered_diagnostics() {
    let temp = TempDir::new().unwrap();
    let source = template(temp.path());
    let dest = temp.path().join("out.def");
    let pp = FakePreprocessor::expanding_to("")
      .with_diagnostic(Severity::Note, "included from here")
      .with_diagnostic(Severity::Fatal, "'func.def.in' file not found");

    let err = preprocess_def(&pp, "foo", &source, &[], Target::gnu(Arch::X86), &dest).unwrap_err();

    match err {
      BuildError::PreprocessFailed { name, message, .. } => {
        assert_eq!(name, "foo");
        assert!(message.contains("fatal error: 'func.def.in' file not found"));
        assert!(!message.contains("included from here"));
      }
      other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
  }

  #[test]
  fn engine_failure_is_preprocess_failure() {
    let temp = TempDir::new().unwrap();
    let source = template(temp.path());
    let pp = FakePreprocessor::failing("clang not found");

    let err = preprocess_def(&pp, "foo", &source, &[], Target::gnu(Arch::X86), &temp.path().join("o.def")).unwrap_err();
    assert!(matches!(err, BuildError::PreprocessFailed { ref message, .. } if message.contains("clang not found")));
  }
}
