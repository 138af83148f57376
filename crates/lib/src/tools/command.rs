//! Running external tools.
//!
//! Every tool runs with a fixed locale and `SOURCE_DATE_EPOCH` so diagnostics
//! parse predictably and archive timestamps are reproducible.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{program} failed ({}): {stderr}", exit_label(.code))]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("{stage} failed at {path}: {source}")]
  Io {
    stage: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn exit_label(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "terminated by signal".to_string(),
  }
}

/// Captured result of a tool run, successful or not.
#[derive(Debug)]
pub struct ToolOutput {
  pub success: bool,
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

/// Run `program` and capture its output without judging the exit status.
pub fn run_tool(program: &Path, args: &[OsString]) -> Result<ToolOutput, ToolError> {
  let program_name = program.display().to_string();
  debug!(program = %program_name, args = ?args, "running tool");

  let output = Command::new(program)
    .args(args)
    .env("LANG", "C")
    .env("LC_ALL", "C")
    // 1980-01-01, the earliest timestamp archive formats agree on
    .env("SOURCE_DATE_EPOCH", "315532800")
    .output()
    .map_err(|source| ToolError::Spawn {
      program: program_name.clone(),
      source,
    })?;

  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
  if !stderr.is_empty() {
    debug!(program = %program_name, stderr = %stderr, "tool stderr");
  }

  Ok(ToolOutput {
    success: output.status.success(),
    code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr,
  })
}

/// Run `program`, turning a non-zero exit into [`ToolError::Failed`].
pub fn run_checked(program: &Path, args: &[OsString]) -> Result<ToolOutput, ToolError> {
  let output = run_tool(program, args)?;
  if !output.success {
    return Err(ToolError::Failed {
      program: program.display().to_string(),
      code: output.code,
      stderr: output.stderr.trim().to_string(),
    });
  }
  Ok(output)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tracing_test::traced_test;

  #[test]
  fn failure_message_names_exit() {
    let err = ToolError::Failed {
      program: "llvm-dlltool".to_string(),
      code: Some(1),
      stderr: "no such file".to_string(),
    };
    assert_eq!(err.to_string(), "llvm-dlltool failed (exit code 1): no such file");

    let err = ToolError::Failed {
      program: "clang".to_string(),
      code: None,
      stderr: String::new(),
    };
    assert!(err.to_string().contains("terminated by signal"));
  }

  #[test]
  fn missing_program_is_spawn_error() {
    let err = run_tool(Path::new("/nonexistent/crtkit-no-such-tool"), &[]).unwrap_err();
    assert!(matches!(err, ToolError::Spawn { .. }));
  }

  #[cfg(unix)]
  #[test]
  fn non_zero_exit_is_failure() {
    let args = vec![OsString::from("-c"), OsString::from("echo boom >&2; exit 3")];
    let output = run_tool(Path::new("/bin/sh"), &args).unwrap();
    assert!(!output.success);
    assert_eq!(output.code, Some(3));
    assert_eq!(output.stderr.trim(), "boom");

    let err = run_checked(Path::new("/bin/sh"), &args).unwrap_err();
    assert!(matches!(err, ToolError::Failed { code: Some(3), ref stderr, .. } if stderr == "boom"));
  }

  #[cfg(unix)]
  #[test]
  fn locale_is_pinned() {
    let args = vec![OsString::from("-c"), OsString::from("echo $LC_ALL $SOURCE_DATE_EPOCH")];
    let output = run_checked(Path::new("/bin/sh"), &args).unwrap();
    assert_eq!(output.stdout.trim(), "C 315532800");
  }

  #[cfg(unix)]
  #[test]
  #[traced_test]
  fn run_is_logged_with_program_name() {
    let args = vec![OsString::from("-c"), OsString::from("echo oops >&2")];
    run_checked(Path::new("/bin/sh"), &args).unwrap();
    assert!(logs_contain("running tool"));
    assert!(logs_contain("program=/bin/sh"));
    assert!(logs_contain("tool stderr"));
  }
}
