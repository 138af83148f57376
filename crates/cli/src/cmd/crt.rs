//! Implementation of the `crtkit crt` command.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crtkit_lib::config::SessionConfig;
use crtkit_lib::crt::{CrtFile, Progress};
use crtkit_lib::session::Session;
use crtkit_lib::target::Target;
use crtkit_lib::tools::ToolPaths;

use crate::output::{OutputFormat, format_elapsed, print_info, print_json, print_success};

#[derive(Serialize)]
struct BuiltFile {
  name: String,
  path: String,
}

/// Logs compiler progress at debug level.
#[derive(Default)]
struct LogProgress {
  total: AtomicUsize,
}

impl Progress for LogProgress {
  fn begin(&self, name: &str, total: usize) {
    self.total.store(total, Ordering::Relaxed);
    debug!(name = %name, total, "compiling");
  }

  fn advance(&self, completed: usize) {
    debug!(completed, total = self.total.load(Ordering::Relaxed), "compiled");
  }
}

/// Build each requested CRT file for `target` and print its path.
pub fn cmd_crt(config: SessionConfig, target: Target, files: &[String], output: OutputFormat) -> Result<()> {
  let files = files
    .iter()
    .map(|name| CrtFile::from_name(name))
    .collect::<Result<Vec<_>, _>>()?;

  let collaborators = ToolPaths::from_env().collaborators(&config);
  let session = Session::new(config, collaborators);
  let progress = LogProgress::default();

  let mut built = Vec::with_capacity(files.len());
  for file in files {
    let started = Instant::now();
    let path = session
      .build_crt_file(target, file, &progress)
      .with_context(|| format!("Failed to build {file} for {target}"))?;
    if !output.is_json() {
      print_success(&format!("{file} ({})", format_elapsed(started.elapsed())));
      print_info(&path.display().to_string());
    }
    built.push(BuiltFile {
      name: file.name().to_string(),
      path: path.display().to_string(),
    });
  }

  if output.is_json() {
    print_json(&serde_json::json!({ "target": target.triple(), "artifacts": built }))?;
  }

  session.teardown();
  Ok(())
}
