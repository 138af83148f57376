//! Implementation of the `crtkit implib` command.

use anyhow::{Context, Result};
use serde::Serialize;

use crtkit_lib::config::SessionConfig;
use crtkit_lib::session::Session;
use crtkit_lib::target::Target;
use crtkit_lib::tools::ToolPaths;

use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

#[derive(Serialize)]
struct ImportLib {
  name: String,
  /// `None` when no definition exists and the linker's own search applies.
  path: Option<String>,
}

/// Build import libraries for `names`. Libraries without any definition file
/// are reported but do not fail the command.
pub fn cmd_implib(config: SessionConfig, target: Target, names: &[String], output: OutputFormat) -> Result<()> {
  let collaborators = ToolPaths::from_env().collaborators(&config);
  let session = Session::new(config, collaborators);

  let mut results = Vec::with_capacity(names.len());
  for name in names {
    let path = session
      .build_import_lib(target, name)
      .with_context(|| format!("Failed to build import library {name} for {target}"))?;

    if !output.is_json() {
      match &path {
        Some(path) => {
          print_success(&format!("{name}.lib"));
          print_stat("Path", &path.display().to_string());
        }
        None => print_warning(&format!("No definition for {name}; leaving it to the linker's library search")),
      }
    }
    results.push(ImportLib {
      name: name.clone(),
      path: path.map(|p| p.display().to_string()),
    });
  }

  if output.is_json() {
    print_json(&serde_json::json!({ "target": target.triple(), "libraries": results }))?;
  }

  session.teardown();
  Ok(())
}
