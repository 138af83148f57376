//! Implementation of the `crtkit locate` command.

use anyhow::Result;

use crtkit_lib::config::SessionConfig;
use crtkit_lib::def::find_def;
use crtkit_lib::target::Target;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

/// Print the definition file `name` resolves to, without building anything.
pub fn cmd_locate(config: &SessionConfig, target: Target, name: &str, output: OutputFormat) -> Result<()> {
  let source = find_def(&config.mingw_root(), target.arch, name)?;

  if output.is_json() {
    print_json(&serde_json::json!({
      "name": name,
      "target": target.triple(),
      "tier": source.tier,
      "path": source.path.display().to_string(),
      "needs_preprocessing": source.needs_preprocessing(),
    }))?;
  } else {
    print_success(&format!("{name} for {target}"));
    print_stat("Tier", &format!("{:?}", source.tier));
    print_stat("Path", &source.path.display().to_string());
  }

  Ok(())
}
