mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crtkit_lib::config::{CACHE_DIR_ENV, ConfigError, LIB_DIR_ENV, SessionConfig};
use crtkit_lib::target::{Arch, Target, UnknownArch};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "crtkit")]
#[command(author, version, about = "On-demand MinGW CRT objects and DLL import libraries", long_about = None)]
struct Cli {
  /// Root of the shared artifact cache
  #[arg(long, global = true, env = CACHE_DIR_ENV)]
  cache_dir: Option<PathBuf>,

  /// Root of the bundled library sources (containing mingw/ and libc/)
  #[arg(long, global = true, env = LIB_DIR_ENV)]
  lib_dir: Option<PathBuf>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args, Clone, Copy)]
struct TargetArgs {
  /// Target architecture (x86, x86_64, arm, thumb, aarch64)
  #[arg(short, long, default_value = "x86_64", value_parser = parse_arch)]
  target: Arch,
}

impl TargetArgs {
  fn target(self) -> Target {
    Target::gnu(self.target)
  }
}

fn parse_arch(value: &str) -> Result<Arch, UnknownArch> {
  value.parse()
}

#[derive(Subcommand)]
enum Commands {
  /// Build C runtime objects (crt2.o, dllcrt2.o, libmingw32.lib)
  Crt {
    #[arg(required = true)]
    files: Vec<String>,

    #[command(flatten)]
    target: TargetArgs,
  },

  /// Build import libraries from export definitions
  Implib {
    /// Library names without extension (kernel32, user32, ...)
    #[arg(required = true)]
    names: Vec<String>,

    #[command(flatten)]
    target: TargetArgs,
  },

  /// Show which definition file would be used for a library
  Locate {
    name: String,

    #[command(flatten)]
    target: TargetArgs,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = resolve_config(&cli)?;

  match cli.command {
    Commands::Crt { files, target } => cmd::cmd_crt(config, target.target(), &files, cli.output),
    Commands::Implib { names, target } => cmd::cmd_implib(config, target.target(), &names, cli.output),
    Commands::Locate { name, target } => cmd::cmd_locate(&config, target.target(), &name, cli.output),
  }
}

/// Environment-derived configuration with command-line paths layered on top.
fn resolve_config(cli: &Cli) -> Result<SessionConfig> {
  let mut config = match (SessionConfig::from_env(), &cli.cache_dir, &cli.lib_dir) {
    (Ok(config), _, _) => config,
    // Both roots given explicitly, so a missing home directory does not matter.
    (Err(ConfigError::NoCacheDir | ConfigError::NoLibDir), Some(cache), Some(lib)) => SessionConfig::new(cache, lib),
    (Err(e), _, _) => return Err(e).context("Failed to resolve configuration"),
  };

  if let Some(cache) = &cli.cache_dir {
    config.cache_root = cache.clone();
  }
  if let Some(lib) = &cli.lib_dir {
    config.lib_root =
      dunce::canonicalize(lib).with_context(|| format!("Library directory {} not found", lib.display()))?;
  }
  Ok(config)
}
