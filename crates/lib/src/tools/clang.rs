//! Clang-backed preprocessor and CRT compiler.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cache::{ArtifactCache, KeyHasher};
use crate::config::OptimizeMode;
use crate::crt::{CompileError, CompileOptions, CompileRequest, CompiledArtifact, CrtCompiler, OutputKind, Progress};
use crate::def::{
  BuiltinMacroMode, Diagnostic, PreprocessError, PreprocessOutput, PreprocessRequest, Preprocessor, Severity,
};
use crate::error::BuildError;
use crate::target::{Arch, Target, UnwindTables};
use crate::tools::command::{ToolError, run_checked, run_tool};

/// Preprocessor running `clang -E` on the definition template.
#[derive(Debug, Clone)]
pub struct ClangPreprocessor {
  clang: PathBuf,
}

impl ClangPreprocessor {
  pub fn new(clang: impl Into<PathBuf>) -> Self {
    Self { clang: clang.into() }
  }
}

/// Triple spelled the way clang's driver parses it.
pub fn clang_triple(target: Target) -> String {
  let arch = match target.arch {
    Arch::X86 => "i686",
    Arch::X86_64 => "x86_64",
    Arch::Arm => "armv7",
    Arch::Thumb => "thumbv7",
    Arch::Aarch64 => "aarch64",
  };
  format!("{arch}-w64-windows-{}", target.abi.as_str())
}

/// Arguments for preprocessing `request` as C to stdout.
pub fn preprocess_args(request: &PreprocessRequest<'_>) -> Vec<OsString> {
  let mut args: Vec<OsString> = vec!["-E".into(), "-x".into(), "c".into()];
  args.push(format!("--target={}", clang_triple(request.target)).into());
  if !request.output.line_markers {
    args.push("-P".into());
  }
  if request.output.keep_comments {
    args.push("-C".into());
  }
  if request.builtins == BuiltinMacroMode::NoSystemDefines {
    args.push("-undef".into());
  }
  for dir in request.include_dirs {
    args.push("-I".into());
    args.push(dir.into());
  }
  for (name, value) in &request.defines {
    let define = match value {
      Some(value) => format!("-D{name}={value}"),
      None => format!("-D{name}"),
    };
    args.push(define.into());
  }
  args.push(request.source.into());
  args
}

/// Split clang's stderr into diagnostics. Lines that carry no severity
/// (source excerpts, carets) are dropped.
pub fn parse_diagnostics(stderr: &str) -> Vec<Diagnostic> {
  const MARKERS: [(&str, Severity); 4] = [
    ("fatal error: ", Severity::Fatal),
    ("error: ", Severity::Error),
    ("warning: ", Severity::Warning),
    ("note: ", Severity::Note),
  ];

  stderr
    .lines()
    .filter_map(|line| {
      // Earliest marker wins, so "fatal error: " is not read as "error: "
      // and message text cannot override the severity.
      let (at, marker, severity) = MARKERS
        .iter()
        .filter_map(|(marker, severity)| line.find(marker).map(|at| (at, *marker, *severity)))
        .min_by_key(|(at, _, _)| *at)?;
      let location = line[..at].trim_end().trim_end_matches(':');
      Some(Diagnostic {
        severity,
        message: line[at + marker.len()..].trim().to_string(),
        location: (!location.is_empty()).then(|| location.to_string()),
      })
    })
    .collect()
}

impl Preprocessor for ClangPreprocessor {
  fn preprocess(&self, request: &PreprocessRequest<'_>) -> Result<PreprocessOutput, PreprocessError> {
    let output = run_tool(&self.clang, &preprocess_args(request)).map_err(|e| PreprocessError(e.to_string()))?;

    let mut diagnostics = parse_diagnostics(&output.stderr);
    if !output.success && !diagnostics.iter().any(|d| d.severity.is_error()) {
      diagnostics.push(Diagnostic {
        severity: Severity::Error,
        message: format!("{} exited unsuccessfully: {}", self.clang.display(), output.stderr.trim()),
        location: None,
      });
    }

    Ok(PreprocessOutput {
      text: output.stdout,
      diagnostics,
    })
  }
}

/// Compiler driving `clang -c` per source and `llvm-ar` for static libraries.
///
/// Outputs are cached in an [`ArtifactCache`] keyed by the request and the
/// bytes of every source file.
#[derive(Debug, Clone)]
pub struct ClangCompiler {
  clang: PathBuf,
  ar: PathBuf,
  cache: ArtifactCache,
}

impl ClangCompiler {
  pub fn new(clang: impl Into<PathBuf>, ar: impl Into<PathBuf>, cache: ArtifactCache) -> Self {
    Self {
      clang: clang.into(),
      ar: ar.into(),
      cache,
    }
  }

  fn compile_all(&self, request: &CompileRequest, out_dir: &Path, progress: &dyn Progress) -> Result<(), ToolError> {
    let dest = out_dir.join(&request.name);
    if request.output == OutputKind::Object && request.sources.len() == 1 {
      let source = &request.sources[0];
      run_checked(&self.clang, &compile_args(request.target, &request.options, &source.extra_flags, &source.path, &dest))?;
      progress.advance(1);
      return Ok(());
    }

    let obj_dir = out_dir.join("obj");
    fs::create_dir_all(&obj_dir).map_err(|source| ToolError::Io {
      stage: "object directory creation",
      path: obj_dir.clone(),
      source,
    })?;

    let mut objects = Vec::with_capacity(request.sources.len());
    for (index, source) in request.sources.iter().enumerate() {
      let stem = source.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
      let object = obj_dir.join(format!("{index:04}-{stem}.o"));
      run_checked(&self.clang, &compile_args(request.target, &request.options, &source.extra_flags, &source.path, &object))?;
      objects.push(object);
      progress.advance(index + 1);
    }

    let mut args: Vec<OsString> = vec!["rcs".into(), dest.into()];
    args.extend(objects.into_iter().map(OsString::from));
    run_checked(&self.ar, &args)?;
    Ok(())
  }
}

/// `clang -c` arguments for one translation unit.
pub fn compile_args(target: Target, options: &CompileOptions, flags: &[String], source: &Path, dest: &Path) -> Vec<OsString> {
  let mut args: Vec<OsString> = vec![format!("--target={}", clang_triple(target)).into(), "-c".into()];
  args.extend(optimize_flags(options.optimize).iter().map(OsString::from));
  match options.unwind_tables {
    UnwindTables::None => {
      args.push("-fno-unwind-tables".into());
      args.push("-fno-asynchronous-unwind-tables".into());
    }
    UnwindTables::Async => args.push("-fasynchronous-unwind-tables".into()),
  }
  if options.lto {
    args.push("-flto".into());
  }
  args.extend(flags.iter().map(OsString::from));
  args.push("-o".into());
  args.push(dest.into());
  args.push(source.into());
  args
}

fn optimize_flags(mode: OptimizeMode) -> &'static [&'static str] {
  match mode {
    OptimizeMode::Debug => &["-O0", "-g"],
    OptimizeMode::ReleaseSafe => &["-O2", "-D_FORTIFY_SOURCE=2"],
    OptimizeMode::ReleaseFast => &["-O2"],
    OptimizeMode::ReleaseSmall => &["-Os"],
  }
}

impl CrtCompiler for ClangCompiler {
  fn build(&self, request: &CompileRequest, progress: &dyn Progress) -> Result<CompiledArtifact, CompileError> {
    let mut hasher = KeyHasher::new();
    hasher
      .add_str(self.cache.tool_version())
      .add_str(&request.name)
      .add_str(&request.target.triple())
      .add_str(&format!("{:?}", request.output))
      .add_str(&format!("{:?}", request.options));
    for source in &request.sources {
      hasher.add_str(&source.path.to_string_lossy());
      for flag in &source.extra_flags {
        hasher.add_str(flag);
      }
      hasher
        .add_file(&source.path)
        .map_err(|e| CompileError(format!("reading {}: {e}", source.path.display())))?;
    }
    let key = hasher.finish();

    progress.begin(&request.name, request.sources.len());
    let published = self
      .cache
      .fetch_or_build(&key, &request.name, |out_dir| {
        info!(name = %request.name, sources = request.sources.len(), "compiling");
        self
          .compile_all(request, out_dir, progress)
          .map_err(|e| BuildError::CompileFailed {
            name: request.name.clone(),
            message: e.to_string(),
          })
      })
      .map_err(|e| match e {
        BuildError::CompileFailed { message, .. } => CompileError(message),
        other => CompileError(other.to_string()),
      })?;

    if !published.fresh {
      debug!(name = %request.name, digest = %published.key, "reused cached CRT artifact");
      progress.advance(request.sources.len());
    }

    Ok(CompiledArtifact {
      path: published.path,
      lock: Some(published.lock),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::def::OutputOptions;

  #[test]
  fn preprocess_args_for_def_template() {
    let include = vec![PathBuf::from("/lib/mingw/def-include")];
    let request = PreprocessRequest {
      source: Path::new("/lib/mingw/lib-common/foo.def.in"),
      include_dirs: &include,
      builtins: BuiltinMacroMode::IncludeSystemDefines,
      target: Target::gnu(Arch::X86_64),
      defines: vec![("DEF_X64".to_string(), None), ("_MSC_VER".to_string(), Some("1930".to_string()))],
      output: OutputOptions::def_file(),
    };

    let args: Vec<String> = preprocess_args(&request)
      .into_iter()
      .map(|a| a.to_string_lossy().into_owned())
      .collect();

    assert_eq!(&args[..3], ["-E", "-x", "c"]);
    assert!(args.contains(&"--target=x86_64-w64-windows-gnu".to_string()));
    assert!(args.contains(&"-P".to_string()));
    assert!(!args.contains(&"-C".to_string()));
    assert!(!args.contains(&"-undef".to_string()));
    assert!(args.contains(&"-DDEF_X64".to_string()));
    assert!(args.contains(&"-D_MSC_VER=1930".to_string()));
    assert_eq!(args.last().unwrap(), "/lib/mingw/lib-common/foo.def.in");
  }

  #[test]
  fn diagnostics_are_classified() {
    let stderr = "\
foo.def.in:3:10: fatal error: 'func.def.in' file not found
    3 | #include \"func.def.in\"
      |          ^~~~~~~~~~~~~
foo.def.in:7:2: warning: unused macro [-Wunused-macros]
note: expanded from here
1 error generated.
";
    let diagnostics = parse_diagnostics(stderr);

    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics[0].severity, Severity::Fatal);
    assert_eq!(diagnostics[0].location.as_deref(), Some("foo.def.in:3:10"));
    assert_eq!(diagnostics[0].message, "'func.def.in' file not found");
    assert_eq!(diagnostics[1].severity, Severity::Warning);
    assert_eq!(diagnostics[2].severity, Severity::Note);
    assert_eq!(diagnostics[2].location, None);
  }

  #[test]
  fn x86_disables_unwind_tables() {
    let options = CompileOptions {
      unwind_tables: UnwindTables::None,
      optimize: OptimizeMode::ReleaseSmall,
      lto: false,
    };
    let args: Vec<String> = compile_args(
      Target::gnu(Arch::X86),
      &options,
      &["-D_CRTBLD".to_string()],
      Path::new("crtexe.c"),
      Path::new("crt2.o"),
    )
    .into_iter()
    .map(|a| a.to_string_lossy().into_owned())
    .collect();

    assert_eq!(args[0], "--target=i686-w64-windows-gnu");
    assert!(args.contains(&"-Os".to_string()));
    assert!(args.contains(&"-fno-asynchronous-unwind-tables".to_string()));
    assert!(!args.contains(&"-flto".to_string()));
    assert!(args.contains(&"-D_CRTBLD".to_string()));
    assert_eq!(args.last().unwrap(), "crtexe.c");
  }
}
