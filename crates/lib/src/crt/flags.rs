//! Compiler flags shared by every MinGW CRT translation unit.

use std::path::Path;

const CRT_DEFINES: &[&str] = &[
  "-DHAVE_CONFIG_H",
  "-D_CRTBLD",
  "-D_SYSCRT=1",
  "-D_WIN32_WINNT=0x0f00",
  "-D__MSVCRT_VERSION__=0x700",
  "-D__USE_MINGW_ANSI_STDIO=0",
];

const C_STANDARD: &str = "-std=gnu11";

/// Extra flags for `crtexe.c` / `crtdll.c`, which must see the MSVCRT
/// configuration rather than the CRTDLL one.
pub const STARTUP_OBJECT_FLAGS: &[&str] = &["-U__CRTDLL__", "-D__MSVCRT__"];

/// Defines, language standard and include paths under `lib_root`.
pub fn base_cc_args(lib_root: &Path) -> Vec<String> {
  let mut args: Vec<String> = CRT_DEFINES.iter().map(|s| s.to_string()).collect();
  args.push(C_STANDARD.to_string());
  for include in [
    lib_root.join("mingw").join("include"),
    lib_root.join("libc").join("include").join("any-windows-any"),
  ] {
    args.push("-I".to_string());
    args.push(include.to_string_lossy().into_owned());
  }
  args
}
