//! Source tables for `libmingw32.lib`, relative to the MinGW root.

use crate::target::Arch;

pub const CRT2_SRC: &str = "crt/crtexe.c";
pub const DLLCRT2_SRC: &str = "crt/crtdll.c";

pub const MINGW32_GENERIC_SRC: &[&str] = &[
  "crt/_newmode.c",
  "crt/cinitexe.c",
  "crt/dll_argv.c",
  "crt/dllargv.c",
  "crt/gccmain.c",
  "crt/merr.c",
  "crt/mingw_custom.c",
  "crt/mingw_helpers.c",
  "crt/mingw_vfprintf.c",
  "crt/natstart.c",
  "crt/pesect.c",
  "crt/pseudo-reloc.c",
  "crt/pseudo-reloc-list.c",
  "crt/tlssup.c",
  "crt/tlsmcrt.c",
  "crt/tlsthrd.c",
  "crt/udllargc.c",
  "crt/usermatherr.c",
  "crt/wildcard.c",
  "crt/xncommod.c",
  "crt/xthdloc.c",
  "crt/xtxtmode.c",
  "crt/charmax.c",
  "crt/cxa_atexit.c",
  "crt/cxa_thread_atexit.c",
  "crt/tls_atexit.c",
  "misc/__initenv.c",
  "misc/delayimp.c",
  "misc/dirent.c",
  "misc/feclearexcept.c",
  "misc/fegetenv.c",
  "misc/fesetenv.c",
  "misc/getopt.c",
  "misc/invalid_parameter_handler.c",
  "misc/mingw_longjmp.S",
  "misc/mingw_matherr.c",
  "misc/mingw_setjmp.S",
  "misc/output_format.c",
  "misc/purecall.c",
  "misc/register_tls_atexit.c",
  // Repeated in the upstream build list; `source_list` keeps the first.
  "misc/delayimp.c",
  "stdio/mingw_lock.c",
  "stdio/mingw_pformat.c",
  "stdio/mingw_vsnprintf.c",
  "stdio/snprintf.c",
  "stdio/vsnprintf.c",
];

/// Shared by 32- and 64-bit x86.
pub const MINGW32_X86_SRC: &[&str] = &[
  "math/cbrtl.c",
  "math/erfl.c",
  "math/fdiml.c",
  "math/fmal.c",
  "math/fmaxl.c",
  "math/fminl.c",
  "math/llrintl.c",
  "math/lrintl.c",
  "math/rintl.c",
  "math/x86/acosh.c",
  "math/x86/ceil.S",
  "math/x86/cossin.c",
  "math/x86/exp2l.S",
  "math/x86/floor.S",
  "math/x86/fmod.c",
  "math/x86/frexpl.S",
  "math/x86/ldexpl.c",
  "math/x86/log2l.S",
  "math/x86/remainder.S",
  "math/x86/scalbn.S",
  "misc/mingw_getsp.S",
];

pub const MINGW32_X86_32_SRC: &[&str] = &[
  "math/x86/atan2.c",
  "math/x86/ceilf.S",
  "math/x86/floorf.S",
  "math/x86/fmodf.c",
  "math/x86/rint.c",
  "misc/longjmp_x86.S",
];

/// Shared by 32-bit ARM and ARM64.
pub const MINGW32_ARM_SRC: &[&str] = &[
  "math/arm-common/ldexpl.c",
  "math/arm-common/sincosl.c",
  "math/arm-common/scalbnl.c",
  "math/arm-common/log2.c",
  "math/arm-common/pow.c",
];

pub const MINGW32_ARM32_SRC: &[&str] = &[
  "math/arm/exp2.S",
  "math/arm/nearbyint.S",
  "math/arm/s_rint.c",
  "math/arm/s_trunc.c",
  "math/arm/sincos.S",
];

pub const MINGW32_ARM64_SRC: &[&str] = &[
  "math/arm64/exp2.S",
  "math/arm64/nearbyint.S",
  "math/arm64/rint.c",
  "math/arm64/sincos.S",
  "math/arm64/trunc.S",
];

/// Architecture tables appended after [`MINGW32_GENERIC_SRC`].
pub fn arch_tables(arch: Arch) -> &'static [&'static [&'static str]] {
  match arch {
    Arch::X86 => &[MINGW32_X86_SRC, MINGW32_X86_32_SRC],
    Arch::X86_64 => &[MINGW32_X86_SRC],
    Arch::Arm | Arch::Thumb => &[MINGW32_ARM_SRC, MINGW32_ARM32_SRC],
    Arch::Aarch64 => &[MINGW32_ARM_SRC, MINGW32_ARM64_SRC],
  }
}
