//! Export-definition handling for import libraries.
//!
//! - [`locate`] - three-tier search for a library's `.def` / `.def.in`
//! - [`preprocess`] - expansion of `.def.in` templates through a [`Preprocessor`]

pub mod locate;
pub mod preprocess;

pub use locate::{DefTier, DefinitionSource, find_def, lib_exists};
pub use preprocess::{
  BuiltinMacroMode, Diagnostic, OutputOptions, PreprocessError, PreprocessOutput, PreprocessRequest, Preprocessor,
  Severity, preprocess_def,
};
