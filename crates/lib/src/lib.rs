//! crtkit-lib: on-demand MinGW runtime artifacts
//!
//! This crate builds the two kinds of Windows support artifacts a toolchain
//! needs at link time, exactly once per set of inputs:
//! - CRT objects (`crt2.o`, `dllcrt2.o`, `libmingw32.lib`) compiled from the
//!   bundled MinGW-w64 sources
//! - DLL import libraries emitted from `.def` / `.def.in` export definitions
//!
//! Requests go through a [`Session`](session::Session), which deduplicates
//! them in an [`ArtifactRegistry`](registry::ArtifactRegistry) and reuses
//! results across processes through the content-addressed
//! [`ArtifactCache`](cache::ArtifactCache).

pub mod cache;
pub mod config;
pub mod consts;
pub mod crt;
pub mod def;
pub mod error;
pub mod implib;
pub mod registry;
pub mod session;
pub mod target;
pub mod tools;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::BuildError;
