/// Application name used for default directory names.
pub const APP_NAME: &str = "crtkit";

/// Version string mixed into every cache key. Bumping it invalidates all
/// previously recorded artifacts.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of hex characters kept from the SHA-256 of a cache key.
pub const DIGEST_HEX_LEN: usize = 32;

/// Directory (relative to the cache root) holding per-digest lock and record files.
pub const MANIFEST_DIR: &str = "h";

/// Directory (relative to the cache root) holding per-digest output directories.
pub const OBJECT_DIR: &str = "o";

/// Directory (relative to the library root) holding the MinGW-w64 sources.
pub const MINGW_DIR: &str = "mingw";
