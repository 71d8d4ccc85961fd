//! Compile-time build metadata exposed by the CLI.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("KREXEC_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("KREXEC_BUILD_TIMESTAMP");

/// Version string used by `krexec --version`.
pub const CLI_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("KREXEC_BUILD_GIT_HASH"),
    ", built ",
    env!("KREXEC_BUILD_TIMESTAMP"),
    ")"
);
