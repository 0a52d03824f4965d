//! Compile-time build metadata for the CLI.

/// Crate version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision captured by `build.rs`.
pub const GIT_COMMIT: &str = env!("TOKENFLOW_BUILD_GIT_HASH");

/// UTC build time captured by `build.rs`.
pub const BUILD_TIMESTAMP: &str = env!("TOKENFLOW_BUILD_TIMESTAMP");

/// Text printed by `tokenflow --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("TOKENFLOW_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("TOKENFLOW_BUILD_TIMESTAMP")
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_text_lists_commit_and_build_time() {
        let text = LONG_VERSION;
        assert!(text.starts_with(VERSION));
        assert!(text.contains(&format!("commit: {GIT_COMMIT}")));
        assert!(text.contains(&format!("built: {BUILD_TIMESTAMP}")));
    }
}
