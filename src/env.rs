pub use std::env::*;
use std::sync::LazyLock;

/// Argv byte budget for a single git invocation. Overridable because the
/// platform defaults are conservative guesses, not hard kernel limits.
pub static MAX_ARG_LENGTH: LazyLock<usize> = LazyLock::new(|| {
    var("LINT_STAGED_MAX_ARG_LENGTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_ARG_LENGTH)
});

#[cfg(windows)]
const DEFAULT_MAX_ARG_LENGTH: usize = 8191;
#[cfg(target_os = "macos")]
const DEFAULT_MAX_ARG_LENGTH: usize = 262144;
#[cfg(not(any(windows, target_os = "macos")))]
const DEFAULT_MAX_ARG_LENGTH: usize = 131072;

pub static LINT_STAGED_LOG: LazyLock<Option<String>> =
    LazyLock::new(|| var("LINT_STAGED_LOG").ok());
