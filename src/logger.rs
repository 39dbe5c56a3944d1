use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::env;

static INIT: Once = Once::new();

/// Route `log` macros through a tracing subscriber writing to stderr.
/// An explicit level from the CLI wins over `LINT_STAGED_LOG`.
pub fn init(level: Option<log::LevelFilter>) {
    INIT.call_once(|| {
        let filter = match level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => match env::LINT_STAGED_LOG.as_deref() {
                Some(directive) => EnvFilter::new(directive),
                None => EnvFilter::new("info"),
            },
        };
        let _ = tracing_log::LogTracer::init();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
