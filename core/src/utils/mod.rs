mod options;

pub use options::*;

use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber filtered by `RUST_LOG`, `info` when unset.
/// Safe to call more than once.
pub fn setup_logger() {
  setup_logger_with_default("info");
}

/// Like [`setup_logger`], with `directives` used when `RUST_LOG` is unset.
pub fn setup_logger_with_default(directives: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .try_init();
}

#[cfg(test)]
pub(crate) fn setup_test_logger() {
  let _ = tracing_subscriber::fmt()
    .with_test_writer()
    .with_env_filter(EnvFilter::from_default_env())
    .try_init();
}
