use crate::{config::LogLevel, errors::Error, Result};

/// Install the process-wide `tracing` subscriber.
///
/// Library code only emits events; binaries call this once at startup.
/// `RUST_LOG` overrides the configured level.
pub fn init(service_name: &str, level: LogLevel) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

/// Our crates at the configured level, everything else at warn.
fn default_directives(service_name: &str, level: LogLevel) -> String {
    let lvl = level.as_filter();
    let service = service_name.replace('-', "_");
    format!("warn,tma_core={lvl},tma_telegram={lvl},{service}={lvl}")
}
