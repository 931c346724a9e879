use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

/// Installs the global subscriber; `RUST_LOG` overrides `level`.
pub fn init(level: LevelFilter) -> Result<(), CliError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(io::stderr),
        )
        .try_init()
        .map_err(|err| CliError::Telemetry(err.to_string()))
}
