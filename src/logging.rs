//! Subscriber setup for hosts that do not install their own.

use color_eyre::eyre::{self, WrapErr};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs a global subscriber and `color-eyre` report handler.
///
/// `RUST_LOG` takes precedence over `level`. Fails if either global hook was
/// already installed.
pub fn init_logging(level: &str, format: LogFormat) -> eyre::Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let output = match format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(ErrorLayer::default())
        .try_init()
        .wrap_err("a global tracing subscriber is already installed")
}
