//! Tracing initialization for embedders and tests.
//!
//! The runtime itself only emits `tracing` events; installing a subscriber is
//! the embedder's decision. This module offers the default wiring: an
//! `EnvFilter` seeded from settings (overridable via `WEFT_LOG`) and a text
//! or JSON formatting layer.

use crate::config::{LogFlavor, LoggingSettings};
use crate::constants;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// The filter directive comes from `WEFT_LOG` when set, else from
/// `settings.level`. The output flavor comes from `WEFT_LOG_FORMAT`
/// (`json`/`text`) when set, else from `settings.flavor`.
///
/// Calling this twice is harmless: the second installation attempt is
/// ignored rather than panicking, so tests may call it freely.
pub fn init(settings: &LoggingSettings) {
    let directive = std::env::var(constants::ENV_WEFT_LOG)
        .unwrap_or_else(|_| settings.level.clone());

    let env_filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let flavor = std::env::var(constants::ENV_WEFT_LOG_FORMAT).map_or(settings.flavor, |s| {
        match s.to_lowercase().as_str() {
            "json" => LogFlavor::Json,
            _ => LogFlavor::Text,
        }
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match flavor {
        LogFlavor::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFlavor::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping existing one");
    }
}
