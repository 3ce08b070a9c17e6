use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;
use super::http::{
    METRIC_ASSET_CACHE_BYPASS, METRIC_ASSET_CACHE_HIT, METRIC_ASSET_CACHE_MISS,
    METRIC_ASSET_CACHE_STALE, METRIC_ASSET_RENDER_ERROR, METRIC_ASSET_RENDER_MS,
};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_ASSET_CACHE_HIT,
            Unit::Count,
            "Total number of bundles served from the cache."
        );
        describe_counter!(
            METRIC_ASSET_CACHE_MISS,
            Unit::Count,
            "Total number of bundle requests with no cached entry."
        );
        describe_counter!(
            METRIC_ASSET_CACHE_STALE,
            Unit::Count,
            "Total number of cached bundles discarded because a source file changed."
        );
        describe_counter!(
            METRIC_ASSET_CACHE_BYPASS,
            Unit::Count,
            "Total number of bundle requests rendered without consulting the cache."
        );
        describe_counter!(
            METRIC_ASSET_RENDER_ERROR,
            Unit::Count,
            "Total number of bundle renders that failed."
        );
        describe_histogram!(
            METRIC_ASSET_RENDER_MS,
            Unit::Milliseconds,
            "Bundle render latency in milliseconds."
        );
    });
}
