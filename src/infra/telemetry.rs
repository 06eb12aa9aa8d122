use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber described by `logging`.
///
/// `RUST_LOG` still wins over the configured level when it is set.
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
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "scaffold_cache_hit_total",
            Unit::Count,
            "Entity cache lookups served from a live entry."
        );
        describe_counter!(
            "scaffold_cache_miss_total",
            Unit::Count,
            "Entity cache lookups that fell through to the store."
        );
        describe_counter!(
            "scaffold_cache_expired_total",
            Unit::Count,
            "Entity cache entries evicted on read after their TTL elapsed."
        );
        describe_counter!(
            "scaffold_http_responses_total",
            Unit::Count,
            "HTTP responses by status class."
        );
    });
}
