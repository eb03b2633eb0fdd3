//! Tracing subscriber initialization.

use mediaduct_core::config::Config;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_DIRECTIVES: &str =
    "mediaduct_api=debug,mediaduct_worker=debug,tower_http=debug,axum::rejection=trace";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default directives. JSON output is meant for log
/// collectors; the compact console format is for local work.
pub fn init_telemetry(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into());

    if config.log_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .init();
    }
}
