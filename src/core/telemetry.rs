use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

// sqlx and hyper are chatty at info; keep them at warn unless RUST_LOG says otherwise.
const QUIET_DIRECTIVES: &str = "sqlx=warn,hyper=warn,reqwest=warn";

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},{QUIET_DIRECTIVES}", settings.telemetry().log_level))
    });

    let builder = fmt().with_env_filter(filter).with_target(false);

    let result = if settings.telemetry().json {
        builder.json().with_span_events(fmt::format::FmtSpan::CLOSE).try_init()
    } else {
        builder.with_span_events(fmt::format::FmtSpan::CLOSE).try_init()
    };

    result.map_err(|err| anyhow::anyhow!(err.to_string()))
}
