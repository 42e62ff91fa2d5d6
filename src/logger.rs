use std::result::Result;

use snafu::ResultExt;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{registry, EnvFilter, Layer as _};

use crate::config::ServerConfig;
use crate::error::{ApplicationError, InitializeLoggerSnafu};

const LOG_FILE: &str = "listing-views.log";

/// Pretty logs on stdout, JSON logs in a daily rolling file under `log_dir`.
///
/// The file also gets a line whenever an instrumented store call closes, with
/// its busy and idle time, so slow queries can be found after the fact.
/// Keep the returned guard alive until exit or buffered file logs are lost.
pub fn init(config: &ServerConfig) -> Result<WorkerGuard, ApplicationError> {
    let directives = config.log_filter.as_deref();

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter(directives));

    let console_layer = layer()
        .pretty()
        .with_writer(std::io::stdout)
        .with_filter(filter(directives));

    let subscriber = registry().with(console_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber).context(InitializeLoggerSnafu)?;

    Ok(guard)
}

/// Unparsable directives are skipped rather than failing start-up.
fn filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives.unwrap_or_default())
}
