//! Log output setup.
//!
//! Text output is the stock `tracing-subscriber` formatter. JSON output writes
//! one object per line in the shape Cloud Logging parses from stdout, so
//! severity survives when running on Cloud Run or Cloud Functions:
//!
//! ```json
//! {"severity":"ERROR","message":"Transformation query failed due to ...","time":"...","target":"kunskap::handler"}
//! ```

use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    registry::LookupSpan,
};

/// Output format selected on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// Cloud Logging structured JSON lines.
    Json,
}

/// Installs the global subscriber. Verbosity comes from `RUST_LOG`,
/// defaulting to `info`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .event_format(CloudLoggingFormat)
            .init(),
    }
}

/// [`FormatEvent`] producing Cloud Logging JSON lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloudLoggingFormat;

#[derive(Serialize)]
struct LogEntry<'a> {
    severity: &'static str,
    message: String,
    time: String,
    target: &'a str,
}

/// Cloud Logging severity name for a tracing level.
pub fn severity(level: &Level) -> &'static str {
    match *level {
        Level::TRACE | Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

impl<S, N> FormatEvent<S, N> for CloudLoggingFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut message = String::new();
        ctx.format_fields(Writer::new(&mut message), event)?;

        let entry = LogEntry {
            severity: severity(event.metadata().level()),
            message,
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            target: event.metadata().target(),
        };

        let line = serde_json::to_string(&entry).map_err(|e| {
            eprintln!("Failed to serialize logging event! err: {e}");
            std::fmt::Error
        })?;
        writeln!(writer, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_maps_to_warning() {
        assert_eq!(severity(&Level::WARN), "WARNING");
        assert_eq!(severity(&Level::TRACE), "DEBUG");
        assert_eq!(severity(&Level::ERROR), "ERROR");
    }
}
