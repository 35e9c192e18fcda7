//! Logging initialization
//!
//! Logs go to stderr (stdout carries command output) in plain, pretty or
//! JSON format, and optionally to a file as well. `RUST_LOG` overrides the
//! configured level.

use crate::config::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Install the global subscriber
///
/// The returned guard flushes the log file when dropped; keep it alive for
/// the lifetime of the program.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer(config.format))
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

fn stderr_layer<S>(format: LogFormat) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    }
}

/// Non-blocking plain-text layer appending to `path`
fn file_layer<S>(path: &Path) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let directory = match path.parent() {
        Some(parent) if parent != Path::new("") => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Log file path {} has no file name", path.display())))?;

    std::fs::create_dir_all(directory)?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}
