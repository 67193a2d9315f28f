use crate::settings::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "bybit-trader.log";

/// Installs the global tracing subscriber.
///
/// Logs always go to stdout. When `config.directory` is set they are also written,
/// without ANSI colours, to a daily rolling file. The returned guard must be held
/// for the life of the process so buffered file output is flushed on exit.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let console = fmt::layer().with_target(true);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_writer(writer).with_ansi(false);

            if tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .try_init()
                .is_err()
            {
                tracing::warn!("A global tracing subscriber was already installed.");
            }
            Some(guard)
        }
        None => {
            if tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()
                .is_err()
            {
                tracing::warn!("A global tracing subscriber was already installed.");
            }
            None
        }
    }
}
