use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::error::AppError;

/// Map `-v`/`-q` counts to a maximum log level.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. Logs go to stderr so command output
/// stays pipeable.
pub fn init_logging(level: Level) -> Result<(), AppError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| AppError::Logging(err.to_string()))
}
