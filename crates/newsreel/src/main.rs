use newsreel::cli::parse_cli;
use newsreel::commands;
use newsreel::error::AppError;
use newsreel::logging::{init_logging, level_for};
use newsreel::settings::resolve_settings;
use tracing::debug;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), AppError> {
    let (cli_args, cli_sources) = parse_cli();
    init_logging(level_for(cli_args.verbose, cli_args.quiet))?;

    let resolved = resolve_settings(&cli_args, &cli_sources)?;
    if let Some(path) = &resolved.config_path {
        debug!(path = %path.display(), "loaded config");
    }
    commands::run(cli_args.command, &resolved.settings).await
}
