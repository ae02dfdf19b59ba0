use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use newsreel_fetch::{DEFAULT_MAX_BYTES, DEFAULT_TIMEOUT};

#[derive(Debug, Default)]
pub struct CliSources {
    pub max_bytes_from_cli: bool,
    pub timeout_secs_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            max_bytes_from_cli: value_from_cli(matches, "max_bytes"),
            timeout_secs_from_cli: value_from_cli(matches, "timeout_secs"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "newsreel",
    about = "Maintain the local video cache behind a news feed",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding cached videos
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,

    /// Base URL that store:// and gs:// locators resolve against
    #[arg(long = "endpoint")]
    pub endpoint: Option<String>,

    /// Largest video a single download may fetch, in bytes
    #[arg(
        long = "max-bytes",
        id = "max_bytes",
        default_value_t = DEFAULT_MAX_BYTES,
        value_parser = parse_positive_u64
    )]
    pub max_bytes: u64,

    /// Seconds allowed to resolve and download one video
    #[arg(
        long = "timeout-secs",
        id = "timeout_secs",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = parse_positive_u64
    )]
    pub timeout_secs: u64,

    /// Log more detail (repeat for trace output)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Download every video listed in a feed manifest
    Prefetch {
        /// Feed manifest (TOML with [[items]] entries)
        feed: PathBuf,
    },
    /// Show which videos of a feed manifest are already cached
    Status { feed: PathBuf },
    /// Remove every cached video
    Clear,
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|_| format!("'{value}' is not a valid number"))?;
    if parsed == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (CliArgs, CliSources) {
        let matches = CliArgs::command().try_get_matches_from(args).unwrap();
        let cli = CliArgs::from_arg_matches(&matches).unwrap();
        (cli, CliSources::from_matches(&matches))
    }

    #[test]
    fn defaults_are_not_marked_as_cli_values() {
        let (cli, sources) = parse(&["newsreel", "clear"]);
        assert_eq!(cli.max_bytes, DEFAULT_MAX_BYTES);
        assert_eq!(cli.timeout_secs, 30);
        assert!(!sources.max_bytes_from_cli);
        assert!(!sources.timeout_secs_from_cli);
        assert!(matches!(cli.command, Command::Clear));
    }

    #[test]
    fn explicit_values_are_marked() {
        let (cli, sources) = parse(&[
            "newsreel",
            "--timeout-secs",
            "5",
            "-vv",
            "prefetch",
            "feed.toml",
        ]);
        assert_eq!(cli.timeout_secs, 5);
        assert_eq!(cli.verbose, 2);
        assert!(sources.timeout_secs_from_cli);
        assert!(!sources.max_bytes_from_cli);
        assert!(
            matches!(cli.command, Command::Prefetch { feed } if feed == PathBuf::from("feed.toml"))
        );
    }

    #[test]
    fn parse_positive_u64_rejects_zero_and_garbage() {
        assert_eq!(parse_positive_u64("12"), Ok(12));
        assert!(parse_positive_u64("0").is_err());
        assert!(parse_positive_u64("-3").is_err());
        assert!(parse_positive_u64("ten").is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = CliArgs::command().try_get_matches_from(["newsreel", "-q", "-v", "clear"]);
        assert!(result.is_err());
    }
}
