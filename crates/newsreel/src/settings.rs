use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use newsreel_fetch::FetchConfig;
use serde::{Deserialize, Serialize};

use crate::cli::{CliArgs, CliSources};

pub const DEFAULT_ACTIVATION_THRESHOLD: f32 = 200.0;
const CACHE_DIR_ENV: &str = "NEWSREEL_CACHE_DIR";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub(crate) cache: Option<CacheFileConfig>,
    pub(crate) fetch: Option<FetchFileConfig>,
    pub(crate) storage: Option<StorageFileConfig>,
    pub(crate) feed: Option<FeedFileConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct CacheFileConfig {
    pub(crate) dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct FetchFileConfig {
    pub(crate) max_bytes: Option<u64>,
    pub(crate) timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct StorageFileConfig {
    pub(crate) endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct FeedFileConfig {
    pub(crate) activation_threshold: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub cache_dir: PathBuf,
    pub fetch: FetchConfig,
    pub endpoint: Option<String>,
    /// Largest midpoint distance at which a feed cell may become active.
    pub activation_threshold: f32,
}

#[derive(Debug)]
pub struct ResolvedSettings {
    pub settings: EffectiveSettings,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<ResolvedSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    let env_cache_dir = env::var_os(CACHE_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    merge(cli, sources, file, config_path, env_cache_dir)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let config = load_file_config(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for candidate in [project_config_path(), default_config_path()]
        .into_iter()
        .flatten()
    {
        if candidate.exists() {
            let config = load_file_config(&candidate)?;
            return Ok((config, Some(candidate)));
        }
    }
    Ok((FileConfig::default(), None))
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
    env_cache_dir: Option<PathBuf>,
) -> Result<ResolvedSettings, ConfigError> {
    let FileConfig {
        cache: file_cache,
        fetch: file_fetch,
        storage: file_storage,
        feed: file_feed,
    } = file;

    let cache_cfg = file_cache.unwrap_or_default();
    let fetch_cfg = file_fetch.unwrap_or_default();
    let storage_cfg = file_storage.unwrap_or_default();
    let feed_cfg = file_feed.unwrap_or_default();

    let cache_dir = cli
        .cache_dir
        .clone()
        .or(env_cache_dir)
        .or(cache_cfg.dir)
        .unwrap_or_else(default_cache_dir);

    let max_bytes = resolve_positive(
        cli.max_bytes,
        fetch_cfg.max_bytes,
        !sources.max_bytes_from_cli,
        "fetch.max_bytes",
        config_path.as_ref(),
    )?;
    let timeout_secs = resolve_positive(
        cli.timeout_secs,
        fetch_cfg.timeout_secs,
        !sources.timeout_secs_from_cli,
        "fetch.timeout_secs",
        config_path.as_ref(),
    )?;

    let activation_threshold = resolve_activation_threshold(
        feed_cfg.activation_threshold,
        config_path.as_ref(),
    )?;

    let endpoint = normalize_string(cli.endpoint.clone())
        .or_else(|| normalize_string(storage_cfg.endpoint));

    let settings = EffectiveSettings {
        cache_dir,
        fetch: FetchConfig {
            max_bytes,
            timeout: Duration::from_secs(timeout_secs),
        },
        endpoint,
        activation_threshold,
    };

    Ok(ResolvedSettings {
        settings,
        config_path,
    })
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

pub(crate) fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join("newsreel"))
        .join("videos")
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("rs", "newsreel", "newsreel")
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join("newsreel.toml"))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn resolve_positive(
    cli_value: u64,
    file_value: Option<u64>,
    use_file: bool,
    field: &'static str,
    config_path: Option<&PathBuf>,
) -> Result<u64, ConfigError> {
    if use_file && let Some(value) = file_value {
        if value < 1 {
            return Err(ConfigError::InvalidValue {
                path: config_path.cloned(),
                field,
                value: value.to_string(),
            });
        }
        return Ok(value);
    }
    Ok(cli_value)
}

fn resolve_activation_threshold(
    file_value: Option<f32>,
    config_path: Option<&PathBuf>,
) -> Result<f32, ConfigError> {
    let Some(value) = file_value else {
        return Ok(DEFAULT_ACTIVATION_THRESHOLD);
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            path: config_path.cloned(),
            field: "feed.activation_threshold",
            value: value.to_string(),
        });
    }
    Ok(value)
}
