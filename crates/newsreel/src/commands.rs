use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use indicatif::{ProgressBar, ProgressStyle};
use newsreel_fetch::{FetchCoordinator, HttpObjectStorage};
use newsreel_store::ContentAddressableVideoStore;
use newsreel_types::{FeedItem, FetchError, VideoId};
use tracing::{info, warn};

use crate::cli::Command;
use crate::error::AppError;
use crate::manifest::load_manifest;
use crate::settings::EffectiveSettings;

const PREFETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Default)]
pub struct PrefetchReport {
    pub cached: Vec<(VideoId, PathBuf)>,
    pub failed: Vec<(VideoId, FetchError)>,
}

impl PrefetchReport {
    pub fn total(&self) -> usize {
        self.cached.len() + self.failed.len()
    }
}

pub async fn run(command: Command, settings: &EffectiveSettings) -> Result<(), AppError> {
    let store = Arc::new(ContentAddressableVideoStore::open(&settings.cache_dir)?);
    info!(cache_dir = %store.root().display(), "cache opened");

    match command {
        Command::Prefetch { feed } => {
            let manifest = load_manifest(&feed).await?;
            let storage = Arc::new(HttpObjectStorage::new(settings.endpoint.clone()));
            let fetcher = FetchCoordinator::new(store, storage, settings.fetch);
            let progress = ProgressBar::new(manifest.items.len() as u64);
            progress.set_style(prefetch_bar_style());

            let report = tokio::select! {
                report = prefetch(&fetcher, &manifest.items, Some(&progress)) => report,
                _ = tokio::signal::ctrl_c() => {
                    progress.abandon_with_message("interrupted");
                    return Err(AppError::Interrupted);
                }
            };
            progress.finish_with_message("done");
            print_report(&report);
            if report.failed.is_empty() {
                Ok(())
            } else {
                Err(AppError::PrefetchFailed {
                    failed: report.failed.len(),
                    total: report.total(),
                })
            }
        }
        Command::Status { feed } => {
            let manifest = load_manifest(&feed).await?;
            println!("{}", settings_summary(settings));
            let mut cached = 0;
            for (id, path) in cache_status(&store, &manifest.items) {
                match path {
                    Some(path) => {
                        cached += 1;
                        println!("cached   {id}  {}", path.display());
                    }
                    None => println!("missing  {id}"),
                }
            }
            println!("{cached}/{} cached", manifest.items.len());
            Ok(())
        }
        Command::Clear => {
            let removed = store.evict_all()?;
            println!("removed {removed} cached videos");
            Ok(())
        }
    }
}

/// Fetch every item, a few at a time. Items sharing an id share a download.
pub async fn prefetch(
    fetcher: &FetchCoordinator,
    items: &[FeedItem],
    progress: Option<&ProgressBar>,
) -> PrefetchReport {
    let mut results = stream::iter(items)
        .map(|item| async move {
            let result = fetcher.ensure_local(&item.id, &item.locator).await;
            (item.id.clone(), result)
        })
        .buffer_unordered(PREFETCH_CONCURRENCY);

    let mut report = PrefetchReport::default();
    while let Some((id, result)) = results.next().await {
        if let Some(progress) = progress {
            progress.set_message(id.to_string());
            progress.inc(1);
        }
        match result {
            Ok(path) => report.cached.push((id, path)),
            Err(err) => {
                warn!(id = %id, kind = err.kind(), error = %err, "prefetch failed");
                report.failed.push((id, err));
            }
        }
    }
    report
}

pub fn cache_status(
    store: &ContentAddressableVideoStore,
    items: &[FeedItem],
) -> Vec<(VideoId, Option<PathBuf>)> {
    items
        .iter()
        .map(|item| (item.id.clone(), store.resolved_path(&item.id)))
        .collect()
}

/// One-line description of the effective cache and feed settings.
pub fn settings_summary(settings: &EffectiveSettings) -> String {
    format!(
        "cache {}  max {} bytes  timeout {}s  activation threshold {}px  endpoint {}",
        settings.cache_dir.display(),
        settings.fetch.max_bytes,
        settings.fetch.timeout.as_secs(),
        settings.activation_threshold,
        settings.endpoint.as_deref().unwrap_or("-"),
    )
}

fn print_report(report: &PrefetchReport) {
    for (id, err) in &report.failed {
        eprintln!("failed   {id}: {err}");
    }
    println!(
        "{} cached, {} failed",
        report.cached.len(),
        report.failed.len()
    );
}

fn prefetch_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}
