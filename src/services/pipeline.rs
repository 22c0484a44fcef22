//! Per-URL scrape pipeline and batch orchestration.
//!
//! Each worker owns its whole call chain (fetch → extract → complete →
//! upsert); workers only meet at the record store, which serializes writes.
//! Errors local to one URL never abort the batch; only a broken site config
//! or an unusable database do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::extract;
use crate::llm::CompletionClient;
use crate::repository::{PropertyRepository, SqlitePool, UpsertOutcome};
use crate::scrapers::Fetcher;
use crate::sites::SiteRegistry;
use crate::status::StatusReconciler;

/// Options for a batch run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Don't re-scrape URLs that already have a record.
    pub skip_existing: bool,
    /// Bounded worker pool size.
    pub workers: usize,
    /// Process at most this many inbox URLs (0 = all).
    pub limit: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_existing: false,
            workers: 2,
            limit: 0,
        }
    }
}

/// A URL that hard-failed during the run.
#[derive(Debug, Clone)]
pub struct FailedUrl {
    pub url: String,
    pub kind: &'static str,
    pub reason: String,
}

/// Outcome of one URL's pipeline.
#[derive(Debug, Clone)]
enum UrlOutcome {
    Created,
    Updated,
    Skipped,
    Failed { kind: &'static str, reason: String },
}

/// Counts for a whole batch run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: Vec<FailedUrl>,
    /// URLs never started because the run was interrupted.
    pub interrupted: usize,
    /// Ledger entries whose status was pushed into the store.
    pub status_synced: usize,
    /// Inbox URLs migrated into the ledger.
    pub absorbed: usize,
}

impl RunSummary {
    /// True when every processed URL either succeeded or was skipped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The full scrape pipeline, cloneable per worker.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<SiteRegistry>,
    fetcher: Arc<Fetcher>,
    completion: Arc<CompletionClient>,
    repo: PropertyRepository,
    reconciler: Arc<StatusReconciler>,
}

impl Pipeline {
    /// Build the pipeline from settings. Fails fast on a broken site
    /// config, before any network activity.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let registry = SiteRegistry::load(&settings.sites_path())
            .context("site configuration failed to load")?;
        let pool = SqlitePool::from_path(&settings.database_path());

        Ok(Self {
            registry: Arc::new(registry),
            fetcher: Arc::new(Fetcher::new(settings.fetch.clone())),
            completion: Arc::new(CompletionClient::new(settings.llm.clone())),
            repo: PropertyRepository::new(pool),
            reconciler: Arc::new(StatusReconciler::new(
                settings.ledger_path(),
                settings.inbox_path(),
            )),
        })
    }

    /// Run the full pipeline over the inbox.
    pub async fn run(&self, options: RunOptions) -> anyhow::Result<RunSummary> {
        self.repo.init_schema().await?;

        let mut summary = RunSummary::default();

        // Human edits land in the store before anything else happens.
        let sync_report = self.reconciler.sync(&self.repo).await?;
        summary.status_synced = sync_report.updated;

        let mut urls = self.reconciler.read_inbox()?;
        if options.limit > 0 {
            urls.truncate(options.limit);
        }
        summary.total = urls.len();
        if urls.is_empty() {
            return Ok(summary);
        }

        let progress = ProgressBar::new(urls.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("valid progress template"),
        );

        // An interrupt stops issuing new URLs; in-flight ones finish.
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let cancelled = cancelled.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing in-flight URLs");
                    cancelled.store(true, Ordering::SeqCst);
                }
            });
        }

        let workers = options.workers.max(1);
        let mut pending = urls.into_iter();
        let mut join_set: JoinSet<(String, UrlOutcome)> = JoinSet::new();
        let mut active = 0usize;
        let mut succeeded: Vec<String> = Vec::new();

        loop {
            while active < workers && !cancelled.load(Ordering::SeqCst) {
                let Some(url) = pending.next() else { break };
                let pipeline = self.clone();
                let skip_existing = options.skip_existing;
                progress.set_message(url.clone());
                join_set.spawn(async move {
                    let outcome = pipeline.process_url(&url, skip_existing).await;
                    (url, outcome)
                });
                active += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            active -= 1;
            progress.inc(1);

            let (url, outcome) = joined.context("worker task panicked")?;
            match outcome {
                UrlOutcome::Created => {
                    summary.created += 1;
                    succeeded.push(url);
                }
                UrlOutcome::Updated => {
                    summary.updated += 1;
                    succeeded.push(url);
                }
                UrlOutcome::Skipped => {
                    summary.skipped += 1;
                    // Already persisted; move it out of the inbox as well.
                    succeeded.push(url);
                }
                UrlOutcome::Failed { kind, reason } => {
                    error!(url = %url, kind, reason = %reason, "url failed");
                    summary.failed.push(FailedUrl { url, kind, reason });
                }
            }
        }
        progress.finish_and_clear();

        summary.interrupted = pending.count();

        // Successes leave the inbox and enter the ledger; failures stay in
        // the inbox for the next run.
        summary.absorbed = self.reconciler.absorb(&succeeded)?;

        Ok(summary)
    }

    /// Run one URL through fetch → extract → complete → upsert.
    async fn process_url(&self, url: &str, skip_existing: bool) -> UrlOutcome {
        let site = match self.registry.resolve(url) {
            Ok(site) => site,
            Err(e) => {
                return UrlOutcome::Failed {
                    kind: "unknown-site",
                    reason: e.to_string(),
                }
            }
        };

        // Check before fetching so skipped listings cost no network or
        // completion budget at all.
        if skip_existing {
            match self.repo.get_by_url(url).await {
                Ok(Some(_)) => {
                    debug!(url, "record exists, skipping pipeline");
                    return UrlOutcome::Skipped;
                }
                Ok(None) => {}
                Err(e) => {
                    return UrlOutcome::Failed {
                        kind: "store",
                        reason: e.to_string(),
                    }
                }
            }
        }

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                return UrlOutcome::Failed {
                    kind: "fetch",
                    reason: e.to_string(),
                }
            }
        };

        let extraction = extract::extract(site, &page);
        debug!(
            url,
            resolved = extraction.fields.len(),
            unresolved = extraction.unresolved.len(),
            "structured extraction done"
        );

        let fields = match self.completion.complete(site, &page, extraction).await {
            Ok(fields) => fields,
            Err(e) => {
                return UrlOutcome::Failed {
                    kind: "completion",
                    reason: e.to_string(),
                }
            }
        };

        match self.repo.upsert(url, &fields, false).await {
            Ok(UpsertOutcome::Created) => UrlOutcome::Created,
            Ok(UpsertOutcome::Updated) => UrlOutcome::Updated,
            Ok(UpsertOutcome::Skipped) => UrlOutcome::Skipped,
            Err(e) => UrlOutcome::Failed {
                kind: "store",
                reason: e.to_string(),
            },
        }
    }
}
