//! Collection stage: run a fixed set of crawlers on a worker pool and publish
//! every article they return.
//!
//! Failure policy is fail-fast per worker: a crawl or publish error ends that
//! worker's loop, while its siblings keep draining the task channel. The first
//! worker error becomes the error of the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, info, warn};

use newsreader_shared::{NewsReaderError, Result, article_id};

use crate::pool::{TaskReceiver, next_task, task_channel, worker_count};
use crate::traits::{Crawler, Publisher};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything a [`Collector`] is built from. Validated by [`Collector::new`].
#[derive(Default)]
pub struct CollectorConfig {
    /// Crawlers run once per [`Collector::run_once`]. May be empty.
    pub crawlers: Vec<Arc<dyn Crawler>>,
    /// Required.
    pub publisher: Option<Arc<dyn Publisher>>,
    /// Span all stage logging happens in. Required.
    pub logger: Option<Span>,
    /// Values below 1 are raised to 1.
    pub num_workers: usize,
}

/// Outcome of a successful collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    pub crawlers: usize,
    pub articles_published: usize,
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

pub struct Collector {
    crawlers: Vec<Arc<dyn Crawler>>,
    publisher: Arc<dyn Publisher>,
    log: Span,
    num_workers: usize,
}

impl Collector {
    /// Validate `config` and build a runnable stage.
    pub fn new(config: CollectorConfig) -> Result<Self> {
        let Some(log) = config.logger else {
            return Err(NewsReaderError::build("no logger provided"));
        };
        let Some(publisher) = config.publisher else {
            return Err(NewsReaderError::build("no publisher provided"));
        };
        let num_workers = worker_count(config.num_workers, &log);

        Ok(Self {
            crawlers: config.crawlers,
            publisher,
            log,
            num_workers,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Run every crawler once and publish the results.
    pub async fn run_once(&self) -> Result<CollectSummary> {
        self.run().instrument(self.log.clone()).await
    }

    async fn run(&self) -> Result<CollectSummary> {
        let (tasks, receiver) = task_channel::<Arc<dyn Crawler>>(self.num_workers);
        let published = Arc::new(AtomicUsize::new(0));

        info!(num_workers = self.num_workers, "setup worker pool");
        let mut workers = JoinSet::new();
        for worker in 0..self.num_workers {
            debug!(worker, "start collecting");
            workers.spawn(
                collect(
                    worker,
                    Arc::clone(&receiver),
                    Arc::clone(&self.publisher),
                    Arc::clone(&published),
                )
                .instrument(Span::current()),
            );
        }
        // Once every worker has stopped, the receiver is gone and sends fail.
        drop(receiver);

        info!(num_crawlers = self.crawlers.len(), "start collecting");
        for (i, crawler) in self.crawlers.iter().enumerate() {
            debug!(task = i, resource = crawler.name(), "add task");
            if tasks.send(Arc::clone(crawler)).await.is_err() {
                warn!(
                    skipped = self.crawlers.len() - i,
                    "all workers stopped, remaining crawlers not run"
                );
                break;
            }
        }
        drop(tasks);

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined
                .map_err(|e| NewsReaderError::Join(e.to_string()))
                .and_then(|result| result);
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    debug!(error = %e, "additional worker error");
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = CollectSummary {
            crawlers: self.crawlers.len(),
            articles_published: published.load(Ordering::Relaxed),
        };
        info!(
            crawlers = summary.crawlers,
            articles_published = summary.articles_published,
            "collection completed"
        );
        Ok(summary)
    }
}

/// Worker loop: one crawler per task, every article published individually.
async fn collect(
    worker: usize,
    tasks: TaskReceiver<Arc<dyn Crawler>>,
    publisher: Arc<dyn Publisher>,
    published: Arc<AtomicUsize>,
) -> Result<()> {
    while let Some(crawler) = next_task(&tasks).await {
        debug!(worker, resource = crawler.name(), "crawling resource");

        let articles = match crawler.crawl().await {
            Ok(articles) => articles,
            Err(e) => {
                error!(worker, resource = crawler.name(), error = %e, "crawl failed");
                return Err(NewsReaderError::Crawl {
                    resource: crawler.name().to_string(),
                    source: Box::new(e),
                });
            }
        };

        for article in articles {
            debug!(worker, title = %article.title, "publish article");
            let id = if article.id.is_empty() {
                article_id(&article)
            } else {
                article.id.clone()
            };

            if let Err(e) = publisher.publish(article).await {
                error!(worker, article_id = %id, error = %e, "publish failed");
                return Err(NewsReaderError::Publish {
                    article_id: id,
                    source: Box::new(e),
                });
            }
            published.fetch_add(1, Ordering::Relaxed);
        }
    }

    debug!(worker, "finished collecting");
    Ok(())
}
