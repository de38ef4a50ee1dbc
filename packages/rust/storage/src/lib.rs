//! libSQL-backed event log (offline mode).
//!
//! [`EventLog`] is the durable queue between pipeline stages. Every published
//! article is appended as a JSON event to the stream named by its id and
//! tagged with an event type; consumers read one event type in append order.

mod migrations;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use newsreader_core::Queue;
use newsreader_shared::{Article, EventLogConfig, NewsReaderError, Result};

const CONTENT_TYPE_JSON: &str = "application/json";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tuning knobs for an [`EventLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLogOptions {
    /// Events read per query while consuming.
    pub batch_size: u64,
    /// Upper bound for a single append.
    pub timeout: Duration,
    /// Keep polling for new events at this interval once the log is drained.
    /// `None` closes the sink instead.
    pub follow: Option<Duration>,
}

impl Default for EventLogOptions {
    fn default() -> Self {
        Self {
            batch_size: 30,
            timeout: Duration::from_secs(10),
            follow: None,
        }
    }
}

impl EventLogOptions {
    pub fn from_config(config: &EventLogConfig, follow: bool) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            timeout: config.timeout(),
            follow: follow.then(|| config.follow_interval()),
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Durable, event-typed article queue.
pub struct EventLog {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    options: EventLogOptions,
}

impl EventLog {
    /// Open or create the log at `path`, applying pending migrations.
    pub async fn open(path: &Path, options: EventLogOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsReaderError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?;

        let log = Self { db, conn, options };
        log.run_migrations().await?;
        Ok(log)
    }

    pub fn options(&self) -> &EventLogOptions {
        &self.options
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsReaderError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            // Table doesn't exist yet
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Append `article` to its stream as an `event_type` event.
    #[instrument(skip_all, fields(article_id = %article.id, event_type = %event_type))]
    pub async fn append(&self, article: &Article, event_type: &str) -> Result<()> {
        debug!("publish article");

        let data = serde_json::to_string(article).map_err(|e| {
            NewsReaderError::Serialization(format!(
                "could not marshal article id={}: {e}",
                article.id
            ))
        })?;
        let event_id = Uuid::now_v7().to_string();
        let recorded_at = Utc::now().to_rfc3339();

        let insert = self.conn.execute(
            "INSERT INTO events (event_id, stream_id, event_type, content_type, data, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event_id.as_str(),
                article.id.as_str(),
                event_type,
                CONTENT_TYPE_JSON,
                data.as_str(),
                recorded_at.as_str()
            ],
        );

        match tokio::time::timeout(self.options.timeout, insert).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(NewsReaderError::Storage(format!(
                "could not append event_type={event_type} to stream_id={}: {e}",
                article.id
            ))),
            Err(_) => Err(NewsReaderError::Storage(format!(
                "could not append event_type={event_type} to stream_id={}: timed out after {:?}",
                article.id, self.options.timeout
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Every event of one article, oldest first, as `(event_type, article)`.
    pub async fn read_stream(&self, stream_id: &str) -> Result<Vec<(String, Article)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT event_type, data FROM events WHERE stream_id = ?1 ORDER BY position",
                params![stream_id],
            )
            .await
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?
        {
            let event_type = row
                .get::<String>(0)
                .map_err(|e| NewsReaderError::Storage(e.to_string()))?;
            let data = row
                .get::<String>(1)
                .map_err(|e| NewsReaderError::Storage(e.to_string()))?;
            let article = decode_article(&data)?;
            events.push((event_type, article));
        }
        Ok(events)
    }

    /// Up to `batch_size` raw `(position, data)` events of `event_type` after `after`.
    async fn read_batch(&self, event_type: &str, after: i64) -> Result<Vec<(i64, String)>> {
        let limit = i64::try_from(self.options.batch_size).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT position, data FROM events
                 WHERE event_type = ?1 AND position > ?2
                 ORDER BY position LIMIT ?3",
                params![event_type, after, limit],
            )
            .await
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?;

        let mut batch = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| NewsReaderError::Storage(e.to_string()))?
        {
            let position = row
                .get::<i64>(0)
                .map_err(|e| NewsReaderError::Storage(e.to_string()))?;
            let data = row
                .get::<String>(1)
                .map_err(|e| NewsReaderError::Storage(e.to_string()))?;
            batch.push((position, data));
        }
        Ok(batch)
    }

    /// Forward every `event_type` event into `sink`; dropping `sink` on return
    /// closes it.
    #[instrument(skip_all, fields(event_type = %event_type))]
    pub async fn subscribe(&self, event_type: &str, sink: mpsc::Sender<Article>) {
        debug!("consume");
        let mut after = 0_i64;

        loop {
            let batch = match self.read_batch(event_type, after).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "could not read events");
                    return;
                }
            };

            if batch.is_empty() {
                let Some(interval) = self.options.follow else {
                    debug!("event log drained");
                    return;
                };
                if sink.is_closed() {
                    return;
                }
                tokio::time::sleep(interval).await;
                continue;
            }

            for (position, data) in batch {
                after = position;
                let article = match decode_article(&data) {
                    Ok(article) => article,
                    Err(e) => {
                        error!(position, error = %e, "could not unmarshal article");
                        return;
                    }
                };
                debug!(
                    article_id = %article.id,
                    url = %article.url,
                    title = %article.title,
                    "forward article"
                );
                if sink.send(article).await.is_err() {
                    debug!("sink closed by receiver");
                    return;
                }
            }
        }
    }
}

fn decode_article(data: &str) -> Result<Article> {
    serde_json::from_str(data).map_err(|e| NewsReaderError::Serialization(e.to_string()))
}

#[async_trait]
impl Queue for EventLog {
    async fn publish(&self, article: &Article, event_type: &str) -> Result<()> {
        self.append(article, event_type).await
    }

    async fn consume(&self, event_type: &str, sink: mpsc::Sender<Article>) {
        self.subscribe(event_type, sink).await
    }
}
