//! Retrieval engine
//!
//! Drives the walker over the export tree, the scanner over each
//! day-file, and the store/transport pair over each attachment
//! descriptor: already-present (id, name) pairs are skipped without any
//! network traffic, misses are fetched through the authenticated
//! transport under a bounded concurrency limit and written to the store.
//!
//! The engine is event-driven: subscribers receive an [`Event`] per
//! channel entered, day-file scanned, and attachment outcome, so
//! long-running retrievals over large exports stay observable.

use crate::config::{Config, FailurePolicy};
use crate::error::{Error, Result};
use crate::scanner;
use crate::store::AttachmentStore;
use crate::transport::Transport;
use crate::types::{AttachmentDescriptor, Event, FailedAttachment, RunSummary};
use crate::walker;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrates attachment discovery, deduplication, and retrieval
///
/// Cloneable: all shared state is Arc-wrapped, so a clone can be moved
/// into a background task while the original keeps its event channel.
#[derive(Clone)]
pub struct RetrievalEngine {
    /// Pipeline configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Local attachment store, exclusively written by this engine during a run
    store: AttachmentStore,
    /// Authenticated transport capability (trait object over the auth mechanism)
    transport: Arc<dyn Transport>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl RetrievalEngine {
    /// Create an engine over the given configuration and transport
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let store = AttachmentStore::new(&config.store_dir);
        // Buffer of 1000 events lets slow subscribers lag without
        // blocking retrieval.
        let (event_tx, _rx) = broadcast::channel(1000);

        Self {
            config: Arc::new(config),
            store,
            transport,
            event_tx,
        }
    }

    /// Subscribe to progress events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls more than 1000 events
    /// behind observes a `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The engine's local attachment store
    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }

    /// The engine's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Emit an event to all subscribers
    ///
    /// If nobody is subscribed the event is silently dropped; retrieval
    /// never blocks on observers.
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run the full retrieval pipeline to completion
    ///
    /// Equivalent to [`run_with_cancellation`](Self::run_with_cancellation)
    /// with a token that is never cancelled.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_with_cancellation(&CancellationToken::new()).await
    }

    /// Run the retrieval pipeline, stopping cleanly if `cancel` fires
    ///
    /// Cancellation is observed between day-files: the current batch of
    /// fetches drains, the summary so far is returned as a normal
    /// completion, and everything already written to the store stays.
    ///
    /// An invalid configuration fails the run before any work starts.
    /// Per-attachment failures are governed by the configured
    /// [`FailurePolicy`]; discovery, parse, and store write errors abort
    /// the run regardless of policy. Partial store progress is never
    /// rolled back, so a re-run resumes via the dedup check.
    pub async fn run_with_cancellation(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        self.config.validate()?;

        let mut summary = RunSummary::new();
        // (id, name) pairs already scheduled this run: a second reference
        // to the same attachment is skipped even before its fetch lands.
        let mut seen: HashSet<(String, String)> = HashSet::new();

        info!(export_root = ?self.config.export_root, "building channel list");
        let channels = walker::list_channels(&self.config.export_root)?;

        'channels: for channel in &channels {
            info!(channel = %channel.name, "processing channel");
            self.emit(Event::ChannelStarted {
                channel: channel.name.clone(),
            });

            for day_file in &walker::list_day_files(channel)? {
                if cancel.is_cancelled() {
                    info!(channel = %channel.name, "cancellation requested, ending run");
                    break 'channels;
                }

                let items = scanner::scan(day_file)?;
                self.emit(Event::DayFileScanned {
                    channel: channel.name.clone(),
                    path: day_file.path.clone(),
                    attachments: items.len(),
                });

                let mut batch = Vec::new();
                for item in items {
                    summary.attempted += 1;
                    match item {
                        Ok(desc) => {
                            let key = (desc.id.clone(), desc.name.clone());
                            if self.store.has(&desc.id, &desc.name) || seen.contains(&key) {
                                debug!(id = %desc.id, name = %desc.name, "already retrieved, skipping");
                                summary.skipped += 1;
                                self.emit(Event::AttachmentSkipped {
                                    id: desc.id,
                                    name: desc.name,
                                });
                            } else {
                                seen.insert(key);
                                batch.push(desc);
                            }
                        }
                        Err(err) => {
                            self.record_failure(
                                &mut summary,
                                "unknown",
                                "unknown",
                                &channel.name,
                                err,
                            )?;
                        }
                    }
                }

                // Ordered buffered stream: concurrency is bounded by the
                // configured fetch limit, results arrive in descriptor
                // order, and returning early under the abort policy drops
                // the stream, cancelling any fetches still in flight.
                let mut fetches = futures::stream::iter(
                    batch.into_iter().map(|desc| self.fetch_one(desc)),
                )
                .buffered(self.config.fetch.max_concurrent_fetches);

                while let Some((desc, result)) = fetches.next().await {
                    match result {
                        Ok(bytes) => {
                            info!(id = %desc.id, name = %desc.name, bytes, "attachment retrieved");
                            summary.retrieved += 1;
                            self.emit(Event::AttachmentRetrieved {
                                id: desc.id,
                                name: desc.name,
                                bytes,
                            });
                        }
                        Err(err) if err.is_per_attachment() => {
                            // A failed pair is not "seen": a later
                            // reference to it gets its own attempt.
                            seen.remove(&(desc.id.clone(), desc.name.clone()));
                            self.record_failure(
                                &mut summary,
                                &desc.id,
                                &desc.name,
                                &channel.name,
                                err,
                            )?;
                        }
                        // Store write (and any other non-attachment) errors
                        // leave no safe way to proceed.
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        summary.finished_at = Utc::now();
        info!(
            attempted = summary.attempted,
            retrieved = summary.retrieved,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "retrieval run finished"
        );
        self.emit(Event::RunFinished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Record one failed attachment, aborting the run when configured to
    fn record_failure(
        &self,
        summary: &mut RunSummary,
        id: &str,
        name: &str,
        channel: &str,
        err: Error,
    ) -> Result<()> {
        warn!(id, name, channel, error = %err, "attachment failed");
        self.emit(Event::AttachmentFailed {
            id: id.to_string(),
            name: name.to_string(),
            error: err.to_string(),
        });
        summary.failed.push(FailedAttachment {
            id: id.to_string(),
            name: name.to_string(),
            channel: channel.to_string(),
            error: err.to_string(),
        });

        match self.config.fetch.failure_policy {
            FailurePolicy::Continue => Ok(()),
            FailurePolicy::Abort => Err(err),
        }
    }

    /// Fetch one attachment and write it to the store
    ///
    /// Each fetch owns its own buffer, so a failure leaves every other
    /// attachment's store state untouched.
    async fn fetch_one(&self, desc: AttachmentDescriptor) -> (AttachmentDescriptor, Result<u64>) {
        debug!(id = %desc.id, url = %desc.url, "fetching attachment");
        let result = async {
            let body = self.transport.get(&desc.url).await?;
            let bytes = body.len() as u64;
            self.store.write(&desc.id, &desc.name, &body).await?;
            Ok(bytes)
        }
        .await;
        (desc, result)
    }
}
