//! # slack-export-dl
//!
//! Backend library for backfilling file attachments into Slack export
//! archives. A standard Slack export contains message records that
//! reference uploaded files but not the files themselves; this crate
//! walks the export tree, downloads every referenced attachment through
//! an authenticated transport, stores it in a local deduplicating cache,
//! and assembles an enriched archive containing both. It can also restore
//! the member email addresses Slack strips from the export's `users.json`
//! (see [`backfill_emails`]).
//!
//! ## Design Philosophy
//!
//! slack-export-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Resumable** - The store is the resume state; re-runs skip what is
//!   already on disk and never re-download
//! - **Event-driven** - Consumers subscribe to progress events, no polling
//!   required
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use slack_export_dl::{assemble, Config, RetrievalEngine, TokenTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         export_root: "./export".into(),
//!         store_dir: "./files".into(),
//!         ..Default::default()
//!     };
//!
//!     let transport = Arc::new(TokenTransport::new(
//!         "xoxp-...",
//!         Duration::from_secs(60),
//!     )?);
//!     let engine = RetrievalEngine::new(config, transport);
//!
//!     // Subscribe to progress events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = engine.run().await?;
//!     println!(
//!         "retrieved {} of {} attachments",
//!         summary.retrieved, summary.attempted
//!     );
//!
//!     assemble(
//!         engine.config().export_root.as_path(),
//!         engine.store(),
//!         "./export-with-files.zip".as_ref(),
//!     )?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Output archive assembly
pub mod assembler;
/// Configuration types
pub mod config;
/// User email backfill
pub mod emails;
/// Retrieval engine orchestration
pub mod engine;
/// Error types
pub mod error;
/// Day-file message scanning
pub mod scanner;
/// Local attachment store
pub mod store;
/// Authenticated HTTP transport
pub mod transport;
/// Core types and events
pub mod types;
/// Export tree traversal
pub mod walker;

// Re-export commonly used types
pub use assembler::{UPLOADS_PREFIX, assemble};
pub use config::{Config, FailurePolicy, FetchConfig};
pub use emails::{USERS_LIST_URL, backfill_emails, backfill_emails_from};
pub use engine::RetrievalEngine;
pub use error::{Error, Result};
pub use store::AttachmentStore;
pub use transport::{CookieTransport, TokenTransport, Transport};
pub use types::{
    AttachmentDescriptor, ChannelDirectory, DayFile, Event, FailedAttachment, RunSummary,
};

use tokio_util::sync::CancellationToken;

/// Helper function to run a retrieval with graceful signal handling.
///
/// Runs the engine to completion; if a termination signal arrives first,
/// the run is cancelled and the partial summary is returned. Everything
/// already written to the store stays, so a later run resumes where this
/// one stopped.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use slack_export_dl::{Config, RetrievalEngine, TokenTransport, run_with_shutdown};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = Arc::new(TokenTransport::new("xoxp-...", Duration::from_secs(60))?);
///     let engine = RetrievalEngine::new(Config::default(), transport);
///
///     // Run with automatic signal handling
///     let summary = run_with_shutdown(engine).await?;
///     println!("retrieved {}", summary.retrieved);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: RetrievalEngine) -> Result<RunSummary> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        watcher.cancel();
    });
    engine.run_with_cancellation(&cancel).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        _ => {
            tracing::warn!("Could not register unix signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
