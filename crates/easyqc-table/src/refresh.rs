//! Background rebuilds of the aggregated rating tables.
//!
//! Each [`ReindexWorker::request`] bumps a generation counter and rescans on
//! a blocking thread. A scan checks the counter between files and gives up
//! as soon as a newer request exists. Finished snapshots are published whole
//! through a `watch` channel, and an older generation never replaces a newer
//! one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aggregate::{aggregate_until, Aggregation};

/// A published aggregation and the request that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// 0 until the first rebuild completes.
    pub generation: u64,
    pub aggregation: Aggregation,
}

/// Rebuilds aggregation snapshots for one rating directory.
#[derive(Debug)]
pub struct ReindexWorker {
    rating_root: PathBuf,
    generation: Arc<AtomicU64>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl ReindexWorker {
    pub fn new(rating_root: impl Into<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            rating_root: rating_root.into(),
            generation: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        let current = self.tx.borrow();
        Arc::clone(&*current)
    }

    /// Generation of the most recent request.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a rebuild, superseding any scan in progress.
    ///
    /// The handle resolves to `true` when this rebuild was published and
    /// `false` when it was cancelled or overtaken. Must be called from within
    /// a tokio runtime.
    pub fn request(&self) -> JoinHandle<bool> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let counter = Arc::clone(&self.generation);
        let root = self.rating_root.clone();
        let tx = self.tx.clone();
        tracing::debug!("reindex requested (generation {})", generation);

        tokio::task::spawn_blocking(move || {
            let superseded = || counter.load(Ordering::SeqCst) != generation;
            let Some(aggregation) = aggregate_until(&root, &superseded) else {
                tracing::debug!("reindex generation {} cancelled", generation);
                return false;
            };
            let snapshot = Arc::new(Snapshot {
                generation,
                aggregation,
            });
            let published = tx.send_if_modified(|current| {
                if current.generation < generation && !superseded() {
                    *current = snapshot;
                    true
                } else {
                    false
                }
            });
            if published {
                tracing::info!("published reindex generation {}", generation);
            } else {
                tracing::debug!("reindex generation {} overtaken", generation);
            }
            published
        })
    }

    /// Request a rebuild and wait for it. Returns the new snapshot, or `None`
    /// if a newer request superseded this one.
    pub async fn refresh(&self) -> Option<Arc<Snapshot>> {
        match self.request().await {
            Ok(true) => Some(self.latest()),
            Ok(false) => None,
            Err(e) => {
                tracing::error!("reindex task failed: {}", e);
                None
            }
        }
    }
}
