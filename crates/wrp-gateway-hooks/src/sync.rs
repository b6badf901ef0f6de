//! Local view of the shared webhook store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use wrp_gateway_core::MetricsSink;

use crate::error::Result;
use crate::store::{StoreItem, WebhookStore};
use crate::types::Webhook;

/// Counter of store pulls, labelled by outcome.
pub const PULLS_METRIC: &str = "webhook_store_pulls_total";

/// Counter of store pushes, labelled by outcome.
pub const PUSHES_METRIC: &str = "webhook_store_pushes_total";

/// Gauge of webhooks in the current snapshot.
pub const LIST_SIZE_METRIC: &str = "webhook_list_size";

/// Reconciles local registrations with a remote [`WebhookStore`].
///
/// Registrations are pushed synchronously; the listing is a snapshot that
/// is replaced wholesale by each successful pull, so readers never wait on
/// the store and never see a partial update. Every pull is numbered when it
/// starts, and a pull that finishes after a later-started one has been
/// applied is discarded.
pub struct WebhookSynchronizer<S: WebhookStore> {
    store: S,
    snapshot: RwLock<Snapshot>,
    pulls_started: AtomicU64,
    pull_interval: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: WebhookStore> WebhookSynchronizer<S> {
    /// Create a synchronizer with an empty snapshot.
    #[must_use]
    pub fn new(store: S, pull_interval: Duration, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::default()),
            pulls_started: AtomicU64::new(0),
            pull_interval,
            metrics,
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Validate `webhook` and push it to the store as owned by `owner`.
    ///
    /// Nothing changes locally unless the push succeeds; a successful push
    /// is followed by a refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the store rejects the push.
    pub async fn register(&self, webhook: Webhook, owner: &str) -> Result<Webhook> {
        let webhook = webhook.validate(chrono::Utc::now())?;
        let item = StoreItem::from_webhook(&webhook)?;

        if let Err(e) = self.store.push(&item, owner).await {
            tracing::error!(
                url = %webhook.url(),
                owner = owner,
                error = %e,
                "Failed to push webhook to store"
            );
            self.metrics
                .increment(PUSHES_METRIC, &[("outcome", "failure")]);
            return Err(e);
        }
        self.metrics
            .increment(PUSHES_METRIC, &[("outcome", "success")]);
        tracing::info!(url = %webhook.url(), owner = owner, id = %item.id, "Registered webhook");

        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Refresh after registration failed");
        }
        Ok(webhook)
    }

    /// The latest snapshot, sorted by subscriber URL.
    #[must_use]
    pub fn list(&self) -> Arc<Vec<Webhook>> {
        Arc::clone(&self.snapshot.read().hooks)
    }

    /// Pull the bucket and replace the snapshot.
    ///
    /// On failure the previous snapshot is kept, as it is when a pull
    /// started later has already been applied. Returns the size of the
    /// resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn refresh(&self) -> Result<usize> {
        let generation = self.pulls_started.fetch_add(1, Ordering::SeqCst) + 1;
        let items = match self.store.pull().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to pull webhooks; keeping previous list");
                self.metrics.increment(PULLS_METRIC, &[("outcome", "failure")]);
                return Err(e);
            }
        };

        let mut hooks: Vec<Webhook> = items
            .iter()
            .filter_map(|item| match item.webhook() {
                Ok(hook) => Some(hook),
                Err(e) => {
                    tracing::warn!(id = %item.id, error = %e, "Skipping undecodable store item");
                    None
                }
            })
            .collect();
        hooks.sort_by(|a, b| a.url().cmp(b.url()));

        let count = hooks.len();
        {
            let mut snapshot = self.snapshot.write();
            if generation < snapshot.generation {
                tracing::debug!(
                    generation,
                    current = snapshot.generation,
                    "Discarding pull overtaken by a newer one"
                );
                return Ok(snapshot.hooks.len());
            }
            *snapshot = Snapshot {
                generation,
                hooks: Arc::new(hooks),
            };
        }

        self.metrics.increment(PULLS_METRIC, &[("outcome", "success")]);
        #[allow(clippy::cast_precision_loss)]
        let size = count as f64;
        self.metrics.gauge(LIST_SIZE_METRIC, size, &[]);
        tracing::debug!(count, "Refreshed webhook list");
        Ok(count)
    }

    /// Pull once, then every `pull_interval` until `shutdown` fires.
    ///
    /// A zero interval performs the initial pull only.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        // Failures are logged inside refresh.
        let _ = self.refresh().await;

        if self.pull_interval.is_zero() {
            tracing::info!("Periodic webhook pulls disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.pull_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Webhook pull loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
            }
        }
    }
}

#[derive(Default)]
struct Snapshot {
    generation: u64,
    hooks: Arc<Vec<Webhook>>,
}
