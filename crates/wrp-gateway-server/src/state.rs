//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use wrp_gateway_auth::AuthChain;
use wrp_gateway_client::{ReqwestTransport, Transactor, Transport};
use wrp_gateway_core::MetricsSink;
use wrp_gateway_hooks::{HttpWebhookStore, WebhookStore, WebhookSynchronizer};

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use crate::translation::TranslationService;

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the HTTP handlers.
pub struct GatewayState<T, S>
where
    T: Transport,
    S: WebhookStore,
{
    /// Inbound authentication and authorization.
    pub auth: Arc<AuthChain>,
    /// Device request translation.
    pub translation: Arc<TranslationService<T>>,
    /// Webhook registrations; `None` when no store is configured.
    pub webhooks: Option<Arc<WebhookSynchronizer<S>>>,
    /// Renders `/metrics`; `None` when no exporter is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
}

impl<T, S> GatewayState<T, S>
where
    T: Transport,
    S: WebhookStore,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        auth: AuthChain,
        translation: TranslationService<T>,
        webhooks: Option<WebhookSynchronizer<S>>,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            translation: Arc::new(translation),
            webhooks: webhooks.map(Arc::new),
            metrics: None,
            config: Arc::new(config),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl GatewayState<ReqwestTransport, HttpWebhookStore> {
    /// Build every service from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a client cannot
    /// be created.
    pub fn from_config(config: GatewayConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ConfigError> {
        let policy = config.validate()?;

        let auth = config.auth_chain(Arc::clone(&metrics))?;
        let acquirer = config
            .auth_acquirer
            .as_ref()
            .map(crate::config::AcquirerConfig::build)
            .transpose()?;
        let transactor = Transactor::new(ReqwestTransport::new(&policy)?, &policy, Arc::clone(&metrics));
        let translation = TranslationService::new(transactor, acquirer, &config);

        let webhooks = match &config.webhook_store {
            Some(store) => {
                let store_policy = store.policy(&policy);
                let transactor = Transactor::new(
                    ReqwestTransport::new(&store_policy)?,
                    &store_policy,
                    Arc::clone(&metrics),
                );
                let acquirer = store
                    .auth
                    .as_ref()
                    .map(crate::config::AcquirerConfig::build)
                    .transpose()?;
                let client = HttpWebhookStore::new(&store.address, &store.bucket, transactor, acquirer)?;
                tracing::info!(
                    address = %store.address,
                    bucket = %store.bucket,
                    pull_interval = ?store.pull_interval,
                    "Webhook store configured"
                );
                Some(WebhookSynchronizer::new(client, store.pull_interval, metrics))
            }
            None => {
                tracing::info!("No webhook store configured; webhook endpoints disabled");
                None
            }
        };

        Ok(Self::new(config, auth, translation, webhooks))
    }
}

impl<T, S> Clone for GatewayState<T, S>
where
    T: Transport,
    S: WebhookStore,
{
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            translation: Arc::clone(&self.translation),
            webhooks: self.webhooks.clone(),
            metrics: self.metrics.clone(),
            config: Arc::clone(&self.config),
        }
    }
}
