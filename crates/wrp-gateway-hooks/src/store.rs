//! Remote webhook store client.
//!
//! The store keeps items in named buckets:
//!
//! - `PUT {address}/api/v1/store/{bucket}/{id}` creates or replaces an item
//! - `GET {address}/api/v1/store/{bucket}` lists every item in the bucket
//!
//! Item expiry is owned by the store via the item `ttl`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use wrp_gateway_auth::Acquirer;
use wrp_gateway_client::{OutboundRequest, ReqwestTransport, Transactor, Transport};

use crate::error::{HookError, Result};
use crate::types::Webhook;

/// Header naming the owner of a pushed item.
pub const OWNER_HEADER: HeaderName = HeaderName::from_static("x-midt-owner");

/// One item as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Item id.
    pub id: String,
    /// The serialized webhook.
    pub data: serde_json::Value,
    /// Seconds until the store expires the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl StoreItem {
    /// Wrap a validated webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook cannot be serialized.
    pub fn from_webhook(webhook: &Webhook) -> Result<Self> {
        let data = serde_json::to_value(webhook)
            .map_err(|e| HookError::InvalidWebhook(format!("failed to encode webhook: {e}")))?;
        Ok(Self {
            id: webhook.id(),
            data,
            ttl: Some(i64::try_from(webhook.ttl_secs()).unwrap_or(i64::MAX)),
        })
    }

    /// Decode the webhook carried by this item.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Store`] if the data is not a webhook.
    pub fn webhook(&self) -> Result<Webhook> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| HookError::Store(format!("item {} is not a webhook: {e}", self.id)))
    }
}

/// A remote bucket of webhook items.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Create or replace `item` on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store did not accept the item.
    async fn push(&self, item: &StoreItem, owner: &str) -> Result<()>;

    /// Fetch every item in the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket could not be read.
    async fn pull(&self) -> Result<Vec<StoreItem>>;
}

/// [`WebhookStore`] over HTTP, sending every call through a [`Transactor`].
pub struct HttpWebhookStore<T: Transport = ReqwestTransport> {
    bucket_url: String,
    transactor: Transactor<T>,
    acquirer: Option<Acquirer>,
}

impl<T: Transport> HttpWebhookStore<T> {
    /// Create a client for `bucket` at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidConfig`] if the address or bucket is empty.
    pub fn new(
        address: &str,
        bucket: &str,
        transactor: Transactor<T>,
        acquirer: Option<Acquirer>,
    ) -> Result<Self> {
        let address = address.trim_end_matches('/');
        if address.is_empty() {
            return Err(HookError::InvalidConfig("store address must not be empty".to_string()));
        }
        if bucket.is_empty() || bucket.contains('/') {
            return Err(HookError::InvalidConfig(format!("invalid store bucket {bucket:?}")));
        }
        Ok(Self {
            bucket_url: format!("{address}/api/v1/store/{bucket}"),
            transactor,
            acquirer,
        })
    }

    async fn authorize(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        let Some(acquirer) = &self.acquirer else {
            return Ok(request);
        };
        let value = acquirer.acquire().await?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| HookError::Store(format!("unusable store credential: {e}")))?;
        Ok(request.header(AUTHORIZATION, value))
    }
}

#[async_trait]
impl<T: Transport> WebhookStore for HttpWebhookStore<T> {
    async fn push(&self, item: &StoreItem, owner: &str) -> Result<()> {
        let body = serde_json::to_vec(item)
            .map_err(|e| HookError::Store(format!("failed to encode item: {e}")))?;
        let owner = HeaderValue::try_from(owner)
            .map_err(|e| HookError::Store(format!("invalid owner: {e}")))?;

        let request = OutboundRequest::new(Method::PUT, format!("{}/{}", self.bucket_url, item.id))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(OWNER_HEADER, owner)
            .body(Bytes::from(body));
        let request = self.authorize(request).await?;

        let response = self.transactor.execute(request).await?;
        if response.status.is_success() {
            Ok(())
        } else {
            Err(HookError::Store(format!(
                "push of item {} returned {}",
                item.id, response.status
            )))
        }
    }

    async fn pull(&self) -> Result<Vec<StoreItem>> {
        let request = self
            .authorize(OutboundRequest::new(Method::GET, self.bucket_url.clone()))
            .await?;

        let response = self.transactor.execute(request).await?;
        if !response.status.is_success() {
            return Err(HookError::Store(format!("pull returned {}", response.status)));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| HookError::Store(format!("invalid bucket listing: {e}")))
    }
}

/// In-memory [`WebhookStore`] with switchable failures.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MemoryWebhookStore {
    items: parking_lot::Mutex<std::collections::BTreeMap<String, (StoreItem, String)>>,
    fail_push: std::sync::atomic::AtomicBool,
    fail_pull: std::sync::atomic::AtomicBool,
    pulls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryWebhookStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make pushes fail (or succeed again).
    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make pulls fail (or succeed again).
    pub fn set_fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Insert an item directly, as another gateway instance would.
    pub fn insert(&self, item: StoreItem, owner: &str) {
        self.items.lock().insert(item.id.clone(), (item, owner.to_string()));
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Owner recorded for `id`.
    #[must_use]
    pub fn owner(&self, id: &str) -> Option<String> {
        self.items.lock().get(id).map(|(_, owner)| owner.clone())
    }

    /// Number of pulls served, including failed ones.
    #[must_use]
    pub fn pulls(&self) -> usize {
        self.pulls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn push(&self, item: &StoreItem, owner: &str) -> Result<()> {
        if self.fail_push.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(HookError::Store("push rejected".to_string()));
        }
        self.insert(item.clone(), owner);
        Ok(())
    }

    async fn pull(&self) -> Result<Vec<StoreItem>> {
        self.pulls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_pull.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(HookError::Store("pull failed".to_string()));
        }
        Ok(self.items.lock().values().map(|(item, _)| item.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wrp_gateway_client::{Deadline, RetryPolicy};
    use wrp_gateway_core::NoopSink;

    use super::*;
    use crate::types::tests::webhook;

    fn transactor() -> Transactor<ReqwestTransport> {
        Transactor::with_policies(
            ReqwestTransport::with_client(reqwest::Client::new()),
            RetryPolicy::none(),
            Deadline::new(Duration::from_secs(5)),
            Arc::new(NoopSink),
        )
    }

    fn item() -> StoreItem {
        let hook = webhook("https://subscriber.example.com/events")
            .validate(chrono::Utc::now())
            .unwrap();
        StoreItem::from_webhook(&hook).unwrap()
    }

    #[tokio::test]
    async fn push_puts_item_with_owner_and_auth() {
        let server = MockServer::start().await;
        let item = item();
        Mock::given(method("PUT"))
            .and(path(format!("/api/v1/store/hooks/{}", item.id)))
            .and(header("x-midt-owner", "client-1"))
            .and(header("authorization", "Basic c3RvcmU6cGFzcw=="))
            .and(body_partial_json(serde_json::json!({"id": item.id, "ttl": 300})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpWebhookStore::new(
            &server.uri(),
            "hooks",
            transactor(),
            Some(Acquirer::fixed("Basic c3RvcmU6cGFzcw==")),
        )
        .unwrap();
        store.push(&item, "client-1").await.unwrap();
    }

    #[tokio::test]
    async fn push_rejection_is_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = HttpWebhookStore::new(&server.uri(), "hooks", transactor(), None).unwrap();
        let err = store.push(&item(), "client-1").await.unwrap_err();
        assert!(matches!(err, HookError::Store(_)));
    }

    #[tokio::test]
    async fn pull_lists_bucket() {
        let server = MockServer::start().await;
        let item = item();
        Mock::given(method("GET"))
            .and(path("/api/v1/store/hooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![item.clone()]))
            .mount(&server)
            .await;

        let store = HttpWebhookStore::new(&format!("{}/", server.uri()), "hooks", transactor(), None)
            .unwrap();
        let items = store.pull().await.unwrap();
        assert_eq!(items, vec![item.clone()]);
        assert_eq!(items[0].webhook().unwrap().url(), "https://subscriber.example.com/events");
    }

    #[tokio::test]
    async fn pull_of_garbage_is_store_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let store = HttpWebhookStore::new(&server.uri(), "hooks", transactor(), None).unwrap();
        assert!(matches!(store.pull().await, Err(HookError::Store(_))));
    }

    #[test]
    fn config_is_validated() {
        assert!(HttpWebhookStore::new("", "hooks", transactor(), None).is_err());
        assert!(HttpWebhookStore::new("http://store", "", transactor(), None).is_err());
        assert!(HttpWebhookStore::new("http://store", "a/b", transactor(), None).is_err());
    }
}
