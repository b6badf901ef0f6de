//! REST to WRP translation.
//!
//! A device request arrives as REST, leaves as a JSON-encoded WRP message
//! posted to the device cluster, and the cluster's answer is rendered back
//! verbatim.

use std::collections::HashSet;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use wrp_gateway_auth::Acquirer;
use wrp_gateway_client::{OutboundRequest, TransactResponse, Transactor, Transport};
use wrp_gateway_core::wrp::{DEFAULT_PAYLOAD_CONTENT_TYPE, WRP_JSON_CONTENT_TYPE};
use wrp_gateway_core::{DeviceId, Message, TransactionId};

use crate::config::GatewayConfig;
use crate::error::ApiError;

/// Header echoing the WRP transaction id to the REST caller.
pub const TRANSACTION_ID_HEADER: HeaderName = HeaderName::from_static("x-webpa-transaction-id");

/// Metadata key carrying the REST method inside the WRP message.
pub const METHOD_METADATA_KEY: &str = "method";

/// One REST request bound for a device service.
#[derive(Debug)]
pub struct TranslationRequest<'a> {
    /// Device id as it appeared in the path.
    pub device_id: &'a str,
    /// Target service on the device.
    pub service: &'a str,
    /// REST method.
    pub method: &'a Method,
    /// REST content type, if any.
    pub content_type: Option<&'a str>,
    /// REST body, carried as the WRP payload.
    pub body: Bytes,
}

/// A downstream answer, rendered back to the REST caller as-is.
#[derive(Debug)]
pub struct ServiceResponse {
    /// Downstream status.
    pub status: StatusCode,
    /// Downstream body.
    pub body: Bytes,
    /// Transaction id of the WRP exchange, if one was made.
    pub transaction_id: Option<TransactionId>,
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        // Only a 200 is known to carry JSON.
        if self.status == StatusCode::OK {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(WRP_JSON_CONTENT_TYPE));
        }
        if let Some(tid) = self.transaction_id {
            if let Ok(value) = HeaderValue::try_from(tid.to_string()) {
                response.headers_mut().insert(TRANSACTION_ID_HEADER, value);
            }
        }
        response
    }
}

/// Translates device requests and forwards them through a [`Transactor`].
pub struct TranslationService<T: Transport> {
    transactor: Transactor<T>,
    acquirer: Option<Acquirer>,
    target_url: String,
    source: String,
    services: HashSet<String>,
    reduced_logging_codes: HashSet<u16>,
}

impl<T: Transport> TranslationService<T> {
    /// Create a service forwarding to the device cluster named in `config`.
    #[must_use]
    pub fn new(transactor: Transactor<T>, acquirer: Option<Acquirer>, config: &GatewayConfig) -> Self {
        Self {
            transactor,
            acquirer,
            target_url: config.target_url.trim_end_matches('/').to_string(),
            source: config.wrp_source.clone(),
            services: config.supported_services.iter().cloned().collect(),
            reduced_logging_codes: config
                .log
                .reduced_logging_response_codes
                .iter()
                .copied()
                .collect(),
        }
    }

    /// Returns `true` if requests may be translated for `service`.
    #[must_use]
    pub fn supports(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    /// Translate `request` into a WRP message and send it to the device.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for an unsupported service or a
    /// malformed device id (nothing is sent), and a 5xx error if the device
    /// cluster cannot be reached.
    pub async fn translate(&self, request: TranslationRequest<'_>) -> Result<ServiceResponse, ApiError> {
        if !self.supports(request.service) {
            tracing::debug!(service = request.service, "Rejected unsupported service");
            return Err(ApiError::BadRequest(format!(
                "unsupported service {:?}",
                request.service
            )));
        }
        let device = DeviceId::parse(request.device_id)
            .map_err(|e| ApiError::BadRequest(format!("invalid device id: {e}")))?;

        let transaction_id = TransactionId::generate();
        let content_type = request
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_PAYLOAD_CONTENT_TYPE);
        let message = Message::simple_request(self.source.as_str(), &device, request.service, transaction_id)
            .with_payload(content_type, request.body.to_vec())
            .with_metadata(METHOD_METADATA_KEY, request.method.as_str());
        let encoded = message.to_json().map_err(|e| {
            tracing::error!(error = %e, "Failed to encode WRP message");
            ApiError::Internal("failed to encode wrp message".to_string())
        })?;

        let outbound = OutboundRequest::new(Method::POST, format!("{}/api/v2/device", self.target_url))
            .header(CONTENT_TYPE, HeaderValue::from_static(WRP_JSON_CONTENT_TYPE))
            .body(encoded);
        let response = self.send(outbound).await?;
        self.log_transaction(&response, &message.dest, Some(transaction_id));

        Ok(ServiceResponse {
            status: response.status,
            body: response.body,
            transaction_id: Some(transaction_id),
        })
    }

    /// Fetch the connection status of a device.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for a malformed device id and a 5xx
    /// error if the device cluster cannot be reached.
    pub async fn get_status(&self, device_id: &str) -> Result<ServiceResponse, ApiError> {
        let device = DeviceId::parse(device_id)
            .map_err(|e| ApiError::BadRequest(format!("invalid device id: {e}")))?;

        let outbound = OutboundRequest::new(
            Method::GET,
            format!("{}/api/v2/device/{device}/stat", self.target_url),
        );
        let response = self.send(outbound).await?;
        self.log_transaction(&response, device.as_str(), None);

        Ok(ServiceResponse {
            status: response.status,
            body: response.body,
            transaction_id: None,
        })
    }

    async fn send(&self, request: OutboundRequest) -> Result<TransactResponse, ApiError> {
        let request = match &self.acquirer {
            Some(acquirer) => {
                let value = acquirer.acquire().await?;
                let value = HeaderValue::try_from(value).map_err(|e| {
                    tracing::error!(error = %e, "Acquired credential is not a valid header value");
                    ApiError::Internal("unusable outbound credential".to_string())
                })?;
                request.header(AUTHORIZATION, value)
            }
            None => request,
        };
        Ok(self.transactor.execute(request).await?)
    }

    fn log_transaction(&self, response: &TransactResponse, dest: &str, tid: Option<TransactionId>) {
        let code = response.status.as_u16();
        let tid = tid.map(|t| t.to_string()).unwrap_or_default();
        if self.reduced_logging_codes.contains(&code) {
            tracing::debug!(code, dest, tid = %tid, "Device transaction completed");
        } else {
            tracing::info!(code, dest, tid = %tid, "Device transaction completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};
    use wrp_gateway_client::{Deadline, ReqwestTransport, RetryPolicy, TimeoutPolicy};
    use wrp_gateway_core::{MessageType, NoopSink};

    use super::*;

    fn service(target: &str, acquirer: Option<Acquirer>) -> TranslationService<ReqwestTransport> {
        let config = GatewayConfig {
            target_url: target.to_string(),
            supported_services: vec!["config".into()],
            ..GatewayConfig::default()
        };
        let transactor = Transactor::with_policies(
            ReqwestTransport::new(&TimeoutPolicy::default()).unwrap(),
            RetryPolicy::none(),
            Deadline::new(Duration::from_secs(5)),
            Arc::new(NoopSink),
        );
        TranslationService::new(transactor, acquirer, &config)
    }

    fn request<'a>(service: &'a str, body: &'static str) -> TranslationRequest<'a> {
        TranslationRequest {
            device_id: "mac:11:22:33:44:55:66",
            service,
            method: &Method::POST,
            content_type: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn translates_into_wrp_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/device"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Basic ZGV2aWNlOnBhc3M="))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), Some(Acquirer::fixed("ZGV2aWNlOnBhc3M=")));
        let response = svc.translate(request("config", r#"{"x":1}"#)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(br#"{"ok":true}"#));

        let received: Vec<Request> = server.received_requests().await.unwrap();
        let message = Message::from_json(&received[0].body).unwrap();
        assert_eq!(message.msg_type, MessageType::SimpleRequestResponse);
        assert_eq!(message.dest, "mac:112233445566/config");
        assert_eq!(message.source, "dns:localhost");
        assert_eq!(message.content_type.as_deref(), Some("application/json"));
        assert_eq!(message.payload, br#"{"x":1}"#);
        assert_eq!(message.metadata["method"], "POST");
        assert_eq!(
            message.transaction_uuid,
            response.transaction_id.map(|t| t.to_string())
        );
    }

    #[tokio::test]
    async fn unsupported_service_never_reaches_downstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = service(&server.uri(), None)
            .translate(request("unknown", ""))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_device_is_bad_request() {
        let mut req = request("config", "");
        req.device_id = "mac:zz";
        let err = service("http://127.0.0.1:1", None).translate(req).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn explicit_content_type_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let mut req = request("config", "raw");
        req.content_type = Some("text/plain");
        let response = service(&server.uri(), None).translate(req).await.unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);

        let received = server.received_requests().await.unwrap();
        let message = Message::from_json(&received[0].body).unwrap();
        assert_eq!(message.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn status_is_fetched_from_stat_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/device/mac:112233445566/stat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not connected"))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server.uri(), None)
            .get_status("MAC:11-22-33-44-55-66")
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, Bytes::from_static(b"not connected"));
        assert!(response.transaction_id.is_none());
    }

    #[tokio::test]
    async fn status_rejects_ids_that_would_rewrite_the_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        for id in ["abc?", "abc#frag", "abc%2F"] {
            let err = service(&server.uri(), None).get_status(id).await.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{id}");
        }
    }

    #[tokio::test]
    async fn unreachable_cluster_is_internal_error() {
        // Nothing listens on port 1.
        let err = service("http://127.0.0.1:1", None)
            .translate(request("config", ""))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn only_ok_gets_json_content_type() {
        let ok = ServiceResponse {
            status: StatusCode::OK,
            body: Bytes::new(),
            transaction_id: Some(TransactionId::generate()),
        }
        .into_response();
        assert_eq!(ok.headers()[CONTENT_TYPE], "application/json");
        assert!(ok.headers().contains_key(TRANSACTION_ID_HEADER));

        let failed = ServiceResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Bytes::from_static(b"boom"),
            transaction_id: None,
        }
        .into_response();
        assert!(failed.headers().get(CONTENT_TYPE).is_none());
    }
}
