//! Authenticated request execution
//!
//! `AuthenticatedClient` joins a path onto its service's base URL, attaches
//! the current access token, sends the request with a fixed per-call
//! timeout, and maps the response onto the error taxonomy. A 401 on an
//! authenticated request goes through the `RefreshCoordinator` and is
//! replayed exactly once with the refreshed token.

use std::sync::Arc;
use std::time::Duration;

use auth_store::{DEFAULT_TIMEOUT, join_url};
use bytes::Bytes;
use common::Secret;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, debug_span, warn};

use crate::auth_style::AuthStyle;
use crate::error::{Error, Result};
use crate::refresh::{AccessSnapshot, RefreshCoordinator};

/// Correlates a request and its replay in server logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-service client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Short service label for logs and metrics (e.g. "profile").
    pub service: String,
    pub base_url: String,
    pub timeout: Duration,
    pub auth_style: AuthStyle,
}

impl ClientConfig {
    pub fn new(service: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            auth_style: AuthStyle::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth_style(mut self, auth_style: AuthStyle) -> Self {
        self.auth_style = auth_style;
        self
    }
}

/// A file sent as one part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    fn to_part(&self) -> Result<Part> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)
            .map_err(|e| {
                Error::Validation(format!("invalid content type {}: {e}", self.content_type))
            })
    }
}

/// Request payload. Kept by value so a replay sends identical content.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(Vec<FilePart>),
}

impl RequestBody {
    pub fn json<B: Serialize + ?Sized>(body: &B) -> Result<Self> {
        serde_json::to_value(body)
            .map(RequestBody::Json)
            .map_err(|e| Error::Validation(format!("request body is not valid JSON: {e}")))
    }
}

/// Extra per-request settings.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    /// Send without credentials and never enter the refresh protocol.
    pub anonymous: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for login/register style calls.
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A 2xx response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body. An empty body decodes as JSON `null`; a body that
    /// does not match `T` is a `Remote` error carrying the response status.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        parsed.map_err(|e| Error::Remote {
            status: self.status.as_u16(),
            message: format!("unexpected response shape: {e}"),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client bound to one backend service.
///
/// Cheap to clone; clones share the connection pool and the refresh
/// coordinator.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    config: ClientConfig,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthenticatedClient {
    pub fn new(
        http: reqwest::Client,
        config: ClientConfig,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            config,
            coordinator,
        }
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, RequestOptions::new())
            .await?
            .json()
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(Method::POST, path, Some(body), RequestOptions::new())
            .await?
            .json()
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(Method::PUT, path, Some(body), RequestOptions::new())
            .await?
            .json()
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, RequestOptions::new())
            .await?
            .json()
    }

    /// `request` followed by typed decoding of the body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(method, path, body, options).await?.json()
    }

    /// `request` for endpoints whose body carries nothing of interest.
    pub async fn request_unit(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<()> {
        self.request(method, path, body, options).await.map(|_| ())
    }

    /// Send a request relative to the base URL.
    ///
    /// Returns the response on 2xx. Non-2xx statuses become `Remote`
    /// errors, except a 401 on an authenticated request, which refreshes
    /// the session and replays once.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let url = join_url(&self.config.base_url, path);
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let span = debug_span!(
            "api_request",
            service = %self.config.service,
            method = %method,
            path,
            request_id = %request_id,
        );
        self.execute(method, url, body, options, request_id)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        method: Method,
        url: String,
        body: Option<RequestBody>,
        options: RequestOptions,
        request_id: String,
    ) -> Result<ApiResponse> {
        let access = if options.anonymous {
            AccessSnapshot::anonymous()
        } else {
            self.coordinator.current_access().await?
        };

        let response = self
            .send_once(
                &method,
                &url,
                body.as_ref(),
                &options,
                access.token.as_ref(),
                &request_id,
            )
            .await?;

        if response.status != StatusCode::UNAUTHORIZED || access.token.is_none() {
            return check_status(response);
        }

        debug!(epoch = access.epoch, "access token rejected, refreshing");
        let fresh = self.coordinator.on_unauthorized(access.epoch).await?;
        let replay = self
            .send_once(
                &method,
                &url,
                body.as_ref(),
                &options,
                Some(&fresh),
                &request_id,
            )
            .await?;
        if replay.status == StatusCode::UNAUTHORIZED {
            warn!("replayed request rejected with refreshed token");
        }
        check_status(replay)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&RequestBody>,
        options: &RequestOptions,
        token: Option<&Secret<String>>,
        request_id: &str,
    ) -> Result<ApiResponse> {
        let mut headers = options.headers.clone();
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        if let Some(token) = token {
            self.config.auth_style.apply(&mut headers, token.expose())?;
        }

        let mut builder = self
            .http
            .request(method.clone(), url)
            .timeout(self.config.timeout)
            .headers(headers);
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart(files)) => {
                let mut form = Form::new();
                for file in files {
                    form = form.part(file.field.clone(), file.to_part()?);
                }
                builder.multipart(form)
            }
            None => builder,
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                crate::metrics::record_request(&self.config.service, 0);
                warn!(error = %e, timeout = e.is_timeout(), "request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        crate::metrics::record_request(&self.config.service, status.as_u16());
        debug!(
            status = status.as_u16(),
            authenticated = token.is_some(),
            "response received"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

fn check_status(response: ApiResponse) -> Result<ApiResponse> {
    if response.status.is_success() {
        return Ok(response);
    }
    Err(Error::Remote {
        status: response.status.as_u16(),
        message: remote_message(response.status, &response.body),
    })
}

/// Error text for a non-2xx response: the body's `message` field, else its
/// `error` field, else the status reason.
fn remote_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        let candidates = [
            value.get("message"),
            value.get("error"),
            value.pointer("/error/message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(msg) = candidate.as_str().filter(|m| !m.is_empty()) {
                return msg.to_string();
            }
        }
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
}
