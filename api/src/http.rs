//! reqwest-backed [`ApiClient`].

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use sitekit_config::ResolvedApiConfig;
use url::Url;

use crate::{ApiClient, ApiError, ApiFut, ApiRequest, encode_query_pairs};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const NONCE_HEADER: &str = "X-WP-Nonce";
const MAX_ERROR_MESSAGE_BYTES: usize = 1024;

/// HTTP client for the Site Kit REST routes of one WordPress site.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(config: &ResolvedApiConfig) -> Result<Self, reqwest::Error> {
        let mut default_headers = HeaderMap::new();
        if let Some(nonce) = config.nonce.as_deref() {
            match HeaderValue::from_str(nonce) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    default_headers.insert(NONCE_HEADER, value);
                }
                Err(_) => tracing::warn!("Ignoring REST nonce with invalid header characters"),
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Absolute URL of a request's route, without query arguments.
    #[must_use]
    pub fn endpoint(&self, request: &ApiRequest) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{}", request.route()));
        url.set_query(None);
        url
    }

    async fn fetch_get(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let mut url = self.endpoint(request);
        let pairs = encode_query_pairs(&request.data);
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }
        tracing::debug!(url = %url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn fetch_set(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let url = self.endpoint(request);
        tracing::debug!(url = %url, "POST");
        let body = json!({ "data": request.data });
        self.send(self.client.post(url).json(&body)).await
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!("REST request failed: {e}");
            ApiError::new("fetch_error", e.to_string())
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            ApiError::new("fetch_error", e.to_string()).with_status(status.as_u16())
        })?;
        let body: Option<Value> = if bytes.iter().all(u8::is_ascii_whitespace) {
            Some(Value::Null)
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        if status.is_success() {
            return body.ok_or_else(|| {
                ApiError::new("invalid_json", "Response body is not valid JSON")
                    .with_status(status.as_u16())
            });
        }

        let error = error_from_response(status, body.as_ref(), &bytes);
        tracing::warn!(
            status = status.as_u16(),
            code = %error.code,
            "REST request returned an error"
        );
        Err(error)
    }
}

impl ApiClient for HttpApiClient {
    fn get<'a>(&'a self, request: &'a ApiRequest) -> ApiFut<'a> {
        Box::pin(self.fetch_get(request))
    }

    fn set<'a>(&'a self, request: &'a ApiRequest) -> ApiFut<'a> {
        Box::pin(self.fetch_set(request))
    }
}

fn error_from_response(status: StatusCode, body: Option<&Value>, raw: &[u8]) -> ApiError {
    if let Some(error) = body.and_then(ApiError::from_body) {
        return if error.status().is_some() {
            error
        } else {
            error.with_status(status.as_u16())
        };
    }

    let text = String::from_utf8_lossy(raw);
    let message = if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unexpected response status")
            .to_string()
    } else {
        truncate(text.trim(), MAX_ERROR_MESSAGE_BYTES)
    };
    ApiError::new("http_error", message).with_status(status.as_u16())
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &text[..end])
}
