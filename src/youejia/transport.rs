//! ubus transport: envelope framing, pooled HTTP session and response
//! validation

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;

use super::models::{Payload, UbusRequest, JSONRPC_VERSION, UBUS_METHOD};
use crate::error::ApiError;

pub const UBUS_PATH: &str = "/ubus";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Incremented before every send, so the first request carries id 2.
const INITIAL_REQUEST_ID: u64 = 1;

struct Session {
    client: Option<Client>,
    /// Only sessions created here are released by `close()`.
    owned: bool,
}

pub struct UbusTransport {
    base_url: String,
    timeout: Duration,
    session: Mutex<Session>,
    request_id: AtomicU64,
}

impl UbusTransport {
    /// Transport that creates its own pooled client on first use
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            session: Mutex::new(Session {
                client: None,
                owned: true,
            }),
            request_id: AtomicU64::new(INITIAL_REQUEST_ID),
        }
    }

    /// Transport borrowing a caller-supplied client; `close()` leaves it alone
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            session: Mutex::new(Session {
                client: Some(client),
                owned: false,
            }),
            request_id: AtomicU64::new(INITIAL_REQUEST_ID),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, UBUS_PATH)
    }

    /// Send `[token, target, action, payload]` and return the result payload.
    pub async fn post(
        &self,
        token: &str,
        target: &str,
        action: &str,
        payload: &Payload,
    ) -> Result<Payload, ApiError> {
        let client = self.client().await?;
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let body = UbusRequest {
            id,
            jsonrpc: JSONRPC_VERSION,
            method: UBUS_METHOD,
            params: (token, target, action, payload),
        };

        tracing::debug!(
            "[YoueJia] POST {} id={} target={} action={}",
            UBUS_PATH,
            id,
            target,
            action
        );

        let resp = client.post(self.url()).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::warn!("[YoueJia] Request {} returned HTTP {}", id, status);
            return Err(ApiError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        // The server labels JSON as text/html, so the content type is ignored.
        let data: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON ({}): {}", e, text)))?;

        Self::extract_result(data)
    }

    /// Validate `{"result": [error_code, payload]}` and return the payload.
    pub fn extract_result(data: Value) -> Result<Payload, ApiError> {
        let mut envelope = match data {
            Value::Object(envelope) => envelope,
            other => {
                return Err(ApiError::MalformedResponse(format!(
                    "response is not an object: {}",
                    other
                )))
            }
        };

        let result = envelope.remove("result").ok_or_else(|| {
            ApiError::MalformedResponse(format!(
                "response has no result field: {}",
                Value::Object(envelope.clone())
            ))
        })?;

        let mut items = match result {
            Value::Array(items) if items.len() >= 2 && items[1].is_object() => items,
            other => {
                return Err(ApiError::MalformedResponse(format!(
                    "unexpected result shape: {}",
                    other
                )))
            }
        };

        let code = items[0].as_i64().ok_or_else(|| {
            ApiError::MalformedResponse(format!("error code is not an integer: {}", items[0]))
        })?;
        if code != 0 {
            return Err(ApiError::Remote(code));
        }

        match items.swap_remove(1) {
            Value::Object(payload) => Ok(payload),
            other => Err(ApiError::MalformedResponse(format!(
                "result payload is not an object: {}",
                other
            ))),
        }
    }

    /// Current pooled client, recreating it if a previous `close()` released it.
    async fn client(&self) -> Result<Client, ApiError> {
        let mut session = self.session.lock().await;
        if let Some(ref client) = session.client {
            return Ok(client.clone());
        }

        let client = Client::builder().timeout(self.timeout).build()?;
        session.client = Some(client.clone());
        session.owned = true;
        tracing::debug!("[YoueJia] HTTP session created (timeout: {:?})", self.timeout);

        Ok(client)
    }

    /// Release the pooled client if this transport created it. Idempotent.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if session.owned && session.client.take().is_some() {
            tracing::debug!("[YoueJia] HTTP session closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.session.lock().await.client.is_none()
    }
}
