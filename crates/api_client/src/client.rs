//! Plan Choque HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Every endpoint
//! answers with the same envelope: `{ success, data | pdvs | user, message }`.

use std::sync::Arc;
use std::time::Duration;

use plan_choque_kpi::access::UserIdentity;
use plan_choque_kpi::draft::ImplementationPayload;
use plan_choque_kpi::{Advisor, DataScope, DateRange, KpiKind, KpiRecord, PointOfSale};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::credentials::CredentialProvider;
use crate::error::ApiError;

pub const USER_AGENT: &str = concat!("pchoque/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend API client (blocking). Cheap to share across threads.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.api_base)
            .field("credentials", &self.credentials.name())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        api_base: &str,
        timeout: Duration,
        credentials: impl CredentialProvider + 'static,
    ) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials: Arc::new(credentials),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    // ── Endpoints ───────────────────────────────────────────────────

    /// Who the current token belongs to.
    pub fn me(&self) -> Result<UserIdentity, ApiError> {
        let body = self.get("/api/auth/me", &[])?;
        let user = body
            .get("user")
            .or_else(|| body.get("data"))
            .cloned()
            .ok_or_else(|| ApiError::UnexpectedResponse("missing `user` in auth response".into()))?;
        decode(user)
    }

    pub fn advisors(&self, scope: &DataScope) -> Result<Vec<Advisor>, ApiError> {
        let body = self.get(&format!("/api/{}/asesores", scope.path_prefix()), &[])?;
        decode_list(body)
    }

    pub fn points_of_sale(&self, scope: &DataScope) -> Result<Vec<PointOfSale>, ApiError> {
        let body = self.get(&format!("/api/{}/puntos-venta", scope.path_prefix()), &[])?;
        decode_list(body)
    }

    /// Records of one KPI category. The date range is applied server-side.
    pub fn kpi(&self, kind: KpiKind, scope: &DataScope, range: &DateRange) -> Result<Vec<KpiRecord>, ApiError> {
        let mut query = Vec::new();
        if let Some(desde) = range.desde {
            query.push(("fecha_desde", desde.format("%Y-%m-%d").to_string()));
        }
        if let Some(hasta) = range.hasta {
            query.push(("fecha_hasta", hasta.format("%Y-%m-%d").to_string()));
        }

        let path = format!("/api/{}/kpi/{}", scope.path_prefix(), kind.slug());
        let items = list_items(self.get(&path, &query)?)?;
        items
            .into_iter()
            .map(|item| {
                KpiRecord::from_value(kind, item)
                    .map_err(|e| ApiError::UnexpectedResponse(format!("invalid {kind} record: {e}")))
            })
            .collect()
    }

    /// Submit an advisor's implementation form.
    pub fn submit_implementation(&self, payload: &ImplementationPayload) -> Result<(), ApiError> {
        let body = serde_json::to_value(payload).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;
        self.post_json("/api/asesor/implementaciones", &body)?;
        Ok(())
    }

    // ── Transport ───────────────────────────────────────────────────

    fn token(&self) -> Result<String, ApiError> {
        self.credentials.token().ok_or(ApiError::SessionExpired)
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_base, path);
        let request = self.http.get(&url).bearer_auth(self.token()?).query(query);
        self.send(&url, request)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_base, path);
        let request = self.http.post(&url).bearer_auth(self.token()?).json(body);
        self.send(&url, request)
    }

    fn send(&self, url: &str, request: reqwest::blocking::RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().map_err(|e| {
            tracing::warn!(url, error = %e, "request failed");
            ApiError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        tracing::debug!(url, status, "response");

        match status {
            401 => return Err(ApiError::SessionExpired),
            403 => return Err(ApiError::Forbidden),
            _ if !response.status().is_success() => {
                let body = response.text().unwrap_or_default();
                return Err(ApiError::Http(status, body));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .map_err(|e| ApiError::UnexpectedResponse(format!("invalid JSON: {e}")))?;
        check_envelope(body)
    }
}

// ── Envelope ────────────────────────────────────────────────────────

/// Reject `success: false`; pass everything else through.
fn check_envelope(body: Value) -> Result<Value, ApiError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body.get("message").and_then(Value::as_str).unwrap_or_default();
        return Err(ApiError::Rejected(message.to_string()));
    }
    Ok(body)
}

/// The list carried by an envelope: `data`, `pdvs`, or a bare array.
fn list_items(body: Value) -> Result<Vec<Value>, ApiError> {
    let list = match body {
        Value::Array(items) => return Ok(items),
        Value::Object(mut map) => map.remove("data").or_else(|| map.remove("pdvs")),
        _ => None,
    };
    match list {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        Some(other) => Err(ApiError::UnexpectedResponse(format!("expected a list, got {}", kind_of(&other)))),
        None => Err(ApiError::UnexpectedResponse("response has no data list".into())),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))
}

fn decode_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    list_items(body)?.into_iter().map(decode).collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
