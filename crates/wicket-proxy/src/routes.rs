//! HTTP route handlers for the device-flow proxy.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use wicket_flow::mint::{self, MintedCodes};
use wicket_flow::pkce;
use wicket_flow::{normalize_user_code, DeviceStatus, FlowRecord, FlowStore, StateRecord};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::extract::RequestMeta;
use crate::pages;
use crate::problem::{Problem, ValidationProblem};
use crate::upstream::{self, TokenExchange};

/// TTL applied once a flow completes: the bounded window the device
/// has to collect its token, and the longest a minted token sits in
/// memory.
const COMPLETION_TTL: Duration = Duration::from_secs(120);

/// Application state shared across handlers.
pub struct AppState {
    /// Proxy configuration, read-only after startup.
    pub config: ProxyConfig,
    /// TTL store binding the flow legs together.
    pub store: FlowStore,
    /// Outbound client for upstream token exchanges.
    pub http: reqwest::Client,
}

impl AppState {
    /// Builds application state from configuration.
    ///
    /// # Errors
    /// Returns an error if the outbound HTTP client fails to build.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let http = upstream::build_client(&config)?;
        Ok(Self {
            config,
            store: FlowStore::new(),
            http,
        })
    }
}

/// Creates the proxy router.
#[must_use = "returns the configured router"]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Device API
        .route("/device/code", post(device_authorization))
        .route("/device/token", post(device_token))
        // Browser routes
        .route("/device", get(device_entry))
        .route("/auth/verify_code", get(verify_code))
        .route("/auth/redirect", get(auth_redirect))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
}

// ============================================================================
// Request / response types
// ============================================================================

/// Form fields for `POST /device/code`. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct DeviceCodeForm {
    /// The client id to forward upstream.
    pub client_id: Option<String>,
    /// Space-delimited scope list.
    pub scope: Option<String>,
}

/// Success body for `POST /device/code`.
#[derive(Debug, Serialize)]
pub struct DeviceCodeResponse {
    /// Long opaque code the device will poll with.
    pub device_code: String,
    /// Short code the user enters at `verification_uri`.
    pub user_code: String,
    /// The proxy's own user-code entry page.
    pub verification_uri: String,
    /// Seconds until both codes expire.
    pub expires_in: u64,
    /// Minimum seconds the device must wait between polls.
    pub interval: u64,
}

/// Form fields for `POST /device/token`.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    /// The client id asserted at flow start.
    pub client_id: Option<String>,
    /// The device code being polled.
    pub device_code: Option<String>,
    /// Grant type; required but not matched against a specific value.
    pub grant_type: Option<String>,
}

/// RFC 8628 polling error body.
#[derive(Debug, Serialize)]
pub struct TokenPollError {
    /// OAuth error code (`authorization_pending`, `invalid_grant`).
    pub error: String,
    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Query parameters for `GET /device`.
#[derive(Debug, Deserialize)]
pub struct DevicePageParams {
    /// Optional code to pre-fill the form with.
    pub code: Option<String>,
}

/// Query parameters for `GET /auth/verify_code`.
#[derive(Debug, Deserialize)]
pub struct VerifyCodeParams {
    /// The human-entered user code; hyphens and lowercase accepted.
    pub code: Option<String>,
}

/// Query parameters for `GET /auth/redirect`.
#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    /// Authorization code minted by the upstream.
    pub code: Option<String>,
    /// CSRF state issued by `verify_code`.
    pub state: Option<String>,
}

// ============================================================================
// Handler implementations
// ============================================================================

/// Pulls a required field out of a form or query, recording a
/// validation error when it is missing or empty.
fn required<'a>(
    invalid: &mut ValidationProblem,
    name: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Some(v),
        None => {
            invalid.add(name, format!("{name} is a required field"));
            None
        }
    }
}

fn token_error(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(TokenPollError {
            error: error.to_string(),
            error_description: None,
        }),
    )
        .into_response()
}

/// 302 redirect. `Redirect::to` would answer 303; the device-flow
/// contract pins 302 Found.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

async fn health_check() -> &'static str {
    "OK"
}

/// `POST /device/code`: starts a flow and hands the device its codes.
async fn device_authorization(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Form(form): Form<DeviceCodeForm>,
) -> Response {
    let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
    let Some(client_id) = required(&mut invalid, "client_id", form.client_id.as_deref()) else {
        return invalid.into_response();
    };

    // Mint everything before the first store write so an RNG failure
    // leaves no partial state behind.
    let codes = match MintedCodes::generate() {
        Ok(codes) => codes,
        Err(e) => return ProxyError::from(e).into_response(),
    };

    let expires_in = state.config.expires_in();

    state.store.put_flow(
        &codes.user_code_normalized,
        FlowRecord {
            client_id: client_id.to_string(),
            scope: form.scope.clone().filter(|s| !s.is_empty()),
            device_code: codes.device_code.clone(),
            pkce_verifier: codes.pkce_verifier.clone(),
            client_secret: None,
        },
        expires_in,
    );
    state
        .store
        .put_device(&codes.device_code, DeviceStatus::pending(client_id), expires_in);

    tracing::info!(req_id = %meta.request_id, client_id = %client_id, "device flow started");

    Json(DeviceCodeResponse {
        device_code: codes.device_code,
        user_code: codes.user_code,
        verification_uri: state.config.verification_uri(),
        expires_in: state.config.expires_in_secs,
        interval: state.config.poll_interval_secs,
    })
    .into_response()
}

/// `POST /device/token`: the polling endpoint. Answers
/// `authorization_pending` until the browser leg completes, then
/// serves the captured token exactly once.
async fn device_token(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Form(form): Form<TokenForm>,
) -> Response {
    let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
    let client_id = required(&mut invalid, "client_id", form.client_id.as_deref());
    let device_code = required(&mut invalid, "device_code", form.device_code.as_deref());
    let grant_type = required(&mut invalid, "grant_type", form.grant_type.as_deref());
    let (Some(client_id), Some(device_code), Some(_)) = (client_id, device_code, grant_type)
    else {
        return invalid.into_response();
    };

    match state.store.get_device(device_code) {
        // Never issued, expired, or already collected are all
        // indistinguishable to the caller.
        None => token_error("invalid_grant"),
        // The code is bound to the client that opened the flow. A
        // mismatched caller learns nothing about the flow's state and
        // consumes nothing.
        Some(ref status) if status.client_id() != client_id => {
            tracing::warn!(
                req_id = %meta.request_id,
                client_id = %client_id,
                "device code polled with a different client_id"
            );
            token_error("invalid_grant")
        }
        Some(DeviceStatus::Pending { .. }) => token_error("authorization_pending"),
        Some(DeviceStatus::Complete { .. }) => {
            // Consume atomically: of any concurrent polls on the same
            // device code, exactly one receives the token.
            match state.store.take_device(device_code) {
                Some(DeviceStatus::Complete { token_response, .. }) => {
                    tracing::info!(req_id = %meta.request_id, "token delivered to device");
                    (
                        [(header::CONTENT_TYPE, "application/json")],
                        token_response,
                    )
                        .into_response()
                }
                _ => token_error("invalid_grant"),
            }
        }
    }
}

/// `GET /device`: serves the user-code entry form. No store access.
async fn device_entry(Query(params): Query<DevicePageParams>) -> Html<String> {
    Html(pages::device_page(params.code.as_deref().unwrap_or_default()))
}

/// `GET /auth/verify_code`: resolves the user code and bounces the
/// browser to the upstream authorization endpoint with a fresh PKCE
/// challenge and CSRF state.
async fn verify_code(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Query(params): Query<VerifyCodeParams>,
) -> Response {
    let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
    let Some(code) = required(&mut invalid, "code", params.code.as_deref()) else {
        return invalid.into_response();
    };

    let user_code = normalize_user_code(code);
    let Some(flow) = state.store.get_flow(&user_code) else {
        tracing::warn!(
            req_id = %meta.request_id,
            remote_ip = ?meta.remote_ip,
            user_agent = ?meta.user_agent,
            referer = ?meta.referer,
            "user code not found"
        );
        return Problem::new(StatusCode::BAD_REQUEST)
            .with_detail("Code not found")
            .into_response();
    };

    let csrf_state = match mint::new_state() {
        Ok(s) => s,
        Err(e) => return ProxyError::from(e).into_response(),
    };
    state.store.put_state(
        &csrf_state,
        StateRecord::new(user_code),
        state.config.expires_in(),
    );

    // The flow record stays: the redirect leg still needs the verifier
    // and client id for the token exchange.
    let challenge = pkce::compute_s256_challenge(&flow.pkce_verifier);

    let mut auth_url = match url::Url::parse(&state.config.authorization_endpoint) {
        Ok(u) => u,
        Err(e) => return ProxyError::from(e).into_response(),
    };
    {
        let mut query = auth_url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &flow.client_id)
            .append_pair("redirect_uri", &state.config.redirect_uri())
            .append_pair("state", &csrf_state)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");
        if let Some(scope) = flow.scope.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("scope", scope);
        }
    }

    found(auth_url.as_str())
}

/// `GET /auth/redirect`: the upstream sends the browser back here.
/// Exchanges the authorization code for a token and promotes the
/// device status to complete, or tears the flow down on refusal.
async fn auth_redirect(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    Query(params): Query<RedirectParams>,
) -> Response {
    let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
    let code = required(&mut invalid, "code", params.code.as_deref());
    let csrf_state = required(&mut invalid, "state", params.state.as_deref());
    let (Some(code), Some(csrf_state)) = (code, csrf_state) else {
        return invalid.into_response();
    };

    let Some(state_record) = state.store.get_state(csrf_state) else {
        tracing::warn!(
            req_id = %meta.request_id,
            remote_ip = ?meta.remote_ip,
            user_agent = ?meta.user_agent,
            referer = ?meta.referer,
            "unknown or replayed state parameter"
        );
        return Problem::new(StatusCode::BAD_REQUEST)
            .with_detail("The state parameter is invalid")
            .into_response();
    };

    let Some(flow) = state.store.get_flow(&state_record.user_code) else {
        return Problem::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_detail("No user_code found in cached state")
            .into_response();
    };

    let redirect_uri = state.config.redirect_uri();
    let outcome = match upstream::exchange_code(
        &state.http,
        &state.config.token_endpoint,
        TokenExchange {
            code,
            redirect_uri: &redirect_uri,
            client_id: &flow.client_id,
            code_verifier: &flow.pkce_verifier,
            client_secret: flow.client_secret.as_deref(),
            request_id: &meta.request_id,
        },
    )
    .await
    {
        Ok(outcome) => outcome,
        // Transport failure: keep all records so the user can retry
        // the redirect without restarting the device.
        Err(e) => {
            tracing::warn!(req_id = %meta.request_id, error = %e, "token exchange failed");
            return e.into_response();
        }
    };

    if !outcome.succeeded() {
        // Upstream refused: tear the whole flow down. The device's
        // next poll observes invalid_grant.
        state.store.delete_flow(&state_record.user_code);
        state.store.delete_device(&flow.device_code);
        state.store.delete_state(csrf_state);

        let body = String::from_utf8_lossy(&outcome.body);
        return (StatusCode::BAD_REQUEST, Html(pages::error_page(&body))).into_response();
    }

    // The completion write happens before anything else so a device
    // polling concurrently observes pending or the token, never a
    // lost update.
    state.store.put_device(
        &flow.device_code,
        DeviceStatus::Complete {
            client_id: flow.client_id.clone(),
            token_response: outcome.body,
        },
        COMPLETION_TTL,
    );
    state.store.delete_flow(&state_record.user_code);
    // States are single use; do not leave it to the TTL.
    state.store.delete_state(csrf_state);

    tracing::info!(req_id = %meta.request_id, client_id = %flow.client_id, "device flow completed");

    Html(pages::signed_in_page()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_accepts_present_value() {
        let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
        assert_eq!(
            required(&mut invalid, "client_id", Some("cli1")),
            Some("cli1")
        );
        assert!(!invalid.has_errors());
    }

    #[test]
    fn test_required_records_missing_and_empty() {
        let mut invalid = ValidationProblem::new(StatusCode::BAD_REQUEST);
        assert_eq!(required(&mut invalid, "client_id", None), None);
        assert_eq!(required(&mut invalid, "device_code", Some("")), None);
        assert_eq!(required(&mut invalid, "grant_type", Some("   ")), None);
        assert!(invalid.has_errors());
    }

    #[test]
    fn test_token_error_body() {
        let response = token_error("authorization_pending");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_found_sets_location() {
        let response = found("https://provider.example.com/auth?x=1");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://provider.example.com/auth?x=1"
        );
    }
}
