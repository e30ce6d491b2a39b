//! Token exchange against the upstream OAuth 2.0 provider.
//!
//! The redirect leg converts the authorization code it received into
//! the access token the device is waiting for. The upstream response
//! body is opaque payload from the proxy's perspective: it is stored
//! and later returned to the device verbatim, never reformatted.

use std::time::Duration;

use serde::Deserialize;

use crate::config::ProxyConfig;
use crate::error::Result;

/// Hard ceiling on the whole exchange: connect, TLS, send, body read.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the outbound HTTP client used for token exchanges.
///
/// # Errors
/// Returns [`crate::ProxyError::Upstream`] if the TLS backend fails to
/// initialize.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(EXCHANGE_TIMEOUT)
        .danger_accept_invalid_certs(config.insecure_skip_verify)
        .build()?)
}

/// Parameters of one authorization-code exchange.
#[derive(Debug)]
pub struct TokenExchange<'a> {
    /// Authorization code returned by the upstream redirect.
    pub code: &'a str,
    /// Redirect URI, bit-exact with the authorization request.
    pub redirect_uri: &'a str,
    /// Client id the device asserted at flow start.
    pub client_id: &'a str,
    /// PKCE verifier minted for this flow.
    pub code_verifier: &'a str,
    /// Confidential-client secret, if the flow carries one.
    pub client_secret: Option<&'a str>,
    /// Request id of the redirect leg, forwarded so the exchange can
    /// be correlated across the proxy and the upstream.
    pub request_id: &'a str,
}

/// Result of a completed (transport-successful) exchange.
#[derive(Debug)]
pub struct ExchangeOutcome {
    /// Raw upstream response body, to be handed to the device verbatim.
    pub body: Vec<u8>,
    /// The `access_token` field extracted from the body, if present.
    pub access_token: Option<String>,
}

impl ExchangeOutcome {
    /// Whether the upstream minted a token. Anything else (an error
    /// body, an empty token, a non-JSON payload) is an authentication
    /// failure.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Exchanges an authorization code for a token at the upstream.
///
/// Transport failures surface as errors (the flow is kept so the user
/// can retry); an upstream refusal comes back as an unsuccessful
/// [`ExchangeOutcome`] carrying the diagnostic body.
///
/// # Errors
/// Returns [`crate::ProxyError::Upstream`] on DNS, connect, TLS,
/// timeout, or body-read failure.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    exchange: TokenExchange<'_>,
) -> Result<ExchangeOutcome> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", exchange.code),
        ("redirect_uri", exchange.redirect_uri),
        ("client_id", exchange.client_id),
        ("code_verifier", exchange.code_verifier),
    ];
    if let Some(secret) = exchange.client_secret.filter(|s| !s.is_empty()) {
        form.push(("client_secret", secret));
    }

    let mut request = client.post(token_endpoint).form(&form);
    if !exchange.request_id.is_empty() {
        request = request.header(crate::extract::REQUEST_ID_HEADER, exchange.request_id);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    if !status.is_success() {
        tracing::warn!(%status, "upstream refused the token exchange");
    }

    let access_token = extract_access_token(&body);
    Ok(ExchangeOutcome { body, access_token })
}

/// Pulls `access_token` out of a JSON body, tolerating anything else.
fn extract_access_token(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct TokenBody {
        #[serde(default)]
        access_token: String,
    }

    serde_json::from_slice::<TokenBody>(body)
        .ok()
        .map(|t| t.access_token)
        .filter(|t| !t.is_empty())
}
