//! RFC 7807 problem responses.
//!
//! Every non-HTML error surface of the proxy answers with
//! `application/problem+json`; validation failures extend the base
//! object with `invalid-params` as in RFC 7807 §3.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// MIME type for problem detail responses.
pub const CONTENT_PROBLEM_JSON: &str = "application/problem+json";

/// A problem details object per RFC 7807.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    /// HTTP status code for the response.
    pub status: u16,
    /// Short summary of the problem type.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Detailed description of this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI identifying the problem type.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub problem_type: String,
    /// URI identifying this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Problem {
    /// Creates a problem for the given status, titled with its
    /// canonical reason phrase.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            title: status.canonical_reason().unwrap_or_default().to_string(),
            detail: None,
            problem_type: format!("https://httpstatuses.com/{}", status.as_u16()),
            instance: None,
        }
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (status, [(header::CONTENT_TYPE, CONTENT_PROBLEM_JSON)], body).into_response()
    }
}

/// A problem object extended with per-field validation errors, as in
/// the form validation example of RFC 7807 §3.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationProblem {
    #[serde(flatten)]
    problem: Problem,
    #[serde(rename = "invalid-params", skip_serializing_if = "Vec::is_empty")]
    invalid_params: Vec<InvalidParam>,
}

/// A single failed field.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidParam {
    /// Name of the field that failed validation.
    pub name: String,
    /// Why it failed.
    pub reason: String,
}

impl ValidationProblem {
    /// Creates an empty validation problem for the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            problem: Problem::new(status),
            invalid_params: Vec::new(),
        }
    }

    /// Records a validation error for `field`.
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.invalid_params.push(InvalidParam {
            name: field.into(),
            reason: reason.into(),
        });
    }

    /// Whether any field failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.invalid_params.is_empty()
    }
}

impl IntoResponse for ValidationProblem {
    fn into_response(self) -> Response {
        let status = self.problem.status_code();
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (status, [(header::CONTENT_TYPE, CONTENT_PROBLEM_JSON)], body).into_response()
    }
}
