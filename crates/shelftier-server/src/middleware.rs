use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::api::ApiError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared secret guarding configuration writes.
#[derive(Clone)]
pub struct AdminGate {
    token: Option<Arc<str>>,
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("configured", &self.token.is_some())
            .finish()
    }
}

impl AdminGate {
    #[must_use]
    pub fn new(token: Option<&str>) -> Self {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!("SHELFTIER_ADMIN_TOKEN not set; config writes will be refused");
        }
        Self {
            token: token.map(Arc::from),
        }
    }
}

fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is inserted into request
/// extensions as [`RequestId`] and echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Requires `X-Admin-Token` to equal the configured admin token.
///
/// With no token configured every request is refused with
/// `admin_token_unset` (500).
pub async fn require_admin_token(
    State(gate): State<AdminGate>,
    req: Request,
    next: Next,
) -> Response {
    let req_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let Some(expected) = gate.token.as_deref() else {
        return ApiError::new(req_id, "admin_token_unset", "admin token is not configured")
            .into_response();
    };

    let presented = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if token_matches(expected, presented) {
        next.run(req).await
    } else {
        tracing::warn!(request_id = %req_id, "rejected config write with bad admin token");
        ApiError::new(req_id, "unauthorized", "missing or invalid admin token").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
        assert!(!token_matches("s3cret", "S3CRET"));
        assert!(!token_matches("s3cret", ""));
    }

    #[test]
    fn blank_admin_token_counts_as_unset() {
        assert!(AdminGate::new(Some("   ")).token.is_none());
        assert!(AdminGate::new(None).token.is_none());
        assert_eq!(AdminGate::new(Some(" abc ")).token.as_deref(), Some("abc"));
    }

    #[test]
    fn debug_hides_admin_token() {
        let rendered = format!("{:?}", AdminGate::new(Some("topsecret")));
        assert!(!rendered.contains("topsecret"));
    }
}
