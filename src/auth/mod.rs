//! PSK-based authentication and caller identity.
//!
//! The upstream gateway authenticates end users and forwards their id in `x-user-id`; this
//! service only checks the shared key the gateway presents. Key comparison is constant-time.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        });

    match provided {
        Some(key) if constant_time_compare(key, &expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            AppError::Unauthenticated("Invalid API key".to_string()).into_response()
        }
        None => AppError::Unauthenticated("Missing API key".to_string()).into_response(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Caller(id.to_string()))
            .ok_or_else(|| AppError::Unauthenticated("Missing caller identity".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(psk: Option<&str>) -> Router {
        let psk = psk.map(str::to_string);
        Router::new()
            .route("/whoami", get(|Caller(id): Caller| async move { id }))
            .layer(middleware::from_fn(move |req, next| {
                psk_auth_layer(psk.clone(), req, next)
            }))
    }

    async fn call(app: Router, headers: &[(&str, &str)]) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
        assert!(constant_time_compare("", ""));
    }

    #[tokio::test]
    async fn test_key_via_header_or_bearer() {
        let (status, body) = call(
            app(Some("secret")),
            &[(API_KEY_HEADER, "secret"), (USER_ID_HEADER, "u-1")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u-1");

        let (status, _) = call(
            app(Some("secret")),
            &[("authorization", "Bearer secret"), (USER_ID_HEADER, "u-1")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_wrong_key_is_unauthenticated() {
        let (status, body) = call(app(Some("secret")), &[(USER_ID_HEADER, "u-1")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("UNAUTHENTICATED"));

        let (status, _) = call(
            app(Some("secret")),
            &[(API_KEY_HEADER, "guess"), (USER_ID_HEADER, "u-1")],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_caller_identity_required() {
        let (status, _) = call(app(None), &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(app(None), &[(USER_ID_HEADER, "   ")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(app(None), &[(USER_ID_HEADER, " u-2 ")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u-2");
    }
}
