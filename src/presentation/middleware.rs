//! Admission request filter
//!
//! Maps engine outcomes onto HTTP: blacklist hit -> 403 with a
//! machine-readable reason, rate limit hit -> 429 with remaining-count
//! metadata, replay/stale/missing nonce -> 400. Allowed requests continue
//! down the stack with `X-RateLimit-*` headers attached.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::application::admission::AdmissionService;
use crate::domain::admission::{
    AdmissionOutcome, InboundAction, NonceEnvelope, RateLimitDecision, RejectReason,
};
use crate::domain::events::RequestProfile;
use crate::domain::keys::LimitKey;

use super::models::ErrorResponse;

/// Shared state for the admission filter
pub struct AdmissionFilterState {
    pub service: Arc<AdmissionService>,
    /// Operation name resolved for every request through this filter
    pub operation: Option<String>,
    /// Whether requests through this filter must carry a nonce
    pub nonce_required: bool,
}

impl AdmissionFilterState {
    pub fn new(service: Arc<AdmissionService>) -> Self {
        Self {
            service,
            operation: None,
            nonce_required: false,
        }
    }

    /// Client identity: X-Forwarded-For first hop, then X-Real-IP.
    fn client_ip(request: &Request) -> String {
        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get("x-real-ip")
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| "unknown-ip".to_string())
    }

    fn nonce_envelope(request: &Request) -> Option<NonceEnvelope> {
        let value = request
            .headers()
            .get("x-nonce")
            .and_then(|h| h.to_str().ok())?
            .to_string();
        let client_timestamp = request
            .headers()
            .get("x-timestamp")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())?;
        Some(NonceEnvelope {
            value,
            client_timestamp,
        })
    }

    fn action_for(&self, request: &Request) -> InboundAction {
        let identity = Self::client_ip(request);
        let user_agent = request
            .headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        InboundAction {
            identity: identity.clone(),
            limit_key: LimitKey::Ip(identity.clone()),
            operation: self.operation.clone(),
            nonce: Self::nonce_envelope(request),
            nonce_required: self.nonce_required,
            request: Some(RequestProfile {
                identity,
                user_agent,
                path: request.uri().path().to_string(),
            }),
            movement: None,
            trade: None,
        }
    }
}

/// Admission middleware: decide before the handler runs.
pub async fn admission_middleware(
    State(state): State<Arc<AdmissionFilterState>>,
    request: Request,
    next: Next,
) -> Response {
    let action = state.action_for(&request);

    match state.service.admit(&action).await {
        AdmissionOutcome::Allowed { rate_limit } => {
            let mut response = next.run(request).await;
            if let Some(decision) = rate_limit {
                apply_rate_limit_headers(&mut response, &decision);
            }
            response
        }
        AdmissionOutcome::Rejected { reason } => reject(reason),
    }
}

fn apply_rate_limit_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

fn reject(reason: RejectReason) -> Response {
    let code = reason.code();
    let (status, body) = match &reason {
        RejectReason::Blacklisted { reason } => (
            StatusCode::FORBIDDEN,
            ErrorResponse::new(code, format!("Access denied: {}", reason)),
        ),
        RejectReason::RateLimited { limit, retry_after } => (
            StatusCode::TOO_MANY_REQUESTS,
            ErrorResponse::new(code, "Rate limit exceeded").with_details(serde_json::json!({
                "limit": limit,
                "remaining": 0,
                "retry_after": retry_after,
            })),
        ),
        RejectReason::ReplayDetected => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(code, "Request token was already used"),
        ),
        RejectReason::StaleTimestamp => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(code, "Request timestamp is outside the accepted window"),
        ),
        RejectReason::MissingNonce => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new(code, "This operation requires a one-time request token"),
        ),
    };

    let mut response = (status, Json(body)).into_response();

    if let RejectReason::RateLimited {
        limit,
        retry_after: Some(retry_after),
    } = reason
    {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
        headers.insert("retry-after", HeaderValue::from(retry_after));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/api/battle/attack");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.5, 10.0.0.1"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(AdmissionFilterState::client_ip(&req), "203.0.113.5");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip_then_unknown() {
        let req = request(&[("x-real-ip", "198.51.100.7")]);
        assert_eq!(AdmissionFilterState::client_ip(&req), "198.51.100.7");

        let req = request(&[]);
        assert_eq!(AdmissionFilterState::client_ip(&req), "unknown-ip");
    }

    #[test]
    fn test_nonce_envelope_requires_both_headers() {
        let req = request(&[("x-nonce", "abc"), ("x-timestamp", "1700000000")]);
        let envelope = AdmissionFilterState::nonce_envelope(&req).unwrap();
        assert_eq!(envelope.value, "abc");
        assert_eq!(envelope.client_timestamp, 1_700_000_000);

        let req = request(&[("x-nonce", "abc")]);
        assert!(AdmissionFilterState::nonce_envelope(&req).is_none());

        let req = request(&[("x-nonce", "abc"), ("x-timestamp", "not-a-number")]);
        assert!(AdmissionFilterState::nonce_envelope(&req).is_none());
    }

    #[test]
    fn test_reject_status_mapping() {
        let response = reject(RejectReason::Blacklisted {
            reason: "flood".into(),
        });
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = reject(RejectReason::RateLimited {
            limit: 10,
            retry_after: Some(30),
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("retry-after").unwrap(),
            &HeaderValue::from(30u64)
        );
        assert_eq!(
            response.headers().get("x-ratelimit-remaining").unwrap(),
            &HeaderValue::from(0u32)
        );

        let response = reject(RejectReason::ReplayDetected);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = reject(RejectReason::StaleTimestamp);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = reject(RejectReason::MissingNonce);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
