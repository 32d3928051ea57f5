use crate::{config::StoreSettings, dto::CheckoutPayload, AppState};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Routes for provider callbacks. The validate route matches every method so
/// non-POST requests get the documented failure redirect instead of a 405.
pub fn callback_routes() -> Router<AppState> {
    Router::new().route("/order/validate", any(validate_order))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Store scope for configuration lookups; default scope when absent
    pub store: Option<String>,
}

// POST /callbacks/order/validate
//
// The provider calls this while the buyer waits on the confirmation page.
// Success is a bare 200; every failure is the same 303 redirect to the
// store's configured failure page, with the cause only in the logs.
#[utoipa::path(
    post,
    path = "/callbacks/order/validate",
    request_body = CheckoutPayload,
    params(
        ("store" = Option<String>, Query, description = "Store scope for configuration lookups")
    ),
    responses(
        (status = 200, description = "Cart reconciled and marked for forced placement"),
        (status = 303, description = "Validation failed; redirect to the configured failure page")
    ),
    tag = "Callbacks"
)]
pub async fn validate_order(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("Order validation callback: start");

    let settings = match state.settings.settings(query.store.as_deref()).await {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "Settings resolution failed; using default scope");
            StoreSettings::default()
        }
    };

    if method != Method::POST {
        info!(method = %method, "Order validation callback: no POST request");
        return failure_redirect(&settings.failed_link);
    }

    if let Some(secret) = &state.config.webhook.secret {
        if !verify_signature(&headers, &body, secret, state.config.webhook.tolerance_secs) {
            warn!("Order validation callback: signature verification failed");
            return failure_redirect(&settings.failed_link);
        }
    } else {
        tracing::debug!("Webhook secret not configured; skipping signature verification");
    }

    let payload: CheckoutPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "Order validation callback: undecodable body");
            return failure_redirect(&settings.failed_link);
        }
    };
    tracing::debug!(?payload, "Decoded callback payload");

    match state.validation.validate(&payload, &settings).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(
                kind = err.kind(),
                error = %err,
                order_id = payload.order_id.as_deref().unwrap_or(""),
                "Order validation failed"
            );
            failure_redirect(&settings.failed_link)
        }
    }
}

/// The flat failure response: a 303 to the store's configured failure page.
fn failure_redirect(failed_link: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, failed_link.to_string())],
    )
        .into_response()
}

/// Generic HMAC verification over `x-timestamp` and `x-signature` headers:
/// the signature is HMAC-SHA256 of `"{timestamp}.{body}"` under the shared
/// secret, hex-encoded, compared in constant time. The timestamp must be
/// within the configured tolerance.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) else {
        return false;
    };
    let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) else {
        return false;
    };

    if let Ok(ts_i) = ts.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts_i).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Computes the signature value a caller must send; shared with the tests.
pub fn sign_payload(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let signed = format!("{}.{}", timestamp, std::str::from_utf8(body).unwrap_or(""));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }

    #[test]
    fn signature_round_trip_verifies() {
        let secret = "test_secret";
        let body = Bytes::from_static(b"{\"order_id\":\"kco_1\"}");
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign_payload(secret, &ts, &body);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());

        assert!(verify_signature(&headers, &body, secret, 300));
        assert!(!verify_signature(&headers, &body, "other_secret", 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "test_secret";
        let body = Bytes::from_static(b"{}");
        let ts = (chrono::Utc::now().timestamp() - 3600).to_string();
        let sig = sign_payload(secret, &ts, &body);

        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(&sig).unwrap());

        assert!(!verify_signature(&headers, &body, secret, 300));
    }

    #[test]
    fn missing_headers_fail_verification() {
        let body = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &body, "secret", 300));
    }

    #[test]
    fn failure_redirect_carries_location() {
        let response = failure_redirect("https://shop.example.com/checkout/failed");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://shop.example.com/checkout/failed"
        );
    }
}
