use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use eventhub_auth::TokenError;
use eventhub_core::StoreError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn token_error_response(err: TokenError) -> Response {
    let status = match err.root() {
        TokenError::MissingField(_) => StatusCode::BAD_REQUEST,
        TokenError::Signing | TokenError::ExpiryOutOfRange => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn store_error_response(err: StoreError) -> Response {
    tracing::error!(error = %err, "storage collaborator failed");
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "store_unavailable",
        "service temporarily unavailable",
    )
}

pub fn validation_error(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn not_found(what: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_keep_their_code_and_pick_a_status() {
        let missing = token_error_response(TokenError::MissingField("email"));
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let expired = token_error_response(TokenError::Refresh(Box::new(TokenError::ExpiredToken)));
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

        let signing = token_error_response(TokenError::Signing);
        assert_eq!(signing.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let overflow = token_error_response(TokenError::ExpiryOutOfRange);
        assert_eq!(overflow.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_failures_are_unavailable() {
        let res = store_error_response(StoreError::unavailable("db down"));
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
