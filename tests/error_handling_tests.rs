//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses are properly formatted
//! - Error classification drives what the user sees and what can be retried

use axum::http::StatusCode;
use axum::response::IntoResponse;
use userdeck::prelude::*;

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_not_found_returns_404() {
        let err = CacheError::NotFound { id: 3 };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_returns_400() {
        let err = CacheError::validation("bad sort");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_edit_in_progress_returns_409() {
        let err = CacheError::EditInProgress { id: 3 };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_config_and_internal_return_500() {
        let config = CacheError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let internal = CacheError::Internal("oops".to_string());
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_keeps_upstream_status() {
        assert_eq!(
            CacheError::request(429, "slow down").status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}

// =============================================================================
// Response Format Tests
// =============================================================================

mod response_tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CacheError::Aborted.error_code(), "ABORTED");
        assert_eq!(CacheError::NotFound { id: 1 }.error_code(), "USER_NOT_FOUND");
        assert_eq!(
            CacheError::request(500, "x").error_code(),
            "REQUEST_FAILED"
        );
    }

    #[test]
    fn test_response_body_serializes() {
        let body = CacheError::NotFound { id: 12 }.to_response();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "USER_NOT_FOUND");
        assert_eq!(json["message"], "User with id '12' not found");
    }

    #[test]
    fn test_into_response_uses_status_code() {
        let response = CacheError::validation("x").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Classification Tests
// =============================================================================

mod classification_tests {
    use super::*;

    #[test]
    fn test_only_request_failures_are_retryable() {
        assert!(CacheError::request(503, "x").is_retryable());
        assert!(!CacheError::NotFound { id: 1 }.is_retryable());
        assert!(!CacheError::validation("x").is_retryable());
        assert!(!CacheError::Aborted.is_retryable());
    }

    #[test]
    fn test_aborted_is_hidden_from_users() {
        assert!(!CacheError::Aborted.is_user_visible());
        assert!(CacheError::NotFound { id: 1 }.is_user_visible());
    }

    #[test]
    fn test_parse_errors_are_validation_errors() {
        assert!(matches!(
            "height".parse::<UserField>(),
            Err(CacheError::Validation { .. })
        ));
        assert!(matches!(
            "sideways".parse::<SortDirection>(),
            Err(CacheError::Validation { .. })
        ));
        assert!(matches!(
            FilterCriteria::new().with(UserField::Age, "old"),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn test_errors_match_by_variant() {
        let err = CacheError::EditInProgress { id: 4 };
        let message = match &err {
            CacheError::EditInProgress { id } => format!("user {} is saving", id),
            _ => "other".to_string(),
        };
        assert_eq!(message, "user 4 is saving");
    }
}
