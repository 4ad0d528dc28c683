use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;

/// Errors surfaced to HTTP callers.
///
/// `error` carries the user-facing (localized) summary. Engine failures add
/// the upstream cause as `message`; database causes are only logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error}")]
    BadRequest {
        error: String,
        details: Option<Map<String, Value>>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{error}: {source}")]
    Store {
        error: String,
        #[source]
        source: StoreError,
    },

    #[error("{error}: {source}")]
    Engine {
        error: String,
        #[source]
        source: EngineError,
    },

    #[error("{error}: {message}")]
    Internal { error: String, message: String },

    #[error("{error}: {source}")]
    Unavailable {
        error: String,
        #[source]
        source: EngineError,
    },
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: None,
        }
    }

    /// 400 whose body carries extra keys next to `error`.
    pub fn rejected(error: impl Into<String>, details: Map<String, Value>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: Some(details),
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        ApiError::NotFound(error.into())
    }

    pub fn internal(error: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Internal {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn store(error: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let error = error.into();
        move |source| ApiError::Store { error, source }
    }

    pub fn engine(error: impl Into<String>) -> impl FnOnce(EngineError) -> Self {
        let error = error.into();
        move |source| ApiError::Engine { error, source }
    }

    pub fn unavailable(error: impl Into<String>) -> impl FnOnce(EngineError) -> Self {
        let error = error.into();
        move |source| ApiError::Unavailable { error, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store {
                source: StoreError::Duplicate(_),
                ..
            } => StatusCode::CONFLICT,
            ApiError::Store { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Engine { source, .. } if source.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Engine { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Status plus the `{error, message, ..}` body object.
    pub fn parts(&self) -> (StatusCode, Map<String, Value>) {
        let mut body = Map::new();
        match self {
            ApiError::BadRequest { error, details } => {
                body.insert("error".into(), Value::String(error.clone()));
                match details {
                    Some(details) => body.extend(details.clone()),
                    None => {
                        body.insert("message".into(), Value::String(error.clone()));
                    }
                }
            }
            ApiError::NotFound(error) => {
                body.insert("error".into(), Value::String(error.clone()));
                body.insert("message".into(), Value::String(error.clone()));
            }
            ApiError::Internal { error, message } => {
                body.insert("error".into(), Value::String(error.clone()));
                body.insert("message".into(), Value::String(message.clone()));
            }
            ApiError::Store { error, .. } => {
                body.insert("error".into(), Value::String(error.clone()));
                body.insert("message".into(), Value::String(error.clone()));
            }
            ApiError::Engine { error, source } | ApiError::Unavailable { error, source } => {
                body.insert("error".into(), Value::String(error.clone()));
                body.insert("message".into(), Value::String(source.to_string()));
            }
        }
        (self.status(), body)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("잘못된 요청 본문입니다: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(format!("잘못된 쿼리 매개변수입니다: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn not_found_body_has_error_and_message() {
        let (status, body) = ApiError::not_found("프로파일을 찾을 수 없습니다.").parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "프로파일을 찾을 수 없습니다.");
        assert_eq!(body["message"], "프로파일을 찾을 수 없습니다.");
    }

    #[test]
    fn engine_404_maps_to_not_found() {
        let err = ApiError::engine("조회 실패")(EngineError::Status {
            status: StatusCode::NOT_FOUND,
            body: "missing".into(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::engine("조회 실패")(EngineError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rejected_merges_details() {
        let mut details = Map::new();
        details.insert("validation_result".into(), json!({"is_valid": false}));
        let (status, body) = ApiError::rejected("메트릭 검증 실패", details).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "메트릭 검증 실패");
        assert_eq!(body["validation_result"]["is_valid"], false);
    }

    #[test]
    fn store_errors_are_internal() {
        let err = ApiError::store("프로파일 조회 중 오류가 발생했습니다.")(StoreError::PoolTimeout);
        let (status, body) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "프로파일 조회 중 오류가 발생했습니다.");
        assert_eq!(body["message"], "프로파일 조회 중 오류가 발생했습니다.");
        assert!(!Value::Object(body).to_string().contains("timed out"));
    }
}
