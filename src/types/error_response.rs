use super::error::{Error, ErrorType};
use super::links::JsonMap;
use crate::config::env;
use crate::service::forms;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response as AxumResponse},
    Json as AxumJson,
};
use serde_json::{json, Value as Json};
use std::fmt::{Debug, Display, Formatter};
use validator::ValidationErrors;

/// Failure half of the envelope: always `status: false` plus a message, and a
/// field error map for rejected forms.
#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    info: String,
    errors: Option<JsonMap>,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> AxumResponse {
        let mut body = json!({"status": false, "msg": self.info});
        if let (Some(errors), Json::Object(mp)) = (self.errors, &mut body) {
            mp.insert("errors".into(), Json::Object(errors));
        }
        let mut resp = AxumJson(body).into_response();
        *resp.status_mut() = self.status;
        resp
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        match e.error_type {
            ErrorType::NotAuthenticated => ErrorResponse::with_status(StatusCode::UNAUTHORIZED, e.error),
            ErrorType::NotFound => ErrorResponse::not_found_with_str(e.error.as_str()),
            ErrorType::PermissionDenied => ErrorResponse::forbidden_with_str(e.error.as_str()),
            ErrorType::ValidationFailed | ErrorType::InsufficientFunds => {
                ErrorResponse::bad_request_with_str(e.error.as_str())
            }
            ErrorType::SystemError => ErrorResponse::server_error(e.error.as_str()),
        }
    }
}

impl From<anyhow::Error> for ErrorResponse {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(err) => err.into(),
            Err(e) => ErrorResponse::server_error(format!("{:#}", e).as_str()),
        }
    }
}

impl From<ValidationErrors> for ErrorResponse {
    fn from(e: ValidationErrors) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            info: forms::from_validation_errors(&e),
            errors: Some(forms::validation_error_map(&e)),
        }
    }
}

impl ErrorResponse {
    pub fn with_status(status: StatusCode, info: String) -> Self {
        Self {
            status,
            info,
            errors: None,
        }
    }
    pub fn not_authenticated() -> Self {
        Error::not_authenticated().into()
    }
    pub fn not_found_with_str(err: &str) -> Self {
        ErrorResponse::with_status(StatusCode::NOT_FOUND, err.to_string())
    }
    pub fn forbidden_with_str(err: &str) -> Self {
        ErrorResponse::with_status(StatusCode::FORBIDDEN, err.to_string())
    }
    pub fn bad_request_with_str(err: &str) -> Self {
        ErrorResponse::with_status(StatusCode::BAD_REQUEST, err.to_string())
    }
    /// Logs the detail; callers only see it when `DEBUG` is on.
    pub fn server_error(detail: &str) -> Self {
        tracing::error!(error = detail, "request failed");
        match env::debug_mode() {
            true => ErrorResponse::with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("服务器错误: {}", detail),
            ),
            false => ErrorResponse::server_error_default(),
        }
    }
    pub fn server_error_default() -> Self {
        ErrorResponse::with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "服务器错误，请求失败".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(resp: AxumResponse) -> Json {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn domain_errors_keep_their_message() {
        let e: anyhow::Error = Error::not_found("帖子不存在").into();
        let resp = ErrorResponse::from(e).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_of(resp).await,
            json!({"status": false, "msg": "帖子不存在"})
        );
    }

    #[tokio::test]
    async fn insufficient_funds_is_a_bad_request() {
        let resp = ErrorResponse::from(Error::insufficient_funds(3)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(resp).await["msg"], "积分不足，您当前有 3 积分");
    }

    #[tokio::test]
    async fn unknown_errors_are_hidden_outside_debug() {
        std::env::remove_var("DEBUG");
        let resp = ErrorResponse::from(anyhow::anyhow!("connection reset")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(resp).await["msg"], "服务器错误，请求失败");
    }
}
