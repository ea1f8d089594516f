use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    NotAuthenticated,
    NotFound,
    PermissionDenied,
    ValidationFailed,
    InsufficientFunds,
    SystemError,
}

/// Domain error carried through `anyhow` by the dao layer and turned into an
/// envelope by `ErrorResponse`.
#[derive(Debug, ThisError)]
#[error("{error_type:?} : {error}")]
pub struct Error {
    pub error_type: ErrorType,
    pub error: String,
}

impl Error {
    pub fn new(error_type: ErrorType, error: &str) -> Self {
        Self {
            error_type,
            error: error.to_string(),
        }
    }
    pub fn not_authenticated() -> Self {
        Self::new(ErrorType::NotAuthenticated, "未登录")
    }
    pub fn not_found(error: &str) -> Self {
        Self::new(ErrorType::NotFound, error)
    }
    pub fn permission_denied(error: &str) -> Self {
        Self::new(ErrorType::PermissionDenied, error)
    }
    pub fn validation_failed(error: &str) -> Self {
        Self::new(ErrorType::ValidationFailed, error)
    }
    pub fn insufficient_funds(balance: i32) -> Self {
        Self::new(
            ErrorType::InsufficientFunds,
            format!("积分不足，您当前有 {} 积分", balance).as_str(),
        )
    }
    pub fn system_error(error: &str) -> Self {
        Self::new(ErrorType::SystemError, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_a_trip_through_anyhow() {
        let e: anyhow::Error = Error::insufficient_funds(5).into();
        let back = e.downcast::<Error>().unwrap();
        assert_eq!(back.error_type, ErrorType::InsufficientFunds);
        assert_eq!(back.error, "积分不足，您当前有 5 积分");
    }
}
