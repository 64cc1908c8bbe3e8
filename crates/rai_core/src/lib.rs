pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod html;
pub mod report;
pub mod scenario;
pub mod timestamp;

#[cfg(test)]
mod tests {
    use super::error::{codes, AppError};

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new(codes::FETCH_FAILED, "fetch failed").with_retryable(false);
        assert_eq!(err.code, "FETCH_FAILED");
        assert_eq!(err.message, "fetch failed");
        assert_eq!(err.retryable, false);
        assert!(err.is(codes::FETCH_FAILED));
    }

    #[test]
    fn app_error_display_includes_details() {
        let err = AppError::new(codes::CONFIG_INVALID, "bad").with_details("key=X");
        assert_eq!(err.to_string(), "[CONFIG_INVALID] bad (key=X)");
    }
}
