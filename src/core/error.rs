use thiserror::Error;

/// Error type for every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum LokiError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid span: {0}")]
    InvalidSpan(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("scrape error: {0}")]
    Scrape(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Loki operations
pub type Result<T> = std::result::Result<T, LokiError>;

impl LokiError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new scrape error
    pub fn scrape<S: Into<String>>(msg: S) -> Self {
        Self::Scrape(msg.into())
    }

    /// Creates a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a new bad-request error
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Returns the error category for metrics/logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidSpan(_) | Self::BadRequest(_) => "input",
            Self::Decode(_) => "decode",
            Self::Scrape(_) => "transient",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::Yaml(_) | Self::Json(_) => "serialization",
        }
    }

    /// True for malformed-input errors: worth a 4xx response, not worth an
    /// error-level log line on every request.
    pub fn is_silent_input_error(&self) -> bool {
        matches!(self, Self::InvalidSpan(_) | Self::BadRequest(_) | Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LokiError::config("bad yaml");
        assert_eq!(err.to_string(), "configuration error: bad yaml");
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_input_errors_are_silent() {
        let err = LokiError::BadRequest("missing serviceName".into());
        assert!(err.is_silent_input_error());
        let err = LokiError::Scrape("timeout".into());
        assert!(!err.is_silent_input_error());
    }

    #[test]
    fn test_not_found_category() {
        let err = LokiError::NotFound("trace 42".into());
        assert_eq!(err.category(), "not_found");
        assert_eq!(err.to_string(), "not found: trace 42");
    }
}
