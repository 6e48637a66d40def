//! Error types for Google OAuth and Calendar operations.

use std::fmt;
use thiserror::Error;

/// The category of a Google error.
///
/// Used to pick the user-facing hint (re-authenticate, fix config, try
/// later) without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoogleErrorCode {
    /// Authentication failed or credentials are invalid/expired.
    AuthenticationFailed,
    /// Authorization failed - the account lacks permission.
    AuthorizationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Resource not found (404), e.g. an unknown calendar id.
    NotFound,
    /// Request was invalid (400) - the event body was rejected.
    BadRequest,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Token file could not be read or written.
    StorageError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl GoogleErrorCode {
    /// Returns true if this error is transient and the user may try again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns true if running the login flow again may fix this error.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// Returns a machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::StorageError => "storage_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for GoogleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to Google.
#[derive(Debug, Error)]
pub struct GoogleError {
    code: GoogleErrorCode,
    message: String,
    /// The account that generated this error (e.g., "google:default").
    account: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GoogleError {
    /// Creates a new error with the given code and message.
    pub fn new(code: GoogleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            account: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::BadRequest, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::ConfigurationError, message)
    }

    /// Creates a token storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::StorageError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GoogleErrorCode::InternalError, message)
    }

    /// Sets the account name for this error.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> GoogleErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the account name, if set.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Returns true if this error is transient.
    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

impl fmt::Display for GoogleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref account) = self.account {
            write!(f, "[{}] ", account)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for Google operations.
pub type GoogleResult<T> = Result<T, GoogleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_transient() {
        assert!(GoogleErrorCode::NetworkError.is_transient());
        assert!(GoogleErrorCode::RateLimited.is_transient());
        assert!(GoogleErrorCode::ServerError.is_transient());
        assert!(!GoogleErrorCode::AuthenticationFailed.is_transient());
        assert!(!GoogleErrorCode::BadRequest.is_transient());
    }

    #[test]
    fn error_code_needs_reauth() {
        assert!(GoogleErrorCode::AuthenticationFailed.needs_reauth());
        assert!(!GoogleErrorCode::AuthorizationFailed.needs_reauth());
    }

    #[test]
    fn error_creation() {
        let err = GoogleError::authentication("token expired");
        assert_eq!(err.code(), GoogleErrorCode::AuthenticationFailed);
        assert_eq!(err.message(), "token expired");
        assert!(err.account().is_none());
        assert!(!err.is_transient());
    }

    #[test]
    fn error_display_includes_account() {
        let err = GoogleError::rate_limited("too many requests").with_account("google:work");
        let display = format!("{}", err);
        assert_eq!(display, "[google:work] rate_limited: too many requests");
    }

    #[test]
    fn error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = GoogleError::storage("failed to write tokens").with_source(io_err);
        assert!(err.source().is_some());
    }
}
