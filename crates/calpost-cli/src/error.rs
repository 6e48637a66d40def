//! Client error types.

use std::fmt;

use calpost_core::{ComposerError, TimeParseError};
use calpost_google::GoogleError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Error reported by Google.
    Google(GoogleError),
    /// IO error.
    Io(std::io::Error),
    /// Authentication required.
    AuthRequired(String),
    /// Invalid event input (bad time, empty title...).
    Input(String),
    /// The form refused to post.
    Composer(ComposerError),
    /// Action failed (open browser...).
    Action(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Google(err) => write!(f, "google error: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::AuthRequired(msg) => write!(f, "authentication required: {}", msg),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Composer(err) => write!(f, "cannot post: {}", err),
            Self::Action(msg) => write!(f, "action failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Google(err) => Some(err),
            Self::Composer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GoogleError> for ClientError {
    fn from(err: GoogleError) -> Self {
        if err.code().needs_reauth() {
            Self::AuthRequired(format!("{} (run 'calpost auth google')", err))
        } else {
            Self::Google(err)
        }
    }
}

impl From<ComposerError> for ClientError {
    fn from(err: ComposerError) -> Self {
        Self::Composer(err)
    }
}

impl From<TimeParseError> for ClientError {
    fn from(err: TimeParseError) -> Self {
        Self::Input(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_login_becomes_auth_required() {
        let err: ClientError = GoogleError::authentication("access token expired or invalid").into();
        assert!(matches!(err, ClientError::AuthRequired(_)));
        assert!(err.to_string().contains("calpost auth google"));
    }

    #[test]
    fn other_google_errors_keep_their_code() {
        let err: ClientError = GoogleError::not_found("calendar not found").into();
        assert_eq!(
            err.to_string(),
            "google error: not_found: calendar not found"
        );
    }

    #[test]
    fn composer_error_display() {
        let err: ClientError = ComposerError::PostInFlight.into();
        assert_eq!(err.to_string(), "cannot post: a post request is already in flight");
    }
}
