use core_library::LibraryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason a login or token request failed.
///
/// Every [`AuthError`] maps to exactly one reason. The string codes are stable
/// and appear in HTTP error bodies and `LoginFailed` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    ProviderUnknown,
    ProviderDisabled,
    MissingToken,
    ProfileFetchFailed,
    AudienceMismatch,
    UnsupportedProvider,
    NotAuthenticated,
    Storage,
    Internal,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::ProviderUnknown => "PROVIDER_UNKNOWN",
            FailureReason::ProviderDisabled => "PROVIDER_DISABLED",
            FailureReason::MissingToken => "MISSING_TOKEN",
            FailureReason::ProfileFetchFailed => "PROFILE_FETCH_FAILED",
            FailureReason::AudienceMismatch => "AUDIENCE_MISMATCH",
            FailureReason::UnsupportedProvider => "UNSUPPORTED_PROVIDER",
            FailureReason::NotAuthenticated => "NOT_AUTHENTICATED",
            FailureReason::Storage => "STORAGE",
            FailureReason::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unknown provider: {0}")]
    ProviderUnknown(String),

    #[error("provider is disabled: {0}")]
    ProviderDisabled(String),

    #[error("missing token")]
    MissingToken,

    #[error("{provider}: {reason}")]
    ProfileFetchFailed { provider: String, reason: String },

    #[error("token not meant for this app")]
    AudienceMismatch,

    #[error("unsupported provider type: {0}")]
    UnsupportedProvider(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("storage error: {0}")]
    Storage(#[from] LibraryError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// "could not retrieve token" for `provider`.
    pub fn token_unavailable(provider: impl Into<String>) -> Self {
        AuthError::ProfileFetchFailed {
            provider: provider.into(),
            reason: "could not retrieve token".to_string(),
        }
    }

    /// "could not retrieve profile" for `provider`.
    pub fn profile_unavailable(provider: impl Into<String>) -> Self {
        AuthError::ProfileFetchFailed {
            provider: provider.into(),
            reason: "could not retrieve profile".to_string(),
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            AuthError::ProviderUnknown(_) => FailureReason::ProviderUnknown,
            AuthError::ProviderDisabled(_) => FailureReason::ProviderDisabled,
            AuthError::MissingToken => FailureReason::MissingToken,
            AuthError::ProfileFetchFailed { .. } => FailureReason::ProfileFetchFailed,
            AuthError::AudienceMismatch => FailureReason::AudienceMismatch,
            AuthError::UnsupportedProvider(_) => FailureReason::UnsupportedProvider,
            AuthError::NotAuthenticated => FailureReason::NotAuthenticated,
            AuthError::Storage(_) => FailureReason::Storage,
            AuthError::InvalidConfig(_) | AuthError::Internal(_) => FailureReason::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
