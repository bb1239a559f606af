use std::error::Error;

use thiserror::Error;

/// An error that happens when fetching a resource.
///
/// Errors are recorded verbatim in the cache entry of the failed resource, and handed out to
/// every reader of that resource until the entry is invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The resource does not exist.
    ///
    /// Only `404 Not Found` and `410 Gone` map to this. `401` and `403` are
    /// [`PermissionDenied`](Self::PermissionDenied), any other status is a [`Status`](Self::Status).
    #[error("not found")]
    NotFound,
    /// The resource could not be fetched due to missing permissions.
    ///
    /// The attached string contains the remote's response status.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The remote responded with a non-success status code.
    #[error("request failed, response status: {0}")]
    Status(u16),
    /// The resource could not be fetched due to a transport problem, like connection loss,
    /// DNS resolution, or a broken TLS handshake.
    #[error("transport error: {0}")]
    Transport(String),
    /// The resource was fetched, but could not be decoded into the expected shape.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The key could not be turned into a request.
    #[error("invalid resource key: {0}")]
    Invalid(String),
    /// The fetch was dropped before it produced a result.
    ///
    /// This happens when the fetch task panics, or when the runtime it was spawned on shuts
    /// down.
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied(status.to_string()),
            404 | 410 => Self::NotFound,
            _ => Self::Status(status),
        }
    }

    /// Creates a [`Transport`](Self::Transport) error from the root cause of `error`.
    pub fn transport(mut error: &dyn Error) -> Self {
        while let Some(src) = error.source() {
            error = src;
        }

        let mut error_string = error.to_string();

        // Special-case a few error strings
        if error_string.contains("certificate verify failed") {
            error_string = "certificate verify failed".to_string();
        }

        Self::Transport(error_string)
    }

    /// A short name of the variant, used to tag metrics.
    pub fn metrics_tag(&self) -> &'static str {
        match self {
            Self::NotFound => "notfound",
            Self::PermissionDenied(_) => "permissiondenied",
            Self::Status(_) => "status",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::Invalid(_) => "invalid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::Malformed(error.to_string());
        }
        Self::transport(&error)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed(error.to_string())
    }
}
