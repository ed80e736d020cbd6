//! Error handling for provider queries.
//!
//! Every variant here is caught at the driver boundary and turned into a
//! provider outcome's `error` string; none of them propagates past a driver.

use std::fmt;
use std::time::Duration;

use crate::types::ProviderId;

/// Main error type for provider-query operations.
#[derive(Debug, Clone)]
pub enum ScoutError {
    /// Non-success HTTP status or network failure
    Transport {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A bounded wait was exceeded
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A required token, identifier or cookie was absent from an upstream response
    SessionExtraction {
        provider: String,
        missing: String,
    },

    /// Response body was not in the expected shape
    Parse {
        provider: String,
        message: String,
    },

    /// The upstream explicitly signaled failure
    UpstreamReported {
        provider: String,
        message: String,
    },

    /// Caller supplied a domain that cannot be queried
    InvalidDomain {
        domain: String,
        reason: String,
    },

    /// Configuration errors (invalid settings, malformed durations, etc.)
    Config {
        message: String,
    },

    /// Configuration or domain-list file could not be read
    FileError {
        path: String,
        message: String,
    },
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.as_str().to_string()
    }
}

impl ScoutError {
    /// Create a transport error without an HTTP status.
    pub fn transport<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a transport error for a non-success HTTP status.
    pub fn transport_status<P: Into<String>>(provider: P, status_code: u16) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: format!("upstream returned HTTP {}", status_code),
            status_code: Some(status_code),
        }
    }

    /// Create a timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a session extraction error naming the missing piece.
    pub fn session<P: Into<String>, M: Into<String>>(provider: P, missing: M) -> Self {
        Self::SessionExtraction {
            provider: provider.into(),
            missing: missing.into(),
        }
    }

    /// Create a parse error.
    pub fn parse<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Parse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an upstream-reported error.
    pub fn upstream<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::UpstreamReported {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stable taxonomy name, suitable for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TransportError",
            Self::Timeout { .. } => "TimeoutError",
            Self::SessionExtraction { .. } => "SessionExtractionError",
            Self::Parse { .. } => "ParseError",
            Self::UpstreamReported { .. } => "UpstreamReportedError",
            Self::InvalidDomain { .. } => "InvalidDomain",
            Self::Config { .. } => "ConfigError",
            Self::FileError { .. } => "FileError",
        }
    }

    /// Check if re-issuing the request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport {
                    status_code: None,
                    ..
                }
                | Self::Transport {
                    status_code: Some(429 | 500..=599),
                    ..
                }
        )
    }
}

impl fmt::Display for ScoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport {
                provider,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Transport error from {} (HTTP {}): {}", provider, code, message)
                } else {
                    write!(f, "Transport error from {}: {}", provider, message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::SessionExtraction { provider, missing } => {
                write!(f, "Session extraction failed for {}: missing {}", provider, missing)
            }
            Self::Parse { provider, message } => {
                write!(f, "Parse error from {}: {}", provider, message)
            }
            Self::UpstreamReported { provider, message } => {
                write!(f, "{} reported an error: {}", provider, message)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for ScoutError {}
