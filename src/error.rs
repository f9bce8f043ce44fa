//! Typed failures returned by provider adapters and the record store.

use std::fmt;

/// Coarse failure taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeout, connection error or non-success HTTP status.
    Network,
    /// Non-JSON body or a required field is missing.
    ResponseFormat,
    /// Missing credentials, identifiers or unsupported setup.
    Configuration,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::ResponseFormat => "response_format",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Failure of a single quote fetch or rate computation.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("{provider} request failed: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned status {status}: {body}")]
    HttpStatus {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} response malformed: {reason}")]
    ResponseFormat {
        provider: &'static str,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{provider} cannot quote {instrument}")]
    UnsupportedInstrument {
        provider: &'static str,
        instrument: String,
    },

    #[error("no bridge rate for {currency}")]
    MissingRate { currency: String },

    #[error("bridge rate for {currency} is zero")]
    ZeroRate { currency: String },
}

impl QuoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } => FailureKind::Network,
            Self::ResponseFormat { .. } | Self::MissingRate { .. } | Self::ZeroRate { .. } => {
                FailureKind::ResponseFormat
            }
            Self::Configuration(_) | Self::UnsupportedInstrument { .. } => {
                FailureKind::Configuration
            }
        }
    }

    pub(crate) fn format(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::ResponseFormat {
            provider,
            reason: reason.into(),
        }
    }
}

/// Failure talking to the external record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("store returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("store response malformed: {0}")]
    ResponseFormat(String),

    #[error("store configuration error: {0}")]
    Configuration(String),

    #[error("record {0} not found")]
    RecordNotFound(String),
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::HttpStatus { .. } => FailureKind::Network,
            Self::ResponseFormat(_) | Self::RecordNotFound(_) => FailureKind::ResponseFormat,
            Self::Configuration(_) => FailureKind::Configuration,
        }
    }
}
