use std::time::Duration;
use thiserror::Error;

use crate::capability::Capability;

/// Unified error type for the orchestration core.
///
/// Every failure a caller can observe is one of these variants; the
/// classification the circuit breaker and callers both act on comes from
/// [`Error::kind`], never from downcasting.
#[derive(Debug, Error)]
pub enum Error {
    /// No provider is registered for the requested capability under that name.
    #[error("no provider named '{name}' is registered for {capability}{}", alternatives_suffix(.registered))]
    ProviderNotFound {
        name: String,
        capability: Capability,
        /// Names registered for the capability, for the error message.
        registered: Vec<String>,
    },

    /// The provider is registered but reports itself not ready.
    #[error("provider '{name}' is currently unavailable for {capability}{}", alternatives_suffix(.available))]
    ProviderUnavailable {
        name: String,
        capability: Capability,
        /// Available alternatives the caller could switch to.
        available: Vec<String>,
    },

    /// The administrative enablement map denies this provider/capability pair.
    #[error("capability {capability} is administratively disabled for provider '{name}'")]
    CapabilityDisabled { name: String, capability: Capability },

    /// The circuit breaker for this service is open.
    #[error("service '{service}' is temporarily unavailable (circuit open, retry in {}s)", .retry_after.as_secs())]
    CircuitOpen {
        service: String,
        retry_after: Duration,
    },

    /// The provider call itself failed. Cause is always preserved.
    #[error("provider '{provider}' failed during {operation}: {source}")]
    ProviderFailure {
        provider: String,
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Composition or settings problem; never counted against the breaker.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller handed the core something unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn alternatives_suffix(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(" (alternatives: {})", names.join(", "))
    }
}

/// Coarse classification used for breaker bookkeeping and caller policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing matched the request; fatal, never retried.
    NotFound,
    /// Registered but not ready; operator remediation.
    Unavailable,
    /// Administratively disabled; configuration error, never retried.
    Disabled,
    /// Breaker tripped; served via fallback where one exists.
    CircuitOpen,
    /// Unexpected failure during a downstream call.
    ProviderFailure,
    /// Composition/settings/input problems.
    Configuration,
    /// Transport, serialization, I/O, and other infrastructure failures.
    Infrastructure,
}

impl ErrorKind {
    /// Whether a failure of this kind counts toward opening a circuit.
    ///
    /// Configuration and lookup errors are deterministic; retrying them
    /// through a cooling-off period would only mask a misconfiguration.
    pub fn trips_breaker(&self) -> bool {
        matches!(self, ErrorKind::ProviderFailure | ErrorKind::Infrastructure)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProviderNotFound { .. } => ErrorKind::NotFound,
            Error::ProviderUnavailable { .. } => ErrorKind::Unavailable,
            Error::CapabilityDisabled { .. } => ErrorKind::Disabled,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::ProviderFailure { .. } => ErrorKind::ProviderFailure,
            Error::Configuration(_) | Error::InvalidInput(_) => ErrorKind::Configuration,
            Error::Transport(_) | Error::Serialization(_) | Error::Io(_) | Error::Other(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Wrap a raw provider error, tagging it with provider and operation.
    pub fn provider_failure(
        provider: impl Into<String>,
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::ProviderFailure {
            provider: provider.into(),
            operation,
            source: source.into(),
        }
    }

    /// The provider this error originated from, when it carries one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Error::ProviderNotFound { name, .. }
            | Error::ProviderUnavailable { name, .. }
            | Error::CapabilityDisabled { name, .. } => Some(name),
            Error::ProviderFailure { provider, .. } => Some(provider),
            _ => None,
        }
    }
}
