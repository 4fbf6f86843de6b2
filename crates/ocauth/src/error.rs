use crate::outcome::{Outcome, TerminalSignal};
use crate::session::SessionState;
use thiserror::Error;

/// Errors raised while generating a one-time password.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid Base32 secret")]
    InvalidBase32,

    #[error("unsupported digit count {0} (expected 6 to 8)")]
    InvalidDigits(u32),

    #[error("time step must be at least one second")]
    InvalidStep,

    #[error("system clock is set before the Unix epoch")]
    TimeError,
}

/// Failures talking to the credential store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyringError {
    #[error("keyring service unavailable: {0}")]
    Unavailable(String),

    #[error("failed to store secret in keyring: {0}")]
    StoreFailed(String),

    #[error("failed to read secret from keyring: {0}")]
    RetrieveFailed(String),
}

/// The resolver could not produce an acceptable answer for a form.
///
/// This is never a network condition: the engine is not resubmitted and the
/// caller sees the session end as an authentication failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthAbort {
    #[error("no value available for required field '{field}'")]
    MissingValue { field: String },

    #[error("value '{value}' for field '{field}' is not one of: {}", allowed.join(", "))]
    InvalidChoice {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("prompt for field '{field}' was dismissed")]
    Dismissed { field: String },

    #[error("no scripted response left for form '{form}'")]
    ScriptExhausted { form: String },

    #[error("cannot read keyring secret for field '{field}': {source}")]
    Keyring {
        field: String,
        #[source]
        source: KeyringError,
    },

    #[error("cannot generate one-time password for field '{field}': {source}")]
    Otp {
        field: String,
        #[source]
        source: OtpError,
    },
}

/// Failures reported by a [`VpnEngine`](crate::engine::VpnEngine) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine initialisation failed: {0}")]
    InitFailed(String),

    #[error("protocol '{0}' is not supported by the engine")]
    UnknownProtocol(String),

    #[error("engine could not parse URL '{0}'")]
    BadUrl(String),

    #[error("{0}")]
    Other(String),
}

/// Configuration problems detected before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid VPN URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid protocol identifier '{0}'")]
    InvalidProtocol(String),

    #[error("max_forms must be at least 1")]
    InvalidFormBudget,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to read configuration {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the session driver can hand back to its caller.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("authentication aborted: {0}")]
    AuthAbort(#[from] AuthAbort),

    #[error("gave up after {limit} authentication forms")]
    BudgetExhausted { limit: usize },

    #[error("engine returned unrecognised signal {signal}")]
    EngineInternal { signal: TerminalSignal },

    #[error("cannot {action} a session in state {from:?}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
}

impl DriverError {
    /// Returns the outcome category a caller should report for this error.
    pub fn outcome(&self) -> Outcome {
        match self {
            DriverError::AuthAbort(_) | DriverError::BudgetExhausted { .. } => {
                Outcome::AuthRejected
            }
            DriverError::Config(_)
            | DriverError::Engine(_)
            | DriverError::EngineInternal { .. }
            | DriverError::InvalidTransition { .. } => Outcome::FatalConfigError,
        }
    }
}
