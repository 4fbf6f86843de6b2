use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default cap on the number of forms answered in one negotiation.
pub const DEFAULT_MAX_FORMS: usize = 16;

fn default_max_forms() -> usize {
    DEFAULT_MAX_FORMS
}

// A scheme is letters, digits, `+`, `-` or `.` before the first `://`, so a
// `://` inside the path or query of a bare host does not count.
fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// What the driver needs to open one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Engine protocol identifier, e.g. `anyconnect`, `f5`, `gp`.
    pub protocol: String,
    pub url: String,
    #[serde(default)]
    pub disable_dtls: bool,
    #[serde(default = "default_max_forms")]
    pub max_forms: usize,
}

impl SessionConfig {
    pub fn new(protocol: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            url: url.into(),
            disable_dtls: false,
            max_forms: DEFAULT_MAX_FORMS,
        }
    }

    pub fn with_dtls_disabled(mut self, disabled: bool) -> Self {
        self.disable_dtls = disabled;
        self
    }

    pub fn with_max_forms(mut self, max_forms: usize) -> Self {
        self.max_forms = max_forms;
        self
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// The URL handed to the engine. A bare host gets `https://`.
    pub fn normalized_url(&self) -> String {
        let url = self.url.trim();
        if has_scheme(url) {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }

    /// Local checks done before the engine sees anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let protocol_ok = !self.protocol.is_empty()
            && self
                .protocol
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !protocol_ok {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url = self.normalized_url();
        let parsed = url::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidUrl {
                url,
                reason: "missing host".to_string(),
            });
        }

        if self.max_forms == 0 {
            return Err(ConfigError::InvalidFormBudget);
        }
        Ok(())
    }
}
