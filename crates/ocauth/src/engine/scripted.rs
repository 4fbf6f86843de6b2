//! A deterministic in-process engine.
//!
//! `ScriptedEngine` plays back a [`Script`] of progress lines, forms and a
//! final signal through the same callback contract a real library uses. It
//! keeps a [`Journal`] of what the driver did to it.

use super::{Callbacks, EngineSession, FormReply, InitOnce, VpnEngine};
use crate::error::EngineError;
use crate::form::{AuthForm, FormValues};
use crate::outcome::TerminalSignal;
use crate::progress::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Protocols understood unless the script says otherwise.
pub const DEFAULT_PROTOCOLS: &[&str] = &["anyconnect", "nc", "gp", "pulse", "f5", "fortinet", "array"];

fn default_protocols() -> Vec<String> {
    DEFAULT_PROTOCOLS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Emit a progress line at an engine level (`0=ERR` .. `3=TRACE`).
    Progress { level: i32, text: String },
    /// Present a form. With `accept`, every listed pair must be submitted or
    /// the engine fails with `reject_signal` (default `-EPERM`).
    Form {
        form: AuthForm,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accept: Option<BTreeMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reject_signal: Option<TerminalSignal>,
    },
    /// End the negotiation with this signal.
    Finish { signal: TerminalSignal },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
    /// Makes `init_ssl` fail with this reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_failure: Option<String>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            protocols: default_protocols(),
            init_failure: None,
            steps: Vec::new(),
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(mut self, level: i32, text: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Progress {
            level,
            text: text.into(),
        });
        self
    }

    pub fn form(mut self, form: AuthForm) -> Self {
        self.steps.push(ScriptStep::Form {
            form,
            accept: None,
            reject_signal: None,
        });
        self
    }

    /// Presents `form` and rejects any submission lacking the `accept` pairs.
    pub fn form_expecting<I, K, V>(mut self, form: AuthForm, accept: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.steps.push(ScriptStep::Form {
            form,
            accept: Some(
                accept
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            reject_signal: None,
        });
        self
    }

    pub fn finish(mut self, signal: TerminalSignal) -> Self {
        self.steps.push(ScriptStep::Finish { signal });
        self
    }
}

/// Record of every call the engine received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    pub init_calls: usize,
    pub sessions_created: usize,
    /// `(protocol, url)` of the last successful `configure`.
    pub configured: Option<(String, String)>,
    pub dtls_disabled: bool,
    pub negotiate_calls: usize,
    pub forms_presented: usize,
    pub submissions: Vec<FormValues>,
    pub destroy_calls: usize,
}

fn record(journal: &Mutex<Journal>) -> MutexGuard<'_, Journal> {
    journal.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct ScriptedEngine {
    script: Script,
    guard: InitOnce,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            guard: InitOnce::new(),
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Snapshot of the calls received so far.
    pub fn journal(&self) -> Journal {
        record(&self.journal).clone()
    }
}

impl VpnEngine for ScriptedEngine {
    type Session = ScriptedSession;

    fn init_guard(&self) -> &InitOnce {
        &self.guard
    }

    fn init_ssl(&self) -> Result<(), EngineError> {
        record(&self.journal).init_calls += 1;
        match &self.script.init_failure {
            Some(reason) => Err(EngineError::InitFailed(reason.clone())),
            None => Ok(()),
        }
    }

    fn create_session(&self, callbacks: Callbacks) -> Result<ScriptedSession, EngineError> {
        record(&self.journal).sessions_created += 1;
        Ok(ScriptedSession {
            protocols: self.script.protocols.clone(),
            steps: self.script.steps.clone(),
            callbacks,
            journal: Arc::clone(&self.journal),
            configured: false,
            destroyed: false,
        })
    }
}

pub struct ScriptedSession {
    protocols: Vec<String>,
    steps: Vec<ScriptStep>,
    callbacks: Callbacks,
    journal: Arc<Mutex<Journal>>,
    configured: bool,
    destroyed: bool,
}

impl ScriptedSession {
    fn progress(&self, severity: Severity, text: &str) {
        self.callbacks.progress.emit(severity, text);
    }

    fn present(
        &mut self,
        form: &AuthForm,
        accept: Option<&BTreeMap<String, String>>,
        reject_signal: Option<TerminalSignal>,
    ) -> Option<TerminalSignal> {
        record(&self.journal).forms_presented += 1;

        // The journal lock is released before calling out.
        let values = match (self.callbacks.auth_form)(form) {
            FormReply::Submit(values) => values,
            FormReply::Abort => {
                self.progress(Severity::Info, "Form submission cancelled");
                return Some(TerminalSignal::CANCELLED);
            }
        };
        self.progress(Severity::Debug, &format!("POST form {}", form.label()));
        record(&self.journal).submissions.push(values.clone());

        let accepted = accept.map_or(true, |expected| {
            expected
                .iter()
                .all(|(name, value)| values.get(name) == Some(value.as_str()))
        });
        if accepted {
            None
        } else {
            self.progress(Severity::Error, "Failed to authenticate");
            Some(reject_signal.unwrap_or(TerminalSignal::PERMISSION_DENIED))
        }
    }
}

impl EngineSession for ScriptedSession {
    fn configure(&mut self, protocol: &str, url: &str) -> Result<(), EngineError> {
        if !self.protocols.iter().any(|p| p == protocol) {
            self.progress(Severity::Error, &format!("Unknown VPN protocol '{}'", protocol));
            return Err(EngineError::UnknownProtocol(protocol.to_string()));
        }
        if url::Url::parse(url).is_err() {
            self.progress(Severity::Error, &format!("Failed to parse server URL '{}'", url));
            return Err(EngineError::BadUrl(url.to_string()));
        }
        record(&self.journal).configured = Some((protocol.to_string(), url.to_string()));
        self.configured = true;
        Ok(())
    }

    fn disable_dtls(&mut self) {
        record(&self.journal).dtls_disabled = true;
    }

    fn negotiate(&mut self) -> TerminalSignal {
        record(&self.journal).negotiate_calls += 1;
        if self.destroyed || !self.configured {
            self.progress(Severity::Error, "Session is not ready for negotiation");
            return TerminalSignal::INVALID;
        }

        let steps = self.steps.clone();
        for step in &steps {
            match step {
                ScriptStep::Progress { level, text } => {
                    self.progress(Severity::from_level(*level), text);
                }
                ScriptStep::Form {
                    form,
                    accept,
                    reject_signal,
                } => {
                    if let Some(signal) = self.present(form, accept.as_ref(), *reject_signal) {
                        return signal;
                    }
                }
                ScriptStep::Finish { signal } => return *signal,
            }
        }
        TerminalSignal::SUCCESS
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            record(&self.journal).destroy_calls += 1;
        }
    }
}
