//! The VPN engine capability.
//!
//! The engine (an OpenConnect-style client library) does all protocol and TLS
//! work. The driver only sees the operations below: a process-wide init, a
//! session with two callbacks, configuration, a blocking negotiation, and
//! teardown. Concrete engines live in submodules.

use crate::error::EngineError;
use crate::form::{AuthForm, FormValues};
use crate::outcome::TerminalSignal;
use crate::progress::ProgressSink;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub mod scripted;

pub use scripted::{Journal, Script, ScriptStep, ScriptedEngine};

/// Answer of the auth-form callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormReply {
    /// Submit these values (callback return value `0`).
    Submit(FormValues),
    /// Stop negotiating (non-zero callback return value).
    Abort,
}

/// Called by the engine, on the negotiating thread, for every form.
pub type FormCallback = Box<dyn FnMut(&AuthForm) -> FormReply + Send>;

/// Callbacks registered when an engine session is created and used for the
/// session's whole lifetime.
pub struct Callbacks {
    pub auth_form: FormCallback,
    pub progress: Arc<dyn ProgressSink>,
}

/// Init-once guard for process-wide engine setup.
///
/// The first call runs the initialiser; later calls return its cached result.
/// There is no teardown.
pub struct InitOnce(OnceCell<Result<(), EngineError>>);

impl InitOnce {
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    pub fn call_once<F>(&self, init: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<(), EngineError>,
    {
        self.0.get_or_init(init).clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.0.get().is_some()
    }
}

impl Default for InitOnce {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine that can open sessions.
///
/// Implementations wrap one client library. Process-wide setup goes through
/// [`VpnEngine::ensure_ssl`]; everything else is per session.
pub trait VpnEngine {
    type Session: EngineSession;

    /// Guard shared by every session of this engine. Library-backed engines
    /// return a `static`.
    fn init_guard(&self) -> &InitOnce;

    /// Raw library initialisation. Call through [`VpnEngine::ensure_ssl`].
    fn init_ssl(&self) -> Result<(), EngineError>;

    /// Opens a session bound to `callbacks` for its whole lifetime.
    fn create_session(&self, callbacks: Callbacks) -> Result<Self::Session, EngineError>;

    /// Runs `init_ssl` at most once for the lifetime of the guard.
    fn ensure_ssl(&self) -> Result<(), EngineError> {
        self.init_guard().call_once(|| self.init_ssl())
    }
}

/// A single engine session handle, owned by the driver.
pub trait EngineSession {
    /// Selects the protocol and server. Unknown protocols and unparsable URLs
    /// are errors.
    fn configure(&mut self, protocol: &str, url: &str) -> Result<(), EngineError>;

    fn disable_dtls(&mut self);

    /// Blocks until the engine reaches a terminal signal, invoking the form
    /// callback zero or more times.
    fn negotiate(&mut self) -> TerminalSignal;

    /// Releases engine resources. Must tolerate repeated calls.
    fn destroy(&mut self);
}
