//! # VPN Authentication Negotiation Driver
//!
//! This library drives an OpenConnect-style VPN engine through its
//! authentication phase: it answers the engine's forms through a pluggable
//! resolver, routes the engine's progress messages, and classifies the final
//! signal into an [`Outcome`].

pub mod config;
pub mod engine;
pub mod error;
pub mod form;
pub mod keyring;
pub mod logger;
pub mod outcome;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod resolver;
pub mod session;
pub mod totp;

// Re-export commonly used items
pub use config::SessionConfig;
pub use engine::{EngineSession, FormReply, InitOnce, Script, ScriptedEngine, VpnEngine};
pub use error::{AuthAbort, ConfigError, DriverError, EngineError, KeyringError, OtpError};
pub use form::{AuthField, AuthForm, FieldKind, FormValues};
pub use crate::keyring::{KeyringProvider, MemoryKeyring, SecretKind, SecretStore, SystemKeyring};
pub use logger::init_logger;
pub use outcome::{classify, Outcome, TerminalSignal};
pub use progress::{ProgressSink, Severity};
pub use provider::{FieldValue, ProviderChain, ScriptedProvider, StaticProvider, ValueProvider};
pub use resolver::{FormResolver, Resolver};
pub use session::{drive, Session, SessionState};
pub use totp::TotpSeed;
