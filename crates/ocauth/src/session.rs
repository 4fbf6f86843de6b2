//! The session driver.
//!
//! A [`Session`] walks one negotiation through
//! `Created -> Configured -> Negotiating -> Terminated`. It owns the engine
//! session, wires the form callback to a [`FormResolver`] and hands the final
//! signal to the outcome classifier.

use crate::config::{SessionConfig, DEFAULT_MAX_FORMS};
use crate::engine::{Callbacks, EngineSession, FormCallback, FormReply, VpnEngine};
use crate::error::{AuthAbort, ConfigError, DriverError};
use crate::form::AuthForm;
use crate::outcome::{classify, is_recognized, Outcome};
use crate::progress::{ProgressSink, Severity};
use crate::resolver::FormResolver;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Where a [`Session`] is in its lifecycle. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Engine session exists and callbacks are registered.
    Created,
    /// Protocol and URL accepted by the engine.
    Configured,
    /// Inside the engine's blocking negotiation.
    Negotiating,
    /// Finished, failed or abandoned. [`Session::outcome`] is set.
    Terminated,
}

/// Sent from the form callback to the driver.
#[derive(Debug)]
enum FormEvent {
    Aborted(AuthAbort),
    BudgetExhausted { limit: usize },
}

/// One negotiation against a [`VpnEngine`].
///
/// Dropping a session tears it down, so the engine handle is released on
/// every path, including early returns.
pub struct Session<E: VpnEngine> {
    handle: Option<E::Session>,
    state: SessionState,
    outcome: Option<Outcome>,
    sink: Arc<dyn ProgressSink>,
    events: Receiver<FormEvent>,
    rounds: Arc<AtomicUsize>,
    limit: Arc<AtomicUsize>,
}

fn announce(sink: &dyn ProgressSink, form: &AuthForm) {
    let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
    sink.emit(
        Severity::Debug,
        &format!("Auth form '{}' with fields [{}]", form.label(), names.join(", ")),
    );
    if let Some(message) = &form.message {
        sink.emit(Severity::Info, message);
    }
    if let Some(error) = &form.error {
        sink.emit(Severity::Error, &format!("Server reported: {}", error));
    }
}

fn form_callback<R>(
    mut resolver: R,
    sink: Arc<dyn ProgressSink>,
    events: Sender<FormEvent>,
    rounds: Arc<AtomicUsize>,
    limit: Arc<AtomicUsize>,
) -> FormCallback
where
    R: FormResolver + Send + 'static,
{
    Box::new(move |form: &AuthForm| {
        let round = rounds.fetch_add(1, Ordering::SeqCst) + 1;
        let max = limit.load(Ordering::SeqCst);
        if round > max {
            sink.emit(
                Severity::Error,
                &format!("Giving up after {} authentication forms", max),
            );
            let _ = events.send(FormEvent::BudgetExhausted { limit: max });
            return FormReply::Abort;
        }

        announce(sink.as_ref(), form);
        match resolver.resolve(form) {
            Ok(values) => {
                log::debug!("Submitting {} value(s) for form '{}'", values.len(), form.label());
                FormReply::Submit(values)
            }
            Err(abort) => {
                sink.emit(Severity::Error, &format!("Form '{}' aborted: {}", form.label(), abort));
                let _ = events.send(FormEvent::Aborted(abort));
                FormReply::Abort
            }
        }
    })
}

impl<E: VpnEngine> Session<E> {
    /// Initialises the engine (once per process) and registers callbacks.
    pub fn create<R>(engine: &E, resolver: R, sink: Arc<dyn ProgressSink>) -> Result<Self, DriverError>
    where
        R: FormResolver + Send + 'static,
    {
        if let Err(e) = engine.ensure_ssl() {
            sink.emit(Severity::Error, &e.to_string());
            return Err(e.into());
        }

        let (tx, events) = crossbeam_channel::unbounded();
        let rounds = Arc::new(AtomicUsize::new(0));
        let limit = Arc::new(AtomicUsize::new(DEFAULT_MAX_FORMS));
        let callbacks = Callbacks {
            auth_form: form_callback(
                resolver,
                Arc::clone(&sink),
                tx,
                Arc::clone(&rounds),
                Arc::clone(&limit),
            ),
            progress: Arc::clone(&sink),
        };

        let handle = match engine.create_session(callbacks) {
            Ok(handle) => handle,
            Err(e) => {
                sink.emit(Severity::Error, &format!("Failed to create session: {}", e));
                return Err(e.into());
            }
        };

        Ok(Self {
            handle: Some(handle),
            state: SessionState::Created,
            outcome: None,
            sink,
            events,
            rounds,
            limit,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Set once the session is terminated.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Number of times the engine presented a form.
    pub fn forms_presented(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }

    /// Validates `config` and passes it to the engine. Only valid in
    /// [`SessionState::Created`].
    ///
    /// The form budget is applied before validation. A rejected configuration
    /// terminates the session with [`Outcome::FatalConfigError`].
    pub fn configure(&mut self, config: &SessionConfig) -> Result<(), DriverError> {
        self.expect_state(SessionState::Created, "configure")?;
        self.limit.store(config.max_forms, Ordering::SeqCst);

        let url = config.normalized_url();
        let result = match (config.validate(), self.handle.as_mut()) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(handle)) => handle
                .configure(&config.protocol, &url)
                .map_err(ConfigError::from),
            (Ok(()), None) => {
                return Err(DriverError::InvalidTransition {
                    from: self.state,
                    action: "configure",
                })
            }
        };

        if let Err(e) = result {
            self.sink
                .emit(Severity::Error, &format!("Configuration rejected: {}", e));
            self.terminate(Outcome::FatalConfigError);
            return Err(e.into());
        }

        if config.disable_dtls {
            if let Some(handle) = self.handle.as_mut() {
                handle.disable_dtls();
            }
        }
        log::debug!("Session configured for {} at {}", config.protocol, url);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Runs the engine's negotiation loop to completion.
    ///
    /// An abort raised inside the form callback wins over the engine's signal
    /// and comes back as an error. Otherwise the signal is classified; an
    /// unrecognised one is [`DriverError::EngineInternal`].
    pub fn negotiate(&mut self) -> Result<Outcome, DriverError> {
        self.expect_state(SessionState::Configured, "negotiate")?;
        self.state = SessionState::Negotiating;

        let signal = match self.handle.as_mut() {
            Some(handle) => handle.negotiate(),
            None => {
                return Err(DriverError::InvalidTransition {
                    from: self.state,
                    action: "negotiate",
                })
            }
        };
        log::debug!("Engine finished with signal {}", signal);

        if let Ok(event) = self.events.try_recv() {
            while self.events.try_recv().is_ok() {}
            self.terminate(Outcome::AuthRejected);
            return Err(match event {
                FormEvent::Aborted(abort) => DriverError::AuthAbort(abort),
                FormEvent::BudgetExhausted { limit } => DriverError::BudgetExhausted { limit },
            });
        }

        if !is_recognized(signal) {
            self.sink.emit(
                Severity::Error,
                &format!("Engine returned unrecognised signal {}", signal),
            );
            self.terminate(Outcome::FatalConfigError);
            return Err(DriverError::EngineInternal { signal });
        }

        let outcome = classify(signal);
        if outcome.is_success() {
            self.sink.emit(Severity::Info, "Authentication succeeded");
        } else {
            self.sink.emit(
                Severity::Error,
                &format!("Negotiation ended with signal {}: {}", signal, outcome),
            );
        }
        self.terminate(outcome);
        Ok(outcome)
    }

    /// Releases the engine session. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.destroy();
            log::debug!("Engine session destroyed");
        }
        if self.state != SessionState::Terminated {
            self.sink
                .emit(Severity::Error, "Session abandoned before negotiation finished");
            self.terminate(Outcome::FatalConfigError);
        }
    }

    fn terminate(&mut self, outcome: Outcome) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        self.outcome = Some(outcome);
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), DriverError> {
        if self.state == expected {
            return Ok(());
        }
        let err = DriverError::InvalidTransition {
            from: self.state,
            action,
        };
        self.sink.emit(Severity::Error, &err.to_string());
        Err(err)
    }
}

impl<E: VpnEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Create, configure, negotiate and tear down one session.
pub fn drive<E, R>(
    engine: &E,
    config: &SessionConfig,
    resolver: R,
    sink: Arc<dyn ProgressSink>,
) -> Result<Outcome, DriverError>
where
    E: VpnEngine,
    R: FormResolver + Send + 'static,
{
    let mut session = Session::create(engine, resolver, sink)?;
    session.configure(config)?;
    let result = session.negotiate();
    session.teardown();
    result
}
