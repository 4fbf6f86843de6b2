use ocauth::engine::{Script, ScriptedEngine};
use ocauth::progress::{ChannelSink, MemorySink, ProgressSink, Severity};
use ocauth::{
    drive, AuthAbort, AuthField, AuthForm, DriverError, FormValues, Outcome, Resolver,
    ScriptedProvider, Session, SessionConfig, SessionState, StaticProvider, TerminalSignal,
};
use std::sync::Arc;

fn f5() -> SessionConfig {
    SessionConfig::new("f5", "https://vpn.example.com")
}

fn login_form() -> AuthForm {
    AuthForm::new(vec![
        AuthField::text("username").with_label("Username:"),
        AuthField::password("password").with_label("Password:"),
    ])
    .with_auth_id("main")
}

fn static_resolver() -> Resolver<StaticProvider> {
    Resolver::new(StaticProvider::credentials("vicwil", "test123"))
}

#[test]
fn f5_login_succeeds() {
    let engine = ScriptedEngine::new(
        Script::new()
            .progress(1, "POST https://vpn.example.com/")
            .form_expecting(login_form(), [("username", "vicwil"), ("password", "test123")])
            .finish(TerminalSignal::SUCCESS),
    );
    let sink = Arc::new(MemorySink::new());

    let outcome = drive(&engine, &f5(), static_resolver(), sink.clone()).unwrap();

    assert_eq!(outcome, Outcome::Success);
    let journal = engine.journal();
    assert_eq!(journal.submissions.len(), 1);
    assert_eq!(journal.submissions[0].get("username"), Some("vicwil"));
    assert_eq!(journal.submissions[0].get("password"), Some("test123"));
    assert_eq!(journal.destroy_calls, 1);
    assert!(!sink.has_errors());
}

#[test]
fn rejected_credentials_are_auth_rejected() {
    let engine = ScriptedEngine::new(
        Script::new()
            .form_expecting(login_form(), [("username", "vicwil"), ("password", "hunter2")])
            .finish(TerminalSignal::SUCCESS),
    );
    let sink = Arc::new(MemorySink::new());

    let outcome = drive(&engine, &f5(), static_resolver(), sink.clone()).unwrap();

    assert_eq!(outcome, Outcome::AuthRejected);
    assert!(sink.count(Severity::Error) >= 1);
}

#[test]
fn unknown_protocol_fails_before_negotiation() {
    let engine = ScriptedEngine::new(Script::new().form(login_form()));
    let sink = Arc::new(MemorySink::new());
    let config = SessionConfig::new("not-a-real-protocol", "https://vpn.example.com");

    let mut session = Session::create(&engine, static_resolver(), sink.clone()).unwrap();
    let err = session.configure(&config).unwrap_err();

    assert_eq!(err.outcome(), Outcome::FatalConfigError);
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.outcome(), Some(Outcome::FatalConfigError));
    assert!(sink.has_errors());

    assert!(matches!(
        session.negotiate(),
        Err(DriverError::InvalidTransition { .. })
    ));
    assert_eq!(engine.journal().negotiate_calls, 0);
}

#[test]
fn out_of_set_choice_aborts_without_submitting() {
    let form = AuthForm::new(vec![
        AuthField::choice("method", ["push", "sms"]),
        AuthField::password("password"),
    ]);
    let engine = ScriptedEngine::new(Script::new().form(form).finish(TerminalSignal::SUCCESS));
    let sink = Arc::new(MemorySink::new());
    let resolver = Resolver::new(
        StaticProvider::credentials("vicwil", "test123").with_field("method", "email"),
    );

    let err = drive(&engine, &f5(), resolver, sink.clone()).unwrap_err();

    assert!(matches!(
        err,
        DriverError::AuthAbort(AuthAbort::InvalidChoice { ref value, .. }) if value == "email"
    ));
    assert_eq!(err.outcome(), Outcome::AuthRejected);
    assert!(engine.journal().submissions.is_empty());
    assert!(sink.has_errors());
}

#[test]
fn multi_step_login_with_scripted_answers() {
    let token_form = AuthForm::new(vec![AuthField::token("otp").required()])
        .with_auth_id("challenge")
        .with_message("Enter the code from your authenticator");
    let engine = ScriptedEngine::new(
        Script::new()
            .form_expecting(login_form(), [("username", "vicwil")])
            .form_expecting(token_form, [("otp", "123456")]),
    );
    let provider = ScriptedProvider::new()
        .then([("username", "vicwil"), ("password", "test123")])
        .then([("otp", "123456")]);
    let sink = Arc::new(MemorySink::new());

    let mut session = Session::create(&engine, Resolver::new(provider), sink.clone()).unwrap();
    session.configure(&f5()).unwrap();
    assert_eq!(session.negotiate().unwrap(), Outcome::Success);
    assert_eq!(session.forms_presented(), 2);

    let infos: Vec<String> = sink
        .messages()
        .into_iter()
        .filter(|m| m.severity == Severity::Info)
        .map(|m| m.text)
        .collect();
    assert!(infos.contains(&"Enter the code from your authenticator".to_string()));
}

#[test]
fn form_budget_is_enforced() {
    let mut script = Script::new();
    for _ in 0..5 {
        script = script.form(login_form());
    }
    let engine = ScriptedEngine::new(script);
    let sink = Arc::new(MemorySink::new());

    let err = drive(&engine, &f5().with_max_forms(3), static_resolver(), sink.clone()).unwrap_err();

    assert!(matches!(err, DriverError::BudgetExhausted { limit: 3 }));
    assert_eq!(err.outcome(), Outcome::AuthRejected);
    let journal = engine.journal();
    assert_eq!(journal.forms_presented, 4);
    assert_eq!(journal.submissions.len(), 3);
}

#[test]
fn teardown_is_idempotent() {
    let engine = ScriptedEngine::new(Script::new().form(login_form()));
    let sink = Arc::new(MemorySink::new());

    let mut session = Session::create(&engine, static_resolver(), sink).unwrap();
    session.configure(&f5()).unwrap();
    session.negotiate().unwrap();
    session.teardown();
    session.teardown();
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.outcome(), Some(Outcome::Success));
    drop(session);

    assert_eq!(engine.journal().destroy_calls, 1);
}

#[test]
fn progress_precedes_form_resolution() {
    let engine = ScriptedEngine::new(
        Script::new()
            .progress(1, "Connected to vpn.example.com")
            .progress(2, "Got HTTP response: HTTP/1.1 200 OK")
            .form(login_form()),
    );
    let (channel, rx) = ChannelSink::unbounded();
    let sink: Arc<dyn ProgressSink> = Arc::new(channel);

    let resolver = move |form: &AuthForm| -> Result<FormValues, AuthAbort> {
        let seen: Vec<String> = rx.try_iter().map(|m| m.text).collect();
        assert_eq!(seen[0], "Connected to vpn.example.com");
        assert_eq!(seen[1], "Got HTTP response: HTTP/1.1 200 OK");
        assert!(seen[2].contains("main"));
        Ok(form.fields.iter().map(|f| (f.name.clone(), "x")).collect())
    };

    assert_eq!(drive(&engine, &f5(), resolver, sink).unwrap(), Outcome::Success);
}

#[test]
fn engine_init_runs_once_across_sessions() {
    let engine = ScriptedEngine::new(Script::new().form(login_form()));
    for _ in 0..3 {
        let sink = Arc::new(MemorySink::new());
        assert_eq!(
            drive(&engine, &f5(), static_resolver(), sink).unwrap(),
            Outcome::Success
        );
    }
    let journal = engine.journal();
    assert_eq!(journal.init_calls, 1);
    assert_eq!(journal.sessions_created, 3);
    assert_eq!(journal.destroy_calls, 3);
}

#[test]
fn failed_init_is_reported_every_time() {
    let script = Script {
        init_failure: Some("no TLS backend".to_string()),
        ..Script::new()
    };
    let engine = ScriptedEngine::new(script);
    for _ in 0..2 {
        let sink = Arc::new(MemorySink::new());
        let err = drive(&engine, &f5(), static_resolver(), sink.clone()).unwrap_err();
        assert_eq!(err.outcome(), Outcome::FatalConfigError);
        assert!(sink.has_errors());
    }
    let journal = engine.journal();
    assert_eq!(journal.init_calls, 1);
    assert_eq!(journal.sessions_created, 0);
}
