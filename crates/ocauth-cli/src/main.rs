//! # ocauth
//!
//! Runs one scripted authentication negotiation through the ocauth session
//! driver and exits with a code describing the outcome.

mod args;
mod scenario;

use anyhow::{bail, Context, Result};
use args::{Args, ProgressOutput};
use clap::Parser;
use console::Style;
use log::{error, info};
use ocauth::progress::{LogSink, StreamSink};
use ocauth::prompt::{PromptProvider, TerminalCredentialsProvider};
use ocauth::{
    drive, init_logger, DriverError, FieldKind, FieldValue, KeyringProvider, Outcome,
    ProgressSink, ProviderChain, Resolver, ScriptedEngine, SecretKind, SecretStore,
    SessionConfig, StaticProvider, SystemKeyring, TotpSeed,
};
use scenario::ScenarioFile;
use std::process::ExitCode;
use std::sync::Arc;

/// Session settings: config file, then scenario, then command-line overrides.
fn session_config(args: &Args, scenario: &ScenarioFile) -> Result<SessionConfig> {
    let base = match &args.config {
        Some(path) => Some(SessionConfig::load(path)?),
        None => scenario.session.clone(),
    };
    let mut config = match (base, &args.protocol, &args.url) {
        (Some(config), _, _) => config,
        (None, Some(protocol), Some(url)) => SessionConfig::new(protocol.as_str(), url.as_str()),
        (None, _, _) => bail!("No session configured: pass --protocol and --url"),
    };

    if let Some(protocol) = &args.protocol {
        config.protocol = protocol.clone();
    }
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if args.no_dtls {
        config.disable_dtls = true;
    }
    if let Some(max_forms) = args.max_forms {
        config.max_forms = max_forms;
    }
    Ok(config)
}

/// Static answers from the command line, then the keyring account, then the
/// terminal prompt.
fn provider_chain<S>(args: &Args, store: S) -> Result<ProviderChain>
where
    S: SecretStore + 'static,
{
    let seed = args
        .otp_secret
        .as_deref()
        .map(TotpSeed::new)
        .transpose()
        .context("Invalid --otp-secret")?;

    let mut answers = StaticProvider::new();
    for (name, value) in &args.fields {
        answers = answers.with_field(name.as_str(), value.as_str());
    }
    // Token fields take the code even when named like a password.
    if let Some(seed) = &seed {
        answers = answers.with_kind(FieldKind::Token, seed.clone());
    }
    if let Some(user) = &args.user {
        answers = answers.with_rule(&["user", "name"], user.as_str());
    }
    match (&args.pin, &seed, &args.password) {
        (Some(pin), Some(seed), _) => {
            answers = answers.with_rule(
                &["pass", "secret"],
                FieldValue::pin_and_totp(pin.as_str(), seed.clone()),
            );
        }
        (_, _, Some(password)) => {
            answers = answers.with_rule(&["pass", "secret"], password.as_str());
        }
        _ => {}
    }

    let mut chain = ProviderChain::new().with(answers);
    if let Some(account) = &args.keyring {
        chain = chain.with(KeyringProvider::new(store, account.as_str()));
    }
    if args.interactive {
        chain = chain.with(PromptProvider::new(TerminalCredentialsProvider));
    }
    Ok(chain)
}

/// Stores the secrets given on the command line under the `--keyring` account.
fn save_secrets(args: &Args, store: &impl SecretStore) -> Result<usize> {
    let Some(account) = &args.keyring else {
        bail!("--save-keyring needs --keyring ACCOUNT");
    };
    let secrets = [
        (SecretKind::Password, &args.password),
        (SecretKind::Pin, &args.pin),
        (SecretKind::OtpSecret, &args.otp_secret),
    ];
    let mut saved = 0;
    for (kind, secret) in secrets {
        if let Some(secret) = secret {
            store
                .set(kind, account, secret)
                .with_context(|| format!("Failed to save {} for {}", kind.service(), account))?;
            saved += 1;
        }
    }
    if saved == 0 {
        bail!("Nothing to save: pass --password, --pin or --otp-secret");
    }
    info!("Saved {} secret(s) for {} in the keyring", saved, account);
    Ok(saved)
}

fn progress_sink(args: &Args) -> Arc<dyn ProgressSink> {
    match args.progress {
        ProgressOutput::Stdio => {
            Arc::new(StreamSink::stdio().with_max_severity(args.progress_level.into()))
        }
        ProgressOutput::Log => Arc::new(LogSink),
    }
}

fn run(args: &Args) -> Result<Outcome> {
    run_with(args, SystemKeyring)
}

fn run_with<S>(args: &Args, store: S) -> Result<Outcome>
where
    S: SecretStore + 'static,
{
    let scenario = ScenarioFile::load(&args.scenario)?;
    let config = session_config(args, &scenario)?;
    info!(
        "Negotiating {} session with {}",
        config.protocol,
        config.normalized_url()
    );

    if args.save_keyring {
        save_secrets(args, &store)?;
    }
    let engine = ScriptedEngine::new(scenario.script);
    let resolver = Resolver::new(provider_chain(args, store)?);
    let outcome = drive(&engine, &config, resolver, progress_sink(args))?;

    let journal = engine.journal();
    info!(
        "Forms presented: {}, submitted: {}",
        journal.forms_presented,
        journal.submissions.len()
    );
    Ok(outcome)
}

/// Driver errors keep their own outcome; anything else is a setup failure.
fn outcome_of(result: Result<Outcome>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<DriverError>()
                .map_or(Outcome::FatalConfigError, DriverError::outcome)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.level.into());

    let outcome = outcome_of(run(&args));

    let style = if outcome.is_success() {
        Style::new().green().bold()
    } else {
        Style::new().red().bold()
    };
    eprintln!("{}", style.apply_to(outcome));
    ExitCode::from(outcome.exit_code())
}
