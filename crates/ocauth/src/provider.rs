//! Value providers: where the answers to form fields come from.

use crate::error::AuthAbort;
use crate::form::{AuthField, AuthForm, FieldKind};
use crate::totp::TotpSeed;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Supplies values for individual form fields.
///
/// `begin_form` is called once before the fields of a form are visited, so
/// stateful providers can advance to the next step.
pub trait ValueProvider {
    fn begin_form(&mut self, _form: &AuthForm) -> Result<(), AuthAbort> {
        Ok(())
    }

    /// `Ok(None)` means "no opinion"; the field is left unset.
    fn provide(&mut self, form: &AuthForm, field: &AuthField)
        -> Result<Option<String>, AuthAbort>;
}

impl<P: ValueProvider + ?Sized> ValueProvider for Box<P> {
    fn begin_form(&mut self, form: &AuthForm) -> Result<(), AuthAbort> {
        (**self).begin_form(form)
    }

    fn provide(
        &mut self,
        form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        (**self).provide(form, field)
    }
}

/// A configured answer: a fixed string or a freshly generated one-time code.
#[derive(Clone)]
pub enum FieldValue {
    Literal(String),
    Totp(TotpSeed),
    /// A static PIN followed by the current one-time code, for servers that
    /// expect both in a single password field.
    PinTotp { pin: String, seed: TotpSeed },
}

impl FieldValue {
    pub fn pin_and_totp(pin: impl Into<String>, seed: TotpSeed) -> Self {
        FieldValue::PinTotp {
            pin: pin.into(),
            seed,
        }
    }

    pub(crate) fn produce(&self, field: &AuthField) -> Result<String, AuthAbort> {
        self.produce_at(field, None)
    }

    /// Value for `field`; one-time codes use `unix_secs` when given.
    pub fn produce_at(&self, field: &AuthField, unix_secs: Option<u64>) -> Result<String, AuthAbort> {
        let code = |seed: &TotpSeed| match unix_secs {
            Some(secs) => Ok(seed.code_at(secs)),
            None => seed.code_now().map_err(|source| AuthAbort::Otp {
                field: field.name.clone(),
                source,
            }),
        };
        match self {
            FieldValue::Literal(value) => Ok(value.clone()),
            FieldValue::Totp(seed) => code(seed),
            FieldValue::PinTotp { pin, seed } => Ok(format!("{}{}", pin, code(seed)?)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Literal(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Literal(value)
    }
}

impl From<TotpSeed> for FieldValue {
    fn from(seed: TotpSeed) -> Self {
        FieldValue::Totp(seed)
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Literal(_) => f.write_str("Literal(<redacted>)"),
            FieldValue::Totp(seed) => f.debug_tuple("Totp").field(seed).finish(),
            FieldValue::PinTotp { seed, .. } => f
                .debug_struct("PinTotp")
                .field("pin", &"<redacted>")
                .field("seed", seed)
                .finish(),
        }
    }
}

// ── StaticProvider ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Matcher {
    Contains(Vec<String>),
    Kind(FieldKind),
}

impl Matcher {
    fn matches(&self, field: &AuthField) -> bool {
        match self {
            Matcher::Contains(patterns) => {
                let name = field.name.to_lowercase();
                patterns.iter().any(|p| name.contains(p.as_str()))
            }
            Matcher::Kind(kind) => field.kind == *kind,
        }
    }
}

/// Answers fields from a fixed table.
///
/// Exact field names are checked first, then the rules in the order they
/// were added. A rule matches when the lower-cased field name contains one of
/// its patterns, or when the field has the rule's kind.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    exact: Vec<(String, FieldValue)>,
    rules: Vec<(Matcher, FieldValue)>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual username/password pair: `user`/`name` fields get `identity`,
    /// `pass`/`secret` fields get `secret`.
    pub fn credentials(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::new()
            .with_rule(&["user", "name"], FieldValue::Literal(identity.into()))
            .with_rule(&["pass", "secret"], FieldValue::Literal(secret.into()))
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.exact.push((name.into(), value.into()));
        self
    }

    pub fn with_rule(mut self, patterns: &[&str], value: impl Into<FieldValue>) -> Self {
        let patterns = patterns.iter().map(|p| p.to_lowercase()).collect();
        self.rules.push((Matcher::Contains(patterns), value.into()));
        self
    }

    pub fn with_kind(mut self, kind: FieldKind, value: impl Into<FieldValue>) -> Self {
        self.rules.push((Matcher::Kind(kind), value.into()));
        self
    }

    fn lookup(&self, field: &AuthField) -> Option<&FieldValue> {
        self.exact
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(matcher, _)| matcher.matches(field))
                    .map(|(_, value)| value)
            })
    }
}

impl ValueProvider for StaticProvider {
    fn provide(
        &mut self,
        _form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        self.lookup(field).map(|v| v.produce(field)).transpose()
    }
}

// ── ScriptedProvider ──────────────────────────────────────────────────────────

/// Replays a fixed answer sheet, one map per form, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    pending: VecDeque<HashMap<String, String>>,
    current: HashMap<String, String>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<I, K, V>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.pending.push_back(
            answers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl ValueProvider for ScriptedProvider {
    fn begin_form(&mut self, form: &AuthForm) -> Result<(), AuthAbort> {
        self.current = self
            .pending
            .pop_front()
            .ok_or_else(|| AuthAbort::ScriptExhausted {
                form: form.label().to_string(),
            })?;
        Ok(())
    }

    fn provide(
        &mut self,
        _form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        Ok(self.current.get(&field.name).cloned())
    }
}

// ── ProviderChain ─────────────────────────────────────────────────────────────

/// Asks each provider in turn; the first one with a value wins.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn ValueProvider + Send>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl ValueProvider + Send + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ValueProvider for ProviderChain {
    fn begin_form(&mut self, form: &AuthForm) -> Result<(), AuthAbort> {
        for provider in &mut self.providers {
            provider.begin_form(form)?;
        }
        Ok(())
    }

    fn provide(
        &mut self,
        form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        for provider in &mut self.providers {
            if let Some(value) = provider.provide(form, field)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
