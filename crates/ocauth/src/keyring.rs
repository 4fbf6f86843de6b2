//! Secrets kept in the system keyring.
//!
//! A [`KeyringProvider`] answers username, password and token fields from
//! secrets stored per account: a plain password, or a PIN plus a TOTP
//! secret that are combined into `PIN + code` at resolution time.

use crate::error::{AuthAbort, KeyringError};
use crate::form::{AuthField, AuthForm, FieldKind};
use crate::provider::{FieldValue, ValueProvider};
use crate::totp::TotpSeed;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Which secret an entry holds. Each kind is a separate keyring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    Password,
    Pin,
    OtpSecret,
}

impl SecretKind {
    pub fn service(self) -> &'static str {
        match self {
            SecretKind::Password => "ocauth-password",
            SecretKind::Pin => "ocauth-pin",
            SecretKind::OtpSecret => "ocauth-otp",
        }
    }
}

/// Storage for per-account secrets.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when nothing is stored for `account`.
    fn get(&self, kind: SecretKind, account: &str) -> Result<Option<String>, KeyringError>;
    fn set(&self, kind: SecretKind, account: &str, secret: &str) -> Result<(), KeyringError>;
    fn delete(&self, kind: SecretKind, account: &str) -> Result<(), KeyringError>;
}

/// The platform keyring (Secret Service, Keychain, Credential Manager).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKeyring;

fn entry(kind: SecretKind, account: &str) -> Result<::keyring::Entry, KeyringError> {
    ::keyring::Entry::new(kind.service(), account)
        .map_err(|e| KeyringError::Unavailable(e.to_string()))
}

impl SecretStore for SystemKeyring {
    fn get(&self, kind: SecretKind, account: &str) -> Result<Option<String>, KeyringError> {
        match entry(kind, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(::keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyringError::RetrieveFailed(e.to_string())),
        }
    }

    fn set(&self, kind: SecretKind, account: &str, secret: &str) -> Result<(), KeyringError> {
        entry(kind, account)?
            .set_password(secret)
            .map_err(|e| KeyringError::StoreFailed(e.to_string()))
    }

    fn delete(&self, kind: SecretKind, account: &str) -> Result<(), KeyringError> {
        match entry(kind, account)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeyringError::StoreFailed(e.to_string())),
        }
    }
}

/// In-memory store for tests and environments without a keyring daemon.
/// Clones share the same entries.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyring {
    entries: Arc<Mutex<HashMap<(SecretKind, String), String>>>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(SecretKind, String), String>>, KeyringError> {
        self.entries
            .lock()
            .map_err(|_| KeyringError::Unavailable("memory keyring poisoned".to_string()))
    }
}

impl SecretStore for MemoryKeyring {
    fn get(&self, kind: SecretKind, account: &str) -> Result<Option<String>, KeyringError> {
        Ok(self.entries()?.get(&(kind, account.to_string())).cloned())
    }

    fn set(&self, kind: SecretKind, account: &str, secret: &str) -> Result<(), KeyringError> {
        self.entries()?
            .insert((kind, account.to_string()), secret.to_string());
        Ok(())
    }

    fn delete(&self, kind: SecretKind, account: &str) -> Result<(), KeyringError> {
        self.entries()?.remove(&(kind, account.to_string()));
        Ok(())
    }
}

/// Answers fields from the secrets stored for one account.
///
/// - `token` fields get a code from the stored OTP secret;
/// - password-like fields get `PIN + code` when both a PIN and an OTP secret
///   are stored, otherwise the stored password;
/// - text fields named like a user name get the account name.
pub struct KeyringProvider<S> {
    store: S,
    account: String,
}

impl<S: SecretStore> KeyringProvider<S> {
    pub fn new(store: S, account: impl Into<String>) -> Self {
        Self {
            store,
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn secret(&self, field: &AuthField, kind: SecretKind) -> Result<Option<String>, AuthAbort> {
        self.store
            .get(kind, &self.account)
            .map(|s| s.map(|s| s.trim().to_string()))
            .map_err(|source| AuthAbort::Keyring {
                field: field.name.clone(),
                source,
            })
    }

    fn seed(&self, field: &AuthField) -> Result<Option<TotpSeed>, AuthAbort> {
        self.secret(field, SecretKind::OtpSecret)?
            .map(|secret| {
                TotpSeed::new(&secret).map_err(|source| AuthAbort::Otp {
                    field: field.name.clone(),
                    source,
                })
            })
            .transpose()
    }

    fn value_for(&self, field: &AuthField) -> Result<Option<FieldValue>, AuthAbort> {
        let name = field.name.to_lowercase();
        let value = match field.kind {
            FieldKind::Token => self.seed(field)?.map(FieldValue::Totp),
            FieldKind::Password => self.password(field)?,
            FieldKind::Text if name.contains("pass") || name.contains("secret") => {
                self.password(field)?
            }
            FieldKind::Text if name.contains("user") || name.contains("name") => {
                Some(FieldValue::Literal(self.account.clone()))
            }
            _ => None,
        };
        Ok(value)
    }

    fn password(&self, field: &AuthField) -> Result<Option<FieldValue>, AuthAbort> {
        if let Some(pin) = self.secret(field, SecretKind::Pin)? {
            if let Some(seed) = self.seed(field)? {
                return Ok(Some(FieldValue::pin_and_totp(pin, seed)));
            }
        }
        Ok(self
            .secret(field, SecretKind::Password)?
            .map(FieldValue::Literal))
    }
}

impl<S: SecretStore> ValueProvider for KeyringProvider<S> {
    fn provide(
        &mut self,
        _form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        self.value_for(field)?
            .map(|value| value.produce_at(field, None))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn ask(provider: &mut KeyringProvider<MemoryKeyring>, field: AuthField) -> Option<String> {
        let form = AuthForm::new(vec![field.clone()]);
        provider.provide(&form, &field).unwrap()
    }

    #[test]
    fn test_memory_keyring_round_trip() {
        let store = MemoryKeyring::new();
        assert_eq!(store.get(SecretKind::Pin, "vicwil"), Ok(None));
        store.set(SecretKind::Pin, "vicwil", "1234").unwrap();
        assert_eq!(store.get(SecretKind::Pin, "vicwil"), Ok(Some("1234".to_string())));
        assert_eq!(store.get(SecretKind::Pin, "other"), Ok(None));
        assert_eq!(store.get(SecretKind::Password, "vicwil"), Ok(None));
        store.delete(SecretKind::Pin, "vicwil").unwrap();
        assert_eq!(store.get(SecretKind::Pin, "vicwil"), Ok(None));
    }

    #[test]
    fn test_stored_password() {
        let store = MemoryKeyring::new();
        store.set(SecretKind::Password, "vicwil", "test123\n").unwrap();
        let mut provider = KeyringProvider::new(store, "vicwil");

        assert_eq!(ask(&mut provider, AuthField::text("username")).as_deref(), Some("vicwil"));
        assert_eq!(ask(&mut provider, AuthField::password("password")).as_deref(), Some("test123"));
        assert_eq!(ask(&mut provider, AuthField::token("otp")), None);
        assert_eq!(ask(&mut provider, AuthField::text("group")), None);
    }

    #[test]
    fn test_pin_and_otp_secret_combine() {
        let store = MemoryKeyring::new();
        store.set(SecretKind::Password, "vicwil", "ignored").unwrap();
        store.set(SecretKind::Pin, "vicwil", "1234").unwrap();
        store.set(SecretKind::OtpSecret, "vicwil", SECRET).unwrap();
        let mut provider = KeyringProvider::new(store, "vicwil");

        let password = ask(&mut provider, AuthField::password("password")).unwrap();
        assert_eq!(password.len(), 10);
        assert!(password.starts_with("1234"));
        assert!(password[4..].chars().all(|c| c.is_ascii_digit()));

        let token = ask(&mut provider, AuthField::token("passcode")).unwrap();
        assert_eq!(token.len(), 6);
    }

    #[test]
    fn test_bad_otp_secret_aborts() {
        let store = MemoryKeyring::new();
        store.set(SecretKind::OtpSecret, "vicwil", "not base32!").unwrap();
        let mut provider = KeyringProvider::new(store, "vicwil");
        let field = AuthField::token("otp");
        let form = AuthForm::new(vec![field.clone()]);
        assert!(matches!(
            provider.provide(&form, &field),
            Err(AuthAbort::Otp { .. })
        ));
    }

    struct Unavailable;

    impl SecretStore for Unavailable {
        fn get(&self, _: SecretKind, _: &str) -> Result<Option<String>, KeyringError> {
            Err(KeyringError::Unavailable("no secret service".to_string()))
        }
        fn set(&self, _: SecretKind, _: &str, _: &str) -> Result<(), KeyringError> {
            Err(KeyringError::Unavailable("no secret service".to_string()))
        }
        fn delete(&self, _: SecretKind, _: &str) -> Result<(), KeyringError> {
            Ok(())
        }
    }

    #[test]
    fn test_store_failure_aborts_form() {
        let mut provider = KeyringProvider::new(Unavailable, "vicwil");
        let field = AuthField::password("password");
        let form = AuthForm::new(vec![field.clone()]);
        assert_eq!(
            provider.provide(&form, &field),
            Err(AuthAbort::Keyring {
                field: "password".to_string(),
                source: KeyringError::Unavailable("no secret service".to_string()),
            })
        );
    }
}
