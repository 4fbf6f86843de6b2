//! Interactive answers: ask a person for each field.

use crate::error::AuthAbort;
use crate::form::{AuthField, AuthForm, Choice, FieldKind};
use crate::provider::ValueProvider;
use console::{Style, Term};
use dialoguer::{Input, Password, Select};

/// Trait for providing credentials and user input.
///
/// The `request_*` methods return `None` when the prompt was dismissed.
pub trait CredentialsProvider: Send + Sync {
    fn request_text(&self, msg: &str) -> Option<String>;
    fn request_password(&self, msg: &str) -> Option<String>;
    /// Returns the index of the selected option.
    fn request_choice(&self, msg: &str, options: &[String]) -> Option<usize>;
    /// Server banners and messages shown alongside a form.
    fn show_message(&self, _msg: &str) {}
}

/// Prompts on the terminal through `dialoguer`.
pub struct TerminalCredentialsProvider;

impl CredentialsProvider for TerminalCredentialsProvider {
    fn request_text(&self, msg: &str) -> Option<String> {
        let term = Term::stderr();
        let _ = term.clear_line();
        Input::<String>::new()
            .with_prompt(msg)
            .allow_empty(true)
            .interact_text()
            .ok()
    }

    fn request_password(&self, msg: &str) -> Option<String> {
        let term = Term::stderr();
        let _ = term.clear_line();
        Password::new().with_prompt(msg).interact().ok()
    }

    fn request_choice(&self, msg: &str, options: &[String]) -> Option<usize> {
        Select::new()
            .with_prompt(msg)
            .items(options)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()
    }

    fn show_message(&self, msg: &str) {
        let bold = Style::new().bold();
        eprintln!("{} {}", bold.apply_to(">>"), msg.trim_end());
    }
}

/// Fills fields by asking a [`CredentialsProvider`].
///
/// An empty answer for a field that has a default keeps the default.
pub struct PromptProvider<C> {
    credentials: C,
}

impl<C: CredentialsProvider> PromptProvider<C> {
    pub fn new(credentials: C) -> Self {
        Self { credentials }
    }
}

impl<C: CredentialsProvider> ValueProvider for PromptProvider<C> {
    fn begin_form(&mut self, form: &AuthForm) -> Result<(), AuthAbort> {
        let notes = [&form.banner, &form.message, &form.error];
        for note in notes.into_iter().flatten() {
            self.credentials.show_message(note);
        }
        Ok(())
    }

    fn provide(
        &mut self,
        _form: &AuthForm,
        field: &AuthField,
    ) -> Result<Option<String>, AuthAbort> {
        let prompt = field.prompt();
        let answer = match field.kind {
            FieldKind::Hidden => return Ok(None),
            FieldKind::Text | FieldKind::Token => self.credentials.request_text(prompt),
            FieldKind::Password => self.credentials.request_password(prompt),
            FieldKind::Choice => {
                let options: Vec<String> =
                    field.choices.iter().map(|c| c.display().to_string()).collect();
                self.credentials
                    .request_choice(prompt, &options)
                    .and_then(|index| field.choices.get(index))
                    .map(|choice: &Choice| choice.name.clone())
            }
        };

        match answer {
            Some(value) if value.is_empty() && field.default.is_some() => Ok(None),
            Some(value) => Ok(Some(value)),
            None => Err(AuthAbort::Dismissed {
                field: field.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Canned {
        text: Option<String>,
        password: Option<String>,
        choice: Option<usize>,
        shown: Mutex<Vec<String>>,
        asked: Mutex<Vec<String>>,
    }

    impl CredentialsProvider for Canned {
        fn request_text(&self, msg: &str) -> Option<String> {
            self.asked.lock().unwrap().push(msg.to_string());
            self.text.clone()
        }
        fn request_password(&self, msg: &str) -> Option<String> {
            self.asked.lock().unwrap().push(msg.to_string());
            self.password.clone()
        }
        fn request_choice(&self, msg: &str, _options: &[String]) -> Option<usize> {
            self.asked.lock().unwrap().push(msg.to_string());
            self.choice
        }
        fn show_message(&self, msg: &str) {
            self.shown.lock().unwrap().push(msg.to_string());
        }
    }

    #[test]
    fn test_prompts_by_kind() {
        let canned = Canned {
            text: Some("vicwil".to_string()),
            password: Some("test123".to_string()),
            choice: Some(1),
            ..Canned::default()
        };
        let mut provider = PromptProvider::new(canned);
        let form = AuthForm::new(vec![
            AuthField::text("username").with_label("Username:"),
            AuthField::password("password"),
            AuthField::choice("method", ["push", "sms"]),
        ])
        .with_error("Invalid username or password");

        provider.begin_form(&form).unwrap();
        let answers: Vec<_> = form
            .fields
            .iter()
            .map(|f| provider.provide(&form, f).unwrap())
            .collect();
        assert_eq!(
            answers,
            vec![
                Some("vicwil".to_string()),
                Some("test123".to_string()),
                Some("sms".to_string())
            ]
        );
        let canned = &provider.credentials;
        assert_eq!(
            *canned.asked.lock().unwrap(),
            vec!["Username", "password", "method"]
        );
        assert_eq!(
            *canned.shown.lock().unwrap(),
            vec!["Invalid username or password"]
        );
    }

    #[test]
    fn test_dismissed_prompt_aborts() {
        let mut provider = PromptProvider::new(Canned::default());
        let field = AuthField::password("password");
        let form = AuthForm::new(vec![field.clone()]);
        assert_eq!(
            provider.provide(&form, &field),
            Err(AuthAbort::Dismissed {
                field: "password".to_string()
            })
        );
    }

    #[test]
    fn test_empty_answer_keeps_default() {
        let mut provider = PromptProvider::new(Canned {
            text: Some(String::new()),
            ..Canned::default()
        });
        let field = AuthField::text("group").with_default("staff");
        let form = AuthForm::new(vec![field.clone()]);
        assert_eq!(provider.provide(&form, &field), Ok(None));
    }
}
