use crate::error::AuthAbort;
use crate::form::{AuthField, AuthForm, FieldKind, FormValues};
use crate::provider::ValueProvider;

/// Turns one authentication form into the values to submit.
pub trait FormResolver {
    fn resolve(&mut self, form: &AuthForm) -> Result<FormValues, AuthAbort>;
}

impl<F> FormResolver for F
where
    F: FnMut(&AuthForm) -> Result<FormValues, AuthAbort>,
{
    fn resolve(&mut self, form: &AuthForm) -> Result<FormValues, AuthAbort> {
        self(form)
    }
}

/// Resolves forms field by field through a [`ValueProvider`].
///
/// Hidden fields are skipped. Choice answers are checked against the declared
/// choices before anything is submitted. A required field with neither an
/// answer nor a default aborts the form.
pub struct Resolver<P> {
    provider: P,
}

impl<P: ValueProvider> Resolver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_inner(self) -> P {
        self.provider
    }
}

fn check_choice(field: &AuthField, value: &str) -> Result<(), AuthAbort> {
    if field.kind == FieldKind::Choice && !field.allows(value) {
        return Err(AuthAbort::InvalidChoice {
            field: field.name.clone(),
            value: value.to_string(),
            allowed: field.choice_names(),
        });
    }
    Ok(())
}

impl<P: ValueProvider> FormResolver for Resolver<P> {
    fn resolve(&mut self, form: &AuthForm) -> Result<FormValues, AuthAbort> {
        self.provider.begin_form(form)?;

        let mut values = FormValues::new();
        for field in &form.fields {
            if field.kind == FieldKind::Hidden {
                continue;
            }
            match self.provider.provide(form, field)? {
                Some(value) => {
                    check_choice(field, &value)?;
                    values.insert(field.name.as_str(), value);
                }
                None if field.required && field.default.is_none() => {
                    return Err(AuthAbort::MissingValue {
                        field: field.name.clone(),
                    });
                }
                None => log::debug!("Leaving field '{}' unset", field.name),
            }
        }
        Ok(values)
    }
}
