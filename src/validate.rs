use serde::Deserialize;
use serde_json::Value;

use crate::err::FieldErrors;

/// A number sent either as a JSON number or as a numeric string. Any other
/// JSON value is kept so it can be reported against its field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Numeric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(text) => text.trim().parse::<f64>().ok(),
            Numeric::Other(_) => None,
        }
        .filter(|n| n.is_finite())
    }
}

/// A string field as sent; non-string JSON values fail validation instead of
/// deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Plain(String),
    Other(Value),
}

impl Text {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Text::Plain(text) => Some(text),
            Text::Other(_) => None,
        }
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Text::Plain(text)
    }
}

/// Collects field-level failures for one request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail<S: Into<String>>(&mut self, field: &str, message: S) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Present, non-blank string no longer than `max` characters.
    pub fn string<'a>(&mut self, field: &str, value: Option<&'a Text>, max: usize) -> Option<&'a str> {
        let value = self.required(field, value)?;
        if value.chars().count() > max {
            self.fail(
                field,
                format!("The {} field must not be greater than {} characters.", field, max),
            );
            return None;
        }
        Some(value)
    }

    pub fn required<'a>(&mut self, field: &str, value: Option<&'a Text>) -> Option<&'a str> {
        match value {
            Some(Text::Plain(value)) if !value.trim().is_empty() => Some(value),
            Some(Text::Other(_)) => {
                self.fail(field, format!("The {} field must be a string.", field));
                None
            }
            _ => {
                self.fail(field, format!("The {} field is required.", field));
                None
            }
        }
    }

    /// Optional string; blank counts as absent.
    pub fn optional_string<'a>(&mut self, field: &str, value: Option<&'a Text>, max: usize) -> Option<&'a str> {
        match value {
            Some(Text::Plain(text)) if text.trim().is_empty() => None,
            Some(_) => self.string(field, value, max),
            None => None,
        }
    }

    pub fn email<'a>(&mut self, field: &str, value: Option<&'a Text>, max: usize) -> Option<&'a str> {
        let value = self.string(field, value, max)?;
        if !is_email(value) {
            self.fail(field, format!("The {} field must be a valid email address.", field));
            return None;
        }
        Some(value)
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) -> bool {
        if value.chars().count() < min {
            self.fail(
                field,
                format!("The {} field must be at least {} characters.", field, min),
            );
            return false;
        }
        true
    }

    /// `field` must equal its `<field>_confirmation` companion.
    pub fn confirmed(&mut self, field: &str, value: &str, confirmation: Option<&str>) -> bool {
        if confirmation != Some(value) {
            self.fail(field, format!("The {} field confirmation does not match.", field));
            return false;
        }
        true
    }

    pub fn number_between(&mut self, field: &str, value: Option<&Numeric>, min: f64, max: f64) -> Option<f64> {
        let Some(raw) = value else {
            self.fail(field, format!("The {} field is required.", field));
            return None;
        };
        self.check_between(field, raw, min, max)
    }

    /// Like [`Validator::number_between`] but absence is accepted.
    pub fn optional_number_between(
        &mut self,
        field: &str,
        value: Option<&Numeric>,
        min: f64,
        max: f64,
    ) -> Option<f64> {
        match value {
            None => None,
            Some(Numeric::Text(text)) if text.trim().is_empty() => None,
            Some(raw) => self.check_between(field, raw, min, max),
        }
    }

    pub fn integer(&mut self, field: &str, value: Option<&Numeric>) -> Option<i64> {
        let Some(raw) = value else {
            self.fail(field, format!("The {} field is required.", field));
            return None;
        };
        match raw.value() {
            Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(n as i64),
            _ => {
                self.fail(field, format!("The {} field must be an integer.", field));
                None
            }
        }
    }

    pub fn one_of<'a>(&mut self, field: &str, value: Option<&'a Text>, allowed: &[&str]) -> Option<&'a str> {
        let value = match value {
            Some(Text::Other(_)) => None,
            _ => Some(self.required(field, value)?),
        };
        match value {
            Some(value) if allowed.contains(&value) => Some(value),
            _ => {
                self.fail(field, format!("The selected {} is invalid.", field));
                None
            }
        }
    }

    pub fn unique(&mut self, field: &str, taken: bool) {
        if taken {
            self.fail(field, format!("The {} has already been taken.", field));
        }
    }

    pub fn exists(&mut self, field: &str, found: bool) {
        if !found {
            self.fail(field, format!("The selected {} is invalid.", field));
        }
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn check_between(&mut self, field: &str, raw: &Numeric, min: f64, max: f64) -> Option<f64> {
        let Some(n) = raw.value() else {
            self.fail(field, format!("The {} field must be a number.", field));
            return None;
        };
        if n < min || n > max {
            self.fail(
                field,
                format!("The {} field must be between {} and {}.", field, min, max),
            );
            return None;
        }
        Some(n)
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !domain.starts_with('.')
        }
        None => false,
    }
}
