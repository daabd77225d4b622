use serde::Deserialize;
use thiserror::Error;

/// Why a submitted form was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid email address")]
    InvalidEmail,
}

/// Login form fields
///
/// Absent fields deserialize as empty strings so that a malformed post is
/// reported through `validate` instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormError> {
        required("username", &self.username)?;
        required("password", &self.password)
    }
}

/// Registration form fields
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FormError> {
        required("username", &self.username)?;
        required("email", &self.email)?;
        required("password", &self.password)?;
        if !is_email(&self.email) {
            return Err(FormError::InvalidEmail);
        }
        Ok(())
    }
}

fn required(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        Err(FormError::Missing(field))
    } else {
        Ok(())
    }
}

// local@domain.tld, no whitespace
fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
