//! Validation for the two identifiers the backend keys user records on.
//!
//! The licence-number rules mirror the DVLA format: sixteen characters, the
//! first five being surname initials padded with `9`s, with the special case
//! that a `MAC` surname prefix is recorded as `MC`.

use std::fmt;

pub const LICENCE_NUMBER_LEN: usize = 16;
pub const APPLICATION_REF_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    LicenceLength,
    LicenceSurname,
    ApplicationRef,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::LicenceLength => {
                write!(f, "driving licence number must be {LICENCE_NUMBER_LEN} characters long")
            }
            CredentialError::LicenceSurname => write!(
                f,
                "first five characters must contain valid surname initials or be padded with 9s"
            ),
            CredentialError::ApplicationRef => {
                write!(f, "application reference must be {APPLICATION_REF_LEN} digits")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Uppercase and strip everything the mobile keyboard lets through.
pub fn normalize_licence_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn validate_licence_number(number: &str) -> Result<(), CredentialError> {
    if number.chars().count() != LICENCE_NUMBER_LEN {
        return Err(CredentialError::LicenceLength);
    }

    let surname_part: String = number.chars().take(5).filter(|c| *c != '9').collect();
    let surname_part = match surname_part.strip_prefix("MAC") {
        Some(rest) => format!("MC{rest}"),
        None => surname_part,
    };

    if surname_part.is_empty() || !surname_part.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(CredentialError::LicenceSurname);
    }

    Ok(())
}

pub fn validate_application_ref(reference: &str) -> Result<(), CredentialError> {
    let valid = reference.chars().count() == APPLICATION_REF_LEN
        && reference.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(CredentialError::ApplicationRef)
    }
}
