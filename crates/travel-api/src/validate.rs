//! Input checks run before any network call

use api_client::{Error, Result};

/// Check a path identifier and return it trimmed.
///
/// Identifiers are spliced into URL paths, so anything that would change
/// the path structure (`/ ? # %` or whitespace) is rejected.
pub fn id<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    if let Some(c) = trimmed
        .chars()
        .find(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
    {
        return Err(Error::Validation(format!(
            "{what} contains invalid character {c:?}"
        )));
    }
    Ok(trimmed)
}

/// Check a free-text field is not blank and return it trimmed.
pub fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

pub fn email(value: &str) -> Result<&str> {
    let trimmed = non_empty("email", value)?;
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::Validation(format!("{trimmed:?} is not an email address")));
    }
    Ok(trimmed)
}

/// Passwords are sent as typed; only emptiness is checked.
pub fn password(value: &str) -> Result<&str> {
    if value.is_empty() {
        return Err(Error::Validation("password must not be empty".into()));
    }
    Ok(value)
}

pub fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<()> {
    if let Some(lat) = latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        return Err(Error::Validation(format!("latitude {lat} out of range")));
    }
    if let Some(long) = longitude
        && !(-180.0..=180.0).contains(&long)
    {
        return Err(Error::Validation(format!("longitude {long} out of range")));
    }
    if latitude.is_some() != longitude.is_some() {
        return Err(Error::Validation(
            "latitude and longitude must be set together".into(),
        ));
    }
    Ok(())
}

/// ISO dates compare correctly as strings; empty dates are not checked.
pub fn date_range(start: &str, end: &str) -> Result<()> {
    if !start.is_empty() && !end.is_empty() && start > end {
        return Err(Error::Validation(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok(())
}
