//! Identifier and alphabet validation, and the global maxima every algorithm is checked against.

use crate::error::{Result, StructuralError};

pub const MAX_NUMBER_OF_VOTING_OPTIONS: usize = 5000;
pub const MAX_NUMBER_OF_SELECTIONS: usize = 120;
pub const MAX_NUMBER_OF_WRITE_INS: usize = 15;
pub const NUMBER_OF_CONTROL_COMPONENTS: usize = 4;

/// Identifiers are 32 upper-case hexadecimal characters.
pub const ID_LENGTH: usize = 32;

pub const START_VOTING_KEY_LENGTH: usize = 24;
pub const START_VOTING_KEY_ALPHABET: &str = "abcdefghijkmnpqrstuvwxyz23456789";

/// Extended authentication factor lengths: birth year or full birth date.
pub const EXTENDED_AUTHENTICATION_FACTOR_LENGTHS: [usize; 2] = [4, 8];

const BASE64_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn invalid(what: &'static str, value: &str) -> crate::error::Error {
    StructuralError::InvalidFormat {
        what,
        value: value.to_owned(),
    }
    .into()
}

/// Election event, verification card set and verification card ids.
pub fn validate_uuid(value: &str) -> Result<&str> {
    if value.len() != ID_LENGTH || !value.chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')) {
        return Err(invalid("identifier", value));
    }
    Ok(value)
}

pub fn validate_uuids<S: AsRef<str>>(values: &[S]) -> Result<()> {
    for value in values.iter() {
        validate_uuid(value.as_ref())?;
    }
    Ok(())
}

pub fn validate_base16(value: &str) -> Result<&str> {
    if value.len() % 2 != 0 || !value.chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')) {
        return Err(invalid("base16 string", value));
    }
    Ok(value)
}

/// Padded Base64; the padding may only appear at the end.
pub fn validate_base64(value: &str) -> Result<&str> {
    if !is_padded(value, 4, BASE64_ALPHABET, 2) {
        return Err(invalid("base64 string", value));
    }
    Ok(value)
}

pub fn validate_base32(value: &str) -> Result<&str> {
    if !is_padded(value, 8, BASE32_ALPHABET, 6) {
        return Err(invalid("base32 string", value));
    }
    Ok(value)
}

fn is_padded(value: &str, block: usize, alphabet: &str, max_padding: usize) -> bool {
    let body = value.trim_end_matches('=');
    value.len() % block == 0
        && value.len() - body.len() <= max_padding
        && body.chars().all(|c| alphabet.contains(c))
}

pub fn validate_digits(value: &str) -> Result<&str> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("decimal string", value));
    }
    Ok(value)
}

pub fn validate_start_voting_key(value: &str) -> Result<&str> {
    if value.len() != START_VOTING_KEY_LENGTH
        || !value.chars().all(|c| START_VOTING_KEY_ALPHABET.contains(c))
    {
        return Err(invalid("start voting key", value));
    }
    Ok(value)
}

pub fn validate_extended_authentication_factor_length(length: usize) -> Result<usize> {
    if !EXTENDED_AUTHENTICATION_FACTOR_LENGTHS.contains(&length) {
        return Err(StructuralError::Configuration(format!(
            "extended authentication factor length must be 4 or 8, found {}",
            length
        ))
        .into());
    }
    Ok(length)
}

/// All digits and exactly `length` long.
pub fn validate_extended_authentication_factor(value: &str, length: usize) -> Result<&str> {
    validate_extended_authentication_factor_length(length)?;
    if value.len() != length || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("extended authentication factor", value));
    }
    Ok(value)
}

/// Rejects the first repeated id.
pub fn validate_distinct<S: AsRef<str>>(what: &'static str, values: &[S]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(values.len());
    for value in values.iter() {
        if !seen.insert(value.as_ref()) {
            return Err(StructuralError::Duplicate {
                what,
                value: value.as_ref().to_owned(),
            }
            .into());
        }
    }
    Ok(())
}
