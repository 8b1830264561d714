//! Validation of player-supplied character names, classes and passwords.
//!
//! Names are stored in tab-separated files and looked up case-insensitively,
//! so they must not contain tabs, control characters or a leading `#`.

use std::collections::HashSet;

/// Character name validation errors with helpful messages
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name cannot start with '#'")]
    LeadingHash,

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Name is reserved")]
    Reserved,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ClassError {
    #[error("Class cannot be empty")]
    Empty,

    #[error("Class is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Class contains control characters")]
    ControlCharacters,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PasswordError {
    #[error("Password is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Password is too long (maximum {max} characters)")]
    TooLong { max: usize },
}

pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_PASSWORD_LEN: usize = 128;

fn reserved_names() -> HashSet<&'static str> {
    [
        "register", "login", "logout", "status", "whoami", "align", "help", "quest", "top",
        "admin", "root", "system", "nobody",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a character name. Returns the trimmed name on success.
pub fn validate_character_name(name: &str, max_len: usize) -> Result<String, NameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(NameError::TooLong { max: max_len });
    }
    if trimmed.starts_with('#') {
        return Err(NameError::LeadingHash);
    }

    let invalid: HashSet<char> = trimmed
        .chars()
        .filter(|c| c.is_control() || c.is_whitespace())
        .collect();
    if !invalid.is_empty() {
        let chars = invalid
            .into_iter()
            .map(|c| format!("\\u{{{:04x}}}", c as u32))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(NameError::InvalidCharacters { chars });
    }

    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(NameError::Reserved);
    }
    Ok(trimmed.to_string())
}

/// Validate a class label. Spaces are allowed, tabs and other control
/// characters are not.
pub fn validate_class(class: &str, max_len: usize) -> Result<String, ClassError> {
    let trimmed = class.trim();
    if trimmed.is_empty() {
        return Err(ClassError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(ClassError::TooLong { max: max_len });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ClassError::ControlCharacters);
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if len > MAX_PASSWORD_LEN {
        return Err(PasswordError::TooLong {
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}
