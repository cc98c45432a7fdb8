//! Default username formatter

use regex::Regex;

use super::Normalizer;
use crate::error::{Result, UserForgeError};

/// Longest user part accepted by the formatter
pub const MAX_USERNAME_LEN: usize = 256;

/// Default [`Normalizer`]: trims, strips a single `@realm` suffix, rejects
/// characters that cannot appear in a principal name and lower-cases.
pub struct UsernameFormatter {
    reserved: Regex,
}

impl UsernameFormatter {
    /// Create a new username formatter
    pub fn new() -> Self {
        Self {
            reserved: Regex::new(r#"[\s/\\:"\[\]<>|*?;,=+]"#)
                .expect("Failed to compile reserved character pattern"),
        }
    }

    /// Format a raw username
    pub fn format(&self, raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserForgeError::validation("Bad username: blank"));
        }

        let user = self.strip_realm(trimmed)?;
        self.validate_characters(user)?;

        if user.chars().count() > MAX_USERNAME_LEN {
            return Err(UserForgeError::validation(format!(
                "Bad username: longer than {} characters",
                MAX_USERNAME_LEN
            )));
        }

        Ok(user.to_lowercase())
    }

    fn strip_realm<'a>(&self, username: &'a str) -> Result<&'a str> {
        let mut parts = username.split('@');
        let user = parts.next().unwrap_or_default();
        let realm = parts.next();

        if parts.next().is_some() {
            return Err(UserForgeError::validation("Bad username: too many @ signs"));
        }
        if user.is_empty() {
            return Err(UserForgeError::validation("Bad username: empty user part"));
        }
        if realm.is_some_and(str::is_empty) {
            return Err(UserForgeError::validation("Bad username: empty realm after @"));
        }

        Ok(user)
    }

    fn validate_characters(&self, user: &str) -> Result<()> {
        if let Some(found) = self.reserved.find(user) {
            return Err(UserForgeError::validation(format!(
                "Bad username: invalid character {:?}",
                found.as_str()
            )));
        }
        Ok(())
    }
}

impl Default for UsernameFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer for UsernameFormatter {
    fn normalize(&self, raw: &str) -> Result<String> {
        self.format(raw)
    }
}
