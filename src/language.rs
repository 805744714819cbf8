//! Language type: validated language code used to select item versions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LocalizationError;

/// A validated language code such as `en`, `da` or `en-GB`.
///
/// Codes are kept verbatim (no case folding) because the content store keys
/// versions by the exact code it was given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    /// Create a Language from a language code string.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is non-empty and only contains ASCII
    ///   letters, digits and `-`
    /// * `Err(LocalizationError::InvalidLanguage)` otherwise
    pub fn new(code: &str) -> Result<Self, LocalizationError> {
        let code = code.trim();
        let valid = !code.is_empty()
            && !code.starts_with('-')
            && !code.ends_with('-')
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid {
            return Err(LocalizationError::InvalidLanguage(code.to_string()));
        }

        Ok(Self(code.to_string()))
    }

    /// The default language used when nothing else is configured.
    pub fn english() -> Self {
        Self("en".to_string())
    }

    /// Get the language code.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Language {
    type Err = LocalizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
