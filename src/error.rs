use thiserror::Error;

use crate::format::FormatError;
use crate::store::StoreError;

/// Errors raised while resolving a dictionary phrase.
///
/// None of these cross the public `Translator` text surface: they are logged
/// and turned into an empty string there. They are returned as-is from the
/// lower-level operations (`translation_item`, `dictionary_root`, ...).
#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    #[error("dictionary root '{0}' does not exist")]
    DictionaryRootNotFound(String),

    #[error("invalid language code: '{0}'")]
    InvalidLanguage(String),

    #[error("format error: {0}")]
    Format(#[from] FormatError),
}
