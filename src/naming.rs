use sha2::{Digest, Sha256};

/// Prefix of the generated name used when nothing of a key survives
/// sanitizing.
const FALLBACK_PREFIX: &str = "DictionaryEntry_";

/// Store-safe item name for a dictionary key (or key segment).
///
/// Spaces become `-`, then everything except ASCII letters, digits, `_`, `-`
/// and `/` is dropped. When nothing is left the name is derived from a
/// SHA-256 digest of the original key, so the same key always maps to the same
/// item.
pub fn item_name_for(key: &str) -> String {
    let name: String = key
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        .collect();

    if name.is_empty() {
        fallback_name(key)
    } else {
        name
    }
}

fn fallback_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}{}", FALLBACK_PREFIX, hex::encode(&digest[..8]))
}
