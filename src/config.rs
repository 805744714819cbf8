use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use crate::site::SiteDescriptor;

pub const DEFAULT_MAX_CACHE_SIZE: &str = "10MB";
pub const DEFAULT_FORMAT_PARAMS_DELIMITER: &str = "|";
pub const DEFAULT_GLOBAL_DICTIONARY_FOLDER: &str = "/sitecore/system/Dictionary";

/// Administrative pseudo-sites that never own a dictionary.
pub const DEFAULT_IGNORED_SITES: [&str; 7] = [
    "shell",
    "modules_shell",
    "modules_website",
    "login",
    "scheduler",
    "publisher",
    "system",
];

/// Prefix of the per-site dictionary folder variables; the site name follows
/// verbatim, e.g. `LOCALIZATION_SITE_FOLDER_website=/sitecore/content/Dictionary`.
const SITE_FOLDER_PREFIX: &str = "LOCALIZATION_SITE_FOLDER_";

#[derive(Debug, Clone)]
pub struct Config {
    // Cache
    pub max_cache_size: usize,

    // Formatting
    pub format_params_delimiter: String,

    // Logging
    pub enable_extra_logging: bool,

    // Creation
    pub create_items_with_default_values: bool,
    pub auto_publish_created_items: bool,

    // Dictionary roots
    pub global_dictionary_folder: String,
    pub site_dictionary_folders: HashMap<String, String>,

    // Sites
    pub sites: Vec<SiteDescriptor>,
    pub ignored_sites: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cache_size: 10 * 1024 * 1024,
            format_params_delimiter: DEFAULT_FORMAT_PARAMS_DELIMITER.to_string(),
            enable_extra_logging: false,
            create_items_with_default_values: true,
            auto_publish_created_items: true,
            global_dictionary_folder: DEFAULT_GLOBAL_DICTIONARY_FOLDER.to_string(),
            site_dictionary_folders: HashMap::new(),
            sites: Vec::new(),
            ignored_sites: DEFAULT_IGNORED_SITES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build a configuration from `(name, value)` pairs. Unknown names are
    /// ignored; missing ones keep their defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut config = Self::default();

        // Cache
        if let Some(size) = vars.get("LOCALIZATION_MAX_CACHE_SIZE") {
            config.max_cache_size =
                parse_size(size).context("LOCALIZATION_MAX_CACHE_SIZE is not a valid size")?;
        }

        // Formatting
        if let Some(delimiter) = vars.get("LOCALIZATION_FORMAT_PARAMS_DELIMITER") {
            config.format_params_delimiter = delimiter.clone();
        }

        // Logging
        if let Some(value) = vars.get("LOCALIZATION_ENABLE_EXTRA_LOGGING") {
            config.enable_extra_logging = parse_bool("LOCALIZATION_ENABLE_EXTRA_LOGGING", value)?;
        }

        // Creation
        if let Some(value) = vars.get("LOCALIZATION_CREATE_ITEMS_WITH_DEFAULT_VALUES") {
            config.create_items_with_default_values =
                parse_bool("LOCALIZATION_CREATE_ITEMS_WITH_DEFAULT_VALUES", value)?;
        }
        if let Some(value) = vars.get("LOCALIZATION_AUTO_PUBLISH_CREATED_ITEMS") {
            config.auto_publish_created_items =
                parse_bool("LOCALIZATION_AUTO_PUBLISH_CREATED_ITEMS", value)?;
        }

        // Dictionary roots
        if let Some(folder) = vars.get("LOCALIZATION_GLOBAL_DICTIONARY_FOLDER") {
            config.global_dictionary_folder = folder.clone();
        }
        config.site_dictionary_folders = vars
            .iter()
            .filter_map(|(name, value)| {
                let site = name.strip_prefix(SITE_FOLDER_PREFIX)?;
                (!site.is_empty() && !value.trim().is_empty())
                    .then(|| (site.to_string(), value.trim().to_string()))
            })
            .collect();

        // Sites
        if let Some(sites) = vars.get("LOCALIZATION_SITES") {
            config.sites = parse_sites(sites).context("LOCALIZATION_SITES is malformed")?;
        }
        if let Some(ignored) = vars.get("LOCALIZATION_IGNORED_SITES") {
            config.ignored_sites = ignored
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Dictionary folder configured for a specific site, if any.
    pub fn site_dictionary_folder(&self, site: &str) -> Option<&str> {
        self.site_dictionary_folders
            .get(site)
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }

    pub fn is_ignored_site(&self, site: &str) -> bool {
        self.ignored_sites.iter().any(|ignored| ignored == site)
    }
}

/// Parse a size such as `10MB`, `512 KB`, `1gb` or `2048` into bytes.
/// Units are binary (1KB = 1024 bytes).
pub fn parse_size(value: &str) -> Result<usize> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    if number.is_empty() {
        bail!("Size '{}' does not start with a number", value);
    }

    let number: usize = number
        .parse()
        .with_context(|| format!("Size '{}' is out of range", value))?;
    let multiplier: usize = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        other => bail!("Unknown size unit '{}' in '{}'", other, value),
    };

    number
        .checked_mul(multiplier)
        .with_context(|| format!("Size '{}' is out of range", value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("{} must be 'true' or 'false', got '{}'", name, other),
    }
}

/// Parse `name=rootPath|startItem;name2=rootPath2` site definitions. The start
/// item is optional.
fn parse_sites(value: &str) -> Result<Vec<SiteDescriptor>> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, location) = entry
                .split_once('=')
                .with_context(|| format!("Site definition '{}' has no '='", entry))?;
            let name = name.trim();
            if name.is_empty() {
                bail!("Site definition '{}' has an empty name", entry);
            }

            let (root_path, start_item) = location.split_once('|').unwrap_or((location, ""));
            Ok(SiteDescriptor::new(name, root_path.trim(), start_item.trim()))
        })
        .collect()
}
