use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::language::Language;
use crate::logging::{extra_info, LOG_TARGET};
use crate::store::{ContentStore, Item};

/// Requests publication of items created by the resolver.
///
/// Publishing is fire-and-forget: failures are logged and never reach the
/// caller, and when auto-publish is switched off the request is skipped.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ContentStore>,
    enabled: bool,
    extra_logging: bool,
}

impl Publisher {
    pub fn new(store: Arc<dyn ContentStore>, config: &Config) -> Self {
        Self {
            store,
            enabled: config.auto_publish_created_items,
            extra_logging: config.enable_extra_logging,
        }
    }

    /// Publish `item` in `languages` (all store languages when empty).
    pub fn publish(&self, item: &Item, languages: &[Language], recursive: bool) {
        if !self.enabled {
            extra_info!(
                self.extra_logging,
                "Publishing disabled for automatically created items, skipping {}. Set LOCALIZATION_AUTO_PUBLISH_CREATED_ITEMS=true to enable it.",
                item.path
            );
            return;
        }

        let targets = if languages.is_empty() {
            "all".to_string()
        } else {
            languages
                .iter()
                .map(Language::code)
                .collect::<Vec<_>>()
                .join("', '")
        };
        info!(target: LOG_TARGET, "Publishing item {} to '{}' languages...", item.path, targets);

        if let Err(e) = self.store.publish(item.id, languages, recursive) {
            warn!(target: LOG_TARGET, "Publishing item {} ({}) failed: {}", item.path, item.id, e);
        }
    }
}
