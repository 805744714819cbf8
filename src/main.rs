//! Resolve dictionary keys against a content store snapshot.
//!
//! Usage:
//!   site-dictionary [OPTIONS] KEY...
//!
//! Options:
//!   --store FILE      snapshot file (default: dictionary.json, created when missing)
//!   --site NAME       site the request belongs to
//!   --lang CODE       request language (default: en)
//!   --preview         resolve as in preview mode (no formatting)
//!   --item ID         item open in preview mode, used to infer the site
//!   --default TEXT    default phrase for created entries
//!   --params VALUES   format parameters joined by the configured delimiter
//!   --report          print cache metrics as JSON after resolving
//!
//! Configuration is read from LOCALIZATION_* environment variables (or .env).

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use site_dictionary::store::TemplateKind;
use site_dictionary::{Config, Language, MemoryStore, PageMode, RequestContext, Translator};

const DEFAULT_STORE_FILE: &str = "dictionary.json";

#[derive(Debug)]
struct Args {
    store_file: PathBuf,
    site: Option<String>,
    language: Language,
    preview: bool,
    item: Option<String>,
    default_value: String,
    params: String,
    report: bool,
    keys: Vec<String>,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args {
            store_file: PathBuf::from(DEFAULT_STORE_FILE),
            site: None,
            language: Language::english(),
            preview: false,
            item: None,
            default_value: String::new(),
            params: String::new(),
            report: false,
            keys: Vec::new(),
        };

        let mut args = args;
        while let Some(arg) = args.next() {
            let mut value = |name: &str| args.next().with_context(|| format!("{} needs a value", name));
            match arg.as_str() {
                "--store" => parsed.store_file = PathBuf::from(value("--store")?),
                "--site" => parsed.site = Some(value("--site")?),
                "--lang" => {
                    let code = value("--lang")?;
                    parsed.language = Language::new(&code).with_context(|| format!("Invalid language '{}'", code))?;
                }
                "--item" => parsed.item = Some(value("--item")?),
                "--default" => parsed.default_value = value("--default")?,
                "--params" => parsed.params = value("--params")?,
                "--preview" => parsed.preview = true,
                "--report" => parsed.report = true,
                other if other.starts_with("--") => bail!("Unknown option '{}'", other),
                _ => parsed.keys.push(arg),
            }
        }

        if parsed.keys.is_empty() {
            bail!("No keys given. Usage: site-dictionary [OPTIONS] KEY...");
        }

        Ok(parsed)
    }

    fn context(&self) -> RequestContext {
        let mut ctx = RequestContext::new(self.language.clone());
        ctx.site = self.site.clone();
        if self.preview {
            ctx = ctx.with_page_mode(PageMode::Preview);
        }
        if let Some(item) = &self.item {
            ctx = ctx.with_item_id(item.clone());
        }
        ctx
    }
}

fn open_store(path: &Path, config: &Config) -> Result<MemoryStore> {
    let store = if path.exists() {
        MemoryStore::load(path).with_context(|| format!("Failed to load store snapshot {}", path.display()))?
    } else {
        info!("No snapshot at {}, starting with an empty store", path.display());
        MemoryStore::new()
    };

    store
        .create_path(&config.global_dictionary_folder, TemplateKind::DictionaryRoot)
        .with_context(|| format!("Failed to create global dictionary {}", config.global_dictionary_folder))?;

    Ok(store)
}

fn main() -> Result<()> {
    // Load .env file when present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("site_dictionary=info".parse()?),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::from_env()?;

    let store = Arc::new(open_store(&args.store_file, &config)?);
    let translator = Translator::new(store.clone(), config);
    let ctx = args.context();

    for key in &args.keys {
        let text = translator.text_with_param_string(&ctx, key, &args.default_value, &args.params);
        println!("{}\t{}", key, text);
    }

    if args.report {
        println!("{}", serde_json::to_string_pretty(&translator.cache().report())?);
    }

    store
        .save(&args.store_file)
        .with_context(|| format!("Failed to save store snapshot {}", args.store_file.display()))?;
    info!("Store snapshot saved to {}", args.store_file.display());

    Ok(())
}
