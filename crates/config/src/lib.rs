//! Layered configuration for docshelf.
//!
//! Values are resolved from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, picked by extension),
//! 3. the legacy `DOCS_PATH` environment variable,
//! 4. `DOCSHELF_`-prefixed environment variables (`DOCSHELF_DOCS_PATH`,
//!    `DOCSHELF_EXTENSIONS=[pdf,md]`, ...).
//!
//! Without an explicit file, `config.toml` in the platform configuration
//! directory is used when it exists.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use docshelf_library::{DEFAULT_EXTENSIONS, DEFAULT_HASH_TIMEOUT, Options};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "DOCSHELF_";
const LEGACY_DOCS_PATH: &str = "DOCS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the documents. Relative paths are resolved against
    /// the working directory.
    pub docs_path: PathBuf,
    /// Sidecar filename inside `docs_path`.
    pub metadata_file: PathBuf,
    /// Recognized document extensions, without the dot.
    pub extensions: Vec<String>,
    pub hash_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_path: PathBuf::from("data"),
            metadata_file: PathBuf::from("document_metadata.json"),
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            hash_timeout_secs: DEFAULT_HASH_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Resolve the configuration from every layer.
    ///
    /// An explicit `file` must exist; the default location is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Self::defaults();
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
                }
                figment = figment.merge(Self::file_provider(path)?);
            },
            None => {
                if let Some(path) = Self::default_file().filter(|path| path.is_file()) {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    figment = figment.merge(Self::file_provider(&path)?);
                }
            },
        }
        Self::from_figment(figment.merge(Env::raw().only(&[LEGACY_DOCS_PATH])).merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults as the lowest layer.
    pub fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    /// `config.toml` in the platform configuration directory, when there is
    /// one.
    pub fn default_file() -> Option<PathBuf> {
        ProjectDirs::from("", "", "docshelf").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file(path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.extensions.iter().all(|ext| ext.trim_start_matches('.').is_empty()) {
            exn::bail!(ErrorKind::Invalid("at least one document extension is required"));
        }
        if self.hash_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("hash timeout must be at least one second"));
        }
        let name = self.metadata_file.to_str().unwrap_or_default();
        if docshelf_storage::validate_name(name).is_err() {
            exn::bail!(ErrorKind::Invalid("metadata file must be a plain filename"));
        }
        Ok(())
    }

    pub fn hash_timeout(&self) -> Duration {
        Duration::from_secs(self.hash_timeout_secs)
    }

    /// Library tunables derived from this configuration.
    pub fn library_options(&self) -> Options {
        Options {
            extensions: self.extensions.clone(),
            hash_timeout: self.hash_timeout(),
        }
    }
}
