//! # Configuration
//!
//! `normcache.toml` settings. Every section is optional; a missing file
//! means defaults. Command-line flags override what the file says.
//!
//! ```toml
//! [store]
//! path = "normcache.db"
//! backend = "redb"            # or "file"
//!
//! [identity]
//! enabled = true
//! typename_field = "__typename"
//! id_field = "id"
//!
//! [fragments]
//! mode = "possible-types"     # or "heuristic"
//! possible_types = { Character = ["Human", "Droid"] }
//!
//! [log]
//! format = "json"             # or "text"
//! ```

use clap::ValueEnum;
use normcache_core::{
    CacheError, EntityStore, FieldIdentity, HeuristicMatcher, NormalizedCache,
    PossibleTypesMatcher,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "normcache.toml";

/// Store file used when neither the config nor `--database` names one.
pub const DEFAULT_STORE_PATH: &str = "normcache.db";

/// Storage backend for the store file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Canonical snapshot file, rewritten after every change.
    #[default]
    File,
    /// redb database (ACID).
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

/// How fragment type conditions are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentMode {
    #[default]
    Heuristic,
    PossibleTypes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub path: PathBuf,
    pub backend: Backend,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            backend: Backend::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySection {
    /// Derive `"<Type>:<id>"` identifiers; otherwise every nested object
    /// gets a generated id.
    pub enabled: bool,
    pub typename_field: String,
    pub id_field: String,
}

impl Default for IdentitySection {
    fn default() -> Self {
        let fields = FieldIdentity::default();
        Self {
            enabled: true,
            typename_field: fields.typename_field,
            id_field: fields.id_field,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FragmentSection {
    pub mode: FragmentMode,
    /// Abstract type -> concrete member types.
    pub possible_types: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub format: LogFormat,
}

/// Parsed `normcache.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreSection,
    pub identity: IdentitySection,
    pub fragments: FragmentSection,
    pub log: LogSection,
}

impl Config {
    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, `normcache.toml` in the
    /// working directory is used if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CacheError> {
        match explicit {
            Some(path) => Self::read_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::read_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CacheError> {
        toml::from_str(contents)
            .map_err(|e| CacheError::DeserializationError(format!("Config: {}", e)))
    }

    fn read_file(path: &Path) -> Result<Self, CacheError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CacheError::IoError(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            CacheError::DeserializationError(format!("Config {}: {}", path.display(), e))
        })
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, database: Option<PathBuf>, backend: Option<Backend>) -> Self {
        if let Some(path) = database {
            self.store.path = path;
        }
        if let Some(backend) = backend {
            self.store.backend = backend;
        }
        self
    }

    /// Wrap `store` in a cache using the configured identity policy and
    /// fragment matcher.
    pub fn build_cache<S: EntityStore>(&self, store: S) -> NormalizedCache<S> {
        let cache = NormalizedCache::with_store(store);
        let cache = if self.identity.enabled {
            cache.with_identify(FieldIdentity {
                typename_field: self.identity.typename_field.clone(),
                id_field: self.identity.id_field.clone(),
            })
        } else {
            cache
        };
        match self.fragments.mode {
            FragmentMode::Heuristic => cache.with_matcher(HeuristicMatcher),
            FragmentMode::PossibleTypes => cache.with_matcher(
                self.fragments
                    .possible_types
                    .iter()
                    .map(|(name, members)| (name.clone(), members.clone()))
                    .collect::<PossibleTypesMatcher>(),
            ),
        }
    }
}
