//! Mixer definitions and provider registry settings.
//!
//! ```json
//! {
//!   "amixer": {
//!     "default": { "type": "basic", "device": "hw:0" },
//!     "card0": "default"
//!   },
//!   "amixer_type": {
//!     "fancy": { "lib": "/opt/mixkit/libfancy.so", "open": "fancy_open" }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Alias chains longer than this are treated as loops.
pub const MAX_ALIAS_HOPS: usize = 64;

/// Environment variable overriding [`RegistryConfig::module_dir`].
pub const MODULE_DIR_ENV: &str = "MIXKIT_MODULE_DIR";

const DEFAULT_MODULE_DIR: &str = "/usr/lib/mixkit/modules";

/// A named mixer: either a full definition or the name of another mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MixerEntry {
    Alias(String),
    Definition(MixerDefinition),
}

/// Provider type plus the parameters handed to its `open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerDefinition {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<Value>,
    /// Provider-specific fields
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl MixerDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            comment: None,
            hint: None,
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }
}

/// How a provider type maps to code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefinition {
    /// Shared object to load instead of the derived module path
    #[serde(default)]
    pub lib: Option<PathBuf>,
    /// Entry point name overriding `_mixkit_mixer_<type>_open`
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Tables of named mixers and provider types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    #[serde(default)]
    pub amixer: HashMap<String, MixerEntry>,
    /// Mixers opened on behalf of a playback or capture stream
    #[serde(default)]
    pub amixer_pcm: HashMap<String, MixerEntry>,
    #[serde(default)]
    pub amixer_type: HashMap<String, TypeDefinition>,
}

impl MixerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn with_mixer(mut self, name: &str, def: MixerDefinition) -> Self {
        self.amixer.insert(name.to_string(), MixerEntry::Definition(def));
        self
    }

    pub fn with_pcm_mixer(mut self, name: &str, def: MixerDefinition) -> Self {
        self.amixer_pcm.insert(name.to_string(), MixerEntry::Definition(def));
        self
    }

    pub fn with_alias(mut self, name: &str, target: &str) -> Self {
        self.amixer.insert(name.to_string(), MixerEntry::Alias(target.to_string()));
        self
    }

    pub fn with_type(mut self, type_name: &str, def: TypeDefinition) -> Self {
        self.amixer_type.insert(type_name.to_string(), def);
        self
    }

    /// Find the definition for `name`, following aliases.
    ///
    /// `pcm` selects the stream-related table.
    pub fn resolve(&self, name: &str, pcm: bool) -> Result<&MixerDefinition> {
        let (table, table_name) = if pcm {
            (&self.amixer_pcm, "amixer_pcm")
        } else {
            (&self.amixer, "amixer")
        };

        let mut current = name;
        for _ in 0..=MAX_ALIAS_HOPS {
            match table.get(current) {
                Some(MixerEntry::Definition(def)) => return Ok(def),
                Some(MixerEntry::Alias(target)) => current = target,
                None => {
                    return Err(Error::config(format!("unknown {} '{}'", table_name, current)))
                }
            }
        }
        Err(Error::config(format!(
            "alias chain for '{}' exceeds {} hops",
            name, MAX_ALIAS_HOPS
        )))
    }

    pub fn type_definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.amixer_type.get(type_name)
    }
}

/// Where the provider registry looks for modules and whether it keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_module_dir")]
    pub module_dir: PathBuf,
    /// Cache resolved providers for the registry's lifetime
    #[serde(default = "default_keep_loaded")]
    pub keep_loaded: bool,
}

fn default_module_dir() -> PathBuf {
    std::env::var_os(MODULE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE_DIR))
}

fn default_keep_loaded() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            module_dir: default_module_dir(),
            keep_loaded: default_keep_loaded(),
        }
    }
}
