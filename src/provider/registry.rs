use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use super::builtin;
use super::loader::{default_loader, LoadedModule, ModuleLoader};
use super::MixerProvider;
use crate::error::{Error, Result};
use crate::mixer::{RegistryConfig, TypeDefinition};

/// Suffix appended to entry names to form the exported module symbol.
pub const DLSYM_VERSION: &str = "__dlsym_mixer_001";

/// Creates a fresh provider instance for one mixer.
pub type ProviderEntry = fn() -> Box<dyn MixerProvider>;

/// Provider linked into the binary and registered at link time.
///
/// Usually produced by `#[derive(RegisterProvider)]`.
pub struct ProviderRegistration {
    pub name: &'static str,
    pub entry: ProviderEntry,
}

inventory::collect!(ProviderRegistration);

/// `_mixkit_mixer_<type>_open`
pub fn entry_name(type_name: &str) -> String {
    format!("_mixkit_mixer_{}_open", type_name)
}

pub fn versioned_symbol(entry: &str) -> String {
    format!("{}{}", entry, DLSYM_VERSION)
}

/// `<module_dir>/libmixkit_mixer_<type>.so`
pub fn module_path(module_dir: &Path, type_name: &str) -> PathBuf {
    module_dir.join(format!("libmixkit_mixer_{}.so", type_name))
}

/// Where a resolved provider came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    Builtin,
    Registered,
    Module,
}

/// Outcome of [`ProviderRegistry::resolve`].
pub struct ResolvedProvider {
    pub entry_name: String,
    pub entry: ProviderEntry,
    pub source: ProviderSource,
    /// Keeps a loaded module alive while the provider is in use
    pub module: Option<Arc<dyn LoadedModule>>,
    /// Served from the registry cache
    pub cached: bool,
}

struct CachedEntry {
    entry: ProviderEntry,
    source: ProviderSource,
    module: Option<Arc<dyn LoadedModule>>,
}

/// Process-wide map from provider type to entry point.
pub struct ProviderRegistry {
    config: RegistryConfig,
    loader: Box<dyn ModuleLoader>,
    cache: Mutex<HashMap<String, CachedEntry>>,
}

impl ProviderRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_loader(config, default_loader())
    }

    pub fn with_loader(config: RegistryConfig, loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            config,
            loader,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Shared registry using the default configuration.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| ProviderRegistry::new(RegistryConfig::default()))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, CachedEntry>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve a provider type to its entry point.
    ///
    /// Cache first, then (without an explicit `lib`) built-ins and
    /// link-time registrations, then the module on disk.
    pub fn resolve(&self, type_name: &str, def: Option<&TypeDefinition>) -> Result<ResolvedProvider> {
        let entry_name = def
            .and_then(|d| d.open.clone())
            .unwrap_or_else(|| entry_name(type_name));
        let lib = def.and_then(|d| d.lib.clone());

        let mut cache = self.cache();
        if let Some(hit) = cache.get(&entry_name) {
            debug!("Provider '{}' served from cache ({})", type_name, entry_name);
            return Ok(ResolvedProvider {
                entry_name,
                entry: hit.entry,
                source: hit.source,
                module: hit.module.clone(),
                cached: true,
            });
        }

        let (entry, source, module) = match lib {
            None => match Self::linked(&entry_name) {
                Some((entry, source)) => (entry, source, None),
                None => {
                    let path = module_path(&self.config.module_dir, type_name);
                    let (entry, module) = self.load(type_name, &path, &entry_name)?;
                    (entry, ProviderSource::Module, Some(module))
                }
            },
            Some(path) => {
                let (entry, module) = self.load(type_name, &path, &entry_name)?;
                (entry, ProviderSource::Module, Some(module))
            }
        };
        debug!("Resolved provider '{}' ({:?})", type_name, source);

        if self.config.keep_loaded {
            cache.insert(
                entry_name.clone(),
                CachedEntry {
                    entry,
                    source,
                    module: module.clone(),
                },
            );
        }

        Ok(ResolvedProvider {
            entry_name,
            entry,
            source,
            module,
            cached: false,
        })
    }

    fn linked(entry: &str) -> Option<(ProviderEntry, ProviderSource)> {
        if let Some(found) = builtin::lookup(entry) {
            return Some((found, ProviderSource::Builtin));
        }
        inventory::iter::<ProviderRegistration>
            .into_iter()
            .find(|reg| entry_name(reg.name) == entry)
            .map(|reg| (reg.entry, ProviderSource::Registered))
    }

    fn load(
        &self,
        type_name: &str,
        path: &Path,
        entry: &str,
    ) -> Result<(ProviderEntry, Arc<dyn LoadedModule>)> {
        let module = self
            .loader
            .load(path)
            .map_err(|source| Error::ProviderNotFound {
                name: type_name.to_string(),
                source: Some(source),
            })?;
        let symbol = versioned_symbol(entry);
        let found = module.entry(&symbol).ok_or_else(|| Error::SymbolMissing {
            symbol: symbol.clone(),
            module: path.display().to_string(),
        })?;
        Ok((found, module))
    }

    /// Entry names currently cached, sorted
    pub fn cached_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache().keys().cloned().collect();
        names.sort();
        names
    }

    /// Forget every cached provider. Modules stay loaded while mixers
    /// opened from them are alive.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }
}
