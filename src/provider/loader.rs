//! Loading provider modules from storage.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

use super::registry::ProviderEntry;

/// A loaded provider module. Dropping the last handle unloads it.
pub trait LoadedModule: Send + Sync {
    fn path(&self) -> &Path;

    /// Look up an exported entry point by symbol name
    fn entry(&self, symbol: &str) -> Option<ProviderEntry>;
}

/// Strategy used by the registry to turn a module path into a module.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModule>>;
}

/// Loader used when the `dynamic` feature is off; every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModuleLoader;

impl ModuleLoader for NoModuleLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModule>> {
        Err(anyhow!(
            "Cannot open shared library {}: dynamic loading is disabled",
            path.display()
        ))
    }
}

/// Loader matching the enabled features.
pub fn default_loader() -> Box<dyn ModuleLoader> {
    #[cfg(feature = "dynamic")]
    {
        Box::new(LibLoader)
    }
    #[cfg(not(feature = "dynamic"))]
    {
        Box::new(NoModuleLoader)
    }
}

#[cfg(feature = "dynamic")]
pub use dynamic::LibLoader;

#[cfg(feature = "dynamic")]
mod dynamic {
    use anyhow::{Context, Result};
    use libloading::{Library, Symbol};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::{LoadedModule, ModuleLoader};
    use crate::provider::registry::ProviderEntry;

    /// Loads provider modules as shared objects.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LibLoader;

    struct LibModule {
        path: PathBuf,
        lib: Library,
    }

    impl ModuleLoader for LibLoader {
        fn load(&self, path: &Path) -> Result<Arc<dyn LoadedModule>> {
            // SAFETY: loading a provider module runs its initializers; modules
            // in the provider directory are trusted.
            let lib = unsafe { Library::new(path) }
                .with_context(|| format!("Cannot open shared library {}", path.display()))?;
            Ok(Arc::new(LibModule {
                path: path.to_path_buf(),
                lib,
            }))
        }
    }

    impl LoadedModule for LibModule {
        fn path(&self) -> &Path {
            &self.path
        }

        fn entry(&self, symbol: &str) -> Option<ProviderEntry> {
            // SAFETY: versioned entry symbols are exported by `export_provider!`
            // with exactly the `ProviderEntry` signature.
            let sym: Symbol<ProviderEntry> = unsafe { self.lib.get(symbol.as_bytes()) }.ok()?;
            Some(*sym)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_loader_fails() {
        let err = NoModuleLoader
            .load(Path::new("/nonexistent/libmixkit_mixer_x.so"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("libmixkit_mixer_x.so"));
    }
}
