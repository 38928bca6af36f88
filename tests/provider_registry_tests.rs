use mixkit::control::EventMask;
use mixkit::mixer::{MixerCore, MixerDefinition, MixerElemId, OpenContext, RegistryConfig, TypeDefinition};
use mixkit::provider::builtin::NoneProvider;
use mixkit::provider::{
    ControlRef, LoadedModule, ModuleLoader, MixerProvider, ProviderEntry, ProviderRegistry,
    ProviderSource,
};
use mixkit::{Error, RegisterProvider, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default, RegisterProvider)]
#[provider(name = "echo")]
struct EchoProvider;

impl MixerProvider for EchoProvider {
    fn open(&mut self, _ctx: &mut OpenContext<'_>, _def: &MixerDefinition) -> Result<()> {
        Ok(())
    }

    fn event(
        &mut self,
        _core: &mut MixerCore,
        _ctl: ControlRef<'_>,
        _mask: EventMask,
        _melem: Option<&MixerElemId>,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Default, RegisterProvider)]
struct Quiet;

impl MixerProvider for Quiet {
    fn open(&mut self, _ctx: &mut OpenContext<'_>, _def: &MixerDefinition) -> Result<()> {
        Ok(())
    }

    fn event(
        &mut self,
        _core: &mut MixerCore,
        _ctl: ControlRef<'_>,
        _mask: EventMask,
        _melem: Option<&MixerElemId>,
    ) -> Result<()> {
        Ok(())
    }
}

fn module_entry() -> Box<dyn MixerProvider> {
    Box::new(NoneProvider)
}

struct FakeModule {
    path: PathBuf,
    exports: Vec<String>,
}

impl LoadedModule for FakeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn entry(&self, symbol: &str) -> Option<ProviderEntry> {
        self.exports
            .iter()
            .any(|s| s == symbol)
            .then_some(module_entry as ProviderEntry)
    }
}

/// Loads any existing file and counts the loads.
struct CountingLoader {
    loads: Arc<AtomicUsize>,
    exports: Vec<String>,
}

impl ModuleLoader for CountingLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn LoadedModule>> {
        if !path.exists() {
            anyhow::bail!("Cannot open shared library {}", path.display());
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModule {
            path: path.to_path_buf(),
            exports: self.exports.clone(),
        }))
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    loads: Arc<AtomicUsize>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libmixkit_mixer_fancy.so"), b"").unwrap();
        Self {
            dir,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn registry(&self, keep_loaded: bool, exports: &[&str]) -> ProviderRegistry {
        ProviderRegistry::with_loader(
            RegistryConfig {
                module_dir: self.dir.path().to_path_buf(),
                keep_loaded,
            },
            Box::new(CountingLoader {
                loads: self.loads.clone(),
                exports: exports.iter().map(|s| s.to_string()).collect(),
            }),
        )
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

const FANCY_SYMBOL: &str = "_mixkit_mixer_fancy_open__dlsym_mixer_001";

#[test]
fn test_module_is_loaded_once_while_cached() {
    let fixture = Fixture::new();
    let registry = fixture.registry(true, &[FANCY_SYMBOL]);

    let first = registry.resolve("fancy", None).unwrap();
    assert_eq!(first.source, ProviderSource::Module);
    assert!(!first.cached);
    assert_eq!(
        first.module.as_ref().unwrap().path(),
        fixture.dir.path().join("libmixkit_mixer_fancy.so")
    );

    let second = registry.resolve("fancy", None).unwrap();
    assert!(second.cached);
    assert_eq!(fixture.loads(), 1);
    assert_eq!(registry.cached_entries(), vec!["_mixkit_mixer_fancy_open".to_string()]);
}

#[test]
fn test_without_keep_loaded_every_resolve_loads() {
    let fixture = Fixture::new();
    let registry = fixture.registry(false, &[FANCY_SYMBOL]);
    registry.resolve("fancy", None).unwrap();
    registry.resolve("fancy", None).unwrap();
    assert_eq!(fixture.loads(), 2);
    assert!(registry.cached_entries().is_empty());
}

#[test]
fn test_missing_symbol_names_symbol_and_module() {
    let fixture = Fixture::new();
    let registry = fixture.registry(true, &[]);
    match registry.resolve("fancy", None) {
        Err(Error::SymbolMissing { symbol, module }) => {
            assert_eq!(symbol, FANCY_SYMBOL);
            assert!(module.ends_with("libmixkit_mixer_fancy.so"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("resolved without the entry symbol"),
    }
    assert!(registry.cached_entries().is_empty());
}

#[test]
fn test_missing_module_keeps_loader_error() {
    let fixture = Fixture::new();
    let registry = fixture.registry(true, &[]);
    match registry.resolve("absent", None) {
        Err(Error::ProviderNotFound { name, source }) => {
            assert_eq!(name, "absent");
            assert!(source.unwrap().to_string().contains("libmixkit_mixer_absent.so"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("resolved a provider without a module"),
    }
}

#[test]
fn test_type_definition_overrides_library_and_entry() {
    let fixture = Fixture::new();
    let lib = fixture.dir.path().join("custom.so");
    std::fs::write(&lib, b"").unwrap();
    let registry = fixture.registry(true, &["custom_open__dlsym_mixer_001"]);

    let def = TypeDefinition {
        lib: Some(lib.clone()),
        open: Some("custom_open".to_string()),
        comment: None,
    };
    let resolved = registry.resolve("fancy", Some(&def)).unwrap();
    assert_eq!(resolved.entry_name, "custom_open");
    assert_eq!(resolved.module.unwrap().path(), lib.as_path());
}

#[test]
fn test_derived_registrations_resolve_without_loading() {
    let fixture = Fixture::new();
    let registry = fixture.registry(true, &[]);

    let echo = registry.resolve("echo", None).unwrap();
    assert_eq!(echo.source, ProviderSource::Registered);
    assert!(echo.module.is_none());

    let quiet = registry.resolve("quiet", None).unwrap();
    assert_eq!(quiet.source, ProviderSource::Registered);
    assert_eq!(fixture.loads(), 0);
}

#[test]
fn test_builtins_take_precedence_over_modules() {
    let fixture = Fixture::new();
    std::fs::write(fixture.dir.path().join("libmixkit_mixer_basic.so"), b"").unwrap();
    let registry = fixture.registry(true, &["_mixkit_mixer_basic_open__dlsym_mixer_001"]);
    let resolved = registry.resolve("basic", None).unwrap();
    assert_eq!(resolved.source, ProviderSource::Builtin);
    assert_eq!(fixture.loads(), 0);
}
