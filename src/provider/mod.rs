//! Mixer providers: the code that turns raw controls into mixer elements.

pub mod builtin;
pub mod loader;
pub mod registry;

pub use loader::{default_loader, LoadedModule, ModuleLoader, NoModuleLoader};
pub use registry::{
    entry_name, module_path, versioned_symbol, ProviderEntry, ProviderRegistration,
    ProviderRegistry, ProviderSource, ResolvedProvider, DLSYM_VERSION,
};

#[cfg(feature = "dynamic")]
pub use loader::LibLoader;

use crate::control::{ControlElement, ControlSession, ElemId, EventMask};
use crate::error::Result;
use crate::mixer::{ControlKey, MixerCore, MixerDefinition, MixerElemId, OpenContext};

/// What the mixer does with elements left without any attached control
/// after a control disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyElementPolicy {
    /// Remove them from the mixer
    Remove,
    /// Leave them; the provider manages their lifetime
    #[default]
    Keep,
}

/// A raw control seen through the session that owns it.
#[derive(Clone, Copy)]
pub struct ControlRef<'a> {
    pub slot: usize,
    pub session: &'a ControlSession,
    pub elem: &'a ControlElement,
}

impl<'a> ControlRef<'a> {
    pub fn key(&self) -> ControlKey {
        ControlKey::new(self.slot, self.elem.numid())
    }

    pub fn id(&self) -> &'a ElemId {
        self.elem.id()
    }
}

/// Provider instance bound to one mixer.
pub trait MixerProvider: Send {
    /// Open the control endpoints this mixer is built from.
    ///
    /// Runs before any control is loaded; element creation normally happens
    /// in [`event`](Self::event) as controls are added.
    fn open(&mut self, ctx: &mut OpenContext<'_>, def: &MixerDefinition) -> Result<()>;

    /// A raw control changed.
    ///
    /// `melem` is `None` for additions and names the attached mixer element
    /// for removal, value and info events.
    fn event(
        &mut self,
        core: &mut MixerCore,
        ctl: ControlRef<'_>,
        mask: EventMask,
        melem: Option<&MixerElemId>,
    ) -> Result<()>;

    fn empty_policy(&self) -> EmptyElementPolicy {
        EmptyElementPolicy::Keep
    }
}
