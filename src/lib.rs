//! Control-element cache and simple mixer layer for sound devices.
//!
//! [`control::ControlSession`] mirrors the controls of one endpoint in a
//! sorted cache kept current by device events. [`mixer::Mixer`] groups raw
//! controls into logical elements through a pluggable
//! [`provider::MixerProvider`].

extern crate self as mixkit;

pub mod control;
pub mod error;
pub mod index;
pub mod mixer;
pub mod poll;
pub mod provider;

pub use error::{Error, Result};
pub use mixkit_macros::RegisterProvider;

/// Export a provider type from a `cdylib` under the versioned entry symbol
/// the registry looks up: `_mixkit_mixer_<name>_open__dlsym_mixer_001`.
///
/// ```ignore
/// mixkit::export_provider!(fancy, FancyProvider);
/// ```
#[macro_export]
macro_rules! export_provider {
    ($name:ident, $provider:ty) => {
        #[export_name = concat!("_mixkit_mixer_", stringify!($name), "_open__dlsym_mixer_001")]
        pub fn __mixkit_provider_entry() -> ::std::boxed::Box<dyn $crate::provider::MixerProvider> {
            ::std::boxed::Box::new(<$provider as ::std::default::Default>::default())
        }
    };
}
