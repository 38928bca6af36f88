//! Simple mixer layer built on top of control sessions.

pub mod attach;
pub mod config;
pub mod element;
pub mod ops;
pub mod session;
pub mod watch;

pub use attach::{Attachments, ControlKey};
pub use config::{
    MixerConfig, MixerDefinition, MixerEntry, RegistryConfig, TypeDefinition, MAX_ALIAS_HOPS,
    MODULE_DIR_ENV,
};
pub use element::{
    channel_name, compare_mixer_default, Caps, Direction, MixerElemId, MixerElement,
    MixerElementCallback, CHANNEL_LAST,
};
pub use ops::{set_volume_range, ElemRef, ElementOps, Rounding};
pub use session::{
    ControlSlots, Mixer, MixerCallback, MixerCore, OpenContext, OpenRequest, Streams,
    MAX_CONTROLS,
};
pub use watch::{pump, pump_session};
