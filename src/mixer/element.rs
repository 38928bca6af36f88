use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use super::ops::ElementOps;
use crate::control::EventMask;
use crate::error::Result;

/// Identity of a mixer element, unique within its mixer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MixerElemId {
    pub name: String,
    #[serde(default)]
    pub index: u32,
}

impl MixerElemId {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for MixerElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}',{}", self.name, self.index)
    }
}

/// Stream direction an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Playback,
    Capture,
    /// Shared by both directions
    Common,
}

/// Capability bits of a mixer element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caps(pub u32);

impl Caps {
    pub const GVOLUME: Caps = Caps(1 << 1);
    pub const GSWITCH: Caps = Caps(1 << 2);
    pub const PVOLUME: Caps = Caps(1 << 3);
    pub const PVOLUME_JOIN: Caps = Caps(1 << 4);
    pub const PSWITCH: Caps = Caps(1 << 5);
    pub const PSWITCH_JOIN: Caps = Caps(1 << 6);
    pub const CVOLUME: Caps = Caps(1 << 7);
    pub const CVOLUME_JOIN: Caps = Caps(1 << 8);
    pub const CSWITCH: Caps = Caps(1 << 9);
    pub const CSWITCH_JOIN: Caps = Caps(1 << 10);
    pub const CSWITCH_EXCL: Caps = Caps(1 << 11);
    pub const PENUM: Caps = Caps(1 << 12);
    pub const CENUM: Caps = Caps(1 << 13);

    pub const fn empty() -> Self {
        Caps(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is set
    pub fn intersects(self, other: Caps) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Caps) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Caps) {
        self.0 &= !other.0;
    }
}

impl BitOr for Caps {
    type Output = Caps;

    fn bitor(self, rhs: Caps) -> Caps {
        Caps(self.0 | rhs.0)
    }
}

/// Highest channel position an element can expose.
pub const CHANNEL_LAST: u32 = 31;

pub const FRONT_LEFT: u32 = 0;
pub const FRONT_RIGHT: u32 = 1;
pub const REAR_LEFT: u32 = 2;
pub const REAR_RIGHT: u32 = 3;
pub const FRONT_CENTER: u32 = 4;
pub const WOOFER: u32 = 5;
pub const SIDE_LEFT: u32 = 6;
pub const SIDE_RIGHT: u32 = 7;
pub const REAR_CENTER: u32 = 8;

/// Human-readable channel position; `"?"` for unnamed positions.
pub fn channel_name(channel: u32) -> &'static str {
    match channel {
        FRONT_LEFT => "Front Left",
        FRONT_RIGHT => "Front Right",
        REAR_LEFT => "Rear Left",
        REAR_RIGHT => "Rear Right",
        FRONT_CENTER => "Front Center",
        WOOFER => "Woofer",
        SIDE_LEFT => "Side Left",
        SIDE_RIGHT => "Side Right",
        REAR_CENTER => "Rear Center",
        _ => "?",
    }
}

pub type MixerElementCallback = Box<dyn FnMut(&MixerElement, EventMask) -> Result<()> + Send>;

/// A logical control built by a provider from one or more raw controls.
pub struct MixerElement {
    id: MixerElemId,
    weight: i32,
    caps: Caps,
    capture_group: u32,
    ops: Arc<dyn ElementOps>,
    private: Option<Box<dyn Any + Send>>,
    callback: Option<MixerElementCallback>,
    callback_private: Option<Box<dyn Any + Send>>,
}

impl MixerElement {
    pub fn new(id: MixerElemId, weight: i32, ops: Arc<dyn ElementOps>) -> Self {
        Self {
            id,
            weight,
            caps: Caps::empty(),
            capture_group: 0,
            ops,
            private: None,
            callback: None,
            callback_private: None,
        }
    }

    pub fn with_caps(mut self, caps: Caps) -> Self {
        self.caps = caps;
        self
    }

    /// Attach provider data, retrievable with [`private`](Self::private).
    pub fn with_private<T: Any + Send>(mut self, private: T) -> Self {
        self.private = Some(Box::new(private));
        self
    }

    pub fn id(&self) -> &MixerElemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn index(&self) -> u32 {
        self.id.index
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn caps(&self) -> Caps {
        self.caps
    }

    pub fn set_caps(&mut self, caps: Caps) {
        self.caps = caps;
    }

    pub fn capture_group(&self) -> u32 {
        self.capture_group
    }

    pub fn set_capture_group(&mut self, group: u32) {
        self.capture_group = group;
    }

    pub fn ops(&self) -> &Arc<dyn ElementOps> {
        &self.ops
    }

    pub fn private<T: 'static>(&self) -> Option<&T> {
        self.private.as_ref()?.downcast_ref()
    }

    pub fn private_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.private.as_mut()?.downcast_mut()
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&MixerElement, EventMask) -> Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    pub fn set_callback_private(&mut self, private: Box<dyn Any + Send>) {
        self.callback_private = Some(private);
    }

    pub fn callback_private<T: 'static>(&self) -> Option<&T> {
        self.callback_private.as_ref()?.downcast_ref()
    }

    pub(crate) fn notify(&mut self, mask: EventMask) -> Result<()> {
        let Some(mut callback) = self.callback.take() else {
            return Ok(());
        };
        let result = callback(self, mask);
        self.callback = Some(callback);
        result
    }
}

impl fmt::Display for MixerElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

impl fmt::Debug for MixerElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerElement")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("caps", &self.caps)
            .field("capture_group", &self.capture_group)
            .finish()
    }
}

/// Default mixer order: provider weight, then name, then index.
pub fn compare_mixer_default(a: &MixerElement, b: &MixerElement) -> Ordering {
    a.weight
        .cmp(&b.weight)
        .then_with(|| a.id.name.cmp(&b.id.name))
        .then_with(|| a.id.index.cmp(&b.id.index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_name(FRONT_LEFT), "Front Left");
        assert_eq!(channel_name(REAR_CENTER), "Rear Center");
        assert_eq!(channel_name(9), "?");
        assert_eq!(channel_name(CHANNEL_LAST), "?");
    }

    #[test]
    fn test_caps_bits() {
        let mut caps = Caps::PVOLUME | Caps::PSWITCH;
        assert!(caps.intersects(Caps::PVOLUME));
        caps.remove(Caps::PVOLUME);
        assert!(!caps.intersects(Caps::PVOLUME));
        caps.insert(Caps::CENUM);
        assert!(caps.intersects(Caps::PENUM | Caps::CENUM));
    }
}
