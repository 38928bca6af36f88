//! Mixer element operations.
//!
//! [`ElementOps`] is the per-element operation table a provider installs;
//! [`ElemRef`] is the public entry point that validates capabilities and
//! collapses joined channels before delegating to it.

use super::element::{Caps, Direction, MixerElement, MixerElemId, CHANNEL_LAST};
use super::session::ControlSlots;
use crate::error::{Error, Result};

/// Rounding used when converting a dB value to a raw volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Exact value or the closest one below
    Below,
    #[default]
    Nearest,
    /// Exact value or the closest one above
    Above,
}

fn unsupported(what: &str) -> Error {
    Error::invalid(format!("{} is not supported by this element", what))
}

/// Operation table bound to a mixer element by its provider.
pub trait ElementOps: Send + Sync {
    fn is_active(&self, _elem: &ElemRef<'_>) -> Result<bool> {
        Ok(true)
    }

    fn has_channel(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32) -> Result<bool>;

    fn get_channels(&self, elem: &ElemRef<'_>, dir: Direction) -> Result<u32>;

    /// User-visible volume range
    fn get_range(&self, _elem: &ElemRef<'_>, _dir: Direction) -> Result<(i64, i64)> {
        Err(unsupported("volume range"))
    }

    fn set_range(
        &self,
        _controls: &ControlSlots,
        _elem: &mut MixerElement,
        _dir: Direction,
        _min: i64,
        _max: i64,
    ) -> Result<()> {
        Err(unsupported("volume range"))
    }

    /// dB range in 0.01 dB units
    fn get_db_range(&self, _elem: &ElemRef<'_>, _dir: Direction) -> Result<(i64, i64)> {
        Err(unsupported("dB range"))
    }

    fn ask_vol_db(&self, _elem: &ElemRef<'_>, _dir: Direction, _value: i64) -> Result<i64> {
        Err(unsupported("dB conversion"))
    }

    fn ask_db_vol(
        &self,
        _elem: &ElemRef<'_>,
        _dir: Direction,
        _db: i64,
        _rounding: Rounding,
    ) -> Result<i64> {
        Err(unsupported("dB conversion"))
    }

    fn get_volume(&self, _elem: &ElemRef<'_>, _dir: Direction, _channel: u32) -> Result<i64> {
        Err(unsupported("volume"))
    }

    fn get_db(&self, _elem: &ElemRef<'_>, _dir: Direction, _channel: u32) -> Result<i64> {
        Err(unsupported("dB volume"))
    }

    fn set_volume(&self, _elem: &ElemRef<'_>, _dir: Direction, _channel: u32, _value: i64) -> Result<()> {
        Err(unsupported("volume"))
    }

    fn set_db(
        &self,
        _elem: &ElemRef<'_>,
        _dir: Direction,
        _channel: u32,
        _db: i64,
        _rounding: Rounding,
    ) -> Result<()> {
        Err(unsupported("dB volume"))
    }

    fn get_switch(&self, _elem: &ElemRef<'_>, _dir: Direction, _channel: u32) -> Result<bool> {
        Err(unsupported("switch"))
    }

    fn set_switch(&self, _elem: &ElemRef<'_>, _dir: Direction, _channel: u32, _on: bool) -> Result<()> {
        Err(unsupported("switch"))
    }

    fn is_enumerated(&self, _elem: &ElemRef<'_>, _dir: Direction) -> Result<bool> {
        Ok(false)
    }

    fn enum_items(&self, _elem: &ElemRef<'_>) -> Result<u32> {
        Err(unsupported("enumeration"))
    }

    fn enum_item_name(&self, _elem: &ElemRef<'_>, _item: u32) -> Result<String> {
        Err(unsupported("enumeration"))
    }

    fn get_enum_item(&self, _elem: &ElemRef<'_>, _channel: u32) -> Result<u32> {
        Err(unsupported("enumeration"))
    }

    fn set_enum_item(&self, _elem: &ElemRef<'_>, _channel: u32, _item: u32) -> Result<()> {
        Err(unsupported("enumeration"))
    }
}

/// A mixer element together with the control sessions it reads from.
#[derive(Clone, Copy)]
pub struct ElemRef<'m> {
    controls: &'m ControlSlots,
    elem: &'m MixerElement,
}

impl<'m> ElemRef<'m> {
    pub fn new(controls: &'m ControlSlots, elem: &'m MixerElement) -> Self {
        Self { controls, elem }
    }

    pub fn elem(&self) -> &'m MixerElement {
        self.elem
    }

    pub fn controls(&self) -> &'m ControlSlots {
        self.controls
    }

    pub fn id(&self) -> &'m MixerElemId {
        self.elem.id()
    }

    fn caps(&self) -> Caps {
        self.elem.caps()
    }

    pub fn has_volume(&self, dir: Direction) -> bool {
        let bit = match dir {
            Direction::Common => Caps::GVOLUME,
            Direction::Playback => Caps::PVOLUME,
            Direction::Capture => Caps::CVOLUME,
        };
        self.caps().intersects(bit)
    }

    pub fn has_volume_joined(&self, dir: Direction) -> bool {
        match dir {
            Direction::Playback => self.caps().intersects(Caps::PVOLUME_JOIN),
            Direction::Capture => self.caps().intersects(Caps::CVOLUME_JOIN),
            Direction::Common => false,
        }
    }

    pub fn has_switch(&self, dir: Direction) -> bool {
        let bit = match dir {
            Direction::Common => Caps::GSWITCH,
            Direction::Playback => Caps::PSWITCH,
            Direction::Capture => Caps::CSWITCH,
        };
        self.caps().intersects(bit)
    }

    pub fn has_switch_joined(&self, dir: Direction) -> bool {
        match dir {
            Direction::Playback => self.caps().intersects(Caps::PSWITCH_JOIN),
            Direction::Capture => self.caps().intersects(Caps::CSWITCH_JOIN),
            Direction::Common => false,
        }
    }

    /// Capture switch belongs to a group where only one may be on
    pub fn has_switch_exclusive(&self, dir: Direction) -> bool {
        dir == Direction::Capture && self.caps().intersects(Caps::CSWITCH_EXCL)
    }

    /// Exclusive capture group number
    pub fn get_group(&self, dir: Direction) -> Result<u32> {
        if !self.has_switch_exclusive(dir) {
            return Err(Error::invalid(format!("{} has no exclusive capture group", self.id())));
        }
        Ok(self.elem.capture_group())
    }

    pub fn is_active(&self) -> Result<bool> {
        self.elem.ops().is_active(self)
    }

    pub fn has_channel(&self, dir: Direction, channel: u32) -> Result<bool> {
        self.elem.ops().has_channel(self, dir, channel)
    }

    pub fn get_channels(&self, dir: Direction) -> Result<u32> {
        self.elem.ops().get_channels(self, dir)
    }

    fn require_volume(&self, dir: Direction) -> Result<()> {
        if self.has_volume(dir) {
            Ok(())
        } else {
            Err(Error::invalid(format!("{} has no {:?} volume", self.id(), dir)))
        }
    }

    fn require_switch(&self, dir: Direction) -> Result<()> {
        if self.has_switch(dir) {
            Ok(())
        } else {
            Err(Error::invalid(format!("{} has no {:?} switch", self.id(), dir)))
        }
    }

    fn require_enum(&self) -> Result<()> {
        if self.caps().intersects(Caps::PENUM | Caps::CENUM) {
            Ok(())
        } else {
            Err(Error::invalid(format!("{} is not enumerated", self.id())))
        }
    }

    fn volume_channel(&self, dir: Direction, channel: u32) -> u32 {
        if self.has_volume_joined(dir) {
            0
        } else {
            channel
        }
    }

    fn switch_channel(&self, dir: Direction, channel: u32) -> u32 {
        if self.has_switch_joined(dir) {
            0
        } else {
            channel
        }
    }

    pub fn get_volume_range(&self, dir: Direction) -> Result<(i64, i64)> {
        self.require_volume(dir)?;
        self.elem.ops().get_range(self, dir)
    }

    pub fn get_db_range(&self, dir: Direction) -> Result<(i64, i64)> {
        self.require_volume(dir)?;
        self.elem.ops().get_db_range(self, dir)
    }

    /// Convert a volume in the user range to 0.01 dB
    pub fn ask_vol_db(&self, dir: Direction, value: i64) -> Result<i64> {
        self.require_volume(dir)?;
        self.elem.ops().ask_vol_db(self, dir, value)
    }

    /// Convert 0.01 dB to a volume in the user range
    pub fn ask_db_vol(&self, dir: Direction, db: i64, rounding: Rounding) -> Result<i64> {
        self.require_volume(dir)?;
        self.elem.ops().ask_db_vol(self, dir, db, rounding)
    }

    pub fn get_volume(&self, dir: Direction, channel: u32) -> Result<i64> {
        self.require_volume(dir)?;
        let channel = self.volume_channel(dir, channel);
        self.elem.ops().get_volume(self, dir, channel)
    }

    pub fn get_db(&self, dir: Direction, channel: u32) -> Result<i64> {
        self.require_volume(dir)?;
        let channel = self.volume_channel(dir, channel);
        self.elem.ops().get_db(self, dir, channel)
    }

    pub fn set_volume(&self, dir: Direction, channel: u32, value: i64) -> Result<()> {
        self.require_volume(dir)?;
        let channel = self.volume_channel(dir, channel);
        self.elem.ops().set_volume(self, dir, channel, value)
    }

    pub fn set_db(&self, dir: Direction, channel: u32, db: i64, rounding: Rounding) -> Result<()> {
        self.require_volume(dir)?;
        let channel = self.volume_channel(dir, channel);
        self.elem.ops().set_db(self, dir, channel, db, rounding)
    }

    pub fn get_switch(&self, dir: Direction, channel: u32) -> Result<bool> {
        self.require_switch(dir)?;
        let channel = self.switch_channel(dir, channel);
        self.elem.ops().get_switch(self, dir, channel)
    }

    pub fn set_switch(&self, dir: Direction, channel: u32, on: bool) -> Result<()> {
        self.require_switch(dir)?;
        let channel = self.switch_channel(dir, channel);
        self.elem.ops().set_switch(self, dir, channel, on)
    }

    /// Apply `op` to every present channel, stopping after channel 0 when
    /// the channels are joined.
    fn for_each_channel<F>(&self, dir: Direction, joined: bool, mut op: F) -> Result<()>
    where
        F: FnMut(u32) -> Result<()>,
    {
        for channel in 0..=CHANNEL_LAST {
            if !self.has_channel(dir, channel)? {
                continue;
            }
            op(channel)?;
            if channel == 0 && joined {
                break;
            }
        }
        Ok(())
    }

    pub fn set_volume_all(&self, dir: Direction, value: i64) -> Result<()> {
        self.require_volume(dir)?;
        self.for_each_channel(dir, self.has_volume_joined(dir), |channel| {
            self.set_volume(dir, channel, value)
        })
    }

    pub fn set_db_all(&self, dir: Direction, db: i64, rounding: Rounding) -> Result<()> {
        self.require_volume(dir)?;
        self.for_each_channel(dir, self.has_volume_joined(dir), |channel| {
            self.set_db(dir, channel, db, rounding)
        })
    }

    pub fn set_switch_all(&self, dir: Direction, on: bool) -> Result<()> {
        self.require_switch(dir)?;
        self.for_each_channel(dir, self.has_switch_joined(dir), |channel| {
            self.set_switch(dir, channel, on)
        })
    }

    pub fn is_enum(&self, dir: Direction) -> Result<bool> {
        if !self.caps().intersects(Caps::PENUM | Caps::CENUM) {
            return Ok(false);
        }
        self.elem.ops().is_enumerated(self, dir)
    }

    pub fn get_enum_items(&self) -> Result<u32> {
        self.require_enum()?;
        self.elem.ops().enum_items(self)
    }

    pub fn get_enum_item_name(&self, item: u32) -> Result<String> {
        self.require_enum()?;
        self.elem.ops().enum_item_name(self, item)
    }

    pub fn get_enum_item(&self, channel: u32) -> Result<u32> {
        self.require_enum()?;
        self.elem.ops().get_enum_item(self, channel)
    }

    pub fn set_enum_item(&self, channel: u32, item: u32) -> Result<()> {
        self.require_enum()?;
        self.elem.ops().set_enum_item(self, channel, item)
    }
}

/// Restrict the user-visible volume range of an element.
pub fn set_volume_range(
    controls: &ControlSlots,
    elem: &mut MixerElement,
    dir: Direction,
    min: i64,
    max: i64,
) -> Result<()> {
    if min >= max {
        return Err(Error::invalid(format!("empty volume range {}..{}", min, max)));
    }
    if !ElemRef::new(controls, elem).has_volume(dir) {
        return Err(Error::invalid(format!("{} has no {:?} volume", elem.id(), dir)));
    }
    let ops = elem.ops().clone();
    ops.set_range(controls, elem, dir, min, max)
}
