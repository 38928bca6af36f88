//! Generic provider mapping conventionally named controls onto mixer
//! elements.
//!
//! `Master Playback Volume` and `Master Playback Switch` become the
//! playback volume and switch of the element `Master`. A `Capture Source`
//! enumeration becomes an exclusive capture switch on every element named
//! after one of its items.

use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::control::{compare_weight, ControlInfo, DbScale, ElemId, EventMask, Interface};
use crate::error::{Error, Result};
use crate::mixer::{
    Caps, ControlKey, ControlSlots, Direction, ElemRef, ElementOps, MixerCore, MixerDefinition,
    MixerElemId, MixerElement, OpenContext, Rounding,
};
use crate::provider::{ControlRef, EmptyElementPolicy, MixerProvider};

const DEFAULT_DEVICE: &str = "default";
const CAPTURE_SOURCE: &str = "Capture Source";

/// dB value reported for the muted minimum of a scale.
pub const DB_GAIN_MUTE: i64 = -9_999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Volume(Direction),
    Switch(Direction),
    Enum(Direction),
    /// Item `n` of the capture source enumeration
    Source(u32),
}

impl Role {
    fn direction(self) -> Direction {
        match self {
            Role::Volume(dir) | Role::Switch(dir) | Role::Enum(dir) => dir,
            Role::Source(_) => Direction::Capture,
        }
    }
}

const SUFFIXES: [(&str, Role); 6] = [
    (" Playback Volume", Role::Volume(Direction::Playback)),
    (" Playback Switch", Role::Switch(Direction::Playback)),
    (" Capture Volume", Role::Volume(Direction::Capture)),
    (" Capture Switch", Role::Switch(Direction::Capture)),
    (" Volume", Role::Volume(Direction::Common)),
    (" Switch", Role::Switch(Direction::Common)),
];

/// Split a control name into element name and role.
fn classify(name: &str, info: &ControlInfo) -> (String, Role) {
    if info.is_enumerated() {
        let dir = if name.contains("Capture") {
            Direction::Capture
        } else {
            Direction::Playback
        };
        return (name.to_string(), Role::Enum(dir));
    }
    for (suffix, role) in SUFFIXES {
        let Some(base) = name.strip_suffix(suffix) else {
            continue;
        };
        let role = match (base, role) {
            ("Capture", Role::Volume(Direction::Common)) => Role::Volume(Direction::Capture),
            ("Capture", Role::Switch(Direction::Common)) => Role::Switch(Direction::Capture),
            _ => role,
        };
        return (base.to_string(), role);
    }
    let role = if info.is_boolean() {
        Role::Switch(Direction::Common)
    } else {
        Role::Volume(Direction::Common)
    };
    (name.to_string(), role)
}

#[derive(Debug, Clone)]
struct Binding {
    key: ControlKey,
    id: ElemId,
    info: ControlInfo,
    role: Role,
}

impl Binding {
    fn raw_range(&self) -> (i64, i64) {
        (self.info.min, self.info.max)
    }

    fn db_scale(&self) -> Result<DbScale> {
        self.info
            .db
            .ok_or_else(|| Error::invalid(format!("{} has no dB scale", self.id)))
    }

    fn channel_index(&self, channel: u32) -> Result<usize> {
        if self.info.count <= 1 {
            Ok(0)
        } else if channel < self.info.count {
            Ok(channel as usize)
        } else {
            Err(Error::invalid(format!("{} has no channel {}", self.id, channel)))
        }
    }

    fn raw_to_db(&self, raw: i64) -> Result<i64> {
        let scale = self.db_scale()?;
        if scale.mute && raw <= self.info.min {
            return Ok(DB_GAIN_MUTE);
        }
        Ok(rescale(raw, self.raw_range(), (scale.min, scale.max)))
    }

    fn db_to_raw(&self, db: i64, rounding: Rounding) -> Result<i64> {
        let scale = self.db_scale()?;
        let span = scale.max - scale.min;
        if span <= 0 {
            return Ok(self.info.min);
        }
        let db = db.clamp(scale.min, scale.max);
        let num = i128::from(db - scale.min) * i128::from(self.info.max - self.info.min);
        Ok(self.info.min + div_round(num, i128::from(span), rounding) as i64)
    }
}

/// Per-element state of the basic provider.
#[derive(Debug, Default)]
struct BasicElem {
    bindings: Vec<Binding>,
    /// User ranges set with `set_volume_range`
    ranges: HashMap<Direction, (i64, i64)>,
}

impl BasicElem {
    fn volume(&self, dir: Direction) -> Result<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.role == Role::Volume(dir))
            .ok_or_else(|| Error::invalid(format!("no {:?} volume control", dir)))
    }

    fn switch(&self, dir: Direction) -> Result<&Binding> {
        self.bindings
            .iter()
            .find(|b| match b.role {
                Role::Switch(d) => d == dir,
                Role::Source(_) => dir == Direction::Capture,
                _ => false,
            })
            .ok_or_else(|| Error::invalid(format!("no {:?} switch control", dir)))
    }

    fn enumeration(&self) -> Result<&Binding> {
        self.bindings
            .iter()
            .find(|b| matches!(b.role, Role::Enum(_)))
            .ok_or_else(|| Error::invalid("no enumerated control"))
    }

    fn user_range(&self, dir: Direction, binding: &Binding) -> (i64, i64) {
        self.ranges
            .get(&dir)
            .copied()
            .unwrap_or_else(|| binding.raw_range())
    }

    fn to_user(&self, dir: Direction, binding: &Binding, raw: i64) -> i64 {
        rescale(raw, binding.raw_range(), self.user_range(dir, binding))
    }

    fn to_raw(&self, dir: Direction, binding: &Binding, value: i64) -> i64 {
        rescale(value, self.user_range(dir, binding), binding.raw_range())
    }

    fn caps(&self) -> (Caps, u32) {
        let mut caps = Caps::empty();
        let mut group = 0;
        for b in &self.bindings {
            let joined = b.info.count <= 1;
            let (bit, join) = match b.role {
                Role::Volume(Direction::Playback) => (Caps::PVOLUME, Caps::PVOLUME_JOIN),
                Role::Switch(Direction::Playback) => (Caps::PSWITCH, Caps::PSWITCH_JOIN),
                Role::Volume(Direction::Capture) => (Caps::CVOLUME, Caps::CVOLUME_JOIN),
                Role::Switch(Direction::Capture) => (Caps::CSWITCH, Caps::CSWITCH_JOIN),
                Role::Volume(Direction::Common) => (Caps::GVOLUME, Caps::empty()),
                Role::Switch(Direction::Common) => (Caps::GSWITCH, Caps::empty()),
                Role::Enum(Direction::Capture) => (Caps::CENUM, Caps::empty()),
                Role::Enum(_) => (Caps::PENUM, Caps::empty()),
                Role::Source(_) => {
                    group = b.key.numid;
                    (Caps::CSWITCH | Caps::CSWITCH_EXCL, Caps::CSWITCH_JOIN)
                }
            };
            caps.insert(bit);
            if joined {
                caps.insert(join);
            }
        }
        (caps, group)
    }
}

fn div_round(num: i128, den: i128, rounding: Rounding) -> i128 {
    match rounding {
        Rounding::Below => num.div_euclid(den),
        Rounding::Above => -(-num).div_euclid(den),
        Rounding::Nearest => (2 * num + den).div_euclid(2 * den),
    }
}

/// Map `value` linearly from `from` onto `to`, rounding to nearest.
fn rescale(value: i64, from: (i64, i64), to: (i64, i64)) -> i64 {
    if from.1 <= from.0 {
        return to.0;
    }
    let value = value.clamp(from.0, from.1);
    let span = i128::from(from.1) - i128::from(from.0);
    let delta = i128::from(value) - i128::from(from.0);
    let target = i128::from(to.1) - i128::from(to.0);
    let offset = match delta.checked_mul(target).filter(|num| num.checked_mul(4).is_some()) {
        Some(num) => div_round(num, span, Rounding::Nearest),
        // both ranges close to the full i64 width
        None => (delta as f64 * (target as f64 / span as f64)).round() as i128,
    };
    (i128::from(to.0) + offset).clamp(i128::from(to.0), i128::from(to.1)) as i64
}

fn foreign(id: &MixerElemId) -> Error {
    Error::invalid(format!("{} is not managed by the basic provider", id))
}

fn state<'m>(elem: &ElemRef<'m>) -> Result<&'m BasicElem> {
    elem.elem()
        .private::<BasicElem>()
        .ok_or_else(|| foreign(elem.id()))
}

fn read(elem: &ElemRef<'_>, binding: &Binding) -> Result<Vec<i64>> {
    elem.controls()
        .session(binding.key.slot)?
        .read_value(&binding.id)
}

fn read_channel(elem: &ElemRef<'_>, binding: &Binding, channel: u32) -> Result<i64> {
    let idx = binding.channel_index(channel)?;
    read(elem, binding)?
        .get(idx)
        .copied()
        .ok_or_else(|| Error::invalid(format!("{} returned no value {}", binding.id, idx)))
}

fn write_channel(elem: &ElemRef<'_>, binding: &Binding, channel: u32, raw: i64) -> Result<()> {
    let idx = binding.channel_index(channel)?;
    let mut values = read(elem, binding)?;
    let slot = values
        .get_mut(idx)
        .ok_or_else(|| Error::invalid(format!("{} returned no value {}", binding.id, idx)))?;
    *slot = raw;
    elem.controls()
        .session(binding.key.slot)?
        .write_value(&binding.id, &values)?;
    Ok(())
}

/// Edit the bindings of an element and recompute its capabilities.
///
/// Returns the number of bindings left.
fn update<F>(elem: &mut MixerElement, edit: F) -> Result<usize>
where
    F: FnOnce(&mut Vec<Binding>),
{
    let Some(state) = elem.private_mut::<BasicElem>() else {
        return Err(foreign(elem.id()));
    };
    edit(&mut state.bindings);
    let remaining = state.bindings.len();
    let (caps, group) = state.caps();
    elem.set_caps(caps);
    elem.set_capture_group(group);
    Ok(remaining)
}

/// Element operations backed by the bound raw controls.
#[derive(Debug, Default)]
pub struct BasicOps;

impl ElementOps for BasicOps {
    fn has_channel(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32) -> Result<bool> {
        Ok(state(elem)?
            .bindings
            .iter()
            .any(|b| b.role.direction() == dir && channel < b.info.count.max(1)))
    }

    fn get_channels(&self, elem: &ElemRef<'_>, dir: Direction) -> Result<u32> {
        Ok(state(elem)?
            .bindings
            .iter()
            .filter(|b| b.role.direction() == dir)
            .map(|b| b.info.count.max(1))
            .max()
            .unwrap_or(0))
    }

    fn get_range(&self, elem: &ElemRef<'_>, dir: Direction) -> Result<(i64, i64)> {
        let state = state(elem)?;
        Ok(state.user_range(dir, state.volume(dir)?))
    }

    fn set_range(
        &self,
        _controls: &ControlSlots,
        elem: &mut MixerElement,
        dir: Direction,
        min: i64,
        max: i64,
    ) -> Result<()> {
        let Some(state) = elem.private_mut::<BasicElem>() else {
            return Err(foreign(elem.id()));
        };
        state.volume(dir)?;
        state.ranges.insert(dir, (min, max));
        Ok(())
    }

    fn get_db_range(&self, elem: &ElemRef<'_>, dir: Direction) -> Result<(i64, i64)> {
        let scale = state(elem)?.volume(dir)?.db_scale()?;
        Ok((scale.min, scale.max))
    }

    fn ask_vol_db(&self, elem: &ElemRef<'_>, dir: Direction, value: i64) -> Result<i64> {
        let state = state(elem)?;
        let binding = state.volume(dir)?;
        binding.raw_to_db(state.to_raw(dir, binding, value))
    }

    fn ask_db_vol(&self, elem: &ElemRef<'_>, dir: Direction, db: i64, rounding: Rounding) -> Result<i64> {
        let state = state(elem)?;
        let binding = state.volume(dir)?;
        let raw = binding.db_to_raw(db, rounding)?;
        Ok(state.to_user(dir, binding, raw))
    }

    fn get_volume(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32) -> Result<i64> {
        let state = state(elem)?;
        let binding = state.volume(dir)?;
        let raw = read_channel(elem, binding, channel)?;
        Ok(state.to_user(dir, binding, raw))
    }

    fn get_db(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32) -> Result<i64> {
        let binding = state(elem)?.volume(dir)?;
        binding.raw_to_db(read_channel(elem, binding, channel)?)
    }

    fn set_volume(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32, value: i64) -> Result<()> {
        let state = state(elem)?;
        let binding = state.volume(dir)?;
        write_channel(elem, binding, channel, state.to_raw(dir, binding, value))
    }

    fn set_db(
        &self,
        elem: &ElemRef<'_>,
        dir: Direction,
        channel: u32,
        db: i64,
        rounding: Rounding,
    ) -> Result<()> {
        let binding = state(elem)?.volume(dir)?;
        write_channel(elem, binding, channel, binding.db_to_raw(db, rounding)?)
    }

    fn get_switch(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32) -> Result<bool> {
        let binding = state(elem)?.switch(dir)?;
        let value = read_channel(elem, binding, channel)?;
        Ok(match binding.role {
            Role::Source(item) => value == i64::from(item),
            _ => value != 0,
        })
    }

    fn set_switch(&self, elem: &ElemRef<'_>, dir: Direction, channel: u32, on: bool) -> Result<()> {
        let binding = state(elem)?.switch(dir)?;
        match binding.role {
            // deselecting a capture source has no device representation
            Role::Source(_) if !on => Ok(()),
            Role::Source(item) => {
                let values = vec![i64::from(item); binding.info.count.max(1) as usize];
                elem.controls()
                    .session(binding.key.slot)?
                    .write_value(&binding.id, &values)?;
                Ok(())
            }
            _ => write_channel(elem, binding, channel, i64::from(on)),
        }
    }

    fn is_enumerated(&self, elem: &ElemRef<'_>, dir: Direction) -> Result<bool> {
        Ok(state(elem)?.bindings.iter().any(|b| match b.role {
            Role::Enum(d) => dir == Direction::Common || d == dir,
            _ => false,
        }))
    }

    fn enum_items(&self, elem: &ElemRef<'_>) -> Result<u32> {
        Ok(state(elem)?.enumeration()?.info.items.len() as u32)
    }

    fn enum_item_name(&self, elem: &ElemRef<'_>, item: u32) -> Result<String> {
        let binding = state(elem)?.enumeration()?;
        binding
            .info
            .items
            .get(item as usize)
            .cloned()
            .ok_or_else(|| Error::invalid(format!("{} has no item {}", binding.id, item)))
    }

    fn get_enum_item(&self, elem: &ElemRef<'_>, channel: u32) -> Result<u32> {
        let binding = state(elem)?.enumeration()?;
        let value = read_channel(elem, binding, channel)?;
        u32::try_from(value)
            .map_err(|_| Error::invalid(format!("{} reported item {}", binding.id, value)))
    }

    fn set_enum_item(&self, elem: &ElemRef<'_>, channel: u32, item: u32) -> Result<()> {
        let binding = state(elem)?.enumeration()?;
        if item as usize >= binding.info.items.len() {
            return Err(Error::invalid(format!("{} has no item {}", binding.id, item)));
        }
        write_channel(elem, binding, channel, i64::from(item))
    }
}

fn devices(def: &MixerDefinition) -> Result<Vec<String>> {
    if let Some(list) = def.param("devices") {
        let Value::Array(list) = list else {
            return Err(Error::config(format!("basic: 'devices' must be an array, got {}", list)));
        };
        if list.is_empty() {
            return Err(Error::config("basic: 'devices' is empty"));
        }
        return list
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::config(format!("basic: device name {} is not a string", v)))
            })
            .collect();
    }
    match def.param("device") {
        None => Ok(vec![DEFAULT_DEVICE.to_string()]),
        Some(Value::String(name)) => Ok(vec![name.clone()]),
        Some(other) => Err(Error::config(format!("basic: device name {} is not a string", other))),
    }
}

/// Provider for devices whose controls follow the usual naming scheme.
///
/// Definition parameters: `device` (one endpoint, default `"default"`) or
/// `devices` (array of endpoints).
#[derive(Default)]
pub struct BasicProvider {
    devices: Vec<String>,
    ops: Arc<BasicOps>,
}

impl BasicProvider {
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    fn add(&mut self, core: &mut MixerCore, ctl: ControlRef<'_>) -> Result<()> {
        if ctl.id().iface != Interface::Mixer {
            return Ok(());
        }
        let info = ctl.session.read_info(ctl.id())?;
        let key = ctl.key();

        if info.is_enumerated() && ctl.elem.name() == CAPTURE_SOURCE {
            for (item, name) in info.items.iter().enumerate() {
                let binding = Binding {
                    key,
                    id: ctl.id().clone(),
                    info: info.clone(),
                    role: Role::Source(item as u32),
                };
                self.bind(core, MixerElemId::new(name.clone(), ctl.elem.index()), binding)?;
            }
            return Ok(());
        }

        let (base, role) = classify(ctl.elem.name(), &info);
        let binding = Binding {
            key,
            id: ctl.id().clone(),
            info,
            role,
        };
        self.bind(core, MixerElemId::new(base, ctl.elem.index()), binding)
    }

    fn bind(&self, core: &mut MixerCore, id: MixerElemId, binding: Binding) -> Result<()> {
        let key = binding.key;
        match core.element_mut(&id) {
            Some(elem) => {
                update(elem, |bindings| bindings.push(binding))?;
                core.attach(&id, key)?;
                core.notify_info(&id)
            }
            None => {
                let state = BasicElem {
                    bindings: vec![binding],
                    ranges: HashMap::new(),
                };
                let (caps, group) = state.caps();
                let ops: Arc<dyn ElementOps> = self.ops.clone();
                let mut elem = MixerElement::new(id.clone(), compare_weight(&id.name), ops)
                    .with_caps(caps)
                    .with_private(state);
                elem.set_capture_group(group);
                debug!("basic: new element {} ({:?})", id, caps);
                core.add_element(elem)?;
                core.attach(&id, key)
            }
        }
    }

    fn unbind(&mut self, core: &mut MixerCore, key: ControlKey, id: &MixerElemId) -> Result<()> {
        let Some(elem) = core.element_mut(id) else {
            return Ok(());
        };
        let remaining = update(elem, |bindings| bindings.retain(|b| b.key != key))?;
        if remaining > 0 {
            core.notify_info(id)?;
        }
        Ok(())
    }

    fn refresh(&mut self, core: &mut MixerCore, ctl: ControlRef<'_>, id: &MixerElemId) -> Result<()> {
        let info = ctl.session.read_info(ctl.id())?;
        let key = ctl.key();
        let Some(elem) = core.element_mut(id) else {
            return Ok(());
        };
        update(elem, |bindings| {
            for b in bindings.iter_mut().filter(|b| b.key == key) {
                b.info = info.clone();
            }
        })?;
        core.notify_info(id)
    }
}

impl MixerProvider for BasicProvider {
    fn open(&mut self, ctx: &mut OpenContext<'_>, def: &MixerDefinition) -> Result<()> {
        self.devices = devices(def)?;
        for device in &self.devices {
            let slot = ctx.open_control(device)?;
            debug!("basic: '{}' opened in slot {}", device, slot);
        }
        Ok(())
    }

    fn event(
        &mut self,
        core: &mut MixerCore,
        ctl: ControlRef<'_>,
        mask: EventMask,
        melem: Option<&MixerElemId>,
    ) -> Result<()> {
        if mask.is_remove() {
            return match melem {
                Some(id) => self.unbind(core, ctl.key(), id),
                None => Ok(()),
            };
        }
        if mask.is_add() {
            return self.add(core, ctl);
        }
        let Some(id) = melem else {
            return Ok(());
        };
        if mask.is_info() {
            self.refresh(core, ctl, id)?;
        }
        if mask.is_value() {
            core.notify_value(id)?;
        }
        Ok(())
    }

    fn empty_policy(&self) -> EmptyElementPolicy {
        EmptyElementPolicy::Remove
    }
}

pub fn open() -> Box<dyn MixerProvider> {
    Box::new(BasicProvider::default())
}
