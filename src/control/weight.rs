//! Name-based priority used by the default control order.
//!
//! Mixer controls are ranked by matching the name against three tables:
//! a category prefix (Master, PCM, ...), a role word (Playback, Capture, ...)
//! and a trailing modifier (Volume, Switch, ...). Lower weights sort first.

use std::cmp::Ordering;

use super::element::ControlElement;
use super::id::Interface;

/// Weight of a name whose prefix matches no category.
pub const UNRANKED: i32 = 1_000_000_000;

const CATEGORY_COEF: i32 = 1_000_000;
const ROLE_COEF: i32 = 1_000;
const MODIFIER_COEF: i32 = 1;

const CATEGORIES: &[&str] = &[
    "Master",
    "Hardware Master",
    "Headphone",
    "Tone Control",
    "3D Control",
    "PCM",
    "Front",
    "Surround",
    "Center",
    "LFE",
    "Synth",
    "FM",
    "Wave",
    "Music",
    "DSP",
    "Line",
    "CD",
    "Mic",
    "Phone",
    "Video",
    "Zoom Video",
    "PC Speaker",
    "Aux",
    "Mono",
    "ADC",
    "Capture Source",
    "Capture",
    "Playback",
    "Loopback",
    "Analog Loopback",
    "Digital Loopback",
    "I2S",
    "IEC958",
];

const ROLES: &[&str] = &[
    "Switch", "Volume", "Playback", "Capture", "Bypass", "Mono", "Front", "Rear", "Pan", "Output",
    "-",
];

const MODIFIERS: &[&str] = &[
    "Switch", "Volume", "Bypass", "Depth", "Wide", "Space", "Level", "Center",
];

/// Match the start of `name` against `table`.
///
/// On a hit the matched prefix and one following space are consumed and
/// `position * coef + 1` is returned.
fn lookup(name: &mut &str, table: &[&str], coef: i32) -> Option<i32> {
    table.iter().enumerate().find_map(|(position, entry)| {
        let rest = name.strip_prefix(entry)?;
        *name = rest.strip_prefix(' ').unwrap_or(rest);
        Some(position as i32 * coef + 1)
    })
}

/// Where the role lookup starts in the text after the category.
///
/// Scans backwards from the end: past the last word, past the spaces before
/// it, then to the start of the preceding word. Returns `None` when that scan
/// reaches the start of `name` while still inside the last word or on the
/// first character, in which case the modifier table applies to all of
/// `name`. For three or more words the window starts on a space and no role
/// can match.
fn role_window(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut pos = bytes.len().checked_sub(1)?;
    while pos > 0 && bytes[pos] != b' ' {
        pos -= 1;
    }
    while pos > 0 && bytes[pos] == b' ' {
        pos -= 1;
    }
    if pos == 0 {
        return None;
    }
    while pos > 0 && bytes[pos] != b' ' {
        pos -= 1;
    }
    Some(pos)
}

/// Compute the ordering weight of a control name.
pub fn compare_weight(name: &str) -> i32 {
    let mut rest = name;
    let Some(mut weight) = lookup(&mut rest, CATEGORIES, CATEGORY_COEF) else {
        return UNRANKED;
    };
    if rest.is_empty() {
        return weight;
    }

    if let Some(start) = role_window(rest) {
        rest = &rest[start..];
        match lookup(&mut rest, ROLES, ROLE_COEF) {
            Some(role) => weight += role,
            None => return weight,
        }
    }

    match lookup(&mut rest, MODIFIERS, MODIFIER_COEF) {
        Some(modifier) => weight + modifier,
        None => weight,
    }
}

/// Default control order.
///
/// Interface first, then the cached name weight for mixer controls, then
/// name, sub-index, device and subdevice.
pub fn compare_default(a: &ControlElement, b: &ControlElement) -> Ordering {
    let (ia, ib) = (a.id(), b.id());
    ia.iface
        .cmp(&ib.iface)
        .then_with(|| {
            if ia.iface == Interface::Mixer {
                a.weight().cmp(&b.weight())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| ia.name.cmp(&ib.name))
        .then_with(|| ia.index.cmp(&ib.index))
        .then_with(|| ia.device.cmp(&ib.device))
        .then_with(|| ia.subdevice.cmp(&ib.subdevice))
}

/// Order by device-assigned numeric id only.
pub fn compare_fast(a: &ControlElement, b: &ControlElement) -> Ordering {
    a.id().numid.cmp(&b.id().numid)
}
