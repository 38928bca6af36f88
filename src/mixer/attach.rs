//! Many-to-many links between raw controls and mixer elements.

use std::collections::HashMap;
use std::fmt;

use super::element::MixerElemId;
use crate::error::{Error, Result};

/// Identifies a raw control across the control sessions of one mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    /// Control session slot inside the mixer
    pub slot: usize,
    pub numid: u32,
}

impl ControlKey {
    pub fn new(slot: usize, numid: u32) -> Self {
        Self { slot, numid }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctl{}:numid={}", self.slot, self.numid)
    }
}

/// Symmetric membership relation, stored once per side.
///
/// A control owns a member list from the moment its addition is seen until
/// it is discarded; mixer element lists exist only while non-empty.
#[derive(Debug, Default)]
pub struct Attachments {
    by_control: HashMap<ControlKey, Vec<MixerElemId>>,
    by_mixer: HashMap<MixerElemId, Vec<ControlKey>>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the (empty) member list of a newly added control.
    pub fn register_control(&mut self, key: ControlKey) {
        self.by_control.entry(key).or_default();
    }

    pub fn is_registered(&self, key: &ControlKey) -> bool {
        self.by_control.contains_key(key)
    }

    /// Drop a control's member list, detaching every remaining pair.
    ///
    /// Returns the mixer elements that were still attached.
    pub fn discard_control(&mut self, key: &ControlKey) -> Vec<MixerElemId> {
        let members = self.by_control.remove(key).unwrap_or_default();
        for id in &members {
            self.unlink_mixer_side(id, key);
        }
        members
    }

    /// Link a control and a mixer element. Linking an existing pair is a no-op.
    pub fn attach(&mut self, key: ControlKey, id: &MixerElemId) -> Result<()> {
        let members = self
            .by_control
            .get_mut(&key)
            .ok_or_else(|| Error::not_found(format!("control {}", key)))?;
        if members.contains(id) {
            return Ok(());
        }
        members.push(id.clone());
        self.by_mixer.entry(id.clone()).or_default().push(key);
        Ok(())
    }

    pub fn detach(&mut self, key: &ControlKey, id: &MixerElemId) -> Result<()> {
        let members = self
            .by_control
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("control {}", key)))?;
        let pos = members
            .iter()
            .position(|m| m == id)
            .ok_or_else(|| Error::not_found(format!("{} is not attached to {}", id, key)))?;
        members.remove(pos);
        self.unlink_mixer_side(id, key);
        Ok(())
    }

    /// Detach a mixer element from every control; returns the former links.
    pub fn detach_mixer(&mut self, id: &MixerElemId) -> Vec<ControlKey> {
        let keys = self.by_mixer.remove(id).unwrap_or_default();
        for key in &keys {
            if let Some(members) = self.by_control.get_mut(key) {
                members.retain(|m| m != id);
            }
        }
        keys
    }

    fn unlink_mixer_side(&mut self, id: &MixerElemId, key: &ControlKey) {
        if let Some(keys) = self.by_mixer.get_mut(id) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.by_mixer.remove(id);
            }
        }
    }

    pub fn is_attached(&self, key: &ControlKey, id: &MixerElemId) -> bool {
        self.by_control
            .get(key)
            .is_some_and(|members| members.contains(id))
    }

    /// Mixer elements linked to a control, in attach order
    pub fn elements_of(&self, key: &ControlKey) -> &[MixerElemId] {
        self.by_control.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Controls linked to a mixer element, in attach order
    pub fn controls_of(&self, id: &MixerElemId) -> &[ControlKey] {
        self.by_mixer.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_control_empty(&self, key: &ControlKey) -> bool {
        self.elements_of(key).is_empty()
    }

    pub fn is_mixer_empty(&self, id: &MixerElemId) -> bool {
        self.controls_of(id).is_empty()
    }

    /// Visit the mixer elements of a control.
    ///
    /// The member list is snapshotted first; members detached by an earlier
    /// callback are skipped. Stops at the first error.
    pub fn for_each_safe_control<F>(&mut self, key: &ControlKey, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &MixerElemId) -> Result<()>,
    {
        let snapshot = self.elements_of(key).to_vec();
        for id in &snapshot {
            if self.is_attached(key, id) {
                f(self, id)?;
            }
        }
        Ok(())
    }

    /// Visit the controls of a mixer element; same rules as
    /// [`for_each_safe_control`](Self::for_each_safe_control).
    pub fn for_each_safe_mixer<F>(&mut self, id: &MixerElemId, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, &ControlKey) -> Result<()>,
    {
        let snapshot = self.controls_of(id).to_vec();
        for key in &snapshot {
            if self.is_attached(key, id) {
                f(self, key)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elem(name: &str) -> MixerElemId {
        MixerElemId::new(name, 0)
    }

    #[test]
    fn test_attach_requires_registered_control() {
        let mut att = Attachments::new();
        let err = att.attach(ControlKey::new(0, 5), &elem("Master")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut att = Attachments::new();
        let key = ControlKey::new(0, 5);
        att.register_control(key);
        att.attach(key, &elem("Master")).unwrap();
        att.attach(key, &elem("Master")).unwrap();
        assert_eq!(att.elements_of(&key).len(), 1);
        assert_eq!(att.controls_of(&elem("Master")), &[key]);
    }

    #[test]
    fn test_discard_control_unlinks_mixer_side() {
        let mut att = Attachments::new();
        let (a, b) = (ControlKey::new(0, 1), ControlKey::new(0, 2));
        att.register_control(a);
        att.register_control(b);
        att.attach(a, &elem("PCM")).unwrap();
        att.attach(b, &elem("PCM")).unwrap();

        assert_eq!(att.discard_control(&a), vec![elem("PCM")]);
        assert!(!att.is_registered(&a));
        assert_eq!(att.controls_of(&elem("PCM")), &[b]);
    }

    #[test]
    fn test_detach_mixer() {
        let mut att = Attachments::new();
        let (a, b) = (ControlKey::new(0, 1), ControlKey::new(1, 1));
        att.register_control(a);
        att.register_control(b);
        att.attach(a, &elem("Mic")).unwrap();
        att.attach(b, &elem("Mic")).unwrap();
        att.attach(b, &elem("Line")).unwrap();

        assert_eq!(att.detach_mixer(&elem("Mic")), vec![a, b]);
        assert!(att.is_control_empty(&a));
        assert_eq!(att.elements_of(&b), &[elem("Line")]);
    }
}
