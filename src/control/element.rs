use std::any::Any;
use std::fmt;

use super::event::EventMask;
use super::id::{ElemId, Interface};
use super::weight::compare_weight;
use crate::error::Result;

/// Per-element notification closure, run for removal, value and info events.
pub type ElementCallback = Box<dyn FnMut(&ControlElement, EventMask) -> Result<()> + Send>;

/// Cached record of one device control.
pub struct ControlElement {
    id: ElemId,
    weight: i32,
    callback: Option<ElementCallback>,
    private: Option<Box<dyn Any + Send>>,
}

impl ControlElement {
    /// Create the record; the name weight is computed once here.
    pub fn new(id: ElemId) -> Self {
        let weight = compare_weight(&id.name);
        Self {
            id,
            weight,
            callback: None,
            private: None,
        }
    }

    pub fn id(&self) -> &ElemId {
        &self.id
    }

    pub fn numid(&self) -> u32 {
        self.id.numid
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn index(&self) -> u32 {
        self.id.index
    }

    pub fn iface(&self) -> Interface {
        self.id.iface
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&ControlElement, EventMask) -> Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn set_callback_private(&mut self, private: Box<dyn Any + Send>) {
        self.private = Some(private);
    }

    pub fn callback_private<T: 'static>(&self) -> Option<&T> {
        self.private.as_ref()?.downcast_ref()
    }

    pub fn callback_private_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.private.as_mut()?.downcast_mut()
    }

    /// Run the element callback, if any, with `mask`.
    pub(crate) fn notify(&mut self, mask: EventMask) -> Result<()> {
        let Some(mut callback) = self.callback.take() else {
            return Ok(());
        };
        let result = callback(self, mask);
        self.callback = Some(callback);
        result
    }
}

impl fmt::Display for ControlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

impl fmt::Debug for ControlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlElement")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_weight_computed_at_creation() {
        let elem = ControlElement::new(ElemId::mixer(10, "Master Playback Volume"));
        assert_eq!(elem.weight(), 2004);
    }

    #[test]
    fn test_notify_keeps_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut elem = ControlElement::new(ElemId::mixer(1, "PCM Playback Volume"));
        let counter = hits.clone();
        elem.set_callback(move |e, mask| {
            assert_eq!(e.numid(), 1);
            assert!(mask.is_value());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        elem.notify(EventMask::VALUE).unwrap();
        elem.notify(EventMask::VALUE).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(elem.has_callback());
    }

    #[test]
    fn test_private_downcast() {
        let mut elem = ControlElement::new(ElemId::mixer(1, "Mic Capture Volume"));
        elem.set_callback_private(Box::new(42u32));
        assert_eq!(elem.callback_private::<u32>(), Some(&42));
        assert_eq!(elem.callback_private::<i64>(), None);
    }
}
