use crate::control::EventMask;
use crate::error::Result;
use crate::mixer::{MixerCore, MixerDefinition, MixerElemId, OpenContext};
use crate::provider::{ControlRef, MixerProvider};

/// Provider that opens no controls and exposes no elements.
#[derive(Debug, Default)]
pub struct NoneProvider;

impl MixerProvider for NoneProvider {
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

pub fn open() -> Box<dyn MixerProvider> {
    Box::new(NoneProvider)
}
