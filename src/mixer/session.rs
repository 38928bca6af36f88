//! The mixer: provider-built elements over up to eight control sessions.

use log::{debug, warn};
use std::any::Any;
use std::future::Future;

use super::attach::{Attachments, ControlKey};
use super::config::{MixerConfig, MixerDefinition};
use super::element::{compare_mixer_default, Direction, MixerElemId, MixerElement};
use super::ops::{self, ElemRef};
use crate::control::{
    ControlBackend, ControlElement, ControlEventHandler, ControlSession, EventMask, OpenMode,
};
use crate::error::{Error, Result};
use crate::index::{CompareFn, SortedIndex};
use crate::poll::{self, PollDescriptor};
use crate::provider::{
    ControlRef, EmptyElementPolicy, LoadedModule, MixerProvider, ProviderRegistry,
};
use std::sync::Arc;

/// Maximum number of control sessions one mixer can own.
pub const MAX_CONTROLS: usize = 8;

/// Fixed table of control sessions indexed by slot.
pub struct ControlSlots {
    slots: [Option<ControlSession>; MAX_CONTROLS],
}

impl Default for ControlSlots {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl ControlSlots {
    pub fn get(&self, slot: usize) -> Option<&ControlSession> {
        self.slots.get(slot)?.as_ref()
    }

    fn get_mut(&mut self, slot: usize) -> Option<&mut ControlSession> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Session in `slot`, or `NotFound`
    pub fn session(&self, slot: usize) -> Result<&ControlSession> {
        self.get(slot)
            .ok_or_else(|| Error::not_found(format!("control slot {}", slot)))
    }

    /// Open sessions with their slots, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ControlSession)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.as_ref().map(|s| (slot, s)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cached control a key refers to.
    pub fn control(&self, key: ControlKey) -> Option<(&ControlSession, &ControlElement)> {
        let session = self.get(key.slot)?;
        Some((session, session.find_numid(key.numid)?))
    }

    fn insert(&mut self, session: ControlSession) -> Result<usize> {
        let slot = self.free_slot()?;
        self.slots[slot] = Some(session);
        Ok(slot)
    }

    fn free_slot(&self) -> Result<usize> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::ControlSlotsExhausted(MAX_CONTROLS))
    }

    fn take(&mut self, slot: usize) -> Option<ControlSession> {
        self.slots.get_mut(slot)?.take()
    }
}

/// PCM streams a mixer is opened for; selects the `amixer_pcm` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Streams {
    pub playback: Option<String>,
    pub capture: Option<String>,
}

impl Streams {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn playback(name: impl Into<String>) -> Self {
        Self {
            playback: Some(name.into()),
            capture: None,
        }
    }

    pub fn capture(name: impl Into<String>) -> Self {
        Self {
            playback: None,
            capture: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.playback.is_none() && self.capture.is_none()
    }
}

/// Parameters of a mixer open, as seen by the provider.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub name: String,
    pub streams: Streams,
    pub mode: OpenMode,
}

/// Handed to [`MixerProvider::open`].
pub struct OpenContext<'a> {
    backend: &'a dyn ControlBackend,
    request: &'a OpenRequest,
    controls: &'a mut ControlSlots,
    core: &'a mut MixerCore,
}

impl<'a> OpenContext<'a> {
    pub fn request(&self) -> &OpenRequest {
        self.request
    }

    /// Open a control endpoint into the next free slot and return the slot.
    pub fn open_control(&mut self, endpoint: &str) -> Result<usize> {
        self.controls.free_slot()?;
        let session = ControlSession::open(self.backend, endpoint, self.request.mode)?;
        self.controls.insert(session)
    }

    pub fn controls(&self) -> &ControlSlots {
        self.controls
    }

    pub fn core(&mut self) -> &mut MixerCore {
        self.core
    }
}

pub type MixerCallback = Box<dyn FnMut(EventMask, &MixerElement) -> Result<()> + Send>;

/// Element index, attachments and callbacks of a mixer.
///
/// Providers mutate the mixer through this type.
pub struct MixerCore {
    elems: SortedIndex<MixerElement>,
    attachments: Attachments,
    callback: Option<MixerCallback>,
    callback_private: Option<Box<dyn Any + Send>>,
    events: usize,
}

impl MixerCore {
    fn new() -> Self {
        Self {
            elems: SortedIndex::new(compare_mixer_default),
            attachments: Attachments::new(),
            callback: None,
            callback_private: None,
            events: 0,
        }
    }

    fn position(&self, id: &MixerElemId) -> Option<usize> {
        self.elems.position(|e| e.id() == id)
    }

    fn require(&self, id: &MixerElemId) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| Error::not_found(format!("mixer element {}", id)))
    }

    pub fn count(&self) -> usize {
        self.elems.len()
    }

    /// Notifications thrown since the mixer was opened
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn element(&self, id: &MixerElemId) -> Option<&MixerElement> {
        self.position(id).and_then(|idx| self.elems.get(idx))
    }

    /// Mutable access for state outside the order (caps, private data,
    /// callbacks).
    pub fn element_mut(&mut self, id: &MixerElemId) -> Option<&mut MixerElement> {
        let idx = self.position(id)?;
        self.elems.get_mut(idx)
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Insert an element and notify the mixer callback.
    pub fn add_element(&mut self, elem: MixerElement) -> Result<()> {
        if self.position(elem.id()).is_some() {
            return Err(Error::DuplicateOrder(elem.id().to_string()));
        }
        let idx = self.elems.insert(elem)?;
        self.events += 1;
        match (self.callback.as_mut(), self.elems.get(idx)) {
            (Some(callback), Some(elem)) => callback(EventMask::ADD, elem),
            _ => Ok(()),
        }
    }

    /// Detach an element from every control, notify its callback and drop it.
    pub fn remove_element(&mut self, id: &MixerElemId) -> Result<()> {
        let idx = self.require(id)?;
        self.attachments.detach_mixer(id);
        self.events += 1;
        let result = match self.elems.get_mut(idx) {
            Some(elem) => elem.notify(EventMask::REMOVE),
            None => Ok(()),
        };
        self.elems.remove_at(idx);
        result
    }

    pub fn attach(&mut self, id: &MixerElemId, key: ControlKey) -> Result<()> {
        self.require(id)?;
        self.attachments.attach(key, id)
    }

    pub fn detach(&mut self, id: &MixerElemId, key: ControlKey) -> Result<()> {
        self.attachments.detach(&key, id)
    }

    /// True when no control is attached to the element
    pub fn is_empty(&self, id: &MixerElemId) -> bool {
        self.attachments.is_mixer_empty(id)
    }

    pub fn notify_value(&mut self, id: &MixerElemId) -> Result<()> {
        self.notify(id, EventMask::VALUE)
    }

    pub fn notify_info(&mut self, id: &MixerElemId) -> Result<()> {
        self.notify(id, EventMask::INFO)
    }

    fn notify(&mut self, id: &MixerElemId, mask: EventMask) -> Result<()> {
        let idx = self.require(id)?;
        self.events += 1;
        match self.elems.get_mut(idx) {
            Some(elem) => elem.notify(mask),
            None => Ok(()),
        }
    }

    /// Visit the mixer elements attached to a control with full access to
    /// the core; elements detached during the walk are skipped.
    pub fn for_each_attached<F>(&mut self, key: &ControlKey, mut f: F) -> Result<()>
    where
        F: FnMut(&mut MixerCore, &MixerElemId) -> Result<()>,
    {
        let snapshot = self.attachments.elements_of(key).to_vec();
        for id in &snapshot {
            if self.attachments.is_attached(key, id) {
                f(self, id)?;
            }
        }
        Ok(())
    }
}

/// Routes control session notifications into the provider.
struct Fanout<'a> {
    slot: usize,
    core: &'a mut MixerCore,
    provider: &'a mut dyn MixerProvider,
}

impl Fanout<'_> {
    fn removed(&mut self, ctl: ControlRef<'_>) -> Result<()> {
        let key = ctl.key();
        let members = self.core.attachments.elements_of(&key).to_vec();
        let mut first_err = None;

        for id in &members {
            if !self.core.attachments.is_attached(&key, id) {
                continue;
            }
            if let Err(e) = self.provider.event(self.core, ctl, EventMask::REMOVE, Some(id)) {
                first_err.get_or_insert(e);
            }
        }

        self.core.attachments.discard_control(&key);

        if self.provider.empty_policy() == EmptyElementPolicy::Remove {
            for id in &members {
                if self.core.position(id).is_some() && self.core.is_empty(id) {
                    debug!("Removing mixer element {} left without controls", id);
                    if let Err(e) = self.core.remove_element(id) {
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl ControlEventHandler for Fanout<'_> {
    fn session_event(
        &mut self,
        session: &ControlSession,
        mask: EventMask,
        elem: &ControlElement,
    ) -> Result<()> {
        if !mask.is_add() {
            return Ok(());
        }
        let ctl = ControlRef {
            slot: self.slot,
            session,
            elem,
        };
        self.core.attachments.register_control(ctl.key());
        self.provider.event(self.core, ctl, mask, None)
    }

    fn element_event(
        &mut self,
        session: &ControlSession,
        elem: &ControlElement,
        mask: EventMask,
    ) -> Result<()> {
        let ctl = ControlRef {
            slot: self.slot,
            session,
            elem,
        };
        if mask.is_remove() {
            return self.removed(ctl);
        }
        if !(mask.is_value() || mask.is_info()) {
            return Ok(());
        }
        let provider = &mut *self.provider;
        self.core
            .for_each_attached(&ctl.key(), |core, id| provider.event(core, ctl, mask, Some(id)))
    }
}

/// Higher-level view of one or more control endpoints.
pub struct Mixer {
    name: String,
    controls: ControlSlots,
    core: MixerCore,
    provider: Box<dyn MixerProvider>,
    // dropped after the provider whose code it holds
    module: Option<Arc<dyn LoadedModule>>,
}

impl Mixer {
    /// Open the mixer `name` from `config`.
    ///
    /// The definition comes from `amixer`, or from `amixer_pcm` when
    /// `streams` names a PCM stream. On failure everything opened so far is
    /// closed again.
    pub fn open(
        registry: &ProviderRegistry,
        backend: &dyn ControlBackend,
        config: &MixerConfig,
        name: &str,
        streams: Streams,
        mode: OpenMode,
    ) -> Result<Mixer> {
        let def = config.resolve(name, !streams.is_empty()).inspect_err(|e| {
            warn!("No usable mixer definition for '{}': {}", name, e);
        })?;
        Self::open_definition(registry, backend, config, def, name, streams, mode)
    }

    /// Open a mixer from an explicit definition.
    pub fn open_definition(
        registry: &ProviderRegistry,
        backend: &dyn ControlBackend,
        config: &MixerConfig,
        def: &MixerDefinition,
        name: &str,
        streams: Streams,
        mode: OpenMode,
    ) -> Result<Mixer> {
        let resolved =
            registry.resolve(&def.type_name, config.type_definition(&def.type_name))?;
        let request = OpenRequest {
            name: name.to_string(),
            streams,
            mode,
        };

        let mut mixer = Mixer {
            name: name.to_string(),
            controls: ControlSlots::default(),
            core: MixerCore::new(),
            provider: (resolved.entry)(),
            module: resolved.module,
        };

        if let Err(e) = mixer.start(backend, &request, def) {
            warn!("Opening mixer '{}' failed: {}", name, e);
            if let Err(close_err) = mixer.close() {
                warn!("Cleanup after failed open: {}", close_err);
            }
            return Err(e);
        }
        debug!(
            "Opened mixer '{}' ({}) with {} controls and {} elements",
            name,
            def.type_name,
            mixer.controls.len(),
            mixer.core.count()
        );
        Ok(mixer)
    }

    fn start(
        &mut self,
        backend: &dyn ControlBackend,
        request: &OpenRequest,
        def: &MixerDefinition,
    ) -> Result<()> {
        let mut ctx = OpenContext {
            backend,
            request,
            controls: &mut self.controls,
            core: &mut self.core,
        };
        self.provider.open(&mut ctx, def)?;

        for slot in 0..MAX_CONTROLS {
            let Some(session) = self.controls.get_mut(slot) else {
                continue;
            };
            session.set_nonblock(true)?;
            session.subscribe_events(true)?;
            let mut fanout = Fanout {
                slot,
                core: &mut self.core,
                provider: self.provider.as_mut(),
            };
            session.load_with(&mut fanout)?;
        }
        Ok(())
    }

    /// Close every control session, drop leftover elements and release
    /// the provider.
    pub fn close(self) -> Result<()> {
        let Mixer {
            name,
            mut controls,
            mut core,
            mut provider,
            module,
        } = self;
        let mut first_err = None;

        for slot in 0..MAX_CONTROLS {
            let Some(session) = controls.take(slot) else {
                continue;
            };
            let mut fanout = Fanout {
                slot,
                core: &mut core,
                provider: provider.as_mut(),
            };
            if let Err(e) = session.close_with(&mut fanout) {
                first_err.get_or_insert(e);
            }
        }

        while let Some(id) = core.elems.last().map(|e| e.id().clone()) {
            warn!("Mixer '{}': element {} still present at close", name, id);
            if let Err(e) = core.remove_element(&id) {
                first_err.get_or_insert(e);
            }
        }

        drop(provider);
        drop(module);
        debug!("Closed mixer '{}'", name);
        first_err.map_or(Ok(()), Err)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controls(&self) -> &ControlSlots {
        &self.controls
    }

    pub fn core(&self) -> &MixerCore {
        &self.core
    }

    /// Replace the element order; see [`SortedIndex::set_compare`].
    pub fn set_compare(&mut self, compare: CompareFn<MixerElement>) -> Result<()> {
        self.core.elems.set_compare(compare)
    }

    pub fn count(&self) -> usize {
        self.core.count()
    }

    pub fn events(&self) -> usize {
        self.core.events()
    }

    pub fn first(&self) -> Option<&MixerElement> {
        self.core.elems.first()
    }

    pub fn last(&self) -> Option<&MixerElement> {
        self.core.elems.last()
    }

    pub fn next(&self, elem: &MixerElement) -> Option<&MixerElement> {
        self.core.elems.next(elem)
    }

    pub fn prev(&self, elem: &MixerElement) -> Option<&MixerElement> {
        self.core.elems.prev(elem)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MixerElement> {
        self.core.elems.iter()
    }

    pub fn find(&self, id: &MixerElemId) -> Option<&MixerElement> {
        self.core.element(id)
    }

    /// Operation handle for the element `id`.
    pub fn elem(&self, id: &MixerElemId) -> Option<ElemRef<'_>> {
        self.find(id).map(|elem| ElemRef::new(&self.controls, elem))
    }

    /// Operation handle for an element obtained by iteration.
    pub fn elem_ref<'m>(&'m self, elem: &'m MixerElement) -> ElemRef<'m> {
        ElemRef::new(&self.controls, elem)
    }

    pub fn element_mut(&mut self, id: &MixerElemId) -> Option<&mut MixerElement> {
        self.core.element_mut(id)
    }

    pub fn set_volume_range(
        &mut self,
        id: &MixerElemId,
        dir: Direction,
        min: i64,
        max: i64,
    ) -> Result<()> {
        let elem = self
            .core
            .element_mut(id)
            .ok_or_else(|| Error::not_found(format!("mixer element {}", id)))?;
        ops::set_volume_range(&self.controls, elem, dir, min, max)
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(EventMask, &MixerElement) -> Result<()> + Send + 'static,
    {
        self.core.callback = Some(Box::new(callback));
    }

    pub fn set_callback_private(&mut self, private: Box<dyn Any + Send>) {
        self.core.callback_private = Some(private);
    }

    pub fn callback_private<T: 'static>(&self) -> Option<&T> {
        self.core.callback_private.as_ref()?.downcast_ref()
    }

    /// Descriptors of every control session, in slot order.
    pub fn poll_descriptors(&self) -> Result<Vec<PollDescriptor>> {
        let mut fds = Vec::new();
        for (_, session) in self.controls.iter() {
            fds.extend(session.poll_descriptors()?);
        }
        Ok(fds)
    }

    pub fn poll_revents(&self, fds: &[PollDescriptor]) -> Result<i16> {
        poll::translate_revents(fds)
    }

    /// Wait for events on any control session. 0 polls without blocking,
    /// a negative timeout waits forever.
    pub fn wait(&self, timeout_ms: i32) -> Result<usize> {
        let mut fds = self.poll_descriptors()?;
        if fds.is_empty() {
            return Err(Error::invalid(format!("mixer '{}' has no open controls", self.name)));
        }
        poll::poll(&mut fds, timeout_ms)
    }

    /// [`wait`](Self::wait) on the tokio blocking pool.
    pub fn wait_async(&self, timeout_ms: i32) -> impl Future<Output = Result<usize>> + Send + 'static {
        let fds = self.poll_descriptors();
        let name = self.name.clone();
        async move {
            let fds = fds?;
            if fds.is_empty() {
                return Err(Error::invalid(format!("mixer '{}' has no open controls", name)));
            }
            poll::poll_async(fds, timeout_ms).await
        }
    }

    /// Drain every control session in slot order.
    ///
    /// Returns the number of control events processed. The first failure
    /// aborts; events handled before it stay applied.
    pub fn handle_events(&mut self) -> Result<usize> {
        let mut total = 0;
        for slot in 0..MAX_CONTROLS {
            let Some(session) = self.controls.get_mut(slot) else {
                continue;
            };
            let mut fanout = Fanout {
                slot,
                core: &mut self.core,
                provider: self.provider.as_mut(),
            };
            total += session.handle_events_with(&mut fanout)?;
        }
        Ok(total)
    }
}
