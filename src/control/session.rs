//! Sorted, event-synchronized cache of one control endpoint.

use log::{debug, error};
use std::any::Any;
use std::future::Future;

use super::element::ControlElement;
use super::event::{ControlEvent, EventMask};
use super::id::{ControlInfo, ElemId};
use super::transport::{ControlBackend, ControlTransport, OpenMode};
use super::weight::compare_default;
use crate::error::{Error, Result};
use crate::index::{CompareFn, SortedIndex};
use crate::poll::{self, PollDescriptor};

/// Session-level closure, run when an element is added.
pub type SessionCallback =
    Box<dyn FnMut(&ControlSession, EventMask, &ControlElement) -> Result<()> + Send>;

/// Receives the notifications of a session in place of the stored closures.
///
/// Both methods run with a shared view of the session: after the element
/// was inserted for additions, before it is unlinked for removals.
pub trait ControlEventHandler {
    /// An element was added to `session`
    fn session_event(
        &mut self,
        session: &ControlSession,
        mask: EventMask,
        elem: &ControlElement,
    ) -> Result<()>;

    /// An element changed or is about to be removed
    fn element_event(
        &mut self,
        session: &ControlSession,
        elem: &ControlElement,
        mask: EventMask,
    ) -> Result<()>;
}

enum Dispatch<'h> {
    Stored,
    Handler(&'h mut dyn ControlEventHandler),
}

/// Mirror of the controls exposed by one endpoint.
pub struct ControlSession {
    name: String,
    transport: Box<dyn ControlTransport>,
    elems: SortedIndex<ControlElement>,
    callback: Option<SessionCallback>,
    callback_private: Option<Box<dyn Any + Send>>,
}

impl ControlSession {
    /// Open `endpoint` on `backend`. The cache starts empty; see [`load`](Self::load).
    pub fn open(backend: &dyn ControlBackend, endpoint: &str, mode: OpenMode) -> Result<Self> {
        let transport = backend.open(endpoint, mode).map_err(Error::Transport)?;
        debug!("Opened control endpoint '{}' on {}", endpoint, backend.backend_id());
        Ok(Self::from_transport(transport))
    }

    /// Wrap an already open transport.
    pub fn from_transport(transport: Box<dyn ControlTransport>) -> Self {
        Self {
            name: transport.name().to_string(),
            transport,
            elems: SortedIndex::new(compare_default),
            callback: None,
            callback_private: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &dyn ControlTransport {
        self.transport.as_ref()
    }

    /// Populate the cache from the device, notifying the session callback
    /// once per element in sorted order.
    pub fn load(&mut self) -> Result<()> {
        self.load_inner(&mut Dispatch::Stored)
    }

    /// Like [`load`](Self::load) but routes notifications to `handler`.
    pub fn load_with(&mut self, handler: &mut dyn ControlEventHandler) -> Result<()> {
        self.load_inner(&mut Dispatch::Handler(handler))
    }

    fn load_inner(&mut self, dispatch: &mut Dispatch<'_>) -> Result<()> {
        if !self.elems.is_empty() {
            return Err(Error::invalid(format!("{}: cache already loaded", self.name)));
        }
        let ids = self.transport.list_elements().map_err(Error::Transport)?;
        for id in ids {
            self.elems.insert(ControlElement::new(id))?;
        }
        debug!("{}: loaded {} controls", self.name, self.elems.len());

        for idx in 0..self.elems.len() {
            self.notify_added(idx, dispatch)?;
        }
        Ok(())
    }

    /// Drop every cached element from the back, notifying each removal.
    ///
    /// Every element is freed even if a callback fails; the first failure
    /// is returned.
    pub fn free_cache(&mut self) -> Result<()> {
        self.free_inner(&mut Dispatch::Stored)
    }

    pub fn free_cache_with(&mut self, handler: &mut dyn ControlEventHandler) -> Result<()> {
        self.free_inner(&mut Dispatch::Handler(handler))
    }

    fn free_inner(&mut self, dispatch: &mut Dispatch<'_>) -> Result<()> {
        let mut first_err = None;
        while let Some(idx) = self.elems.len().checked_sub(1) {
            if let Err(e) = self.notify_element(idx, EventMask::REMOVE, dispatch) {
                first_err.get_or_insert(e);
            }
            self.elems.pop();
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Process every pending event with the stored callbacks.
    ///
    /// Returns the number of events handled. Processing stops at the first
    /// failure; events handled before it stay applied.
    pub fn handle_events(&mut self) -> Result<usize> {
        self.drain(&mut Dispatch::Stored)
    }

    pub fn handle_events_with(&mut self, handler: &mut dyn ControlEventHandler) -> Result<usize> {
        self.drain(&mut Dispatch::Handler(handler))
    }

    /// Apply a single event with the stored callbacks.
    pub fn handle_event(&mut self, event: ControlEvent) -> Result<()> {
        self.apply(event, &mut Dispatch::Stored)
    }

    fn drain(&mut self, dispatch: &mut Dispatch<'_>) -> Result<usize> {
        let mut count = 0;
        while let Some(event) = self.transport.next_event().map_err(Error::Transport)? {
            self.apply(event, dispatch)?;
            count += 1;
        }
        Ok(count)
    }

    fn apply(&mut self, event: ControlEvent, dispatch: &mut Dispatch<'_>) -> Result<()> {
        let ControlEvent { id, mask } = event;

        if mask.is_remove() {
            let idx = self.locate(&id)?;
            let result = self.notify_element(idx, EventMask::REMOVE, dispatch);
            self.elems.remove_at(idx);
            return result;
        }

        if mask.is_add() {
            let idx = self.elems.insert(ControlElement::new(id.clone()))?;
            self.notify_added(idx, dispatch)?;
        }

        let changes = mask.changes();
        if !changes.is_empty() {
            let idx = self.locate(&id)?;
            self.notify_element(idx, changes, dispatch)?;
        }
        Ok(())
    }

    fn notify_added(&mut self, idx: usize, dispatch: &mut Dispatch<'_>) -> Result<()> {
        match dispatch {
            Dispatch::Handler(handler) => {
                let elem = self.elem_at(idx)?;
                handler.session_event(self, EventMask::ADD, elem)
            }
            Dispatch::Stored => {
                let Some(mut callback) = self.callback.take() else {
                    return Ok(());
                };
                let result = match self.elems.get(idx) {
                    Some(elem) => callback(self, EventMask::ADD, elem),
                    None => Err(Error::not_found(format!("{}: slot {}", self.name, idx))),
                };
                self.callback = Some(callback);
                result
            }
        }
    }

    fn notify_element(
        &mut self,
        idx: usize,
        mask: EventMask,
        dispatch: &mut Dispatch<'_>,
    ) -> Result<()> {
        match dispatch {
            Dispatch::Handler(handler) => {
                let elem = self.elem_at(idx)?;
                handler.element_event(self, elem, mask)
            }
            Dispatch::Stored => match self.elems.get_mut(idx) {
                Some(elem) => elem.notify(mask),
                None => Err(Error::not_found(format!("{}: slot {}", self.name, idx))),
            },
        }
    }

    fn elem_at(&self, idx: usize) -> Result<&ControlElement> {
        self.elems
            .get(idx)
            .ok_or_else(|| Error::not_found(format!("{}: slot {}", self.name, idx)))
    }

    fn search(&self, id: &ElemId) -> Option<usize> {
        let key = ControlElement::new(id.clone());
        self.elems.search(&key).ok()
    }

    fn locate(&self, id: &ElemId) -> Result<usize> {
        self.search(id).ok_or_else(|| {
            error!("{}: event for unknown control {}", self.name, id);
            Error::not_found(id.to_string())
        })
    }

    /// Replace the element order. Fails and keeps the old order if the new
    /// comparator reports two cached elements as equal.
    pub fn set_compare(&mut self, compare: CompareFn<ControlElement>) -> Result<()> {
        self.elems.set_compare(compare)
    }

    pub fn first(&self) -> Option<&ControlElement> {
        self.elems.first()
    }

    pub fn last(&self) -> Option<&ControlElement> {
        self.elems.last()
    }

    pub fn next(&self, elem: &ControlElement) -> Option<&ControlElement> {
        self.elems.next(elem)
    }

    pub fn prev(&self, elem: &ControlElement) -> Option<&ControlElement> {
        self.elems.prev(elem)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ControlElement> {
        self.elems.iter()
    }

    pub fn count(&self) -> usize {
        self.elems.len()
    }

    /// Binary search by full identifier under the active order.
    pub fn find(&self, id: &ElemId) -> Option<&ControlElement> {
        self.search(id).and_then(|idx| self.elems.get(idx))
    }

    pub fn find_numid(&self, numid: u32) -> Option<&ControlElement> {
        self.elems
            .position(|e| e.numid() == numid)
            .and_then(|idx| self.elems.get(idx))
    }

    /// Mutable access for installing element callbacks.
    pub fn element_mut(&mut self, id: &ElemId) -> Option<&mut ControlElement> {
        let idx = self.search(id)?;
        self.elems.get_mut(idx)
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&ControlSession, EventMask, &ControlElement) -> Result<()> + Send + 'static,
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

    pub fn read_info(&self, id: &ElemId) -> Result<ControlInfo> {
        self.transport.read_info(id).map_err(Error::Transport)
    }

    pub fn read_value(&self, id: &ElemId) -> Result<Vec<i64>> {
        self.transport.read_value(id).map_err(Error::Transport)
    }

    /// Write every channel of a control; returns whether the device changed.
    pub fn write_value(&self, id: &ElemId, values: &[i64]) -> Result<bool> {
        self.transport.write_value(id, values).map_err(Error::Transport)
    }

    pub fn subscribe_events(&self, enable: bool) -> Result<()> {
        self.transport.subscribe_events(enable).map_err(Error::Transport)
    }

    pub fn set_nonblock(&self, nonblock: bool) -> Result<()> {
        self.transport.set_nonblock(nonblock).map_err(Error::Transport)
    }

    pub fn poll_descriptors(&self) -> Result<Vec<PollDescriptor>> {
        self.transport.poll_descriptors().map_err(Error::Transport)
    }

    /// Combined returned events of descriptors filled in by a poll.
    pub fn poll_revents(&self, fds: &[PollDescriptor]) -> Result<i16> {
        poll::translate_revents(fds)
    }

    /// Wait for pending events. 0 polls without blocking, a negative
    /// timeout waits forever. Returns the number of ready descriptors.
    pub fn wait(&self, timeout_ms: i32) -> Result<usize> {
        let mut fds = self.pollable()?;
        poll::poll(&mut fds, timeout_ms)
    }

    /// [`wait`](Self::wait) on the tokio blocking pool.
    pub fn wait_async(&self, timeout_ms: i32) -> impl Future<Output = Result<usize>> + Send + 'static {
        let fds = self.pollable();
        async move { poll::poll_async(fds?, timeout_ms).await }
    }

    fn pollable(&self) -> Result<Vec<PollDescriptor>> {
        let fds = self.poll_descriptors()?;
        if fds.is_empty() {
            return Err(Error::invalid(format!("{}: no descriptors to poll", self.name)));
        }
        Ok(fds)
    }

    /// Free the cache and close the transport.
    pub fn close(mut self) -> Result<()> {
        let freed = self.free_cache();
        self.finish_close(freed)
    }

    pub fn close_with(mut self, handler: &mut dyn ControlEventHandler) -> Result<()> {
        let freed = self.free_cache_with(handler);
        self.finish_close(freed)
    }

    fn finish_close(self, freed: Result<()>) -> Result<()> {
        debug!("Closing control endpoint '{}'", self.name);
        let closed = self.transport.close().map_err(Error::Transport);
        freed.and(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::mock::MockBackend;
    use crate::control::weight::compare_fast;
    use std::sync::{Arc, Mutex};

    fn scenario() -> (MockBackend, ControlSession) {
        let backend = MockBackend::new();
        let card = backend.add_card("hw:0");
        card.add_control(ElemId::mixer(30, "Capture Switch"), ControlInfo::boolean(2));
        card.add_control(ElemId::mixer(10, "Master Playback Volume"), ControlInfo::integer(2, 0, 31));
        card.add_control(ElemId::mixer(20, "PCM Playback Volume"), ControlInfo::integer(2, 0, 255));
        let mut session = ControlSession::open(&backend, "hw:0", OpenMode::nonblocking()).unwrap();
        session.subscribe_events(true).unwrap();
        session.load().unwrap();
        (backend, session)
    }

    fn names(session: &ControlSession) -> Vec<String> {
        session.iter().map(|e| e.name().to_string()).collect()
    }

    #[test]
    fn test_load_sorted_by_weight() {
        let (_backend, session) = scenario();
        assert_eq!(
            names(&session),
            vec!["Master Playback Volume", "PCM Playback Volume", "Capture Switch"]
        );
        assert_eq!(session.first().unwrap().numid(), 10);
        assert_eq!(session.last().unwrap().numid(), 30);
    }

    #[test]
    fn test_load_notifies_in_order() {
        let backend = MockBackend::new();
        let card = backend.add_card("hw:0");
        card.add_control(ElemId::mixer(2, "PCM Playback Volume"), ControlInfo::integer(1, 0, 10));
        card.add_control(ElemId::mixer(1, "Master Playback Volume"), ControlInfo::integer(1, 0, 10));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = ControlSession::open(&backend, "hw:0", OpenMode::default()).unwrap();
        let sink = seen.clone();
        session.set_callback(move |_, mask, elem| {
            assert!(mask.is_add());
            sink.lock().unwrap().push(elem.numid());
            Ok(())
        });
        session.load().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_remove_event_unlinks() {
        let (backend, mut session) = scenario();
        backend.device("hw:0").unwrap().remove_control(20);

        assert_eq!(session.handle_events().unwrap(), 1);
        assert!(session.find_numid(20).is_none());
        assert!(session.find(&ElemId::mixer(20, "PCM Playback Volume")).is_none());
        assert_eq!(session.count(), 2);
    }

    #[test]
    fn test_value_event_reaches_element_callback() {
        let (backend, mut session) = scenario();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session
            .element_mut(&ElemId::mixer(10, "Master Playback Volume"))
            .unwrap()
            .set_callback(move |_, mask| {
                sink.lock().unwrap().push(mask);
                Ok(())
            });

        backend.device("hw:0").unwrap().set_value(10, vec![5, 5]);
        assert_eq!(session.handle_events().unwrap(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![EventMask::VALUE]);
    }

    #[test]
    fn test_unknown_value_event_is_not_found() {
        let (_backend, mut session) = scenario();
        let err = session
            .handle_event(ControlEvent::new(ElemId::mixer(99, "Ghost"), EventMask::VALUE))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_add_with_value_bits() {
        let (_backend, mut session) = scenario();
        let id = ElemId::mixer(40, "Mic Capture Volume");
        session
            .handle_event(ControlEvent::new(id.clone(), EventMask::ADD | EventMask::VALUE))
            .unwrap();
        assert!(session.find(&id).is_some());
    }

    #[test]
    fn test_fast_compare_orders_by_numid() {
        let (_backend, mut session) = scenario();
        session.set_compare(compare_fast).unwrap();
        let ids: Vec<u32> = session.iter().map(|e| e.numid()).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        session.set_compare(compare_default).unwrap();
        assert_eq!(session.last().unwrap().numid(), 30);
    }

    #[test]
    fn test_handle_events_aborts_on_transport_error() {
        let (backend, mut session) = scenario();
        let card = backend.device("hw:0").unwrap();
        card.set_value(10, vec![1, 1]);
        card.fail_next_event("device unplugged");
        assert!(matches!(session.handle_events(), Err(Error::Transport(_))));
    }

    #[test]
    fn test_wait_reports_pending_events() {
        let (backend, mut session) = scenario();
        assert_eq!(session.wait(0).unwrap(), 0);
        backend.device("hw:0").unwrap().set_value(20, vec![7, 7]);
        assert_eq!(session.wait(1000).unwrap(), 1);
        let fds = {
            let mut fds = session.poll_descriptors().unwrap();
            poll::poll(&mut fds, 0).unwrap();
            fds
        };
        assert_eq!(session.poll_revents(&fds).unwrap() & poll::POLLIN, poll::POLLIN);
        session.handle_events().unwrap();
        assert_eq!(session.wait(0).unwrap(), 0);
    }

    #[test]
    fn test_close_frees_with_remove_notifications() {
        let (_backend, mut session) = scenario();
        let removed = Arc::new(Mutex::new(0));
        for numid in [10, 20, 30] {
            let id = session.find_numid(numid).unwrap().id().clone();
            let counter = removed.clone();
            session.element_mut(&id).unwrap().set_callback(move |_, mask| {
                assert!(mask.is_remove());
                *counter.lock().unwrap() += 1;
                Ok(())
            });
        }
        session.close().unwrap();
        assert_eq!(*removed.lock().unwrap(), 3);
    }
}
