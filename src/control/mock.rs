//! In-memory control backend for tests and the demo binary.
//!
//! Every open transport gets its own event queue plus a socket pair whose
//! read end is the poll descriptor, so sessions can wait on a mock card
//! exactly as on real hardware.

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::event::{ControlEvent, EventMask};
use super::id::{ControlInfo, ElemId};
use super::transport::{ControlBackend, ControlTransport, OpenMode};
use crate::poll::PollDescriptor;

/// Backend serving any number of simulated cards by name.
#[derive(Clone, Default)]
pub struct MockBackend {
    cards: Arc<Mutex<HashMap<String, MockDevice>>>,
    opens: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a card reachable as `name`.
    pub fn add_card(&self, name: &str) -> MockDevice {
        let device = MockDevice::new(name);
        lock(&self.cards).insert(name.to_string(), device.clone());
        device
    }

    pub fn device(&self, name: &str) -> Option<MockDevice> {
        lock(&self.cards).get(name).cloned()
    }

    /// Number of successful `open` calls so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ControlBackend for MockBackend {
    fn backend_id(&self) -> &str {
        "mock"
    }

    fn open(&self, endpoint: &str, mode: OpenMode) -> Result<Box<dyn ControlTransport>> {
        let device = self
            .device(endpoint)
            .ok_or_else(|| anyhow!("No such control endpoint: {}", endpoint))?;
        let transport = device.connect(mode)?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(transport))
    }
}

struct MockControl {
    id: ElemId,
    info: ControlInfo,
    values: Vec<i64>,
}

struct Subscriber {
    key: usize,
    events: Sender<ControlEvent>,
    wake: UnixStream,
    subscribed: Arc<AtomicBool>,
}

#[derive(Default)]
struct CardState {
    controls: Vec<MockControl>,
    subscribers: Vec<Subscriber>,
    next_key: usize,
    fail_reads: bool,
    fail_next_event: Option<String>,
    unpollable: bool,
}

impl CardState {
    fn control(&self, numid: u32) -> Result<&MockControl> {
        self.controls
            .iter()
            .find(|c| c.id.numid == numid)
            .ok_or_else(|| anyhow!("No control with numid {}", numid))
    }

    fn broadcast(&mut self, event: ControlEvent) {
        self.subscribers.retain(|sub| {
            if !sub.subscribed.load(Ordering::SeqCst) {
                return true;
            }
            if sub.events.send(event.clone()).is_err() {
                return false;
            }
            match (&sub.wake).write(&[1]) {
                Ok(_) => true,
                // a full socket is still readable
                Err(e) if e.kind() == ErrorKind::WouldBlock => true,
                Err(_) => false,
            }
        });
    }
}

/// Handle to one simulated card, shared by every transport opened on it.
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    state: Arc<Mutex<CardState>>,
}

impl MockDevice {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(CardState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, CardState> {
        lock(&self.state)
    }

    fn connect(&self, mode: OpenMode) -> Result<MockTransport> {
        let (wake_tx, wake_rx) = UnixStream::pair()?;
        wake_tx.set_nonblocking(true)?;
        wake_rx.set_nonblocking(true)?;
        let (tx, rx) = unbounded();
        let subscribed = Arc::new(AtomicBool::new(false));

        let mut state = self.state();
        let key = state.next_key;
        state.next_key += 1;
        state.subscribers.push(Subscriber {
            key,
            events: tx,
            wake: wake_tx,
            subscribed: subscribed.clone(),
        });

        Ok(MockTransport {
            name: self.name.clone(),
            device: self.clone(),
            key,
            events: rx,
            wake: wake_rx,
            subscribed,
            nonblock: AtomicBool::new(mode.nonblock),
        })
    }

    /// Add a control; values start at the minimum of its range.
    pub fn add_control(&self, id: ElemId, info: ControlInfo) {
        let values = vec![info.min; info.count as usize];
        let mut state = self.state();
        state.controls.push(MockControl {
            id: id.clone(),
            info,
            values,
        });
        state.broadcast(ControlEvent::new(id, EventMask::ADD));
    }

    /// Remove a control; returns false if it did not exist.
    pub fn remove_control(&self, numid: u32) -> bool {
        let mut state = self.state();
        let Some(pos) = state.controls.iter().position(|c| c.id.numid == numid) else {
            return false;
        };
        let control = state.controls.remove(pos);
        state.broadcast(ControlEvent::new(control.id, EventMask::REMOVE));
        true
    }

    /// Change a value from the hardware side.
    pub fn set_value(&self, numid: u32, values: Vec<i64>) -> bool {
        let mut state = self.state();
        let Some(control) = state.controls.iter_mut().find(|c| c.id.numid == numid) else {
            return false;
        };
        control.values = values;
        let id = control.id.clone();
        state.broadcast(ControlEvent::new(id, EventMask::VALUE));
        true
    }

    /// Replace the static description of a control.
    pub fn set_info(&self, numid: u32, info: ControlInfo) -> bool {
        let mut state = self.state();
        let Some(control) = state.controls.iter_mut().find(|c| c.id.numid == numid) else {
            return false;
        };
        control.info = info;
        let id = control.id.clone();
        state.broadcast(ControlEvent::new(id, EventMask::INFO));
        true
    }

    pub fn values(&self, numid: u32) -> Option<Vec<i64>> {
        self.state().control(numid).ok().map(|c| c.values.clone())
    }

    /// Queue an arbitrary event to every subscribed transport.
    pub fn push_event(&self, event: ControlEvent) {
        self.state().broadcast(event);
    }

    /// Make value and info reads fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    /// Make the next `next_event` call on any transport fail.
    pub fn fail_next_event(&self, reason: &str) {
        self.state().fail_next_event = Some(reason.to_string());
    }

    /// Hide the wake-up descriptor from `poll_descriptors`.
    pub fn set_unpollable(&self, unpollable: bool) {
        self.state().unpollable = unpollable;
    }

    /// Number of transports currently attached to this card
    pub fn connections(&self) -> usize {
        self.state().subscribers.len()
    }
}

/// Transport returned by [`MockBackend::open`].
pub struct MockTransport {
    name: String,
    device: MockDevice,
    key: usize,
    events: Receiver<ControlEvent>,
    wake: UnixStream,
    subscribed: Arc<AtomicBool>,
    nonblock: AtomicBool,
}

impl MockTransport {
    pub fn is_nonblocking(&self) -> bool {
        self.nonblock.load(Ordering::SeqCst)
    }
}

impl ControlTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_elements(&self) -> Result<Vec<ElemId>> {
        Ok(self.device.state().controls.iter().map(|c| c.id.clone()).collect())
    }

    fn read_info(&self, id: &ElemId) -> Result<ControlInfo> {
        let state = self.device.state();
        if state.fail_reads {
            return Err(anyhow!("Read failure injected on {}", self.name));
        }
        Ok(state.control(id.numid)?.info.clone())
    }

    fn read_value(&self, id: &ElemId) -> Result<Vec<i64>> {
        let state = self.device.state();
        if state.fail_reads {
            return Err(anyhow!("Read failure injected on {}", self.name));
        }
        Ok(state.control(id.numid)?.values.clone())
    }

    fn write_value(&self, id: &ElemId, values: &[i64]) -> Result<bool> {
        let mut state = self.device.state();
        let control = state
            .controls
            .iter_mut()
            .find(|c| c.id.numid == id.numid)
            .ok_or_else(|| anyhow!("No control with numid {}", id.numid))?;
        if values.len() != control.values.len() {
            return Err(anyhow!(
                "Expected {} values for {}, got {}",
                control.values.len(),
                control.id,
                values.len()
            ));
        }
        if control.values == values {
            return Ok(false);
        }
        control.values = values.to_vec();
        let id = control.id.clone();
        state.broadcast(ControlEvent::new(id, EventMask::VALUE));
        Ok(true)
    }

    fn subscribe_events(&self, enable: bool) -> Result<()> {
        self.subscribed.store(enable, Ordering::SeqCst);
        Ok(())
    }

    fn set_nonblock(&self, nonblock: bool) -> Result<()> {
        self.nonblock.store(nonblock, Ordering::SeqCst);
        Ok(())
    }

    fn poll_descriptors(&self) -> Result<Vec<PollDescriptor>> {
        if self.device.state().unpollable {
            return Ok(Vec::new());
        }
        Ok(vec![PollDescriptor::readable(self.wake.as_raw_fd())])
    }

    fn next_event(&self) -> Result<Option<ControlEvent>> {
        if let Some(reason) = self.device.state().fail_next_event.take() {
            return Err(anyhow!("{}", reason));
        }
        match self.events.try_recv() {
            Ok(event) => {
                let mut byte = [0u8; 1];
                match (&self.wake).read(&mut byte) {
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(Some(event))
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn close(&self) -> Result<()> {
        let key = self.key;
        self.device.state().subscribers.retain(|sub| sub.key != key);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_unknown_card_fails() {
        let backend = MockBackend::new();
        assert!(backend.open("hw:9", OpenMode::default()).is_err());
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_events_only_when_subscribed() {
        let backend = MockBackend::new();
        let card = backend.add_card("hw:0");
        card.add_control(ElemId::mixer(1, "Master Playback Volume"), ControlInfo::integer(1, 0, 10));
        let transport = backend.open("hw:0", OpenMode::default()).unwrap();

        card.set_value(1, vec![3]);
        assert!(transport.next_event().unwrap().is_none());

        transport.subscribe_events(true).unwrap();
        card.set_value(1, vec![4]);
        let event = transport.next_event().unwrap().unwrap();
        assert_eq!(event.id.numid, 1);
        assert!(event.mask.is_value());
        assert!(transport.next_event().unwrap().is_none());
    }

    #[test]
    fn test_write_reports_change() {
        let backend = MockBackend::new();
        let card = backend.add_card("hw:0");
        let id = ElemId::mixer(1, "Master Playback Switch");
        card.add_control(id.clone(), ControlInfo::boolean(2));
        let transport = backend.open("hw:0", OpenMode::default()).unwrap();

        assert!(transport.write_value(&id, &[1, 1]).unwrap());
        assert!(!transport.write_value(&id, &[1, 1]).unwrap());
        assert!(transport.write_value(&id, &[1]).is_err());
        assert_eq!(card.values(1), Some(vec![1, 1]));
    }

    #[test]
    fn test_close_detaches() {
        let backend = MockBackend::new();
        let card = backend.add_card("hw:0");
        let transport = backend.open("hw:0", OpenMode::default()).unwrap();
        assert_eq!(card.connections(), 1);
        transport.close().unwrap();
        assert_eq!(card.connections(), 0);
    }
}
