use anyhow::Result;

use super::event::ControlEvent;
use super::id::{ControlInfo, ElemId};
use crate::poll::PollDescriptor;

/// Flags passed when opening a control endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenMode {
    /// Reads from the event queue never block
    pub nonblock: bool,
}

impl OpenMode {
    pub fn nonblocking() -> Self {
        Self { nonblock: true }
    }
}

/// Factory for control endpoints (e.g. one per sound card).
pub trait ControlBackend: Send + Sync {
    /// Backend identifier used in logs
    fn backend_id(&self) -> &str;

    /// Open a control endpoint by name
    fn open(&self, endpoint: &str, mode: OpenMode) -> Result<Box<dyn ControlTransport>>;
}

/// One open control endpoint.
///
/// Implementations own the device handle; all queries are synchronous.
pub trait ControlTransport: Send {
    /// Endpoint name as passed to `open`
    fn name(&self) -> &str;

    /// Enumerate every control currently exposed
    fn list_elements(&self) -> Result<Vec<ElemId>>;

    fn read_info(&self, id: &ElemId) -> Result<ControlInfo>;

    /// Current value of every channel
    fn read_value(&self, id: &ElemId) -> Result<Vec<i64>>;

    /// Write all channels; returns whether anything changed
    fn write_value(&self, id: &ElemId, values: &[i64]) -> Result<bool>;

    /// Enable or disable delivery of change events
    fn subscribe_events(&self, enable: bool) -> Result<()>;

    fn set_nonblock(&self, nonblock: bool) -> Result<()>;

    /// Descriptors that become readable when events are pending
    fn poll_descriptors(&self) -> Result<Vec<PollDescriptor>>;

    /// Next pending event, or `None` when the queue is empty
    fn next_event(&self) -> Result<Option<ControlEvent>>;

    /// Release the device handle
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
