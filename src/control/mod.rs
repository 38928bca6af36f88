//! Raw device controls: identifiers, ordering, events and the cached session.

pub mod element;
pub mod event;
pub mod id;
pub mod mock;
pub mod session;
pub mod transport;
pub mod weight;

pub use element::{ControlElement, ElementCallback};
pub use event::{ControlEvent, EventMask};
pub use id::{ControlInfo, DbScale, ElemId, ElemType, Interface};
pub use session::{ControlEventHandler, ControlSession, SessionCallback};
pub use transport::{ControlBackend, ControlTransport, OpenMode};
pub use weight::{compare_default, compare_fast, compare_weight, UNRANKED};
