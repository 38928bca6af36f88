//! Async helpers that wait for control activity and apply it.

use log::debug;

use super::session::Mixer;
use crate::control::ControlSession;
use crate::error::Result;

/// Wait up to `timeout_ms` for activity on any control of `mixer`, then
/// process whatever is pending.
///
/// Returns the number of control events handled; 0 on timeout.
pub async fn pump(mixer: &mut Mixer, timeout_ms: i32) -> Result<usize> {
    let ready = mixer.wait_async(timeout_ms).await?;
    if ready == 0 {
        return Ok(0);
    }
    let handled = mixer.handle_events()?;
    debug!("Mixer '{}': {} control events", mixer.name(), handled);
    Ok(handled)
}

/// [`pump`] for a bare control session using its stored callbacks.
pub async fn pump_session(session: &mut ControlSession, timeout_ms: i32) -> Result<usize> {
    let ready = session.wait_async(timeout_ms).await?;
    if ready == 0 {
        return Ok(0);
    }
    session.handle_events()
}
