//! Thin wrapper over poll(2) for control event descriptors.

use std::io;
use std::os::unix::io::RawFd;

use crate::error::{Error, Result};

pub const POLLIN: i16 = libc::POLLIN;
pub const POLLERR: i16 = libc::POLLERR;
pub const POLLNVAL: i16 = libc::POLLNVAL;

/// Bits reported back to callers by [`translate_revents`].
const REPORTED: i16 = POLLIN | POLLERR | POLLNVAL;

/// One descriptor to wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDescriptor {
    pub fd: RawFd,
    pub events: i16,
    pub revents: i16,
}

impl PollDescriptor {
    /// Wait for readability on `fd`
    pub fn readable(fd: RawFd) -> Self {
        Self {
            fd,
            events: POLLIN,
            revents: 0,
        }
    }
}

/// Block on `fds` for at most `timeout_ms` milliseconds.
///
/// A timeout of 0 returns immediately, a negative timeout waits forever.
/// Returns the number of ready descriptors; `revents` is updated in place.
pub fn poll(fds: &mut [PollDescriptor], timeout_ms: i32) -> Result<usize> {
    let mut raw: Vec<libc::pollfd> = fds
        .iter()
        .map(|d| libc::pollfd {
            fd: d.fd,
            events: d.events,
            revents: 0,
        })
        .collect();
    let timeout = timeout_ms.max(-1);

    // SAFETY: `raw` is a valid, exclusively borrowed array of `raw.len()`
    // pollfd structs for the duration of the call.
    let ready = unsafe { libc::poll(raw.as_mut_ptr(), raw.len() as libc::nfds_t, timeout) };
    if ready < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }

    for (desc, raw) in fds.iter_mut().zip(&raw) {
        desc.revents = raw.revents;
    }
    Ok(ready as usize)
}

/// Run [`poll`] on tokio's blocking pool.
pub async fn poll_async(mut fds: Vec<PollDescriptor>, timeout_ms: i32) -> Result<usize> {
    tokio::task::spawn_blocking(move || poll(&mut fds, timeout_ms))
        .await
        .map_err(|e| Error::Io(io::Error::other(e)))?
}

/// Fold the returned events of every descriptor into one mask.
///
/// Only input, error and invalid-descriptor bits are reported.
pub fn translate_revents(fds: &[PollDescriptor]) -> Result<i16> {
    if fds.is_empty() {
        return Err(Error::invalid("empty poll descriptor set"));
    }
    Ok(fds.iter().fold(0, |acc, d| acc | (d.revents & REPORTED)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_translate_ors_all_descriptors() {
        let fds = [
            PollDescriptor { fd: 3, events: POLLIN, revents: 0 },
            PollDescriptor { fd: 4, events: POLLIN, revents: POLLIN | libc::POLLOUT },
            PollDescriptor { fd: 5, events: POLLIN, revents: POLLERR },
        ];
        assert_eq!(translate_revents(&fds).unwrap(), POLLIN | POLLERR);
    }

    #[test]
    fn test_translate_empty_is_invalid() {
        assert!(matches!(translate_revents(&[]), Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_poll_async_times_out() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        let fds = vec![PollDescriptor::readable(rx.as_raw_fd())];
        assert_eq!(poll_async(fds, 10).await.unwrap(), 0);
    }

    #[test]
    fn test_poll_readiness() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        let mut fds = [PollDescriptor::readable(rx.as_raw_fd())];

        assert_eq!(poll(&mut fds, 0).unwrap(), 0);

        tx.write_all(&[1]).unwrap();
        assert_eq!(poll(&mut fds, 1000).unwrap(), 1);
        assert_eq!(translate_revents(&fds).unwrap() & POLLIN, POLLIN);
    }
}
