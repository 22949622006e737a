//! Thin epoll wrapper.
//!
//! Just enough surface for the reactor: create, register (level- or
//! edge-triggered read interest), deregister, and a bounded wait. Errors
//! surface as `io::Error`; `EINTR` during the wait is reported as an empty
//! tick so the caller's loop re-checks its exit flags.

use std::io;
use std::os::fd::RawFd;

/// One readiness event: the file descriptor stored at registration.
pub type Event = libc::epoll_event;

/// Owned epoll instance.
pub struct Poller {
    epfd: RawFd,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        // SAFETY: epoll_create1 takes no pointers; a negative return is an
        // error reported through errno.
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { epfd })
    }

    /// Register read interest for `fd`. Edge-triggered registrations fire
    /// once per readiness transition and require the caller to drain.
    pub fn register(&self, fd: RawFd, edge_triggered: bool) -> io::Result<()> {
        let mut events = libc::EPOLLIN as u32;
        if edge_triggered {
            events |= libc::EPOLLET as u32;
        }
        let mut ev = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        // SAFETY: ev is a valid epoll_event for the duration of the call;
        // the kernel copies it.
        let rc = unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut ev) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Drop `fd` from the interest set. Required before closing a peer
    /// whose descriptor is duplicated elsewhere; closing one duplicate
    /// does not remove the open file description from epoll.
    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        // SAFETY: the event argument is ignored for EPOLL_CTL_DEL on any
        // kernel this crate supports; null is permitted.
        let rc = unsafe {
            libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Wait for readiness, at most `timeout_ms`. Fills `events` and
    /// returns the ready count; a signal interruption returns zero events
    /// instead of an error.
    pub fn wait(&self, events: &mut Vec<Event>, timeout_ms: i32) -> io::Result<usize> {
        events.clear();
        let capacity = events.capacity().max(1) as i32;
        // SAFETY: the spare capacity of `events` is valid writable memory
        // for `capacity` entries; the kernel writes at most that many.
        let n = unsafe {
            libc::epoll_wait(self.epfd, events.as_mut_ptr(), capacity, timeout_ms)
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        // SAFETY: the kernel initialized the first n entries.
        unsafe { events.set_len(n as usize) };
        Ok(n as usize)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        // SAFETY: epfd was returned by epoll_create1 and is closed once.
        unsafe {
            libc::close(self.epfd);
        }
    }
}
