//! Socket construction and write helpers.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

/// Ceiling on waiting for a non-blocking peer socket to become writable
/// before the frame is abandoned for that peer.
const WRITABLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Create and configure the listening socket.
///
/// Built through socket2 for reuse-address (so a restarted server can
/// rebind its port out of TIME_WAIT) and switched to non-blocking for the
/// readiness loop before listening starts.
pub fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Write one whole frame to a non-blocking peer socket.
///
/// Short writes are resumed; `WouldBlock` waits for writability with a
/// bounded poll so one stalled peer costs at most the timeout, not the
/// pipeline. A peer that stays unwritable loses this frame only; its
/// removal happens on the reactor's read path.
pub fn write_frame(stream: &TcpStream, frame: &[u8]) -> io::Result<()> {
    let mut written = 0;
    let deadline = Instant::now() + WRITABLE_TIMEOUT;

    while written < frame.len() {
        match (&*stream).write(&frame[written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                wait_writable(stream.as_raw_fd(), (deadline - now).as_millis() as i32)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Block until `fd` is writable or `timeout_ms` elapses.
fn wait_writable(fd: i32, timeout_ms: i32) -> io::Result<()> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    // SAFETY: pfd is a valid pollfd array of length 1 for the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms.max(0)) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(());
        }
        return Err(err);
    }
    if rc == 0 {
        return Err(io::ErrorKind::TimedOut.into());
    }
    if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
        return Err(io::ErrorKind::BrokenPipe.into());
    }
    Ok(())
}
