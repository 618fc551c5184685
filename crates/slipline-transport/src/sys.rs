use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Wait until `fd` reports any of `events`, or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout. Hang-up and error conditions count as
/// ready so the following read or write surfaces the real error.
pub(crate) fn poll_fd(
    fd: RawFd,
    events: libc::c_short,
    timeout: Option<Duration>,
) -> io::Result<bool> {
    let timeout_ms = poll_timeout_ms(timeout);
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };

    loop {
        // SAFETY: `pfd` is a valid, exclusively borrowed pollfd and nfds is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(false);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        return Ok(true);
    }
}

/// `poll(2)` timeout argument: -1 blocks, and a non-zero timeout never rounds
/// down to 0, which would make poll return immediately.
fn poll_timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(timeout) if timeout.is_zero() => 0,
        Some(timeout) => {
            let millis = timeout.as_nanos().div_ceil(1_000_000);
            millis.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

/// Turn a poll timeout into the error std sockets report for timeouts.
pub(crate) fn timed_out() -> io::Error {
    io::Error::from(io::ErrorKind::WouldBlock)
}
