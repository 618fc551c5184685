use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::sys::{poll_fd, timed_out};

/// A serial device in raw mode.
///
/// Reads and writes are blocking; optional timeouts are implemented with
/// `poll(2)` and surface as `ErrorKind::WouldBlock`, the same way std sockets
/// report an expired timeout.
pub struct SerialPort {
    file: File,
    path: PathBuf,
    baud: u32,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl SerialPort {
    /// Open `path`, switch it to raw mode at `baud`, and discard anything
    /// already sitting in the driver queues.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = speed_for(baud).ok_or(TransportError::UnsupportedBaud(baud))?;

        // O_NONBLOCK keeps open(2) from waiting on carrier detect; cleared below.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Connect {
                path: path.clone(),
                source,
            })?;

        let fd = file.as_raw_fd();
        configure_raw(fd, speed)
            .and_then(|()| set_blocking(fd))
            .and_then(|()| flush_queues(fd))
            .map_err(|source| TransportError::Configure {
                path: path.clone(),
                source,
            })?;

        info!(?path, baud, "opened serial port");

        Ok(Self {
            file,
            path,
            baud,
            read_timeout: None,
            write_timeout: None,
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured line speed.
    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    /// Duplicate the descriptor so reader and writer halves can be owned separately.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            baud: self.baud,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }

    /// Block until every queued byte has been transmitted.
    pub fn drain(&self) -> io::Result<()> {
        loop {
            // SAFETY: the descriptor is owned by `self.file` and open for the call.
            let rc = unsafe { libc::tcdrain(self.file.as_raw_fd()) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub(crate) fn wait_writable(&self, timeout: Option<Duration>) -> io::Result<bool> {
        poll_fd(self.file.as_raw_fd(), libc::POLLOUT, timeout)
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(timeout) = self.read_timeout {
            if !poll_fd(self.file.as_raw_fd(), libc::POLLIN, Some(timeout))? {
                return Err(timed_out());
            }
        }
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(timeout) = self.write_timeout {
            if !poll_fd(self.file.as_raw_fd(), libc::POLLOUT, Some(timeout))? {
                return Err(timed_out());
            }
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud", &self.baud)
            .finish()
    }
}

fn speed_for(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

fn configure_raw(fd: RawFd, speed: libc::speed_t) -> io::Result<()> {
    // SAFETY: termios is a plain C struct; all-zero is a valid value to pass to tcgetattr.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is open and `tio` is a valid, writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `tio` was initialised by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios and `speed` is one of the B* constants.
    let rc = unsafe {
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            -1
        } else {
            libc::tcsetattr(fd, libc::TCSANOW, &tio)
        }
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    debug!(fd, "serial line switched to raw mode");
    Ok(())
}

fn set_blocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: F_GETFL/F_SETFL on an open descriptor take no pointers.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn flush_queues(fd: RawFd) -> io::Result<()> {
    // SAFETY: tcflush on an open tty descriptor takes no pointers.
    if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_baud_rates() {
        assert_eq!(speed_for(9600), Some(libc::B9600));
        assert_eq!(speed_for(115_200), Some(libc::B115200));
        assert_eq!(speed_for(12_345), None);
    }

    #[test]
    fn unsupported_baud_is_rejected_before_open() {
        let err = SerialPort::open("/dev/does-not-exist", 12_345).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaud(12_345)));
    }

    #[test]
    fn missing_device_reports_connect_error() {
        let err = SerialPort::open("/dev/slipline-missing-device", 115_200).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn regular_file_cannot_be_configured() {
        let path = std::env::temp_dir().join(format!("slipline-not-a-tty-{}", std::process::id()));
        std::fs::write(&path, b"plain file").unwrap();

        let err = SerialPort::open(&path, 115_200).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pty_roundtrip_in_raw_mode() {
        let (master, slave_path) = open_pty();
        let mut master = master;

        let mut port = SerialPort::open(&slave_path, 115_200).unwrap();
        port.set_read_timeout(Some(Duration::from_secs(2)));

        // Raw mode: reserved SLIP bytes and control characters pass untouched.
        let wire = [0xC0, 0x03, 0x0A, 0xDB, 0xDD, 0xC0];
        master.write_all(&wire).unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        while received.len() < wire.len() {
            let n = port.read(&mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, wire);

        port.write_all(b"\xC0ok\xC0").unwrap();
        port.drain().unwrap();
        let mut back = [0u8; 4];
        master.read_exact(&mut back).unwrap();
        assert_eq!(&back, b"\xC0ok\xC0");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn read_timeout_surfaces_would_block() {
        let (_master, slave_path) = open_pty();
        let mut port = SerialPort::open(&slave_path, 9600).unwrap();
        port.set_read_timeout(Some(Duration::from_millis(10)));

        let mut buf = [0u8; 4];
        let err = port.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[cfg(target_os = "linux")]
    fn open_pty() -> (File, PathBuf) {
        use std::os::fd::FromRawFd;

        // SAFETY: plain libc pty calls; the master fd is handed to `File` exactly once
        // and `name` is a writable buffer of the advertised length.
        unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            assert!(fd >= 0, "posix_openpt failed");
            assert_eq!(libc::grantpt(fd), 0);
            assert_eq!(libc::unlockpt(fd), 0);

            let mut name = [0 as libc::c_char; 128];
            assert_eq!(libc::ptsname_r(fd, name.as_mut_ptr(), name.len()), 0);
            let path = std::ffi::CStr::from_ptr(name.as_ptr())
                .to_string_lossy()
                .into_owned();

            (File::from_raw_fd(fd), PathBuf::from(path))
        }
    }
}
