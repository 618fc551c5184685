use std::io::{self, Read, Write};
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// A write side that can report backpressure and confirm drain.
///
/// A write returning `ErrorKind::WouldBlock` (or `TimedOut`) means the
/// transport buffer is full. Writers must then call [`wait_writable`] before
/// issuing the next write, and call [`drain`] once a frame is complete.
///
/// [`wait_writable`]: WriteTransport::wait_writable
/// [`drain`]: WriteTransport::drain
pub trait WriteTransport: Write {
    /// Block until the transport can take more bytes.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first.
    fn wait_writable(&mut self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Block until everything written so far has left the transport.
    fn drain(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl WriteTransport for Vec<u8> {
    fn wait_writable(&mut self, _timeout: Option<Duration>) -> io::Result<bool> {
        Ok(true)
    }
}

impl<W: WriteTransport + ?Sized> WriteTransport for &mut W {
    fn wait_writable(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        (**self).wait_writable(timeout)
    }

    fn drain(&mut self) -> io::Result<()> {
        (**self).drain()
    }
}

#[cfg(unix)]
impl WriteTransport for std::os::unix::net::UnixStream {
    fn wait_writable(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        use std::os::fd::AsRawFd;

        crate::sys::poll_fd(self.as_raw_fd(), libc::POLLOUT, timeout)
    }
}

/// A connected byte channel: implements Read + Write + [`WriteTransport`].
///
/// On Unix this wraps either a raw-mode serial port or a Unix domain socket.
pub struct SlipStream {
    inner: SlipStreamInner,
}

enum SlipStreamInner {
    #[cfg(unix)]
    Serial(crate::serial::SerialPort),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl SlipStream {
    /// Acquire the transport named by `endpoint`.
    #[cfg(unix)]
    pub fn open(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Serial { path, baud } => {
                crate::serial::SerialPort::open(path, *baud).map(Self::from_serial)
            }
            Endpoint::Unix { path } => crate::uds::UnixDomainSocket::connect(path),
        }
    }

    /// Acquire the transport named by `endpoint`.
    #[cfg(not(unix))]
    pub fn open(endpoint: &Endpoint) -> Result<Self> {
        Err(crate::error::TransportError::Connect {
            path: endpoint.path().to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "slipline transports require a Unix platform",
            ),
        })
    }

    #[cfg(unix)]
    pub(crate) fn from_serial(port: crate::serial::SerialPort) -> Self {
        Self {
            inner: SlipStreamInner::Serial(port),
        }
    }

    /// Wrap an already connected Unix socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SlipStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => {
                port.set_read_timeout(timeout);
                Ok(())
            }
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => {
                port.set_write_timeout(timeout);
                Ok(())
            }
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both directions. The peer observes EOF.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(_) => Ok(()),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            SlipStreamInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl Read for SlipStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SlipStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl WriteTransport for SlipStream {
    fn wait_writable(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => port.wait_writable(timeout),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.wait_writable(timeout),
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => port.drain(),
            #[cfg(unix)]
            SlipStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for SlipStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            SlipStreamInner::Serial(port) => f.debug_tuple("SlipStream").field(port).finish(),
            #[cfg(unix)]
            SlipStreamInner::Unix(_) => f.debug_struct("SlipStream").field("type", &"unix").finish(),
        }
    }
}
