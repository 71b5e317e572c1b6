use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected duplex byte stream — implements Read + Write.
///
/// A [`SessionStream`] is meant to be exclusively owned by one framed
/// connection for that connection's entire lifetime. Handles obtained via
/// [`try_clone`](SessionStream::try_clone) refer to the same underlying
/// stream, which is how a connection splits itself into a read half, a
/// write half, and a cancellation handle.
///
/// On Unix this wraps a Unix domain socket stream.
pub struct SessionStream {
    inner: SessionStreamInner,
}

enum SessionStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SessionStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SessionStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SessionStream {
    #[cfg(unix)]
    fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: SessionStreamInner::Unix(stream),
        }
    }

    /// Create a connected in-process stream pair.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Connect to a listening Unix domain socket.
    #[cfg(unix)]
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream =
            std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected session stream");
        Ok(Self::from_unix(stream))
    }

    /// Obtain another handle to the same stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Wake any blocked read on this stream and prevent further reads.
    ///
    /// A reader blocked in [`Read::read`] observes the cancellation as
    /// `Ok(0)`, indistinguishable from end-of-stream by design.
    pub fn cancel_pending_read(&self) -> Result<()> {
        self.shutdown(Shutdown::Read)
    }

    /// Mark the input direction finished. Idempotent.
    pub fn complete_input(&self) -> Result<()> {
        self.shutdown(Shutdown::Read)
    }

    /// Mark the output direction finished. Idempotent.
    pub fn complete_output(&self) -> Result<()> {
        self.shutdown(Shutdown::Write)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(stream) => match stream.shutdown(how) {
                Ok(()) => Ok(()),
                // Repeated shutdown of an already-completed direction.
                Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(TransportError::Io(err)),
            },
        }
    }
}

impl std::fmt::Debug for SessionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            SessionStreamInner::Unix(_) => f
                .debug_struct("SessionStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::thread;

    use super::*;

    #[test]
    fn pair_roundtrip() {
        let (mut left, mut right) = SessionStream::pair().unwrap();

        left.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn clone_shares_stream() {
        let (left, mut right) = SessionStream::pair().unwrap();
        let mut cloned = left.try_clone().unwrap();

        cloned.write_all(b"via-clone").unwrap();
        let mut buf = [0u8; 9];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"via-clone");
    }

    #[test]
    fn cancel_pending_read_wakes_blocked_reader() {
        let (mut left, _right) = SessionStream::pair().unwrap();
        let control = left.try_clone().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 16];
            left.read(&mut buf).unwrap()
        });

        // Give the reader a moment to block.
        thread::sleep(std::time::Duration::from_millis(20));
        control.cancel_pending_read().unwrap();

        let read = reader.join().unwrap();
        assert_eq!(read, 0, "cancelled read should surface as end-of-stream");
    }

    #[test]
    fn complete_output_signals_eof_to_peer() {
        let (left, mut right) = SessionStream::pair().unwrap();

        left.complete_output().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(right.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn completion_is_idempotent() {
        let (left, _right) = SessionStream::pair().unwrap();

        left.complete_input().unwrap();
        left.complete_input().unwrap();
        left.complete_output().unwrap();
        left.complete_output().unwrap();
    }

    #[test]
    fn connect_to_missing_path_fails() {
        let result = SessionStream::connect("/tmp/fanlink-definitely-missing.sock");
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
