//! Raw telemetry channel to sensord.
//!
//! Once a session is requested, sensord streams fixed-layout sample
//! records over a Unix socket. The handshake writes the session id and
//! waits for a single ack byte; after that the stream carries frames of
//! `u32` record count followed by that many records.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use log::debug;

/// Upper bound on records per frame; anything larger is stream garbage.
const MAX_RECORDS_PER_FRAME: usize = 1024;

/// Bounded wait for the handshake ack byte.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Blocking reader over the sensord sample socket.
pub struct SocketReader {
    stream: UnixStream,
}

impl SocketReader {
    /// Connect to the sample socket and perform the session handshake.
    pub fn connect(path: &Path, session_id: i32) -> io::Result<Self> {
        let mut stream = UnixStream::connect(path)?;
        stream.write_all(&session_id.to_le_bytes())?;
        // Bounded wait for the ack so a wedged sensord cannot hang
        // construction.
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        let mut ack = [0u8; 1];
        stream.read_exact(&mut ack)?;
        debug!("sensord socket handshake done for session {}", session_id);
        Ok(Self { stream })
    }

    /// Clone the underlying stream so the read thread owns its own handle.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
        })
    }

    /// Wait up to `timeout` for data; false when nothing arrived in time.
    ///
    /// Also arms the read timeout used by a following `read_frame`.
    pub fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            Ok(0) => Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(_) => Ok(true),
            Err(e) if is_timeout(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read one count-prefixed frame of `record_len`-byte records.
    ///
    /// A short or timed-out read yields `Ok(None)`: no sample yet.
    pub fn read_frame(&mut self, record_len: usize) -> io::Result<Option<Vec<u8>>> {
        let mut count_buf = [0u8; 4];
        match self.stream.read_exact(&mut count_buf) {
            Ok(()) => {}
            Err(e) if is_timeout(&e) => return Ok(None),
            Err(e) => return Err(e),
        }

        let count = u32::from_le_bytes(count_buf) as usize;
        if count == 0 {
            return Ok(Some(Vec::new()));
        }
        if count > MAX_RECORDS_PER_FRAME {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("telemetry frame claims {} records", count),
            ));
        }

        let mut payload = vec![0u8; count * record_len];
        match self.stream.read_exact(&mut payload) {
            Ok(()) => Ok(Some(payload)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::path::PathBuf;

    fn socket_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("sensord.sock")
    }

    #[test]
    fn test_handshake_sends_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut id = [0u8; 4];
            stream.read_exact(&mut id).unwrap();
            stream.write_all(b"\n").unwrap();
            i32::from_le_bytes(id)
        });

        let _reader = SocketReader::connect(&path, 42).unwrap();
        assert_eq!(server.join().unwrap(), 42);
    }

    #[test]
    fn test_wait_ready_times_out_on_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut id = [0u8; 4];
            stream.read_exact(&mut id).unwrap();
            stream.write_all(b"\n").unwrap();
            stream
        });

        let mut reader = SocketReader::connect(&path, 1).unwrap();
        let stream = server.join().unwrap();

        assert!(!reader.wait_ready(Duration::from_millis(10)).unwrap());
        drop(stream);
    }

    #[test]
    fn test_read_frame_returns_full_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut id = [0u8; 4];
            stream.read_exact(&mut id).unwrap();
            stream.write_all(b"\n").unwrap();

            stream.write_all(&2u32.to_le_bytes()).unwrap();
            stream.write_all(&[0xAB; 24]).unwrap();
            stream
        });

        let mut reader = SocketReader::connect(&path, 7).unwrap();
        let stream = server.join().unwrap();

        assert!(reader.wait_ready(Duration::from_millis(100)).unwrap());
        let payload = reader.read_frame(12).unwrap().unwrap();
        assert_eq!(payload.len(), 24);
        assert!(payload.iter().all(|b| *b == 0xAB));
        drop(stream);
    }

    #[test]
    fn test_partial_frame_is_no_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut id = [0u8; 4];
            stream.read_exact(&mut id).unwrap();
            stream.write_all(b"\n").unwrap();

            // One record announced, only a third of it delivered.
            stream.write_all(&1u32.to_le_bytes()).unwrap();
            stream.write_all(&[0u8; 4]).unwrap();
            stream
        });

        let mut reader = SocketReader::connect(&path, 7).unwrap();
        let stream = server.join().unwrap();

        assert!(reader.wait_ready(Duration::from_millis(50)).unwrap());
        assert!(reader.read_frame(12).unwrap().is_none());
        drop(stream);
    }

    #[test]
    fn test_closed_socket_reports_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = socket_path(&dir);
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut id = [0u8; 4];
            stream.read_exact(&mut id).unwrap();
            stream.write_all(b"\n").unwrap();
        });

        let mut reader = SocketReader::connect(&path, 7).unwrap();
        server.join().unwrap();

        // Peer is gone; readiness polling must surface the EOF.
        let err = loop {
            match reader.wait_ready(Duration::from_millis(10)) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
