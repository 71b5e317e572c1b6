use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use fanlink_frame::{decode_frame, Frame, FrameType};
use fanlink_transport::SessionStream;
use tracing::{debug, trace};

use crate::codec::MessageCodec;
use crate::error::{ConnectionError, Result};
use crate::observer::ConnectionObserver;
use crate::sender::MessageSender;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// State shared between the read loop, the sender, and dispose handles.
pub(crate) struct LinkShared {
    /// `OPEN → CLOSING → CLOSED`, advanced exactly once.
    state: AtomicU8,
    closed_notified: AtomicBool,
    /// Extra handle to the stream, used only for cancellation/completion.
    control: SessionStream,
}

impl LinkShared {
    fn new(control: SessionStream) -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            closed_notified: AtomicBool::new(false),
            control,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    /// Cancel any pending read and complete both stream directions.
    ///
    /// The compare-and-set picks a single winner among racing disposers;
    /// everyone else returns immediately.
    pub(crate) fn dispose(&self) {
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let _ = self.control.cancel_pending_read();
        let _ = self.control.complete_input();
        let _ = self.control.complete_output();
        self.state.store(CLOSED, Ordering::Release);
        debug!("connection disposed");
    }
}

/// Cloneable handle for disposing a connection and checking its state.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<LinkShared>,
}

impl ConnectionHandle {
    /// Dispose the connection: cancel the pending read and complete both
    /// stream directions. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// False after any terminal transition.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }
}

/// A framed message connection over one exclusively-owned byte stream.
///
/// Construction splits the stream into a read half (driven by
/// [`run`](FramedConnection::run)), a write half (the returned
/// [`MessageSender`]), and a cancellation handle. The read loop is meant
/// to occupy one dedicated thread per connection; everything the owner
/// needs comes back through its [`ConnectionObserver`].
pub struct FramedConnection<C: MessageCodec> {
    stream: SessionStream,
    buf: BytesMut,
    codec: Arc<C>,
    observer: Arc<dyn ConnectionObserver<C::Message>>,
    max_message_size: usize,
    shared: Arc<LinkShared>,
}

impl<C: MessageCodec> FramedConnection<C> {
    /// Create a connection over `stream` with the negotiated maximum
    /// message size. Returns the read-loop driver and the send half.
    pub fn new(
        stream: SessionStream,
        codec: Arc<C>,
        observer: Arc<dyn ConnectionObserver<C::Message>>,
        max_message_size: usize,
    ) -> Result<(Self, MessageSender<C>)> {
        let control = stream.try_clone()?;
        let writer = stream.try_clone()?;
        let shared = Arc::new(LinkShared::new(control));

        let connection = Self {
            stream,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec: Arc::clone(&codec),
            observer,
            max_message_size,
            shared: Arc::clone(&shared),
        };
        let sender = MessageSender::new(writer, codec, shared, max_message_size);
        Ok((connection, sender))
    }

    /// Dispose/state handle for this connection.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the read loop until the stream ends, the connection is
    /// disposed, or a failure occurs.
    ///
    /// Per iteration every complete buffered frame is extracted and
    /// dispatched, then one blocking read refills the buffer — the read is
    /// the only suspension point, so a malformed frame is detected and
    /// acted on before any partial data goes upward. A protocol violation
    /// or codec failure raises `connection_error` and disposes the
    /// connection with no further frames processed. On loop exit, for any
    /// reason, `connection_closed` is raised exactly once.
    pub fn run(mut self) {
        debug!(max_message_size = self.max_message_size, "read loop started");

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let failure = loop {
            if !self.shared.is_connected() {
                break None;
            }

            match decode_frame(&mut self.buf, self.max_message_size) {
                Ok(Some(frame)) => match self.handle_frame(frame) {
                    Ok(()) => continue,
                    Err(err) => break Some(err),
                },
                Ok(None) => {}
                Err(err) => break Some(ConnectionError::Frame(err)),
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => break None, // end-of-stream or cancelled
                Ok(read) => self.buf.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    if self.shared.is_connected() {
                        break Some(ConnectionError::Io(err));
                    }
                    break None; // dispose raced the read
                }
            }
        };

        if let Some(err) = failure {
            debug!(error = %err, "read loop failed");
            self.observer.connection_error(&err);
        }

        self.shared.dispose();
        if !self.shared.closed_notified.swap(true, Ordering::AcqRel) {
            self.observer.connection_closed();
        }
        debug!("read loop finished");
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        match frame.frame_type {
            FrameType::Message => {
                let message = self.codec.decode(frame.payload.as_ref())?;
                self.observer.message_arrived(message);
            }
            // Accepted at the header level; keepalive semantics belong to
            // the owner, not this layer.
            FrameType::Ping | FrameType::Pong => {
                trace!(frame_type = ?frame.frame_type, "control frame ignored");
            }
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use fanlink_frame::{encode_frame, write_header, HEADER_SIZE};

    use super::*;
    use crate::codec::JsonCodec;

    #[derive(Default)]
    struct Recording {
        messages: Mutex<Vec<serde_json::Value>>,
        errors: Mutex<Vec<String>>,
        closed: AtomicUsize,
    }

    impl Recording {
        fn message_count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }

        fn error_count(&self) -> usize {
            self.errors.lock().unwrap().len()
        }

        fn closed_count(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl ConnectionObserver<serde_json::Value> for Recording {
        fn message_arrived(&self, message: serde_json::Value) {
            self.messages.lock().unwrap().push(message);
        }

        fn connection_error(&self, error: &ConnectionError) {
            self.errors.lock().unwrap().push(error.to_string());
        }

        fn connection_closed(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_until(what: &str, condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("timed out waiting for {what}");
    }

    fn spawn_connection(
        stream: SessionStream,
        max_message_size: usize,
    ) -> (
        Arc<Recording>,
        ConnectionHandle,
        MessageSender<JsonCodec>,
        thread::JoinHandle<()>,
    ) {
        let observer = Arc::new(Recording::default());
        let (connection, sender) = FramedConnection::new(
            stream,
            Arc::new(JsonCodec),
            Arc::clone(&observer) as Arc<dyn ConnectionObserver<serde_json::Value>>,
            max_message_size,
        )
        .unwrap();
        let handle = connection.handle();
        let join = thread::spawn(move || connection.run());
        (observer, handle, sender, join)
    }

    fn message_frame(payload: &[u8]) -> BytesMut {
        let mut wire = BytesMut::new();
        encode_frame(FrameType::Message, payload, &mut wire).unwrap();
        wire
    }

    #[test]
    fn well_formed_message_arrives_and_connection_stays_open() {
        let (local, mut peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 65_536);

        // 100-byte application payload.
        let payload = format!(r#"{{"pad":"{}"}}"#, "a".repeat(90));
        assert_eq!(payload.len(), 100);
        peer.write_all(&message_frame(payload.as_bytes())).unwrap();

        wait_until("message arrival", || observer.message_count() == 1);
        assert!(handle.is_connected());
        assert_eq!(observer.error_count(), 0);
        assert_eq!(observer.closed_count(), 0);
        assert_eq!(
            observer.messages.lock().unwrap()[0]["pad"],
            serde_json::json!("a".repeat(90))
        );

        drop(peer);
        join.join().unwrap();
        assert_eq!(observer.closed_count(), 1);
        assert_eq!(observer.error_count(), 0);
    }

    #[test]
    fn oversized_declared_length_tears_down_connection() {
        let (local, mut peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 1024);

        // Header declares 2048 bytes; no payload ever follows.
        let mut header = [0u8; HEADER_SIZE];
        write_header(FrameType::Message, 2048, &mut header).unwrap();
        peer.write_all(&header).unwrap();

        join.join().unwrap();
        assert_eq!(observer.message_count(), 0);
        assert_eq!(observer.error_count(), 1);
        assert_eq!(observer.closed_count(), 1);
        assert!(!handle.is_connected());
    }

    #[test]
    fn unknown_tag_is_a_protocol_violation() {
        let (local, mut peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 1024);

        peer.write_all(&[0x07, 0x00, 0x00, 0x00]).unwrap();

        join.join().unwrap();
        assert_eq!(observer.error_count(), 1);
        assert_eq!(observer.closed_count(), 1);
        assert!(!handle.is_connected());
    }

    #[test]
    fn codec_failure_is_connection_fatal() {
        let (local, mut peer) = SessionStream::pair().unwrap();
        let (observer, _handle, _sender, join) = spawn_connection(local, 1024);

        peer.write_all(&message_frame(b"{not json")).unwrap();

        join.join().unwrap();
        assert_eq!(observer.message_count(), 0);
        assert_eq!(observer.error_count(), 1);
        assert_eq!(observer.closed_count(), 1);
    }

    #[test]
    fn control_frames_are_accepted_as_no_ops() {
        let (local, mut peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 1024);

        let mut wire = BytesMut::new();
        encode_frame(FrameType::Ping, b"", &mut wire).unwrap();
        encode_frame(FrameType::Pong, b"", &mut wire).unwrap();
        encode_frame(FrameType::Message, br#""after-control""#, &mut wire).unwrap();
        peer.write_all(&wire).unwrap();

        wait_until("message after control frames", || {
            observer.message_count() == 1
        });
        assert_eq!(observer.error_count(), 0);
        assert!(handle.is_connected());

        drop(peer);
        join.join().unwrap();
    }

    #[test]
    fn clean_eof_raises_closed_exactly_once() {
        let (local, peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 1024);

        drop(peer);
        join.join().unwrap();

        assert_eq!(observer.closed_count(), 1);
        assert_eq!(observer.error_count(), 0);
        assert!(!handle.is_connected());
    }

    #[test]
    fn dispose_unblocks_read_loop_and_is_idempotent() {
        let (local, _peer) = SessionStream::pair().unwrap();
        let (observer, handle, _sender, join) = spawn_connection(local, 1024);

        // Let the loop block on its read first.
        thread::sleep(Duration::from_millis(20));
        handle.dispose();
        handle.dispose();

        join.join().unwrap();
        assert_eq!(observer.closed_count(), 1);
        assert_eq!(observer.error_count(), 0);
        assert!(!handle.is_connected());
    }

    #[test]
    fn two_connections_roundtrip_messages() {
        let (left, right) = SessionStream::pair().unwrap();
        let (_obs_a, handle_a, mut sender_a, join_a) = spawn_connection(left, 65_536);
        let (obs_b, _handle_b, _sender_b, join_b) = spawn_connection(right, 65_536);

        let message = serde_json::json!({"seq": 1, "body": "ping over frames"});
        sender_a.send(&message).unwrap();

        wait_until("roundtrip delivery", || obs_b.message_count() == 1);
        assert_eq!(obs_b.messages.lock().unwrap()[0], message);

        handle_a.dispose();
        join_a.join().unwrap();
        join_b.join().unwrap();
    }
}
