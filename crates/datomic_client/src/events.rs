//! Event stream subscription.
//!
//! An [`EventStream`] owns the open connection of a
//! `text/event-stream` response and hands out the body as it arrives,
//! one chunk per transport read. The connection is released when the
//! stream ends, fails, is closed, is cancelled, or is dropped.

use crate::error::{ClientError, ClientResult};
use crate::http::{HttpRequest, ResponseHead, StreamingResponse};
use bytes::Bytes;
use datomic_edn::{from_edn, Value};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Size of the read buffer used for each chunk.
const CHUNK_SIZE: usize = 8 * 1024;

/// Cancels an [`EventStream`] from another thread.
///
/// The handle is shared with the transport, which aborts a read blocked
/// on an idle connection once it fires. After
/// [`cancel`](CancelHandle::cancel) the stream yields no further chunks,
/// including one whose read was already under way.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An open event subscription.
///
/// Iterating yields raw body chunks in arrival order. A read error is
/// yielded once, after which the stream is finished.
pub struct EventStream {
    head: ResponseHead,
    request: HttpRequest,
    reader: Option<Box<dyn Read + Send>>,
    buf: Vec<u8>,
    cancel: CancelHandle,
}

impl EventStream {
    pub(crate) fn new(
        request: HttpRequest,
        response: StreamingResponse,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            head: response.head,
            request,
            reader: Some(response.body),
            buf: vec![0u8; CHUNK_SIZE],
            cancel,
        }
    }

    /// Status and headers of the stream response.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// The request that opened this stream.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Returns a handle that can cancel this stream from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns true while the connection is held.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Closes the connection.
    pub fn close(mut self) {
        self.release("closed");
    }

    /// Splits the stream into server-sent events.
    pub fn server_events(self) -> ServerEvents {
        ServerEvents {
            stream: self,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    fn release(&mut self, reason: &str) {
        if self.reader.take().is_some() {
            tracing::debug!(url = %self.request.url, reason, "event stream released");
        }
    }
}

impl Iterator for EventStream {
    type Item = ClientResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            self.release("cancelled");
            return None;
        }
        let reader = self.reader.as_mut()?;
        let read = loop {
            match reader.read(&mut self.buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        if self.cancel.is_cancelled() {
            self.release("cancelled");
            return None;
        }
        match read {
            Ok(0) => {
                self.release("end of stream");
                None
            }
            Ok(n) => {
                tracing::trace!(bytes = n, "event chunk");
                Some(Ok(Bytes::copy_from_slice(&self.buf[..n])))
            }
            Err(e) => {
                self.release("read error");
                Some(Err(ClientError::transport(format!(
                    "event stream read failed: {e}"
                ))))
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.release("dropped");
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("head", &self.head)
            .field("url", &self.request.url)
            .field("open", &self.is_open())
            .finish()
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerEvent {
    /// `id:` field, if present.
    pub id: Option<String>,
    /// `event:` field, if present.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl ServerEvent {
    /// Parses the data payload as EDN.
    pub fn edn(&self) -> ClientResult<Value> {
        from_edn(&self.data).map_err(|e| ClientError::decoding(e.to_string()))
    }
}

/// Incremental parser for the `text/event-stream` format.
///
/// Chunk boundaries may fall anywhere, including inside a line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, returning every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
            let line = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(ServerEvent {
            id: self.id.clone(),
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Iterator of [`ServerEvent`]s over an [`EventStream`].
#[derive(Debug)]
pub struct ServerEvents {
    stream: EventStream,
    decoder: SseDecoder,
    pending: VecDeque<ServerEvent>,
}

impl ServerEvents {
    /// Returns a handle that can cancel the underlying stream.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.stream.cancel_handle()
    }

    /// Closes the underlying connection.
    pub fn close(self) {
        self.stream.close();
    }
}

impl Iterator for ServerEvents {
    type Item = ClientResult<ServerEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            match self.stream.next()? {
                Ok(chunk) => self.pending.extend(self.decoder.push(&chunk)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream_over(body: Box<dyn Read + Send>, cancel: CancelHandle) -> EventStream {
        EventStream::new(
            HttpRequest::get("http://x:1/events/dev/mydb"),
            StreamingResponse {
                head: ResponseHead::new(200),
                body,
            },
            cancel,
        )
    }

    fn stream_of(body: &'static [u8]) -> EventStream {
        stream_over(Box::new(Cursor::new(body)), CancelHandle::default())
    }

    #[test]
    fn stream_reads_until_eof() {
        let mut stream = stream_of(b"data: 1\n\n");
        let chunk = stream.next().unwrap().unwrap();
        assert_eq!(&chunk[..], b"data: 1\n\n");
        assert!(stream.is_open());
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }

    #[test]
    fn cancelled_stream_yields_nothing() {
        let mut stream = stream_of(b"data: 1\n\n");
        stream.cancel_handle().cancel();
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }

    #[test]
    fn read_error_is_transport_error() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
            }
        }

        let mut stream = stream_over(Box::new(Failing), CancelHandle::default());
        assert!(matches!(
            stream.next(),
            Some(Err(ClientError::Transport { .. }))
        ));
        assert!(stream.next().is_none());
    }

    /// Fires the cancel handle while a read is in flight, then completes it.
    struct CancelDuringRead {
        cancel: CancelHandle,
        fail: bool,
    }

    impl Read for CancelDuringRead {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.cancel.cancel();
            if self.fail {
                return Err(std::io::Error::new(ErrorKind::ConnectionAborted, "aborted"));
            }
            buf[..9].copy_from_slice(b"data: 1\n\n");
            Ok(9)
        }
    }

    #[test]
    fn chunk_read_during_cancel_is_dropped() {
        let cancel = CancelHandle::default();
        let reader = CancelDuringRead {
            cancel: cancel.clone(),
            fail: false,
        };
        let mut stream = stream_over(Box::new(reader), cancel);
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }

    #[test]
    fn aborted_read_after_cancel_is_not_an_error() {
        let cancel = CancelHandle::default();
        let reader = CancelDuringRead {
            cancel: cancel.clone(),
            fail: true,
        };
        let mut stream = stream_over(Box::new(reader), cancel);
        assert!(stream.next().is_none());
        assert!(!stream.is_open());
    }

    #[test]
    fn sse_decoder_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"id: 7\nevent: tx\ndata: {:t 1}\n\n");
        assert_eq!(
            events,
            vec![ServerEvent {
                id: Some("7".into()),
                event: Some("tx".into()),
                data: "{:t 1}".into(),
            }]
        );
        assert_eq!(
            events[0].edn().unwrap().get_keyword("t"),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn sse_decoder_joins_split_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {:db-af").is_empty());
        assert!(decoder.push(b"ter {:basis-t 5}}\r\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{:db-after {:basis-t 5}}");
        assert_eq!(events[0].id, None);
    }

    #[test]
    fn sse_decoder_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\ndata: a\ndata: b\n\ndata\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[1].data, "");
    }

    #[test]
    fn server_events_over_stream() {
        let events: Vec<ServerEvent> = stream_of(b"data: 1\n\ndata: 2\n\n")
            .server_events()
            .collect::<ClientResult<_>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].edn().unwrap(), Value::Integer(2));
    }
}
