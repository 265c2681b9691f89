//! In-memory transport for tests.

use crate::events::CancelHandle;
use crate::http::{HttpClient, HttpRequest, HttpResponse, ResponseHead, StreamingResponse};
use crate::http::{EDN_CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

enum Reply {
    Buffered(HttpResponse),
    Stream(ResponseHead, Vec<Bytes>, StreamWatch),
    Fail(String),
}

/// A transport that answers from a queue of canned replies and records
/// every request it receives.
///
/// Replies are consumed in order by both [`HttpClient::execute`] and
/// [`HttpClient::open_stream`]. An empty queue is a transport error.
#[derive(Default)]
pub struct MockHttpClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    /// Creates a mock with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with the given status and body.
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        self.push_http_response(HttpResponse {
            head: ResponseHead::new(status),
            body: body.into(),
        });
    }

    /// Queues a 200 response carrying EDN text.
    pub fn push_edn(&self, body: &str) {
        self.push_http_response(HttpResponse {
            head: ResponseHead::new(200).with_header("Content-Type", EDN_CONTENT_TYPE),
            body: Bytes::copy_from_slice(body.as_bytes()),
        });
    }

    /// Queues a fully specified response.
    pub fn push_http_response(&self, response: HttpResponse) {
        self.replies.lock().push_back(Reply::Buffered(response));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().push_back(Reply::Fail(message.into()));
    }

    /// Queues a 200 event stream that delivers `chunks`, one per read.
    ///
    /// The returned watch reports how many chunks were read and whether
    /// the stream body has been released.
    pub fn push_stream<I, B>(&self, chunks: I) -> StreamWatch
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let head = ResponseHead::new(200).with_header("Content-Type", EVENT_STREAM_CONTENT_TYPE);
        let watch = StreamWatch::default();
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.replies
            .lock()
            .push_back(Reply::Stream(head, chunks, watch.clone()));
        watch
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    fn next_reply(&self, request: &HttpRequest) -> Result<Reply, String> {
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| format!("no mock reply queued for {} {}", request.method, request.url))
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        match self.next_reply(request)? {
            Reply::Buffered(response) => Ok(response),
            Reply::Stream(head, chunks, watch) => {
                watch.released.store(true, Ordering::SeqCst);
                Ok(HttpResponse {
                    head,
                    body: chunks.concat().into(),
                })
            }
            Reply::Fail(message) => Err(message),
        }
    }

    fn open_stream(
        &self,
        request: &HttpRequest,
        cancel: &CancelHandle,
    ) -> Result<StreamingResponse, String> {
        match self.next_reply(request)? {
            Reply::Buffered(response) => Ok(StreamingResponse {
                head: response.head,
                body: Box::new(ChunkReader::new(
                    vec![response.body],
                    StreamWatch::default(),
                    cancel.clone(),
                )),
            }),
            Reply::Stream(head, chunks, watch) => Ok(StreamingResponse {
                head,
                body: Box::new(ChunkReader::new(chunks, watch, cancel.clone())),
            }),
            Reply::Fail(message) => Err(message),
        }
    }
}

impl std::fmt::Debug for MockHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpClient")
            .field("queued", &self.replies.lock().len())
            .field("received", &self.requests.lock().len())
            .finish()
    }
}

/// Observes a mock event stream body.
#[derive(Debug, Clone, Default)]
pub struct StreamWatch {
    reads: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl StreamWatch {
    /// Number of chunks handed out so far.
    pub fn chunks_read(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns true once the body reader has been dropped.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Reader that returns one queued chunk per `read` call and fails once
/// its stream is cancelled.
struct ChunkReader {
    chunks: VecDeque<Bytes>,
    watch: StreamWatch,
    cancel: CancelHandle,
}

impl ChunkReader {
    fn new(chunks: Vec<Bytes>, watch: StreamWatch, cancel: CancelHandle) -> Self {
        Self {
            chunks: chunks.into(),
            watch,
            cancel,
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "stream cancelled",
            ));
        }
        let Some(chunk) = self.chunks.front_mut() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        let _ = chunk.split_to(n);
        if chunk.is_empty() {
            self.chunks.pop_front();
            self.watch.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(n)
    }
}

impl Drop for ChunkReader {
    fn drop(&mut self) {
        self.watch.released.store(true, Ordering::SeqCst);
    }
}
