//! HTTP transport abstraction.
//!
//! The client never talks to sockets itself. Requests are described as
//! plain [`HttpRequest`] values and handed to an [`HttpClient`]
//! implementation: the bundled `ureq` transport, the in-memory
//! [`MockHttpClient`](crate::MockHttpClient), or anything else that can
//! move bytes.

use crate::events::CancelHandle;
use bytes::Bytes;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// `Accept` value for EDN responses.
pub const EDN_CONTENT_TYPE: &str = "application/edn";
/// `Accept` value for the event stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
/// `Content-Type` of form bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Both methods
/// return the response whatever its status; status policy belongs to the
/// caller. `Err` is reserved for failures to obtain a response at all.
pub trait HttpClient: Send + Sync {
    /// Performs a request and buffers the whole response body.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String>;

    /// Performs a request and returns as soon as the response head arrives,
    /// leaving the body to be read incrementally.
    ///
    /// The body stays open until it ends or is dropped, with no overall
    /// time limit. Once `cancel` fires, a read blocked on an idle
    /// connection must fail promptly and the connection must be dropped.
    fn open_stream(
        &self,
        request: &HttpRequest,
        cancel: &CancelHandle,
    ) -> Result<StreamingResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }

    fn open_stream(
        &self,
        request: &HttpRequest,
        cancel: &CancelHandle,
    ) -> Result<StreamingResponse, String> {
        (**self).open_stream(request, cancel)
    }
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Reads.
    Get,
    /// Writes.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

/// Description of an outgoing request.
///
/// Also serves as the "originating request" carried by every
/// [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Query-string parameters, in order.
    pub query: Vec<(String, String)>,
    /// Request headers, in order.
    pub headers: Vec<(String, String)>,
    /// Form fields sent as an `application/x-www-form-urlencoded` body.
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    /// Creates a request with no headers, parameters or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            form: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the query-string parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets a form body and its content type.
    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self.with_header("Content-Type", FORM_CONTENT_TYPE)
    }

    /// Returns the first header value for `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find(&self.headers, name)
    }

    /// Returns the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the form field named `name`.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Headers, in the order received.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Creates a head with the given status and no headers.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first header value for `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find(&self.headers, name)
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status and headers.
    pub head: ResponseHead,
    /// Raw body.
    pub body: Bytes,
}

/// A response whose body is still on the wire.
pub struct StreamingResponse {
    /// Status and headers.
    pub head: ResponseHead,
    /// Body reader. Dropping it releases the connection.
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

fn find<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
