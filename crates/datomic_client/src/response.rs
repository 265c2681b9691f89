//! Response wrapper.

use crate::error::{ClientError, ClientResult};
use crate::http::{HttpRequest, HttpResponse, ResponseHead};
use bytes::Bytes;
use datomic_edn::{from_edn, Value};

/// A completed response, together with the request that produced it.
///
/// The body is kept as raw bytes and only parsed when [`Response::edn`]
/// is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    body: Bytes,
    head: ResponseHead,
    request: HttpRequest,
}

impl Response {
    /// Wraps a body, its response head and the originating request.
    pub fn new(body: Bytes, head: ResponseHead, request: HttpRequest) -> Self {
        Self {
            body,
            head,
            request,
        }
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> ClientResult<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ClientError::decoding(format!("response body is not UTF-8: {e}")))
    }

    /// Parses the body as EDN.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decoding`] if the body is not valid EDN.
    pub fn edn(&self) -> ClientResult<Value> {
        let text = self.text()?;
        from_edn(text).map_err(|e| ClientError::decoding(e.to_string()))
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.head.is_success()
    }

    /// Response headers, in the order received.
    pub fn headers(&self) -> &[(String, String)] {
        &self.head.headers
    }

    /// Returns the first header value for `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// The `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// The request this response answers.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Consumes the response, returning the raw body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Packages a transport response, turning non-2xx statuses into
/// [`ClientError::Protocol`].
pub(crate) fn into_response(request: HttpRequest, response: HttpResponse) -> ClientResult<Response> {
    let HttpResponse { head, body } = response;
    if !head.is_success() {
        tracing::warn!(
            method = %request.method,
            url = %request.url,
            status = head.status,
            "server returned an error status"
        );
        return Err(ClientError::Protocol {
            status: head.status,
            headers: head.headers,
            body,
        });
    }
    Ok(Response::new(body, head, request))
}
