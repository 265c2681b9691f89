//! Blocking HTTP transport backed by `ureq`.

use crate::config::ClientConfig;
use crate::events::CancelHandle;
use crate::http::{
    HttpClient, HttpRequest, HttpResponse, Method, ResponseHead, StreamingResponse,
};
use std::time::{Duration, Instant};
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::time::Duration as WaitDuration;
use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector, DefaultConnector, NextTimeout, Transport,
};

/// How often a blocked stream read wakes up to check for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// [`HttpClient`] implementation on a shared `ureq` agent.
///
/// Agents are configured to hand back non-2xx responses instead of
/// failing, so the caller sees the server's status and body. Buffered
/// requests are bounded by the configured timeout as a whole. Event
/// streams only bound connecting and waiting for the response head, and
/// then stay open for as long as the server keeps them.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
    timeout: Duration,
    user_agent: String,
}

impl UreqClient {
    /// Creates a transport using the timeout and user agent from `config`.
    pub fn new(config: &ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
        }
    }

    /// A dedicated agent for one event stream, whose connection watches
    /// `cancel`.
    fn stream_agent(&self, cancel: &CancelHandle) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(self.timeout))
            .timeout_recv_response(Some(self.timeout))
            .http_status_as_error(false)
            .build();
        let connector = CancellableConnector {
            inner: DefaultConnector::new(),
            cancel: cancel.clone(),
        };
        ureq::Agent::with_parts(config, connector, DefaultResolver::default())
    }

    fn call(
        &self,
        agent: &ureq::Agent,
        request: &HttpRequest,
    ) -> Result<ureq::http::Response<ureq::Body>, String> {
        let result = match request.method {
            Method::Get => self.decorate(agent.get(&request.url), request).call(),
            Method::Post => {
                let builder = self.decorate(agent.post(&request.url), request);
                match &request.form {
                    Some(fields) => builder.send_form(
                        fields.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    ),
                    None => builder.send_empty(),
                }
            }
        };
        result.map_err(|e| format!("{} {} failed: {e}", request.method, request.url))
    }

    fn decorate<B>(
        &self,
        mut builder: ureq::RequestBuilder<B>,
        request: &HttpRequest,
    ) -> ureq::RequestBuilder<B> {
        for (name, value) in &request.query {
            builder = builder.query(name, value);
        }
        for (name, value) in &request.headers {
            // send_form writes its own content type
            if request.form.is_some() && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.header("User-Agent", self.user_agent.as_str())
    }
}

fn head_of<B>(response: &ureq::http::Response<B>) -> ResponseHead {
    let mut head = ResponseHead::new(response.status().as_u16());
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            head = head.with_header(name.as_str(), value);
        }
    }
    head
}

impl HttpClient for UreqClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut response = self.call(&self.agent, request)?;
        let head = head_of(&response);
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| format!("failed to read response body: {e}"))?;
        Ok(HttpResponse {
            head,
            body: body.into(),
        })
    }

    fn open_stream(
        &self,
        request: &HttpRequest,
        cancel: &CancelHandle,
    ) -> Result<StreamingResponse, String> {
        let agent = self.stream_agent(cancel);
        let response = self.call(&agent, request)?;
        let head = head_of(&response);
        Ok(StreamingResponse {
            head,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

/// Wraps every connection of the default connector chain in a
/// [`CancellableTransport`].
#[derive(Debug)]
struct CancellableConnector {
    inner: DefaultConnector,
    cancel: CancelHandle,
}

impl Connector<()> for CancellableConnector {
    type Out = CancellableTransport;

    fn connect(
        &self,
        details: &ConnectionDetails,
        chained: Option<()>,
    ) -> Result<Option<Self::Out>, ureq::Error> {
        let transport = self.inner.connect(details, chained)?;
        Ok(transport.map(|inner| CancellableTransport {
            inner,
            cancel: self.cancel.clone(),
        }))
    }
}

/// A connection whose blocking reads are cut into short waits, so a
/// cancelled stream stops waiting on an idle server.
#[derive(Debug)]
struct CancellableTransport {
    inner: Box<dyn Transport>,
    cancel: CancelHandle,
}

impl CancellableTransport {
    fn aborted() -> ureq::Error {
        ureq::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "event stream cancelled",
        ))
    }
}

impl Transport for CancellableTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        self.inner.buffers()
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), ureq::Error> {
        if self.cancel.is_cancelled() {
            return Err(Self::aborted());
        }
        self.inner.transmit_output(amount, timeout)
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, ureq::Error> {
        let deadline = match timeout.after {
            WaitDuration::Exact(after) => Some(Instant::now() + after),
            WaitDuration::NotHappening => None,
        };
        loop {
            if self.cancel.is_cancelled() {
                return Err(Self::aborted());
            }
            let wait = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(ureq::Error::Timeout(timeout.reason));
                    }
                    left.min(CANCEL_POLL)
                }
                None => CANCEL_POLL,
            };
            let slice = NextTimeout {
                after: WaitDuration::Exact(wait),
                reason: timeout.reason,
            };
            match self.inner.await_input(slice) {
                Err(ureq::Error::Timeout(_)) => continue,
                other => return other,
            }
        }
    }

    fn is_open(&mut self) -> bool {
        !self.cancel.is_cancelled() && self.inner.is_open()
    }

    fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}
