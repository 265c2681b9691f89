//! # datomic_client
//!
//! Client for the Datomic REST peer protocol.
//!
//! Method calls become HTTP requests against a remote service, and the
//! service's EDN responses come back as [`Response`] values that parse
//! on demand.
//!
//! ## Operations
//!
//! - [`Client::create_database`]
//! - [`Client::database_info`]
//! - [`Client::transact`]
//! - [`Client::datoms`]
//! - [`Client::entity`]
//! - [`Client::query`]
//! - [`Client::events`] / [`Client::events_with`]
//!
//! Payloads are given either as pre-formatted EDN text or as
//! [`Value`]s, which are encoded before sending. Any non-2xx status is
//! returned as [`ClientError::Protocol`] carrying the status, headers and
//! body.
//!
//! ## Transports
//!
//! The client is generic over [`HttpClient`]. The default `ureq` feature
//! provides [`UreqClient`]; [`MockHttpClient`] answers from a queue of
//! canned replies for tests.
//!
//! ```
//! use datomic_client::{Client, ClientConfig, DbOptions, MockHttpClient};
//!
//! let client = Client::with_transport(
//!     ClientConfig::new("http://localhost:8080").with_storage("dev"),
//!     MockHttpClient::new(),
//! );
//! client.transport().push_edn("{:basis-t 1000}");
//!
//! let info = client.database_info("seattle", DbOptions::latest())?;
//! assert_eq!(info.request().url, "http://localhost:8080/data/dev/seattle/-/");
//! # Ok::<(), datomic_client::ClientError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod events;
mod http;
mod mock;
mod response;
#[cfg(feature = "ureq")]
mod transport;
mod url;
mod wire;

pub use client::Client;
pub use config::{ClientConfig, DbOptions, Version, LATEST};
pub use error::{ClientError, ClientResult};
pub use events::{CancelHandle, EventStream, ServerEvent, ServerEvents, SseDecoder};
pub use http::{
    HttpClient, HttpRequest, HttpResponse, Method, ResponseHead, StreamingResponse,
    EDN_CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE, FORM_CONTENT_TYPE,
};
pub use mock::{MockHttpClient, StreamWatch};
pub use response::Response;
#[cfg(feature = "ureq")]
pub use transport::UreqClient;
pub use url::UrlBuilder;
pub use wire::{db_alias, Params, QueryArgs, WireInput};

pub use datomic_edn::{Name, Value};
