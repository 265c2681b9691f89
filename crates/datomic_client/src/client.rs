//! Request dispatch.

use crate::config::{ClientConfig, DbOptions, Version};
use crate::error::{ClientError, ClientResult};
use crate::events::{CancelHandle, EventStream};
use crate::http::{HttpClient, HttpRequest, EDN_CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE};
use crate::response::{into_response, Response};
use crate::url::UrlBuilder;
use crate::wire::{self, Params, QueryArgs, WireInput};
use bytes::Bytes;
use datomic_edn::Value;
use std::fmt::Display;
use std::io::Read;
use std::ops::ControlFlow;

/// Client for a Datomic REST service.
///
/// Every operation is one independent blocking request. The client holds
/// no mutable state and can be shared between threads when its transport
/// can.
///
/// # Example
///
/// ```no_run
/// use datomic_client::{Client, ClientConfig, DbOptions};
///
/// let client = Client::new(ClientConfig::new("http://localhost:8080").with_storage("dev"));
/// client.create_database("seattle")?;
/// let info = client.database_info("seattle", DbOptions::latest())?;
/// println!("{:?}", info.edn()?);
/// # Ok::<(), datomic_client::ClientError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Client<C: HttpClient> {
    config: ClientConfig,
    http: C,
}

#[cfg(feature = "ureq")]
impl Client<crate::transport::UreqClient> {
    /// Creates a client using the bundled `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        let http = crate::transport::UreqClient::new(&config);
        Self::with_transport(config, http)
    }
}

impl<C: HttpClient> Client<C> {
    /// Creates a client over the given transport.
    pub fn with_transport(config: ClientConfig, http: C) -> Self {
        Self { config, http }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &C {
        &self.http
    }

    fn urls(&self) -> UrlBuilder<'_> {
        UrlBuilder::new(&self.config.base_url, self.config.storage.as_deref())
    }

    /// The `{:db/alias "<storage>/<name>"}` reference for a database.
    pub fn db_alias(&self, name: &str) -> Value {
        wire::db_alias(self.urls().storage(), name)
    }

    /// Creates a database.
    ///
    /// `POST {base}/data/{storage}/` with form field `db-name`.
    pub fn create_database(&self, name: &str) -> ClientResult<Response> {
        let url = format!("{}/", self.urls().storage_root());
        let request = HttpRequest::post(url).with_form(vec![("db-name".into(), name.into())]);
        self.send(request)
    }

    /// Fetches database information.
    ///
    /// `GET {base}/data/{storage}/{name}/{t}/`.
    pub fn database_info(&self, name: &str, options: DbOptions) -> ClientResult<Response> {
        let url = format!("{}/", self.urls().database(name, Some(&options.t), None));
        self.send(edn_request(HttpRequest::get(url)))
    }

    /// Submits a transaction.
    ///
    /// `data` is sent as the `tx-data` form field. Structured values are
    /// encoded before the request is made, so an encoding error means
    /// nothing was sent.
    pub fn transact(&self, name: &str, data: impl Into<WireInput>) -> ClientResult<Response> {
        let tx_data = data.into().transcode()?;
        let url = format!("{}/", self.urls().database(name, None, None));
        let request = edn_request(HttpRequest::post(url))
            .with_form(vec![("tx-data".into(), tx_data)]);
        self.send(request)
    }

    /// Reads a range of datoms.
    ///
    /// `params` (index, components, limit, ...) are passed through as the
    /// query string. A version other than the latest is also sent as `t`.
    pub fn datoms(&self, name: &str, options: DbOptions, params: Params) -> ClientResult<Response> {
        let url = self.urls().database(name, Some(&options.t), Some("datoms"));
        let params = with_version(params, &options.t);
        self.send(edn_request(HttpRequest::get(url)).with_query(params.into_pairs()))
    }

    /// Fetches one entity. `id` overrides any `e` entry in `params`, and a
    /// version other than the latest is also sent as `t`.
    pub fn entity(
        &self,
        name: &str,
        id: impl Display,
        options: DbOptions,
        params: Params,
    ) -> ClientResult<Response> {
        let url = self.urls().database(name, Some(&options.t), Some("entity"));
        let params = with_version(params, &options.t).merge("e", id.to_string());
        self.send(edn_request(HttpRequest::get(url)).with_query(params.into_pairs()))
    }

    /// Runs a query.
    ///
    /// A database name as `args` is expanded to
    /// `[{:db/alias "<storage>/<name>"}]`. Anything else is sent as the
    /// complete argument list. `q` and `args` override caller entries of
    /// the same name in `params`.
    pub fn query(
        &self,
        query: impl Into<WireInput>,
        args: impl Into<QueryArgs>,
        params: Params,
    ) -> ClientResult<Response> {
        let q = query.into().transcode()?;
        let args = args.into().resolve(self.urls().storage()).transcode()?;
        let params = params.merge("q", q).merge("args", args);
        let request = edn_request(HttpRequest::get(self.urls().query()))
            .with_query(params.into_pairs());
        self.send(request)
    }

    /// Opens the event stream of a database.
    ///
    /// A non-2xx answer is read to the end and returned as
    /// [`ClientError::Protocol`].
    pub fn events(&self, name: &str) -> ClientResult<EventStream> {
        let request = HttpRequest::get(self.urls().events(name))
            .with_header("Accept", EVENT_STREAM_CONTENT_TYPE);
        tracing::debug!(method = %request.method, url = %request.url, "opening event stream");

        let cancel = CancelHandle::default();
        let mut response = self
            .http
            .open_stream(&request, &cancel)
            .map_err(ClientError::transport)?;
        if !response.head.is_success() {
            let mut body = Vec::new();
            response
                .body
                .read_to_end(&mut body)
                .map_err(|e| ClientError::transport(format!("failed to read error body: {e}")))?;
            tracing::warn!(
                url = %request.url,
                status = response.head.status,
                "event stream refused"
            );
            return Err(ClientError::Protocol {
                status: response.head.status,
                headers: response.head.headers,
                body: body.into(),
            });
        }
        Ok(EventStream::new(request, response, cancel))
    }

    /// Subscribes to the event stream and feeds each chunk to `handler`.
    ///
    /// Blocks until the stream ends, fails, is cancelled, or the handler
    /// returns [`ControlFlow::Break`]. The connection is released in every
    /// case before this returns.
    pub fn events_with<F>(&self, name: &str, mut handler: F) -> ClientResult<()>
    where
        F: FnMut(Bytes) -> ControlFlow<()>,
    {
        for chunk in self.events(name)? {
            if handler(chunk?).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn send(&self, request: HttpRequest) -> ClientResult<Response> {
        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self
            .http
            .execute(&request)
            .map_err(ClientError::transport)?;
        into_response(request, response)
    }
}

fn edn_request(request: HttpRequest) -> HttpRequest {
    request.with_header("Accept", EDN_CONTENT_TYPE)
}

/// Mirrors a pinned version into the query string.
fn with_version(params: Params, t: &Version) -> Params {
    match t {
        Version::Latest => params,
        t => params.merge("t", t.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, FORM_CONTENT_TYPE};
    use crate::mock::MockHttpClient;
    use std::sync::Arc;

    fn client() -> (Client<Arc<MockHttpClient>>, Arc<MockHttpClient>) {
        let mock = Arc::new(MockHttpClient::new());
        let config = ClientConfig::new("http://localhost:8080").with_storage("dev");
        (Client::with_transport(config, Arc::clone(&mock)), mock)
    }

    #[test]
    fn create_database_posts_form_without_accept() {
        let (client, mock) = client();
        mock.push_response(201, "");

        let response = client.create_database("mydb").unwrap();
        assert_eq!(response.status(), 201);

        let request = mock.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://localhost:8080/data/dev/");
        assert_eq!(request.form_field("db-name"), Some("mydb"));
        assert_eq!(request.header("Content-Type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(request.header("Accept"), None);
    }

    #[test]
    fn database_info_defaults_to_latest() {
        let (client, mock) = client();
        mock.push_edn("{:db/alias \"dev/mydb\" :basis-t 1000}");

        let response = client.database_info("mydb", DbOptions::default()).unwrap();
        assert_eq!(
            response.edn().unwrap().get_keyword("basis-t"),
            Some(&Value::Integer(1000))
        );

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:8080/data/dev/mydb/-/");
        assert_eq!(request.header("Accept"), Some(EDN_CONTENT_TYPE));
        assert!(request.query.is_empty());
    }

    #[test]
    fn transact_encodes_structured_data() {
        let (client, mock) = client();
        mock.push_edn("{:tempids {}}");

        let tx = vec![Value::vector(vec![
            Value::keyword("db/add"),
            Value::tagged("db/id", Value::vector(vec![Value::keyword("db.part/user")])),
            Value::keyword("person/name"),
            Value::from("Ann"),
        ])];
        client.transact("mydb", tx).unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:8080/data/dev/mydb/");
        assert_eq!(
            request.form_field("tx-data"),
            Some(r#"[[:db/add #db/id [:db.part/user] :person/name "Ann"]]"#)
        );
        assert_eq!(request.header("Accept"), Some(EDN_CONTENT_TYPE));
    }

    #[test]
    fn transact_encoding_failure_sends_nothing() {
        let (client, mock) = client();
        let err = client
            .transact("mydb", Value::Float(f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, ClientError::Encoding(_)));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn entity_id_overrides_caller_param() {
        let (client, mock) = client();
        mock.push_edn("{:db/id 17}");

        let params = Params::new().with("e", 99).with("since", 5);
        client
            .entity("mydb", 17, DbOptions::at(1000i64), params)
            .unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:8080/data/dev/mydb/1000/entity");
        assert_eq!(
            request.query,
            vec![
                ("since".to_string(), "5".to_string()),
                ("t".to_string(), "1000".to_string()),
                ("e".to_string(), "17".to_string()),
            ]
        );
    }

    #[test]
    fn pinned_version_is_also_a_query_param() {
        let (client, mock) = client();
        mock.push_edn("[]");
        mock.push_edn("[]");
        mock.push_edn("{}");

        client
            .datoms("mydb", DbOptions::at(1000i64), Params::new().with("index", "eavt"))
            .unwrap();
        client
            .datoms("mydb", DbOptions::latest(), Params::new().with("index", "eavt"))
            .unwrap();
        client
            .database_info("mydb", DbOptions::at(1000i64))
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].url, "http://localhost:8080/data/dev/mydb/1000/datoms");
        assert_eq!(requests[0].query_param("t"), Some("1000"));
        assert_eq!(requests[1].url, "http://localhost:8080/data/dev/mydb/-/datoms");
        assert_eq!(requests[1].query_param("t"), None);
        assert!(requests[2].query.is_empty());
    }

    #[test]
    fn query_with_database_name() {
        let (client, mock) = client();
        mock.push_edn("[[1]]");

        client
            .query("[:find ?e :where [?e :db/doc]]", "mydb", Params::new())
            .unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:8080/api/query");
        assert_eq!(request.query_param("q"), Some("[:find ?e :where [?e :db/doc]]"));
        assert_eq!(request.query_param("args"), Some(r#"[{:db/alias "dev/mydb"}]"#));
    }

    #[test]
    fn transport_failure_is_reported() {
        let (client, mock) = client();
        mock.push_failure("connection refused");

        let err = client
            .datoms("mydb", DbOptions::at(Version::Latest), Params::new())
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn db_alias_uses_storage() {
        let (client, _) = client();
        assert_eq!(
            client.db_alias("mydb").get_keyword("db/alias"),
            Some(&Value::from("dev/mydb"))
        );
    }

    #[test]
    fn refused_event_stream_is_protocol_error() {
        let (client, mock) = client();
        mock.push_response(404, "no such database");

        let err = client.events("missing").unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body_text().as_deref(), Some("no such database"));
    }
}
