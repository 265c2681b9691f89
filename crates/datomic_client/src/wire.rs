//! Normalisation of caller payloads into EDN wire text.

use crate::error::{ClientError, ClientResult};
use datomic_edn::{to_edn, Value};

/// A payload headed for the wire.
///
/// `Raw` text is trusted to already be valid EDN and is sent untouched;
/// `Structured` values are always encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum WireInput {
    /// Pre-formatted EDN source.
    Raw(String),
    /// Native value to be encoded.
    Structured(Value),
}

impl WireInput {
    /// Produces the wire text for this payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encoding`] if a structured value has no EDN form.
    pub fn transcode(&self) -> ClientResult<String> {
        match self {
            WireInput::Raw(text) => Ok(text.clone()),
            WireInput::Structured(value) => to_edn(value).map_err(ClientError::Encoding),
        }
    }
}

impl From<&str> for WireInput {
    fn from(text: &str) -> Self {
        WireInput::Raw(text.to_string())
    }
}

impl From<String> for WireInput {
    fn from(text: String) -> Self {
        WireInput::Raw(text)
    }
}

impl From<Value> for WireInput {
    fn from(value: Value) -> Self {
        WireInput::Structured(value)
    }
}

impl From<Vec<Value>> for WireInput {
    fn from(items: Vec<Value>) -> Self {
        WireInput::Structured(Value::Vector(items))
    }
}

/// Arguments to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArgs {
    /// Query a single database, by name, under the client's storage alias.
    Database(String),
    /// An explicit argument list, encoded as one value.
    Args(WireInput),
}

impl QueryArgs {
    /// Resolves the argument list to send.
    ///
    /// A database name becomes `[{:db/alias "<storage>/<name>"}]`.
    pub fn resolve(self, storage: Option<&str>) -> WireInput {
        match self {
            QueryArgs::Database(name) => {
                WireInput::Structured(Value::Vector(vec![db_alias(storage, &name)]))
            }
            QueryArgs::Args(args) => args,
        }
    }
}

impl From<&str> for QueryArgs {
    fn from(name: &str) -> Self {
        QueryArgs::Database(name.to_string())
    }
}

impl From<String> for QueryArgs {
    fn from(name: String) -> Self {
        QueryArgs::Database(name)
    }
}

impl From<Value> for QueryArgs {
    fn from(args: Value) -> Self {
        QueryArgs::Args(WireInput::Structured(args))
    }
}

impl From<Vec<Value>> for QueryArgs {
    fn from(args: Vec<Value>) -> Self {
        QueryArgs::Args(WireInput::from(args))
    }
}

impl From<WireInput> for QueryArgs {
    fn from(args: WireInput) -> Self {
        QueryArgs::Args(args)
    }
}

/// The `{:db/alias "<storage>/<name>"}` reference used as a query argument.
///
/// The separator is always present; an absent storage alias leaves the
/// storage part empty (`"/<name>"`).
pub fn db_alias(storage: Option<&str>, name: &str) -> Value {
    let alias = format!("{}/{name}", storage.unwrap_or_default());
    Value::map(vec![(Value::keyword("db/alias"), Value::Text(alias))])
}

/// Caller-supplied query-string parameters, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((name.into(), value.to_string()));
        self
    }

    /// Sets a computed parameter, replacing any caller entry of the same name.
    pub fn merge(mut self, name: &str, value: impl Into<String>) -> Self {
        self.pairs.retain(|(k, _)| k != name);
        self.pairs.push((name.to_string(), value.into()));
        self
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Consumes the list, returning the pairs.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
