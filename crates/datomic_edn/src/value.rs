//! Dynamic EDN value type.

use std::fmt;

/// A namespaced name, shared by keywords and symbols.
///
/// `db/alias` has namespace `db` and name `alias`; `?e` has no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name {
    namespace: Option<String>,
    name: String,
}

impl Name {
    /// Splits `text` on its first `/` into namespace and name.
    ///
    /// A lone `/` (the division symbol) and text whose split would leave an
    /// empty half are kept whole as the name.
    pub fn parse(text: &str) -> Self {
        match text.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Self {
                namespace: Some(ns.to_string()),
                name: name.to_string(),
            },
            _ => Self {
                namespace: None,
                name: text.to_string(),
            },
        }
    }

    /// Creates a name with an explicit namespace.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Returns the namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the local name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A dynamic EDN value.
///
/// Maps and sets keep the order in which their entries were written or
/// parsed, so a value read back from its own encoding compares equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `nil`.
    Nil,
    /// `true` / `false`.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Float(f64),
    /// Arbitrary precision decimal (`1.5M`), kept as its digits.
    Decimal(String),
    /// Character literal (`\a`, `\newline`).
    Char(char),
    /// String.
    Text(String),
    /// Keyword (`:db/id`).
    Keyword(Name),
    /// Symbol (`?e`, `datomic.api/q`).
    Symbol(Name),
    /// List `( ... )`.
    List(Vec<Value>),
    /// Vector `[ ... ]`.
    Vector(Vec<Value>),
    /// Map `{ ... }`.
    Map(Vec<(Value, Value)>),
    /// Set `#{ ... }`.
    Set(Vec<Value>),
    /// Tagged element (`#inst "..."`, `#db/id [...]`).
    Tagged(Name, Box<Value>),
}

impl Value {
    /// Creates a keyword value from `ns/name` or `name` text (no leading colon).
    pub fn keyword(text: &str) -> Self {
        Value::Keyword(Name::parse(text))
    }

    /// Creates a symbol value.
    pub fn symbol(text: &str) -> Self {
        Value::Symbol(Name::parse(text))
    }

    /// Creates a map value, keeping the given entry order.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(pairs)
    }

    /// Creates a vector value.
    pub fn vector(items: Vec<Value>) -> Self {
        Value::Vector(items)
    }

    /// Creates a tagged element.
    pub fn tagged(tag: &str, value: Value) -> Self {
        Value::Tagged(Name::parse(tag), Box::new(value))
    }

    /// Check if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the keyword name, if this is a keyword.
    pub fn as_keyword(&self) -> Option<&Name> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }

    /// Get the elements of a list, vector or set.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Vector(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a key in this map value.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up a keyword key (`"db/id"` for `:db/id`) in this map value.
    pub fn get_keyword(&self, key: &str) -> Option<&Value> {
        self.get(&Value::keyword(key))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Vector(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Nil
    }
}
