//! # Datomic EDN
//!
//! Reader and writer for EDN, the data notation spoken by the Datomic REST
//! peer protocol.
//!
//! The codec works on a dynamic [`Value`] tree:
//!
//! - [`to_edn`] writes a value as EDN text
//! - [`from_edn`] reads exactly one value back
//!
//! Maps and sets keep their entry order, so a value written by [`to_edn`]
//! reads back equal to itself.
//!
//! ## Usage
//!
//! ```
//! use datomic_edn::{from_edn, to_edn, Value};
//!
//! let alias = Value::map(vec![(Value::keyword("db/alias"), Value::from("dev/mydb"))]);
//! let text = to_edn(&alias).unwrap();
//! assert_eq!(text, r#"{:db/alias "dev/mydb"}"#);
//!
//! let decoded = from_edn(&text).unwrap();
//! assert_eq!(decoded, alias);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_edn, EdnDecoder};
pub use encoder::{to_edn, EdnEncoder};
pub use error::{CodecError, CodecResult};
pub use value::{Name, Value};

impl std::str::FromStr for Value {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        from_edn(s)
    }
}
