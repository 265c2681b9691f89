//! EDN text encoder.

use crate::decoder::is_symbol_char;
use crate::error::{CodecError, CodecResult};
use crate::value::{Name, Value};
use std::fmt::Write;

/// Encode a value as EDN text.
///
/// Collections are written in their stored order; map entries are separated
/// by `, ` and sequence elements by a single space.
///
/// # Errors
///
/// Returns an error if the value has no EDN representation: non-finite
/// floats, or keywords/symbols whose names are empty or contain characters
/// that would not read back as the same name.
pub fn to_edn(value: &Value) -> CodecResult<String> {
    let mut encoder = EdnEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_string())
}

/// An EDN text encoder.
pub struct EdnEncoder {
    buffer: String,
}

impl EdnEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    /// Encode a value, appending to the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Nil => self.buffer.push_str("nil"),
            Value::Bool(b) => self.buffer.push_str(if *b { "true" } else { "false" }),
            Value::Integer(n) => {
                let _ = write!(self.buffer, "{n}");
            }
            Value::Float(f) => self.encode_float(*f)?,
            Value::Decimal(digits) => self.encode_decimal(digits)?,
            Value::Char(c) => self.encode_char(*c),
            Value::Text(s) => self.encode_text(s),
            Value::Keyword(name) => {
                check_name(name, "keyword")?;
                self.buffer.push(':');
                let _ = write!(self.buffer, "{name}");
            }
            Value::Symbol(name) => {
                check_name(name, "symbol")?;
                let _ = write!(self.buffer, "{name}");
            }
            Value::List(items) => self.encode_seq("(", items, ")")?,
            Value::Vector(items) => self.encode_seq("[", items, "]")?,
            Value::Set(items) => self.encode_seq("#{", items, "}")?,
            Value::Map(pairs) => self.encode_map(pairs)?,
            Value::Tagged(tag, inner) => {
                check_name(tag, "tag")?;
                if !tag.to_string().starts_with(|c: char| c.is_alphabetic()) {
                    return Err(CodecError::encoding_failed(format!(
                        "tag must start with a letter: {tag}"
                    )));
                }
                let _ = write!(self.buffer, "#{tag} ");
                self.encode(inner)?;
            }
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded text.
    pub fn into_string(self) -> String {
        self.buffer
    }

    /// Get a reference to the encoded text.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    fn encode_float(&mut self, f: f64) -> CodecResult<()> {
        if !f.is_finite() {
            return Err(CodecError::encoding_failed(format!(
                "non-finite float {f} has no EDN form"
            )));
        }
        // Debug output is the shortest text that reads back to the same f64
        // and always carries a `.` or exponent.
        let _ = write!(self.buffer, "{f:?}");
        Ok(())
    }

    fn encode_decimal(&mut self, digits: &str) -> CodecResult<()> {
        let numeric = digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        // anything else reads back as a symbol
        let mut chars = digits.chars();
        let leading_digit = match chars.next() {
            Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
            Some(c) => c.is_ascii_digit(),
            None => false,
        };
        if !numeric || !leading_digit || digits.parse::<f64>().is_err() {
            return Err(CodecError::encoding_failed(format!(
                "invalid decimal digits: {digits}"
            )));
        }
        self.buffer.push_str(digits);
        self.buffer.push('M');
        Ok(())
    }

    fn encode_char(&mut self, c: char) {
        self.buffer.push('\\');
        match c {
            '\n' => self.buffer.push_str("newline"),
            '\r' => self.buffer.push_str("return"),
            ' ' => self.buffer.push_str("space"),
            '\t' => self.buffer.push_str("tab"),
            '\u{8}' => self.buffer.push_str("backspace"),
            '\u{c}' => self.buffer.push_str("formfeed"),
            c if c.is_control() => {
                let _ = write!(self.buffer, "u{:04X}", c as u32);
            }
            c => self.buffer.push(c),
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.buffer.reserve(text.len() + 2);
        self.buffer.push('"');
        for c in text.chars() {
            match c {
                '"' => self.buffer.push_str("\\\""),
                '\\' => self.buffer.push_str("\\\\"),
                '\n' => self.buffer.push_str("\\n"),
                '\r' => self.buffer.push_str("\\r"),
                '\t' => self.buffer.push_str("\\t"),
                '\u{8}' => self.buffer.push_str("\\b"),
                '\u{c}' => self.buffer.push_str("\\f"),
                c if c.is_control() => {
                    let _ = write!(self.buffer, "\\u{:04X}", c as u32);
                }
                c => self.buffer.push(c),
            }
        }
        self.buffer.push('"');
    }

    fn encode_seq(&mut self, open: &str, items: &[Value], close: &str) -> CodecResult<()> {
        self.buffer.push_str(open);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buffer.push(' ');
            }
            self.encode(item)?;
        }
        self.buffer.push_str(close);
        Ok(())
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        self.buffer.push('{');
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                self.buffer.push_str(", ");
            }
            self.encode(key)?;
            self.buffer.push(' ');
            self.encode(value)?;
        }
        self.buffer.push('}');
        Ok(())
    }
}

impl Default for EdnEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that a keyword, symbol or tag name reads back unchanged.
fn check_name(name: &Name, kind: &str) -> CodecResult<()> {
    let parts = name.namespace().into_iter().chain(Some(name.name()));
    for part in parts {
        let mut chars = part.chars();
        let first = chars.next();
        let second = chars.next();
        let valid = match first {
            None => false,
            Some(c) if c.is_ascii_digit() || c == ':' || c == '#' => false,
            Some('+' | '-' | '.') => !second.is_some_and(|c| c.is_ascii_digit()),
            Some(_) => true,
        } && part.chars().all(is_symbol_char);
        if !valid {
            return Err(CodecError::encoding_failed(format!(
                "invalid {kind} name: {name:?}"
            )));
        }
    }
    let literal = matches!(name.name(), "nil" | "true" | "false");
    if kind == "symbol" && literal && name.namespace().is_none() {
        return Err(CodecError::encoding_failed(format!(
            "symbol {} would read back as a literal",
            name.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_scalars() {
        assert_eq!(to_edn(&Value::Nil).unwrap(), "nil");
        assert_eq!(to_edn(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(to_edn(&Value::Integer(-42)).unwrap(), "-42");
        assert_eq!(to_edn(&Value::Float(1.0)).unwrap(), "1.0");
        assert_eq!(to_edn(&Value::Float(-2.5)).unwrap(), "-2.5");
        assert_eq!(to_edn(&Value::Decimal("3.14".into())).unwrap(), "3.14M");
    }

    #[test]
    fn decimal_needs_leading_digit() {
        for bad in [".5", "-.5", "+", "e1", ""] {
            assert!(
                to_edn(&Value::Decimal(bad.into())).is_err(),
                "{bad:?} should not encode"
            );
        }
        let value = Value::Decimal("-0.5".into());
        let text = to_edn(&value).unwrap();
        assert_eq!(text, "-0.5M");
        assert_eq!(crate::from_edn(&text).unwrap(), value);
    }

    #[test]
    fn encode_text_escapes() {
        let value = Value::from("say \"hi\"\n\\");
        assert_eq!(to_edn(&value).unwrap(), r#""say \"hi\"\n\\""#);
    }

    #[test]
    fn encode_chars() {
        assert_eq!(to_edn(&Value::Char('a')).unwrap(), "\\a");
        assert_eq!(to_edn(&Value::Char('\n')).unwrap(), "\\newline");
        assert_eq!(to_edn(&Value::Char(' ')).unwrap(), "\\space");
        assert_eq!(to_edn(&Value::Char('\u{1}')).unwrap(), "\\u0001");
    }

    #[test]
    fn encode_keywords_and_symbols() {
        assert_eq!(to_edn(&Value::keyword("db/alias")).unwrap(), ":db/alias");
        assert_eq!(to_edn(&Value::keyword("find")).unwrap(), ":find");
        assert_eq!(to_edn(&Value::symbol("?e")).unwrap(), "?e");
        assert_eq!(to_edn(&Value::symbol("/")).unwrap(), "/");
    }

    #[test]
    fn encode_collections() {
        let value = Value::vector(vec![
            Value::keyword("find"),
            Value::symbol("?e"),
            Value::List(vec![Value::symbol("inc"), Value::Integer(1)]),
            Value::Set(vec![Value::Integer(2)]),
        ]);
        assert_eq!(to_edn(&value).unwrap(), "[:find ?e (inc 1) #{2}]");
    }

    #[test]
    fn encode_map_in_order() {
        let value = Value::map(vec![
            (Value::keyword("db/alias"), Value::from("dev/mydb")),
            (Value::keyword("a"), Value::Integer(1)),
        ]);
        assert_eq!(to_edn(&value).unwrap(), r#"{:db/alias "dev/mydb", :a 1}"#);
    }

    #[test]
    fn encode_tagged() {
        let value = Value::tagged(
            "db/id",
            Value::vector(vec![Value::keyword("db.part/user"), Value::Integer(-1)]),
        );
        assert_eq!(to_edn(&value).unwrap(), "#db/id [:db.part/user -1]");
    }

    #[test]
    fn reject_non_finite_float() {
        assert!(matches!(
            to_edn(&Value::Float(f64::NAN)),
            Err(CodecError::EncodingFailed { .. })
        ));
        assert!(matches!(
            to_edn(&Value::vector(vec![Value::Float(f64::INFINITY)])),
            Err(CodecError::EncodingFailed { .. })
        ));
    }

    #[test]
    fn reject_invalid_names() {
        assert!(to_edn(&Value::keyword("")).is_err());
        assert!(to_edn(&Value::keyword("has space")).is_err());
        assert!(to_edn(&Value::symbol("1abc")).is_err());
        assert!(to_edn(&Value::symbol("nil")).is_err());
        assert!(to_edn(&Value::symbol("-1x")).is_err());
        assert!(to_edn(&Value::tagged("_x", Value::Nil)).is_err());
    }
}
