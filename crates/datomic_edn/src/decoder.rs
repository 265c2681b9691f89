//! EDN text decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{Name, Value};

/// Decode exactly one value from EDN text.
///
/// Leading and trailing whitespace, commas, `;` comments and `#_`
/// discarded forms are ignored.
///
/// # Errors
///
/// Returns an error if the text is not a single well-formed EDN value.
pub fn from_edn(input: &str) -> CodecResult<Value> {
    let mut decoder = EdnDecoder::new(input);
    let value = decoder.decode()?;
    decoder.skip_whitespace()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingInput {
            offset: decoder.pos,
        });
    }
    Ok(value)
}

/// Maximum nesting depth of collections and tagged elements.
/// Guards the recursive reader against stack exhaustion on hostile input.
const MAX_DEPTH: usize = 128;

/// Returns true if `c` may appear inside a symbol or keyword name.
pub(crate) fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || ".*+!-_?$%&=<>/:#'".contains(c)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\\')
}

/// A streaming EDN reader over a string slice.
pub struct EdnDecoder<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> EdnDecoder<'a> {
    /// Create a new decoder for the given text.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    /// Check if all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Get the unread input.
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.skip_whitespace()?;
        let offset = self.pos;
        let c = self.peek().ok_or(CodecError::UnexpectedEof)?;

        match c {
            '(' => self.nested(|d| d.decode_seq(')').map(Value::List)),
            '[' => self.nested(|d| d.decode_seq(']').map(Value::Vector)),
            '{' => self.nested(Self::decode_map),
            '"' => self.decode_string(),
            '\\' => self.decode_char(),
            ':' => self.decode_keyword(),
            '#' => self.decode_dispatch(),
            '+' | '-' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                self.decode_number()
            }
            c if c.is_ascii_digit() => self.decode_number(),
            c if is_symbol_char(c) => self.decode_symbol(),
            ch => Err(CodecError::UnexpectedChar { ch, offset }),
        }
    }

    /// Skip whitespace, commas, comments and `#_` discarded forms.
    pub fn skip_whitespace(&mut self) -> CodecResult<()> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c == '#' && self.peek_second() == Some('_') {
                self.pos += 2;
                self.nested(Self::decode)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline]
    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    #[inline]
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Reads up to the next delimiter.
    fn read_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn nested<F>(&mut self, read: F) -> CodecResult<Value>
    where
        F: FnOnce(&mut Self) -> CodecResult<Value>,
    {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::invalid_structure(format!(
                "nesting deeper than {MAX_DEPTH}"
            )));
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// Reads forms until `close`; the opening delimiter is consumed here.
    fn decode_seq(&mut self, close: char) -> CodecResult<Vec<Value>> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some(c) if c == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(_) => items.push(self.decode()?),
            }
        }
    }

    fn decode_map(&mut self) -> CodecResult<Value> {
        let items = self.decode_seq('}')?;
        if items.len() % 2 != 0 {
            return Err(CodecError::invalid_structure(
                "map literal must contain an even number of forms",
            ));
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((k, v));
        }
        Ok(Value::Map(pairs))
    }

    fn decode_dispatch(&mut self) -> CodecResult<Value> {
        let offset = self.pos;
        self.bump();
        match self.peek() {
            Some('{') => self.nested(|d| d.decode_seq('}').map(Value::Set)),
            Some('#') => {
                self.bump();
                match self.read_token() {
                    "Inf" => Ok(Value::Float(f64::INFINITY)),
                    "-Inf" => Ok(Value::Float(f64::NEG_INFINITY)),
                    "NaN" => Ok(Value::Float(f64::NAN)),
                    other => Err(CodecError::invalid_structure(format!(
                        "unknown symbolic value ##{other}"
                    ))),
                }
            }
            Some(c) if c.is_alphabetic() => {
                let tag = self.read_token();
                if !tag.chars().all(is_symbol_char) {
                    return Err(CodecError::invalid_structure(format!("invalid tag #{tag}")));
                }
                let tag = Name::parse(tag);
                self.nested(|d| d.decode().map(|inner| Value::Tagged(tag, Box::new(inner))))
            }
            Some(ch) => Err(CodecError::UnexpectedChar {
                ch,
                offset: offset + 1,
            }),
            None => Err(CodecError::UnexpectedEof),
        }
    }

    fn decode_number(&mut self) -> CodecResult<Value> {
        let token = self.read_token();
        if let Some(digits) = token.strip_suffix('M') {
            return match digits.parse::<f64>() {
                Ok(_) if digits.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') => {
                    Ok(Value::Decimal(digits.to_string()))
                }
                _ => Err(CodecError::invalid_number(token)),
            };
        }
        if let Some(digits) = token.strip_suffix('N') {
            return digits
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| CodecError::invalid_number(token));
        }
        if token.contains(['.', 'e', 'E']) {
            return token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CodecError::invalid_number(token));
        }
        token
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| CodecError::invalid_number(token))
    }

    fn decode_symbol(&mut self) -> CodecResult<Value> {
        let offset = self.pos;
        let token = self.read_token();
        if let Some((i, ch)) = token.char_indices().find(|(_, c)| !is_symbol_char(*c)) {
            return Err(CodecError::UnexpectedChar {
                ch,
                offset: offset + i,
            });
        }
        Ok(match token {
            "nil" => Value::Nil,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Symbol(Name::parse(token)),
        })
    }

    fn decode_keyword(&mut self) -> CodecResult<Value> {
        self.bump();
        let token = self.read_token();
        if token.is_empty() || token.starts_with(':') || !token.chars().all(is_symbol_char) {
            return Err(CodecError::invalid_structure(format!("invalid keyword :{token}")));
        }
        Ok(Value::Keyword(Name::parse(token)))
    }

    fn decode_string(&mut self) -> CodecResult<Value> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump().ok_or(CodecError::UnexpectedEof)? {
                '"' => return Ok(Value::Text(text)),
                '\\' => {
                    let escape = self.bump().ok_or(CodecError::UnexpectedEof)?;
                    match escape {
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        'n' => text.push('\n'),
                        'b' => text.push('\u{8}'),
                        'f' => text.push('\u{c}'),
                        '\\' => text.push('\\'),
                        '"' => text.push('"'),
                        'u' => text.push(self.read_unicode_escape()?),
                        other => return Err(CodecError::invalid_escape(format!("\\{other}"))),
                    }
                }
                c => text.push(c),
            }
        }
    }

    fn read_unicode_escape(&mut self) -> CodecResult<char> {
        let end = self.pos + 4;
        let hex = self
            .input
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        let c = u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| CodecError::invalid_escape(format!("\\u{hex}")))?;
        self.pos = end;
        Ok(c)
    }

    fn decode_char(&mut self) -> CodecResult<Value> {
        self.bump();
        let start = self.pos;
        let first = self.bump().ok_or(CodecError::UnexpectedEof)?;
        while self.peek().is_some_and(char::is_alphanumeric) {
            self.bump();
        }
        let text = &self.input[start..self.pos];
        if text.len() == first.len_utf8() {
            return Ok(Value::Char(first));
        }
        let c = match text {
            "newline" => '\n',
            "return" => '\r',
            "space" => ' ',
            "tab" => '\t',
            "backspace" => '\u{8}',
            "formfeed" => '\u{c}',
            _ => text
                .strip_prefix('u')
                .filter(|hex| hex.len() == 4)
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .and_then(char::from_u32)
                .ok_or_else(|| CodecError::invalid_escape(format!("\\{text}")))?,
        };
        Ok(Value::Char(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_scalars() {
        assert_eq!(from_edn("nil").unwrap(), Value::Nil);
        assert_eq!(from_edn("true").unwrap(), Value::Bool(true));
        assert_eq!(from_edn("false").unwrap(), Value::Bool(false));
        assert_eq!(from_edn("42").unwrap(), Value::Integer(42));
        assert_eq!(from_edn("-7").unwrap(), Value::Integer(-7));
        assert_eq!(from_edn("+7").unwrap(), Value::Integer(7));
        assert_eq!(from_edn("12N").unwrap(), Value::Integer(12));
        assert_eq!(from_edn("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(from_edn("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(from_edn("2.50M").unwrap(), Value::Decimal("2.50".into()));
    }

    #[test]
    fn decode_strings() {
        assert_eq!(from_edn(r#""""#).unwrap(), Value::from(""));
        assert_eq!(
            from_edn(r#""a \"b\"\nA""#).unwrap(),
            Value::from("a \"b\"\nA")
        );
        assert!(matches!(
            from_edn(r#""\q""#),
            Err(CodecError::InvalidEscape { .. })
        ));
        assert!(matches!(from_edn(r#""open"#), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn decode_chars() {
        assert_eq!(from_edn("\\a").unwrap(), Value::Char('a'));
        assert_eq!(from_edn("\\newline").unwrap(), Value::Char('\n'));
        assert_eq!(from_edn("\\u0041").unwrap(), Value::Char('A'));
        assert_eq!(from_edn("\\(").unwrap(), Value::Char('('));
        assert_eq!(
            from_edn("[\\a \\b]").unwrap(),
            Value::vector(vec![Value::Char('a'), Value::Char('b')])
        );
        assert!(from_edn("\\bogus").is_err());
    }

    #[test]
    fn decode_keywords_and_symbols() {
        assert_eq!(from_edn(":db/id").unwrap(), Value::keyword("db/id"));
        assert_eq!(from_edn(":find").unwrap(), Value::keyword("find"));
        assert_eq!(from_edn("?e").unwrap(), Value::symbol("?e"));
        assert_eq!(from_edn("-").unwrap(), Value::symbol("-"));
        assert_eq!(from_edn("datomic.api/q").unwrap(), Value::symbol("datomic.api/q"));
        assert!(from_edn(":").is_err());
        assert!(from_edn("::x").is_err());
    }

    #[test]
    fn decode_collections() {
        let value = from_edn("[:find ?e :where [?e :db/ident]]").unwrap();
        assert_eq!(
            value,
            Value::vector(vec![
                Value::keyword("find"),
                Value::symbol("?e"),
                Value::keyword("where"),
                Value::vector(vec![Value::symbol("?e"), Value::keyword("db/ident")]),
            ])
        );

        assert_eq!(
            from_edn("(1 2)").unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            from_edn("#{:a}").unwrap(),
            Value::Set(vec![Value::keyword("a")])
        );
    }

    #[test]
    fn decode_map_with_commas() {
        let value = from_edn(r#"{:db/alias "dev/mydb", :a 1}"#).unwrap();
        assert_eq!(value.get_keyword("db/alias"), Some(&Value::from("dev/mydb")));
        assert_eq!(value.get_keyword("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn decode_tagged() {
        let value = from_edn(r#"#inst "2013-01-01T00:00:00.000-00:00""#).unwrap();
        assert_eq!(
            value,
            Value::tagged("inst", Value::from("2013-01-01T00:00:00.000-00:00"))
        );
        let value = from_edn("#db/id [:db.part/user -1]").unwrap();
        assert!(matches!(value, Value::Tagged(ref tag, _) if tag.to_string() == "db/id"));
    }

    #[test]
    fn decode_skips_comments_and_discards() {
        let value = from_edn("; leading\n[1 #_2 3 #_ 4] ; trailing").unwrap();
        assert_eq!(
            value,
            Value::vector(vec![Value::Integer(1), Value::Integer(3)])
        );
    }

    #[test]
    fn decode_symbolic_floats() {
        assert_eq!(from_edn("##Inf").unwrap(), Value::Float(f64::INFINITY));
        assert!(from_edn("##NaN").unwrap().as_float().unwrap().is_nan());
    }

    #[test]
    fn reject_malformed_input() {
        assert!(matches!(from_edn(""), Err(CodecError::UnexpectedEof)));
        assert!(matches!(from_edn("[1 2"), Err(CodecError::UnexpectedEof)));
        assert!(matches!(
            from_edn("]"),
            Err(CodecError::UnexpectedChar { ch: ']', offset: 0 })
        ));
        assert!(matches!(
            from_edn("{:a}"),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            from_edn("1 2"),
            Err(CodecError::TrailingInput { offset: 2 })
        ));
        assert!(matches!(
            from_edn("12abc"),
            Err(CodecError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn reject_excessive_nesting() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            from_edn(&deep),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_excessive_discard_chain() {
        let chained = "#_".repeat(200_000) + "1";
        assert!(matches!(
            from_edn(&chained),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert_eq!(from_edn("#_ #_ 1 2 3").unwrap(), Value::Integer(3));
    }

    #[test]
    fn decoder_reads_successive_values() {
        let mut decoder = EdnDecoder::new("1 :two");
        assert_eq!(decoder.decode().unwrap(), Value::Integer(1));
        assert_eq!(decoder.remaining(), " :two");
        assert_eq!(decoder.decode().unwrap(), Value::keyword("two"));
        decoder.skip_whitespace().unwrap();
        assert!(decoder.is_empty());
    }
}
