//! A tiny typed JSON path-expression evaluator.
//!
//! Response-parsing (`choices[0].message.content`, `content[0].text`,
//! `response`) and model-catalog field extraction are both expressed as
//! path strings in `ProviderConfig`. Reflection has no purchase here —
//! `serde_json::Value` is already a dynamic tree — so a minimal grammar
//! (`ident(.ident | [int])*`) is enough and keeps provider configs
//! declarative instead of requiring a closure per provider.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
}

/// A parsed, reusable path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonPathError {
    #[error("empty path expression")]
    Empty,
    #[error("invalid path expression: {0}")]
    Syntax(String),
}

impl JsonPath {
    /// Parse `ident(.ident | [int])*` into a reusable path.
    pub fn parse(expr: &str) -> Result<Self, JsonPathError> {
        if expr.is_empty() {
            return Err(JsonPathError::Empty);
        }
        let mut segments = Vec::new();
        let mut chars = expr.chars().peekable();
        let mut current = String::new();

        fn flush(current: &mut String, segments: &mut Vec<Segment>) {
            if !current.is_empty() {
                segments.push(Segment::Field(std::mem::take(current)));
            }
        }

        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    flush(&mut current, &mut segments);
                    chars.next();
                }
                '[' => {
                    flush(&mut current, &mut segments);
                    chars.next();
                    let mut digits = String::new();
                    for d in chars.by_ref() {
                        if d == ']' {
                            break;
                        }
                        digits.push(d);
                    }
                    let idx = digits
                        .parse::<usize>()
                        .map_err(|_| JsonPathError::Syntax(format!("bad index '[{digits}]'")))?;
                    segments.push(Segment::Index(idx));
                }
                _ => {
                    current.push(c);
                    chars.next();
                }
            }
        }
        flush(&mut current, &mut segments);

        if segments.is_empty() {
            return Err(JsonPathError::Empty);
        }
        Ok(Self { segments })
    }

    /// Evaluate this path against a JSON value. Returns `None` if any
    /// segment fails to resolve (missing field, out-of-bounds index, or
    /// indexing into a non-container).
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                Segment::Field(name) => current.get(name)?,
                Segment::Index(idx) => current.get(idx)?,
            };
        }
        Some(current)
    }

    /// Convenience: evaluate and coerce to a string slice.
    pub fn get_str<'a>(&self, root: &'a Value) -> Option<&'a str> {
        self.get(root)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_field_and_index() {
        let path = JsonPath::parse("choices[0].message.content").unwrap();
        let value = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(path.get_str(&value), Some("hi"));
    }

    #[test]
    fn parses_plain_field() {
        let path = JsonPath::parse("response").unwrap();
        let value = json!({"response": "ok"});
        assert_eq!(path.get_str(&value), Some("ok"));
    }

    #[test]
    fn parses_leading_index() {
        let path = JsonPath::parse("content[0].text").unwrap();
        let value = json!({"content": [{"text": "world"}]});
        assert_eq!(path.get_str(&value), Some("world"));
    }

    #[test]
    fn missing_field_resolves_to_none() {
        let path = JsonPath::parse("choices[0].message.content").unwrap();
        let value = json!({"choices": []});
        assert_eq!(path.get(&value), None);
    }

    #[test]
    fn empty_expression_is_an_error() {
        assert!(matches!(JsonPath::parse(""), Err(JsonPathError::Empty)));
    }

    #[test]
    fn null_leaf_resolves_but_is_null() {
        let path = JsonPath::parse("data").unwrap();
        let value = json!({"data": null});
        assert_eq!(path.get(&value), Some(&Value::Null));
    }
}
