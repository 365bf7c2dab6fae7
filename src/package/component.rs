//! Source files stored inside a package
//!
//! A component is either a structured tree produced by a [`SourceParser`]
//! (only program-equivalent on the way back out) or an opaque copy of the
//! file's bytes, base64 encoded so it survives text-only transport and
//! decodes to exactly the original bytes.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{NccError, Result, codec};
use crate::serializer::{self, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentFlag {
    Structured,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Path relative to the project's source directory, `/` separated
    pub path: String,
    pub flag: ComponentFlag,
    #[serde(with = "crate::serializer::bytes")]
    pub data: Vec<u8>,
}

/// What a component decodes back into
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentContent {
    Bytes(Vec<u8>),
    Tree(Value),
}

/// Turns source text into a tree and back
pub trait SourceParser: Send + Sync {
    /// Whether files with this extension should be stored structured
    fn handles(&self, extension: &str) -> bool;

    fn parse(&self, text: &str) -> Result<Value>;

    fn emit(&self, tree: &Value) -> Result<String>;
}

impl Component {
    /// Read `path` and store it under `relative` with the requested encoding
    ///
    /// Structured encoding fails with an EncodingError when the parser rejects
    /// the file; callers may retry with [`ComponentFlag::Opaque`].
    pub fn encode(
        path: &Path,
        relative: &str,
        flag: ComponentFlag,
        parser: &dyn SourceParser,
    ) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| NccError::io(path, e))?;
        let data = match flag {
            ComponentFlag::Opaque => STANDARD.encode(&bytes).into_bytes(),
            ComponentFlag::Structured => {
                let text = std::str::from_utf8(&bytes).map_err(|_| {
                    codec::encoding("component", format!("'{relative}' is not UTF-8 text"))
                })?;
                let tree = parser.parse(text).map_err(|e| {
                    codec::encoding("component", format!("cannot parse '{relative}': {e}"))
                })?;
                serializer::encode(&tree)?
            }
        };

        Ok(Self {
            path: relative.to_string(),
            flag,
            data,
        })
    }

    /// Encode structured when the parser claims the extension, falling back to opaque
    pub fn encode_auto(path: &Path, relative: &str, parser: &dyn SourceParser) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if parser.handles(extension) {
            match Self::encode(path, relative, ComponentFlag::Structured, parser) {
                Ok(component) => return Ok(component),
                Err(e) => {
                    tracing::warn!(component = relative, error = %e, "Storing component as opaque");
                }
            }
        }
        Self::encode(path, relative, ComponentFlag::Opaque, parser)
    }

    pub fn decode(&self) -> Result<ComponentContent> {
        match self.flag {
            ComponentFlag::Opaque => STANDARD
                .decode(&self.data)
                .map(ComponentContent::Bytes)
                .map_err(|e| codec::decoding(0, format!("component '{}': {e}", self.path))),
            ComponentFlag::Structured => serializer::decode(&self.data).map(ComponentContent::Tree),
        }
    }

    /// Reproduce source text (or bytes) for this component
    pub fn source_bytes(&self, parser: &dyn SourceParser) -> Result<Vec<u8>> {
        match self.decode()? {
            ComponentContent::Bytes(bytes) => Ok(bytes),
            ComponentContent::Tree(tree) => parser.emit(&tree).map(String::into_bytes),
        }
    }
}

/// Built-in parse capability for JSON documents
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl SourceParser for JsonParser {
    fn handles(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("json")
    }

    fn parse(&self, text: &str) -> Result<Value> {
        let json: serde_json::Value = serde_json::from_str(text).map_err(|e| NccError::Validation {
            message: format!("invalid JSON: {e}"),
        })?;
        Ok(json_to_value(json))
    }

    fn emit(&self, tree: &Value) -> Result<String> {
        let json = value_to_json(tree)?;
        serde_json::to_string_pretty(&json).map_err(|e| codec::encoding("tree", e.to_string()))
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::String(k), json_to_value(v)))
                .collect(),
        ),
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => {
            if let Ok(i) = i64::try_from(*n) {
                serde_json::Value::from(i)
            } else if let Ok(u) = u64::try_from(*n) {
                serde_json::Value::from(u)
            } else {
                return Err(codec::encoding("integer", format!("{n} does not fit JSON")));
            }
        }
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| codec::encoding("float", format!("{x} does not fit JSON")))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect::<Result<_>>()?)
        }
        Value::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                let key = k
                    .as_str()
                    .ok_or_else(|| codec::encoding(k.kind(), "JSON object keys must be strings"))?;
                map.insert(key.to_string(), value_to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        other @ (Value::Binary(_) | Value::Ext { .. }) => {
            return Err(codec::encoding(other.kind(), "no JSON representation"));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_opaque_is_byte_exact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logo.bin");
        let bytes: Vec<u8> = (0..=255).collect();
        std::fs::write(&path, &bytes).unwrap();

        let component = Component::encode(&path, "logo.bin", ComponentFlag::Opaque, &JsonParser).unwrap();
        assert!(std::str::from_utf8(&component.data).is_ok());
        assert_eq!(component.decode().unwrap(), ComponentContent::Bytes(bytes));
    }

    #[test]
    fn test_structured_json_is_equivalent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"name": "x",   "deps": [1, 2, 3]}"#).unwrap();

        let component =
            Component::encode(&path, "config.json", ComponentFlag::Structured, &JsonParser).unwrap();
        let ComponentContent::Tree(tree) = component.decode().unwrap() else {
            panic!("expected a tree");
        };
        assert_eq!(tree.get("name"), Some(&Value::from("x")));

        let emitted = component.source_bytes(&JsonParser).unwrap();
        let reparsed: serde_json::Value = serde_json::from_slice(&emitted).unwrap();
        assert_eq!(reparsed, serde_json::json!({"name": "x", "deps": [1, 2, 3]}));
    }

    #[test]
    fn test_structured_parse_failure_is_encoding_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Component::encode(&path, "broken.json", ComponentFlag::Structured, &JsonParser)
            .unwrap_err();
        assert!(matches!(err, NccError::Encoding { .. }));

        let component = Component::encode_auto(&path, "broken.json", &JsonParser).unwrap();
        assert_eq!(component.flag, ComponentFlag::Opaque);
        assert_eq!(component.source_bytes(&JsonParser).unwrap(), b"{not json");
    }

    #[test]
    fn test_auto_leaves_unclaimed_extensions_opaque() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.sh");
        std::fs::write(&path, "echo hi\n").unwrap();

        let component = Component::encode_auto(&path, "main.sh", &JsonParser).unwrap();
        assert_eq!(component.flag, ComponentFlag::Opaque);
    }
}
