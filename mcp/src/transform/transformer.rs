//! Per-tool rewrite applied before a tool enters the index.

use std::{borrow::Cow, sync::Arc};

use serde_json::Value;

use crate::core::config::{JsonObject, NamespacingConfig, Tool, UpstreamConfig};

/// Longest description kept after compression, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 100;

const ELLIPSIS: char = '…';

/// Characters that end a sentence, ASCII and full-width.
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Property keys stripped from input schemas.
const STRIPPED_PROPERTY_KEYS: [&str; 2] = ["description", "title"];

/// Rewrites upstream tools into their compact, externally visible form.
pub struct ToolTransformer;

impl ToolTransformer {
    /// Produce the public descriptor for `tool` as served by `upstream`.
    ///
    /// Only name, description and input schema survive; titles, annotations
    /// and output schemas are not part of the compact surface.
    pub fn transform(
        tool: &Tool,
        upstream: &UpstreamConfig,
        namespacing: &NamespacingConfig,
    ) -> Tool {
        let original_name: &str = &tool.name;
        let description = match upstream.description_override(original_name) {
            Some(text) => text.to_string(),
            None => Self::compress_description(tool.description.as_deref()),
        };

        Tool {
            name: Cow::Owned(Self::public_name(&upstream.name, original_name, namespacing)),
            title: None,
            description: Some(Cow::Owned(description)),
            input_schema: Arc::new(Self::compress_schema(&tool.input_schema)),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }

    pub fn public_name(upstream: &str, original: &str, namespacing: &NamespacingConfig) -> String {
        if namespacing.enabled {
            format!("{}{}{}", upstream, namespacing.separator, original)
        } else {
            original.to_string()
        }
    }

    /// Keep the first sentence, capped at [`MAX_DESCRIPTION_CHARS`].
    pub fn compress_description(description: Option<&str>) -> String {
        let Some(text) = description else {
            return String::new();
        };

        let first_sentence = match text.find(&SENTENCE_TERMINATORS[..]) {
            Some(idx) => &text[..idx],
            None => text,
        };

        if first_sentence.chars().count() <= MAX_DESCRIPTION_CHARS {
            return first_sentence.to_string();
        }

        let mut truncated: String = first_sentence
            .chars()
            .take(MAX_DESCRIPTION_CHARS - 3)
            .collect();
        truncated.push(ELLIPSIS);
        truncated
    }

    /// Rebuild the top level of an input schema.
    ///
    /// Keeps `type: "object"`, each property minus its `description`/`title`,
    /// and `required`. Anything below a property is copied untouched.
    pub fn compress_schema(schema: &JsonObject) -> JsonObject {
        let mut compressed = JsonObject::new();
        compressed.insert("type".to_string(), Value::String("object".to_string()));

        if let Some(Value::Object(properties)) = schema.get("properties") {
            let stripped = properties
                .iter()
                .map(|(key, value)| (key.clone(), Self::strip_property(value)))
                .collect::<JsonObject>();
            compressed.insert("properties".to_string(), Value::Object(stripped));
        }

        if let Some(required) = schema.get("required") {
            compressed.insert("required".to_string(), required.clone());
        }

        compressed
    }

    fn strip_property(value: &Value) -> Value {
        match value {
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .filter(|(key, _)| !STRIPPED_PROPERTY_KEYS.contains(&key.as_str()))
                    .map(|(key, v)| (key.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tool(name: &str, description: Option<&str>, schema: Value) -> Tool {
        let Value::Object(schema) = schema else {
            panic!("schema fixture must be an object");
        };
        Tool {
            name: Cow::Owned(name.to_string()),
            title: Some("Fancy title".to_string()),
            description: description.map(|d| Cow::Owned(d.to_string())),
            input_schema: Arc::new(schema),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }

    fn terminator_count(s: &str) -> usize {
        s.chars().filter(|c| SENTENCE_TERMINATORS.contains(c)).count()
    }

    #[test]
    fn test_first_sentence_is_kept() {
        assert_eq!(
            ToolTransformer::compress_description(Some("Reads a file. Returns text.")),
            "Reads a file"
        );
        assert_eq!(
            ToolTransformer::compress_description(Some("Really? Yes!")),
            "Really"
        );
        assert_eq!(
            ToolTransformer::compress_description(Some("ファイルを読む。テキストを返す。")),
            "ファイルを読む"
        );
    }

    #[test]
    fn test_missing_description_becomes_empty() {
        assert_eq!(ToolTransformer::compress_description(None), "");
        assert_eq!(ToolTransformer::compress_description(Some("")), "");
    }

    #[test]
    fn test_description_without_terminator_is_kept_whole() {
        assert_eq!(
            ToolTransformer::compress_description(Some("List directory entries")),
            "List directory entries"
        );
    }

    #[test]
    fn test_exactly_max_length_is_not_truncated() {
        let text = "a".repeat(MAX_DESCRIPTION_CHARS);
        assert_eq!(ToolTransformer::compress_description(Some(&text)), text);
    }

    #[test]
    fn test_long_sentence_is_truncated_with_ellipsis() {
        let text = format!("{}. Second sentence.", "x".repeat(250));
        let out = ToolTransformer::compress_description(Some(&text));
        assert_eq!(out.chars().count(), 98);
        assert!(out.ends_with(ELLIPSIS));
        assert!(out.starts_with(&"x".repeat(97)));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "é".repeat(150);
        let out = ToolTransformer::compress_description(Some(&text));
        assert_eq!(out.chars().count(), 98);
        assert!(out.chars().count() <= MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_compressed_description_bounds_hold() {
        let samples = [
            "One. Two. Three.",
            "Does things! Many things? Yes.",
            "長い説明。さらに説明！",
            "No terminator at all but quite a lot of words that keep going and going and going past the limit of one hundred characters",
            "...",
            "?!",
        ];
        for sample in samples {
            let out = ToolTransformer::compress_description(Some(sample));
            assert!(terminator_count(&out) <= 1, "{:?} -> {:?}", sample, out);
            assert!(out.chars().count() <= MAX_DESCRIPTION_CHARS);
        }
    }

    #[test]
    fn test_schema_strips_property_docs_only() {
        let schema = json!({
            "type": "object",
            "title": "Args",
            "description": "top level text",
            "properties": {
                "path": {"type": "string", "description": "the path", "title": "Path"},
                "mode": {"type": "string", "enum": ["r", "w"], "default": "r"},
                "opts": {
                    "type": "object",
                    "properties": {"deep": {"type": "boolean", "description": "kept"}}
                }
            },
            "required": ["path"],
            "additionalProperties": false
        });
        let Value::Object(schema) = schema else { unreachable!() };

        let out = ToolTransformer::compress_schema(&schema);
        assert_eq!(
            Value::Object(out),
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "mode": {"type": "string", "enum": ["r", "w"], "default": "r"},
                    "opts": {
                        "type": "object",
                        "properties": {"deep": {"type": "boolean", "description": "kept"}}
                    }
                },
                "required": ["path"]
            })
        );
    }

    #[test]
    fn test_schema_without_properties() {
        let out = ToolTransformer::compress_schema(&JsonObject::new());
        assert_eq!(Value::Object(out), json!({"type": "object"}));
    }

    #[test]
    fn test_public_name_follows_namespacing() {
        let mut namespacing = NamespacingConfig::default();
        assert_eq!(
            ToolTransformer::public_name("fs", "read_file", &namespacing),
            "fs__read_file"
        );

        namespacing.separator = ".".to_string();
        assert_eq!(
            ToolTransformer::public_name("fs", "read_file", &namespacing),
            "fs.read_file"
        );

        namespacing.enabled = false;
        assert_eq!(
            ToolTransformer::public_name("fs", "read_file", &namespacing),
            "read_file"
        );
    }

    #[test]
    fn test_override_wins_verbatim() {
        let upstream = UpstreamConfig::stdio("fs", "fs-server")
            .with_description_override("read_file", "Custom. Text! Kept as is?");
        let original = tool("read_file", Some("Reads a file. Returns text."), json!({}));

        let out = ToolTransformer::transform(&original, &upstream, &NamespacingConfig::default());
        assert_eq!(out.name, "fs__read_file");
        assert_eq!(out.description.as_deref(), Some("Custom. Text! Kept as is?"));
    }

    #[test]
    fn test_transform_drops_extra_metadata() {
        let upstream = UpstreamConfig::stdio("fs", "fs-server");
        let original = tool(
            "read_file",
            Some("Reads a file. Returns text."),
            json!({"properties": {"path": {"type": "string", "description": "the path"}}}),
        );

        let out = ToolTransformer::transform(&original, &upstream, &NamespacingConfig::default());
        assert_eq!(out.description.as_deref(), Some("Reads a file"));
        assert!(out.title.is_none());
        assert_eq!(
            Value::Object((*out.input_schema).clone()),
            json!({"type": "object", "properties": {"path": {"type": "string"}}})
        );
    }
}
