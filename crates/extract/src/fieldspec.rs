//! The evolving field spec carried through the extraction loop.
//!
//! A field spec is an ordered mapping from field name to its currently
//! known value. It is the accumulator of the carry-forward loop: the
//! completion service's output for chunk *i* becomes the field spec input
//! for chunk *i+1*, as a full overwrite.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Wire marker for a field the service could not find in the context.
pub const NOT_FOUND_MARKER: &str = "NA";

/// The value state of a single extraction field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A value derived from the document
    Found(String),
    /// Not found in any chunk processed so far; serialized as `"NA"`
    NotFound,
}

impl FieldValue {
    /// The wire representation of this value.
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Found(value) => value,
            FieldValue::NotFound => NOT_FOUND_MARKER,
        }
    }

    /// Whether a value was found.
    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }
}

/// An ordered field-name to value mapping.
///
/// Order of first appearance is preserved, so the consolidated result lists
/// fields the way the caller (or the service) introduced them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSpec {
    fields: Vec<(String, FieldValue)>,
}

impl FieldSpec {
    /// Build a spec from bare field names, all initially not found.
    /// Duplicate names are dropped, keeping the first occurrence.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = FieldSpec::default();
        for name in names {
            let name = name.into();
            if !name.is_empty() && spec.get(&name).is_none() {
                spec.fields.push((name, FieldValue::NotFound));
            }
        }
        spec
    }

    /// Parse a completion-service response into a field spec.
    ///
    /// Accepts a JSON object, optionally wrapped in a markdown code fence.
    /// Every value must be a scalar; `"NA"` and `null` mean not found.
    /// Anything else is malformed output and must not be carried forward.
    pub fn from_json_object(text: &str) -> Result<Self, String> {
        let json_str = strip_code_fence(text);

        let json: Value = serde_json::from_str(&json_str)
            .map_err(|e| format!("not valid JSON: {}", e))?;

        let object = json
            .as_object()
            .ok_or_else(|| "expected a JSON object of key/value pairs".to_string())?;

        let mut fields = Vec::with_capacity(object.len());
        for (name, value) in object {
            let field_value = match value {
                Value::String(s) if s == NOT_FOUND_MARKER => FieldValue::NotFound,
                Value::String(s) => FieldValue::Found(s.clone()),
                Value::Number(n) => FieldValue::Found(n.to_string()),
                Value::Bool(b) => FieldValue::Found(b.to_string()),
                Value::Null => FieldValue::NotFound,
                Value::Array(_) | Value::Object(_) => {
                    return Err(format!("field '{}' has a non-scalar value", name));
                }
            };
            fields.push((name.clone(), field_value));
        }

        Ok(Self { fields })
    }

    /// Parse caller-supplied field-spec text.
    ///
    /// Tries a JSON object first; otherwise treats the text as a list of
    /// field names separated by newlines, commas, or semicolons. Returns
    /// `None` when no field names can be resolved.
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(spec) = Self::from_json_object(text) {
            if !spec.is_empty() {
                return Some(spec);
            }
        }

        let spec = Self::from_names(
            text.split(['\n', ',', ';'])
                .map(|name| name.trim().trim_matches('"'))
                .filter(|name| !name.is_empty()),
        );

        if spec.is_empty() {
            None
        } else {
            Some(spec)
        }
    }

    /// Compact JSON representation, the form threaded through prompts.
    pub fn to_json(&self) -> String {
        // Serialization of a string map cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Pretty JSON representation for display.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Field names in order of first appearance.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the spec has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for FieldSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value.as_str())?;
        }
        map.end()
    }
}

/// Strip a markdown code fence if the response is wrapped in one.
/// LLMs sometimes wrap JSON in ```json blocks despite instructions.
fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return String::new();
        }
        // Skip first line (```json or ```) and last line (```)
        lines[1..lines.len().saturating_sub(1)].join("\n")
    } else {
        trimmed.to_string()
    }
}
