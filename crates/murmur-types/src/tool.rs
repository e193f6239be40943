//! Tool definitions as exposed to the speech model.
//!
//! The serialized form matches the realtime session `tools` array:
//! `{"type":"function","name":…,"description":…,"parameters":{…}}`.
//! Property maps are ordered (`BTreeMap`) so that serializing the same
//! definition twice yields byte-identical JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of tool. Only function tools are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Function,
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    /// Creates a function tool with an empty parameter object.
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: ToolKind::Function,
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::default(),
        }
    }

    /// Adds a property; `required` also lists it in the schema's required set.
    pub fn with_property(mut self, name: &str, property: PropertySchema, required: bool) -> Self {
        self.parameters
            .properties
            .insert(name.to_string(), property);
        if required && !self.parameters.required.iter().any(|r| r == name) {
            self.parameters.required.push(name.to_string());
        }
        self
    }
}

/// JSON-schema-like object description of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

/// One property in a [`ParameterSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn typed(kind: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: Some(description.to_string()),
            allowed: None,
            items: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::typed("string", description)
    }

    pub fn integer(description: &str) -> Self {
        Self::typed("integer", description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::typed("boolean", description)
    }

    /// A string restricted to the given values.
    pub fn one_of(description: &str, values: &[&str]) -> Self {
        Self {
            allowed: Some(values.iter().map(|v| v.to_string()).collect()),
            ..Self::typed("string", description)
        }
    }

    /// An array of strings.
    pub fn string_list(description: &str) -> Self {
        Self {
            items: Some(Box::new(Self {
                kind: "string".to_string(),
                description: None,
                allowed: None,
                items: None,
            })),
            ..Self::typed("array", description)
        }
    }
}
