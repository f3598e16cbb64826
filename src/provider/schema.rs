//! Attribute schemas for the provider, its resources and data sources
//!
//! Schemas are declared with a small builder and serialized as-is by the
//! `schema` command. [`Schema::validate`] checks a configuration object
//! against the declaration before any handler runs.

use serde::Serialize;
use serde_json::Value;

use super::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Bool,
    /// List of strings
    List,
    /// Map of string to string
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMode {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub mode: AttributeMode,
    pub description: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_replace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            mode: AttributeMode::Optional,
            description: "",
            sensitive: false,
            requires_replace: false,
            one_of: None,
            default: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, AttributeKind::String)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Bool)
    }

    pub fn list(name: &'static str) -> Self {
        Self::new(name, AttributeKind::List)
    }

    pub fn map(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Map)
    }

    pub fn required(mut self) -> Self {
        self.mode = AttributeMode::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.mode = AttributeMode::Optional;
        self
    }

    pub fn computed(mut self) -> Self {
        self.mode = AttributeMode::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.mode = AttributeMode::OptionalComputed;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn type_matches(&self, value: &Value) -> bool {
        match self.kind {
            AttributeKind::String => value.is_string(),
            AttributeKind::Bool => value.is_boolean(),
            AttributeKind::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            AttributeKind::Map => value
                .as_object()
                .is_some_and(|entries| entries.values().all(Value::is_string)),
        }
    }

    fn type_label(&self) -> &'static str {
        match self.kind {
            AttributeKind::String => "a string",
            AttributeKind::Bool => "a bool",
            AttributeKind::List => "a list of strings",
            AttributeKind::Map => "a map of strings",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(description: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            description,
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check presence, type and allowed values of every declared attribute.
    /// Null counts as absent. Unknown keys are rejected.
    pub fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        let Some(object) = config.as_object() else {
            diags.add_error(
                "Invalid Configuration",
                "Expected the configuration to be a JSON object.",
            );
            return;
        };

        for key in object.keys() {
            if self.attribute(key).is_none() {
                diags.add_attribute_error(
                    key.as_str(),
                    "Unsupported Argument",
                    format!("An argument named \"{}\" is not expected here.", key),
                );
            }
        }

        for attribute in &self.attributes {
            let value = object.get(attribute.name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attribute.mode == AttributeMode::Required {
                    diags.add_attribute_error(
                        attribute.name,
                        "Missing Required Argument",
                        format!(
                            "The argument \"{}\" is required, but no definition was found.",
                            attribute.name
                        ),
                    );
                }
                continue;
            };

            if !attribute.type_matches(value) {
                diags.add_attribute_error(
                    attribute.name,
                    "Incorrect Attribute Type",
                    format!("Attribute \"{}\" must be {}.", attribute.name, attribute.type_label()),
                );
                continue;
            }

            if let (Some(allowed), Some(text)) = (attribute.one_of, value.as_str()) {
                if !allowed.contains(&text) {
                    diags.add_attribute_error(
                        attribute.name,
                        "Invalid Attribute Value Match",
                        format!(
                            "Attribute {} value must be one of: [{}], got: \"{}\"",
                            attribute.name,
                            allowed
                                .iter()
                                .map(|v| format!("\"{}\"", v))
                                .collect::<Vec<_>>()
                                .join(" "),
                            text
                        ),
                    );
                }
            }
        }
    }

    /// Fill absent attributes that declare a default
    pub fn apply_defaults(&self, config: &mut Value) {
        let Some(object) = config.as_object_mut() else {
            return;
        };
        for attribute in &self.attributes {
            if let Some(default) = &attribute.default {
                let slot = object.entry(attribute.name).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = default.clone();
                }
            }
        }
    }
}
