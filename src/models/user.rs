use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub customer_id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl User {
    /// Single-valued view of the attribute map: the first value of each key
    pub fn first_attribute_values(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter_map(|(key, values)| values.first().map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Expand a single-valued attribute map into the wire format
    pub fn attributes_from(values: &BTreeMap<String, String>) -> BTreeMap<String, Vec<String>> {
        values
            .iter()
            .map(|(key, value)| (key.clone(), vec![value.clone()]))
            .collect()
    }
}
