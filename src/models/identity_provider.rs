use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PrismError;

/// Supported federation types; also the path segment of the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderType {
    Google,
    Microsoft,
    Keycloak,
    Custom,
}

impl IdentityProviderType {
    pub const ALL: [IdentityProviderType; 4] = [
        IdentityProviderType::Google,
        IdentityProviderType::Microsoft,
        IdentityProviderType::Keycloak,
        IdentityProviderType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProviderType::Google => "google",
            IdentityProviderType::Microsoft => "microsoft",
            IdentityProviderType::Keycloak => "keycloak",
            IdentityProviderType::Custom => "custom",
        }
    }

    /// Config keys that must be present
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            IdentityProviderType::Google => &["clientId", "clientSecret"],
            IdentityProviderType::Microsoft => &["clientId", "clientSecret", "tenantId"],
            IdentityProviderType::Keycloak => {
                &["clientId", "clientSecret", "authServerUrl", "targetRealm"]
            }
            IdentityProviderType::Custom => &[
                "clientId",
                "clientSecret",
                "authorizationUrl",
                "tokenUrl",
                "issuer",
            ],
        }
    }

    /// Config keys forwarded when present
    pub fn optional_keys(&self) -> &'static [&'static str] {
        match self {
            IdentityProviderType::Google => &["hostedDomain"],
            IdentityProviderType::Microsoft | IdentityProviderType::Keycloak => &[],
            IdentityProviderType::Custom => {
                &["authServerUrl", "userInfoUrl", "logoutUrl", "providerName"]
            }
        }
    }

    /// Values the backend insists on for this type
    fn forced_fields(&self) -> Vec<(&'static str, Value)> {
        match self {
            IdentityProviderType::Google => vec![
                ("trustEmail", Value::Bool(true)),
                ("storeToken", Value::Bool(false)),
                ("addReadTokenRoleOnCreate", Value::Bool(false)),
                ("syncMode", Value::String("FORCE".to_string())),
            ],
            IdentityProviderType::Microsoft => vec![
                ("trustEmail", Value::Bool(true)),
                ("storeToken", Value::Bool(false)),
                ("syncMode", Value::String("FORCE".to_string())),
            ],
            IdentityProviderType::Keycloak | IdentityProviderType::Custom => Vec::new(),
        }
    }

    /// Names of required keys missing from `config`, in declaration order
    pub fn missing_keys(&self, config: &BTreeMap<String, String>) -> Vec<&'static str> {
        self.required_keys()
            .iter()
            .copied()
            .filter(|key| config.get(*key).is_none_or(|v| v.is_empty()))
            .collect()
    }
}

impl fmt::Display for IdentityProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityProviderType {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdentityProviderType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                PrismError::validation(
                    "type",
                    format!(
                        "expected one of google, microsoft, keycloak, custom, got '{}'",
                        s
                    ),
                )
            })
    }
}

/// Identity provider as the rest of the crate sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: IdentityProviderType,
    pub alias: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl IdentityProvider {
    /// Request body for create and update: config keys are lifted to the top
    /// level and the type's forced fields are added
    pub fn request_body(&self) -> Map<String, Value> {
        let mut body = Map::new();

        if !self.display_name.is_empty() {
            body.insert(
                "displayName".to_string(),
                Value::String(self.display_name.clone()),
            );
        }
        body.insert("enabled".to_string(), Value::Bool(self.enabled));

        let t = self.provider_type;
        for key in t.required_keys().iter().chain(t.optional_keys()) {
            if let Some(value) = self.config.get(*key) {
                body.insert(key.to_string(), Value::String(value.clone()));
            }
        }

        for (key, value) in t.forced_fields() {
            body.insert(key.to_string(), value);
        }

        body
    }
}

/// Create/get/update response; the record sits under `identityProvider`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderEnvelope {
    pub identity_provider: IdentityProviderRecord,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderRecord {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub trust_email: bool,
    #[serde(default)]
    pub store_token: bool,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl IdentityProviderEnvelope {
    pub fn into_provider(self, provider_type: IdentityProviderType) -> IdentityProvider {
        let record = self.identity_provider;
        IdentityProvider {
            id: record.alias.clone(),
            provider_type,
            alias: record.alias,
            display_name: record.display_name,
            enabled: record.enabled,
            config: record.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(provider_type: IdentityProviderType, pairs: &[(&str, &str)]) -> IdentityProvider {
        IdentityProvider {
            id: String::new(),
            provider_type,
            alias: "corp".to_string(),
            display_name: "Corp SSO".to_string(),
            enabled: true,
            config: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_google_body_has_forced_fields() {
        let idp = provider(
            IdentityProviderType::Google,
            &[
                ("clientId", "id"),
                ("clientSecret", "secret"),
                ("hostedDomain", "example.com"),
                ("unrelated", "dropped"),
            ],
        );
        let body = Value::Object(idp.request_body());

        assert_eq!(
            body,
            json!({
                "displayName": "Corp SSO",
                "enabled": true,
                "clientId": "id",
                "clientSecret": "secret",
                "hostedDomain": "example.com",
                "trustEmail": true,
                "storeToken": false,
                "addReadTokenRoleOnCreate": false,
                "syncMode": "FORCE"
            })
        );
    }

    #[test]
    fn test_keycloak_body_has_no_forced_fields() {
        let idp = provider(
            IdentityProviderType::Keycloak,
            &[
                ("clientId", "id"),
                ("clientSecret", "secret"),
                ("authServerUrl", "https://kc.example.com"),
                ("targetRealm", "main"),
            ],
        );
        let body = idp.request_body();
        assert!(!body.contains_key("syncMode"));
        assert_eq!(body["targetRealm"], "main");
    }

    #[test]
    fn test_missing_keys() {
        let config: BTreeMap<String, String> = [("clientId".to_string(), "id".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            IdentityProviderType::Microsoft.missing_keys(&config),
            vec!["clientSecret", "tenantId"]
        );
        assert_eq!(
            IdentityProviderType::Custom.missing_keys(&config),
            vec!["clientSecret", "authorizationUrl", "tokenUrl", "issuer"]
        );
    }

    #[test]
    fn test_envelope_into_provider() {
        let envelope: IdentityProviderEnvelope = serde_json::from_value(json!({
            "identityProvider": {
                "alias": "google",
                "displayName": "Google",
                "providerId": "google",
                "enabled": true,
                "trustEmail": true,
                "config": {"clientId": "id"}
            }
        }))
        .unwrap();

        let idp = envelope.into_provider(IdentityProviderType::Google);
        assert_eq!(idp.alias, "google");
        assert_eq!(idp.config["clientId"], "id");
    }

    #[test]
    fn test_type_parse() {
        assert_eq!(
            "microsoft".parse::<IdentityProviderType>().unwrap(),
            IdentityProviderType::Microsoft
        );
        assert!("okta".parse::<IdentityProviderType>().is_err());
    }
}
