//! `prism_identity_provider`
//!
//! `config` is a JSON object encoded as a string so that it can be marked
//! sensitive as a whole. The backend keeps at most one provider per type and
//! echoes secrets back redacted, so the configured `config` text is what stays
//! in state; read only refreshes the display name and the enabled flag.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::{refresh_string, sentence};
use crate::models::{IdentityProvider, IdentityProviderType};
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderModel {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub alias: String,
    pub display_name: Option<String>,
    pub enabled: Option<bool>,
    pub config: String,
}

/// Decode the `config` attribute. Only string values are forwarded to the
/// backend; anything else is dropped.
fn parse_config(raw: &str) -> Result<BTreeMap<String, String>, String> {
    let object: BTreeMap<String, Value> =
        serde_json::from_str(raw).map_err(|e| format!("config must be a JSON object: {}", e))?;

    Ok(object
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => {
                tracing::debug!(key = %key, "ignoring non-string identity provider config value");
                None
            }
        })
        .collect())
}

impl IdentityProviderModel {
    fn to_api(&self) -> Result<IdentityProvider, String> {
        let provider_type = self
            .provider_type
            .parse::<IdentityProviderType>()
            .map_err(sentence)?;
        Ok(IdentityProvider {
            id: String::new(),
            provider_type,
            alias: self.alias.clone(),
            display_name: self.display_name.clone().unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            config: parse_config(&self.config)?,
        })
    }

    fn refresh(mut self, remote: IdentityProvider) -> Self {
        self.id = Some(if remote.alias.is_empty() {
            self.alias.clone()
        } else {
            remote.alias.clone()
        });
        self.display_name = refresh_string(remote.display_name, self.display_name.take());
        self.enabled = Some(remote.enabled);
        if self.config.is_empty() {
            // Imported: adopt whatever the backend reports.
            self.config = serde_json::to_string(&remote.config).unwrap_or_default();
        }
        self
    }
}

pub struct IdentityProviderResource;

impl TypedResource for IdentityProviderResource {
    type Model = IdentityProviderModel;

    const TYPE_NAME: &'static str = "prism_identity_provider";
    const IMPORT_ATTRIBUTE: &'static str = "alias";

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages a federated identity provider.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("type")
                    .required()
                    .replace()
                    .one_of(&["google", "microsoft", "keycloak", "custom"]),
                Attribute::string("alias").required().replace(),
                Attribute::string("display_name").optional(),
                Attribute::bool("enabled")
                    .optional_computed()
                    .default_value(json!(true)),
                Attribute::string("config")
                    .required()
                    .sensitive()
                    .describe("JSON object with the provider settings; required keys depend on type."),
            ],
        )
    }

    fn validate(&self, model: &IdentityProviderModel, diags: &mut Diagnostics) {
        let config = match parse_config(&model.config) {
            Ok(config) => config,
            Err(err) => {
                diags.add_attribute_error("config", "Invalid Configuration", sentence(err));
                return;
            }
        };

        let Ok(provider_type) = model.provider_type.parse::<IdentityProviderType>() else {
            // Already reported by the schema.
            return;
        };

        let missing = provider_type.missing_keys(&config);
        if !missing.is_empty() {
            diags.add_attribute_error(
                "config",
                "Missing Identity Provider Configuration",
                format!(
                    "The {} identity provider requires the config key(s): {}.",
                    provider_type,
                    missing.join(", ")
                ),
            );
        }
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let request = match plan.to_api() {
            Ok(request) => request,
            Err(err) => {
                diags.add_error("Invalid Plan", err);
                return None;
            }
        };

        match env.api.create_identity_provider(&request) {
            Ok(created) => {
                tracing::info!(provider_type = %created.provider_type, alias = %created.alias, "created identity provider");
                Some(plan.refresh(created))
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create identity provider, got error: {}", err),
                );
                None
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let provider_type = match state.provider_type.parse::<IdentityProviderType>() {
            Ok(provider_type) => provider_type,
            Err(err) => {
                diags.add_error("Invalid State", sentence(err));
                return None;
            }
        };

        match env.api.get_identity_provider(provider_type, &state.alias) {
            // Another provider now occupies this type slot.
            Ok(remote) if !remote.alias.is_empty() && remote.alias != state.alias => {
                tracing::info!(alias = %state.alias, found = %remote.alias, "identity provider replaced remotely");
                None
            }
            Ok(remote) => Some(state.refresh(remote)),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read identity provider, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: IdentityProviderModel,
        plan: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let request = match plan.to_api() {
            Ok(request) => request,
            Err(err) => {
                diags.add_error("Invalid Plan", err);
                return None;
            }
        };

        match env.api.update_identity_provider(&request) {
            Ok(updated) => {
                let mut state = plan.refresh(updated);
                if state.id.is_none() {
                    state.id = prior.id;
                }
                Some(state)
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to update identity provider, got error: {}", err),
                );
                None
            }
        }
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: IdentityProviderModel, diags: &mut Diagnostics) {
        let Ok(provider_type) = state.provider_type.parse::<IdentityProviderType>() else {
            diags.add_error(
                "Invalid State",
                format!("Unknown identity provider type \"{}\".", state.provider_type),
            );
            return;
        };
        match env.api.delete_identity_provider(provider_type, &state.alias) {
            Ok(()) => tracing::info!(alias = %state.alias, "deleted identity provider"),
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to delete identity provider, got error: {}", err),
            ),
        }
    }

    /// Import ids have the form `<type>/<alias>`
    fn import_state(&self, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let parsed = id
            .split_once('/')
            .filter(|(t, alias)| !alias.is_empty() && t.parse::<IdentityProviderType>().is_ok());
        match parsed {
            Some((provider_type, alias)) => Some(json!({
                "type": provider_type,
                "alias": alias,
                "config": "",
            })),
            None => {
                diags.add_error(
                    "Unexpected Import Identifier",
                    format!(
                        "Expected import identifier with format: <type>/<alias> where type is one of google, microsoft, keycloak, custom. Got: {}",
                        id
                    ),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::resource::ResourceOptions;
    use crate::test_helpers::MockPrismApi;
    use crate::wait::OpContext;

    fn env<'a>(api: &'a MockPrismApi, ctx: &'a OpContext) -> ResourceEnv<'a> {
        ResourceEnv {
            api,
            ctx,
            options: ResourceOptions::default(),
        }
    }

    fn plan() -> IdentityProviderModel {
        IdentityProviderModel {
            provider_type: "google".to_string(),
            alias: "google".to_string(),
            display_name: Some("Sign in with Google".to_string()),
            config: r#"{"clientId": "abc", "clientSecret": "s3cret", "hostedDomain": "example.com"}"#
                .to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_config() {
        let config = parse_config(
            r#"{"clientId": "abc", "pkce": true, "port": 443, "nested": {"a": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config["clientId"], "abc");
        assert!(parse_config("[]").is_err());
        assert!(parse_config("not json").is_err());
    }

    #[test]
    fn test_validate_required_keys() {
        let mut diags = Diagnostics::new();
        let model = IdentityProviderModel {
            provider_type: "microsoft".to_string(),
            config: r#"{"clientId": "abc"}"#.to_string(),
            ..plan()
        };
        TypedResource::validate(&IdentityProviderResource, &model, &mut diags);

        assert_eq!(diags.summaries(), vec!["Missing Identity Provider Configuration"]);
        assert!(
            diags
                .iter()
                .next()
                .unwrap()
                .detail
                .contains("clientSecret, tenantId")
        );

        let mut diags = Diagnostics::new();
        let model = IdentityProviderModel {
            config: "not json".to_string(),
            ..plan()
        };
        TypedResource::validate(&IdentityProviderResource, &model, &mut diags);
        assert_eq!(diags.summaries(), vec!["Invalid Configuration"]);
    }

    #[test]
    fn test_non_string_required_key_counts_as_missing() {
        let mut diags = Diagnostics::new();
        let model = IdentityProviderModel {
            config: r#"{"clientId": 42, "clientSecret": "s3cret", "hostedDomain": "example.com"}"#
                .to_string(),
            ..plan()
        };

        TypedResource::validate(&IdentityProviderResource, &model, &mut diags);

        assert_eq!(diags.summaries(), vec!["Missing Identity Provider Configuration"]);
        assert!(diags.iter().next().unwrap().detail.ends_with("config key(s): clientId."));
    }

    #[test]
    fn test_create_keeps_configured_config() {
        let api = MockPrismApi::new();
        let ctx = OpContext::background();
        let mut diags = Diagnostics::new();

        let state = IdentityProviderResource
            .create(&env(&api, &ctx), plan(), &mut diags)
            .unwrap();

        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(state.id.as_deref(), Some("google"));
        assert_eq!(state.config, plan().config);
        assert_eq!(state.enabled, Some(true));
        let stored = api.identity_provider(IdentityProviderType::Google).unwrap();
        assert_eq!(stored.config["hostedDomain"], "example.com");
    }

    #[test]
    fn test_read_detects_replaced_provider() {
        let api = MockPrismApi::new().with_identity_provider(IdentityProvider {
            id: "corp-google".to_string(),
            provider_type: IdentityProviderType::Google,
            alias: "corp-google".to_string(),
            display_name: String::new(),
            enabled: true,
            config: BTreeMap::new(),
        });
        let ctx = OpContext::background();
        let mut diags = Diagnostics::new();

        let state = IdentityProviderResource.read(&env(&api, &ctx), plan(), &mut diags);

        assert!(state.is_none());
        assert!(!diags.has_error());
    }

    #[test]
    fn test_import_state_parses_type_and_alias() {
        let mut diags = Diagnostics::new();
        let state = IdentityProviderResource
            .import_state("keycloak/corp-sso", &mut diags)
            .unwrap();
        assert_eq!(state["type"], json!("keycloak"));
        assert_eq!(state["alias"], json!("corp-sso"));

        for bad in ["corp-sso", "okta/corp", "google/"] {
            let mut diags = Diagnostics::new();
            assert!(IdentityProviderResource.import_state(bad, &mut diags).is_none());
            assert_eq!(diags.summaries(), vec!["Unexpected Import Identifier"]);
        }
    }

    #[test]
    fn test_imported_state_adopts_remote_config() {
        let api = MockPrismApi::new().with_identity_provider(IdentityProvider {
            id: "corp-sso".to_string(),
            provider_type: IdentityProviderType::Keycloak,
            alias: "corp-sso".to_string(),
            display_name: "Corporate SSO".to_string(),
            enabled: false,
            config: BTreeMap::from([("clientId".to_string(), "kc".to_string())]),
        });
        let ctx = OpContext::background();
        let mut diags = Diagnostics::new();
        let partial = IdentityProviderModel {
            provider_type: "keycloak".to_string(),
            alias: "corp-sso".to_string(),
            ..Default::default()
        };

        let state = IdentityProviderResource
            .read(&env(&api, &ctx), partial, &mut diags)
            .unwrap();

        assert_eq!(state.display_name.as_deref(), Some("Corporate SSO"));
        assert_eq!(state.enabled, Some(false));
        assert_eq!(state.config, r#"{"clientId":"kc"}"#);
    }

    #[test]
    fn test_delete() {
        let api = MockPrismApi::new();
        let ctx = OpContext::background();
        let mut diags = Diagnostics::new();
        let state = IdentityProviderResource
            .create(&env(&api, &ctx), plan(), &mut diags)
            .unwrap();

        IdentityProviderResource.delete(&env(&api, &ctx), state, &mut diags);

        assert!(api.identity_provider(IdentityProviderType::Google).is_none());
        assert!(diags.is_empty());
    }
}
