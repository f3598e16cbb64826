//! Provider surface
//!
//! [`PrismProvider`] owns the dispatch table from type name to handler and
//! turns one [`ProviderRequest`] into one [`ProviderResponse`]. Schema
//! validation runs before the connection settings are even resolved, so a
//! malformed plan never reaches the network.

pub mod data_sources;
pub mod diagnostics;
pub mod protocol;
pub mod resource;
pub mod resources;
pub mod schema;

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{PrismApi, PrismClient};
use crate::config::ProviderConfig;
use crate::wait::OpContext;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use protocol::{Operation, ProviderRequest, ProviderResponse, TargetKind};
pub use resource::{DataSource, Resource, ResourceEnv, ResourceOptions};
pub use schema::{Attribute, Schema};

/// Every schema the provider declares, as dumped by `prism-provider schema`
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchemas {
    pub provider: Schema,
    pub resources: BTreeMap<&'static str, Schema>,
    pub data_sources: BTreeMap<&'static str, Schema>,
}

pub struct PrismProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    options: ResourceOptions,
}

impl Default for PrismProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PrismProvider {
    pub fn new() -> Self {
        Self::with_options(ResourceOptions::default())
    }

    pub fn with_options(options: ResourceOptions) -> Self {
        let mut provider = Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
            options,
        };

        provider.register_resource(resources::AwsAccountResource);
        provider.register_resource(resources::PermissionSetResource);
        provider.register_resource(resources::PermissionSetAssignmentResource);
        provider.register_resource(resources::UserResource);
        provider.register_resource(resources::GroupResource);
        provider.register_resource(resources::GroupMembershipResource);
        provider.register_resource(resources::IdentityProviderResource);

        provider.register_data_source(data_sources::AwsAccountDataSource);
        provider.register_data_source(data_sources::PermissionSetDataSource);
        provider.register_data_source(data_sources::UserDataSource);
        provider.register_data_source(data_sources::GroupDataSource);

        provider
    }

    fn register_resource<R: Resource + 'static>(&mut self, resource: R) {
        self.resources.insert(resource.type_name(), Box::new(resource));
    }

    fn register_data_source<D: DataSource + 'static>(&mut self, data_source: D) {
        self.data_sources
            .insert(data_source.type_name(), Box::new(data_source));
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    /// Schema of the provider block itself
    pub fn provider_schema() -> Schema {
        Schema::new(
            "Manage CloudKeeper Prism identity and access resources.",
            vec![
                Attribute::string("prism_subdomain")
                    .optional()
                    .describe("Customer subdomain. May also be set with PRISM_SUBDOMAIN."),
                Attribute::string("api_token")
                    .optional()
                    .sensitive()
                    .describe("API token. May also be set with PRISM_API_TOKEN."),
                Attribute::string("region")
                    .optional()
                    .one_of(&["prism", "prism-eu"])
                    .default_value(json!("prism"))
                    .describe("API region. May also be set with PRISM_REGION."),
                Attribute::string("base_url")
                    .optional()
                    .describe("Override the API base URL. May also be set with PRISM_BASE_URL."),
            ],
        )
    }

    pub fn schemas(&self) -> ProviderSchemas {
        ProviderSchemas {
            provider: Self::provider_schema(),
            resources: self
                .resources
                .iter()
                .map(|(name, r)| (*name, r.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, d)| (*name, d.schema()))
                .collect(),
        }
    }

    /// Handle a request against the real API
    pub fn handle(&self, request: ProviderRequest, ctx: &OpContext) -> ProviderResponse {
        let ctx = ctx.child(request.timeout_seconds.map(Duration::from_secs));

        let diags = self.precheck(&request);
        if diags.has_error() || request.operation == Operation::Validate {
            return ProviderResponse {
                diagnostics: diags,
                ..Default::default()
            };
        }

        let api: Arc<dyn PrismApi> = match self.connect(&request) {
            Ok(api) => api,
            Err(diags) => return ProviderResponse::failed(diags),
        };

        self.dispatch(request, api.as_ref(), &ctx)
    }

    /// Handle a request against a caller-supplied API
    pub fn handle_with_api(
        &self,
        request: ProviderRequest,
        api: &dyn PrismApi,
        ctx: &OpContext,
    ) -> ProviderResponse {
        let ctx = ctx.child(request.timeout_seconds.map(Duration::from_secs));

        let diags = self.precheck(&request);
        if diags.has_error() || request.operation == Operation::Validate {
            return ProviderResponse {
                diagnostics: diags,
                ..Default::default()
            };
        }

        self.dispatch(request, api, &ctx)
    }

    /// Type lookup and plan validation; nothing here touches the network
    fn precheck(&self, request: &ProviderRequest) -> Diagnostics {
        let mut diags = Diagnostics::new();

        match request.kind {
            TargetKind::Resource => {
                let Some(resource) = self.resources.get(request.type_name.as_str()) else {
                    diags.add_error(
                        "Unknown Resource Type",
                        format!("The provider does not support resource type \"{}\".", request.type_name),
                    );
                    return diags;
                };
                if matches!(
                    request.operation,
                    Operation::Validate | Operation::Create | Operation::Update
                ) {
                    match &request.planned_state {
                        Some(plan) => resource.validate(plan, &mut diags),
                        None => diags.add_error(
                            "Missing Planned State",
                            format!("Operation {} requires planned_state.", request.operation),
                        ),
                    }
                }
            }
            TargetKind::DataSource => {
                let Some(data_source) = self.data_sources.get(request.type_name.as_str()) else {
                    diags.add_error(
                        "Unknown Data Source Type",
                        format!(
                            "The provider does not support data source type \"{}\".",
                            request.type_name
                        ),
                    );
                    return diags;
                };
                if !matches!(request.operation, Operation::Validate | Operation::Read) {
                    diags.add_error(
                        "Unsupported Operation",
                        format!("Data sources only support read, got {}.", request.operation),
                    );
                    return diags;
                }
                match &request.planned_state {
                    Some(config) => data_source.schema().validate(config, &mut diags),
                    None => diags.add_error(
                        "Missing Configuration",
                        "Data source reads require planned_state to carry the configuration.",
                    ),
                }
            }
        }

        diags
    }

    fn connect(&self, request: &ProviderRequest) -> Result<Arc<dyn PrismApi>, Diagnostics> {
        let mut diags = Diagnostics::new();

        let config = match ProviderConfig::resolve(&request.provider) {
            Ok(config) => config,
            Err(errors) => {
                for err in errors {
                    diags.add_attribute_error(err.attribute(), err.summary(), capitalize(&err.to_string()));
                }
                return Err(diags);
            }
        };

        tracing::debug!(subdomain = %config.subdomain, base_url = %config.base_url, "configured API client");

        match PrismClient::new(&config) {
            Ok(client) => Ok(Arc::new(client)),
            Err(err) => {
                diags.add_error(
                    "Unable to Create CloudKeeper API Client",
                    format!("An unexpected error occurred when creating the API client: {}", err),
                );
                Err(diags)
            }
        }
    }

    fn dispatch(
        &self,
        request: ProviderRequest,
        api: &dyn PrismApi,
        ctx: &OpContext,
    ) -> ProviderResponse {
        let env = ResourceEnv {
            api,
            ctx,
            options: self.options,
        };
        let mut response = ProviderResponse::default();
        let diags = &mut response.diagnostics;

        tracing::debug!(
            type_name = %request.type_name,
            operation = %request.operation,
            "dispatching request"
        );

        match request.kind {
            TargetKind::DataSource => {
                if let (Some(data_source), Some(config)) = (
                    self.data_sources.get(request.type_name.as_str()),
                    request.planned_state,
                ) {
                    response.new_state = data_source.read(&env, config, diags);
                }
            }
            TargetKind::Resource => {
                let Some(resource) = self.resources.get(request.type_name.as_str()) else {
                    return response;
                };
                match request.operation {
                    Operation::Validate => {}
                    Operation::Create => {
                        if let Some(plan) = request.planned_state {
                            response.new_state = resource.create(&env, plan, diags);
                        }
                    }
                    Operation::Read => match request.prior_state {
                        Some(state) => {
                            response.new_state = resource.read(&env, state, diags);
                            response.removed = response.new_state.is_none() && !diags.has_error();
                        }
                        None => missing_prior(diags, request.operation),
                    },
                    Operation::Update => match (request.prior_state, request.planned_state) {
                        (Some(prior), Some(plan)) => {
                            response.new_state = resource.update(&env, prior, plan, diags);
                        }
                        _ => missing_prior(diags, request.operation),
                    },
                    Operation::Delete => match request.prior_state {
                        Some(state) => resource.delete(&env, state, diags),
                        None => missing_prior(diags, request.operation),
                    },
                    Operation::Import => match request.import_id.as_deref().map(str::trim) {
                        Some(id) if !id.is_empty() => {
                            response.new_state = resource.import(&env, id, diags);
                        }
                        _ => diags.add_error(
                            "Missing Import ID",
                            "Import requires a non-empty import_id.",
                        ),
                    },
                }
            }
        }

        if response.diagnostics.has_error() {
            tracing::warn!(
                type_name = %request.type_name,
                operation = %request.operation,
                errors = ?response.diagnostics.summaries(),
                "operation failed"
            );
        }
        response
    }
}

fn missing_prior(diags: &mut Diagnostics, operation: Operation) {
    diags.add_error(
        "Missing Prior State",
        format!("Operation {} requires prior_state.", operation),
    );
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::models::PrincipalType;
    use crate::test_helpers::{MockPrismApi, fast_policy};
    use serde_json::{Value, json};

    fn provider() -> PrismProvider {
        PrismProvider::with_options(ResourceOptions {
            dependency: fast_policy(),
            cascade: fast_policy(),
        })
    }

    fn request(type_name: &str, operation: Operation) -> ProviderRequest {
        ProviderRequest {
            provider: ProviderSettings::default(),
            kind: TargetKind::Resource,
            type_name: type_name.to_string(),
            operation,
            planned_state: None,
            prior_state: None,
            import_id: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn test_registers_every_type() {
        let provider = provider();
        let resources: Vec<_> = provider.resource_types().collect();
        assert_eq!(
            resources,
            vec![
                "prism_aws_account",
                "prism_group",
                "prism_group_membership",
                "prism_identity_provider",
                "prism_permission_set",
                "prism_permission_set_assignment",
                "prism_user",
            ]
        );
        let data_sources: Vec<_> = provider.data_source_types().collect();
        assert_eq!(
            data_sources,
            vec!["prism_aws_account", "prism_group", "prism_permission_set", "prism_user"]
        );
    }

    #[test]
    fn test_schemas_serialize() {
        let schemas = serde_json::to_value(provider().schemas()).unwrap();
        assert!(schemas["resources"]["prism_user"]["attributes"].is_array());
        let token = schemas["provider"]["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["name"] == "api_token")
            .unwrap();
        assert_eq!(token["sensitive"], json!(true));
    }

    #[test]
    fn test_unknown_type() {
        let api = MockPrismApi::new();
        let response = provider().handle_with_api(
            request("prism_robot", Operation::Read),
            &api,
            &OpContext::background(),
        );
        assert_eq!(response.diagnostics.summaries(), vec!["Unknown Resource Type"]);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_invalid_plan_never_reaches_api() {
        let api = MockPrismApi::new();
        let mut req = request("prism_user", Operation::Create);
        req.planned_state = Some(json!({"username": "alice"}));

        let response = provider().handle_with_api(req, &api, &OpContext::background());

        assert!(response.has_error());
        assert_eq!(response.diagnostics.summaries(), vec!["Missing Required Argument"]);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_missing_configuration_reported_per_attribute() {
        let mut req = request("prism_group", Operation::Read);
        req.prior_state = Some(json!({"name": "ops"}));
        req.provider = ProviderSettings {
            region: Some("prism-us".to_string()),
            prism_subdomain: Some("acme".to_string()),
            ..Default::default()
        };

        // The token may come from the environment on a developer machine.
        if std::env::var(crate::config::ENV_API_TOKEN).is_ok() {
            return;
        }

        let response = provider().handle(req, &OpContext::background());
        let attributes: Vec<_> = response
            .diagnostics
            .iter()
            .map(|d| d.attribute.as_deref())
            .collect();
        assert!(attributes.contains(&Some("api_token")));
        assert!(attributes.contains(&Some("region")));
    }

    #[test]
    fn test_read_missing_object_marks_removed() {
        let api = MockPrismApi::new();
        let mut req = request("prism_group", Operation::Read);
        req.prior_state = Some(json!({"id": "group-1", "name": "ops"}));

        let response = provider().handle_with_api(req, &api, &OpContext::background());

        assert!(response.removed);
        assert!(response.new_state.is_none());
        assert!(!response.has_error());
    }

    #[test]
    fn test_huge_request_timeout_is_accepted() {
        let api = MockPrismApi::new().with_group("ops");
        let mut req = request("prism_group", Operation::Read);
        req.prior_state = Some(json!({"name": "ops"}));
        req.timeout_seconds = Some(u64::MAX);

        let response = provider().handle_with_api(req, &api, &OpContext::background());

        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert_eq!(response.new_state.unwrap()["name"], json!("ops"));
    }

    #[test]
    fn test_permission_set_delete_cascades_first() {
        let api = MockPrismApi::new()
            .with_permission_set("ps", "Admin")
            .with_assignment("asg-a", "ps", PrincipalType::User, "alice", "111111111111")
            .with_assignment("asg-b", "ps", PrincipalType::Group, "ops", "222222222222")
            .with_assignment("asg-c", "other", PrincipalType::User, "bob", "111111111111");

        let mut req = request("prism_permission_set", Operation::Delete);
        req.prior_state = Some(json!({"id": "ps", "name": "Admin"}));

        let response = provider().handle_with_api(req, &api, &OpContext::background());

        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let calls = api.calls();
        let assignment_deletes: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with("DELETE /permission-set-assignments/"))
            .collect();
        assert_eq!(assignment_deletes.len(), 2);
        let ps_delete = calls
            .iter()
            .position(|c| c == "DELETE /permission-sets/ps")
            .unwrap();
        assert!(assignment_deletes.iter().all(|(i, _)| *i < ps_delete));
        assert_eq!(api.assignment_ids(), vec!["asg-c".to_string()]);
        assert!(
            response
                .diagnostics
                .summaries()
                .contains(&"Automatic Assignment Cleanup")
        );
    }

    #[test]
    fn test_import_and_data_source_round_trip() {
        let api = MockPrismApi::new().with_user("alice");

        let mut req = request("prism_user", Operation::Import);
        req.import_id = Some("alice".to_string());
        let imported = provider().handle_with_api(req, &api, &OpContext::background());
        assert!(!imported.has_error(), "{:?}", imported.diagnostics);
        let state = imported.new_state.unwrap();
        assert_eq!(state["username"], json!("alice"));

        let mut req = request("prism_user", Operation::Read);
        req.kind = TargetKind::DataSource;
        req.planned_state = Some(json!({"username": "alice"}));
        let read = provider().handle_with_api(req, &api, &OpContext::background());
        assert!(!read.has_error(), "{:?}", read.diagnostics);
        assert_eq!(read.new_state.unwrap()["id"], state["id"]);
    }

    #[test]
    fn test_data_source_rejects_writes() {
        let api = MockPrismApi::new();
        let mut req = request("prism_group", Operation::Create);
        req.kind = TargetKind::DataSource;
        req.planned_state = Some(Value::Null);

        let response = provider().handle_with_api(req, &api, &OpContext::background());
        assert_eq!(response.diagnostics.summaries(), vec!["Unsupported Operation"]);
    }

    #[test]
    fn test_validate_only() {
        let api = MockPrismApi::new();
        let mut req = request("prism_permission_set_assignment", Operation::Validate);
        req.planned_state = Some(json!({
            "permission_set_id": "ps",
            "principal_type": "USER",
            "principal_id": "alice",
            "account_id": "111111111111",
            "account_ids": ["222222222222"]
        }));

        let response = provider().handle_with_api(req, &api, &OpContext::background());

        assert_eq!(
            response.diagnostics.summaries(),
            vec!["Invalid Attribute Combination"]
        );
        assert!(api.calls().is_empty());
    }
}
