use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{is_session_duration, refresh_list, refresh_map, refresh_string, sentence};
use crate::assignment::{CascadeParent, purge_assignments};
use crate::models::PermissionSet;
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSetModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub session_duration: Option<String>,
    pub managed_policies: Option<Vec<String>>,
    pub inline_policies: Option<BTreeMap<String, String>>,
}

impl PermissionSetModel {
    fn to_api(&self) -> PermissionSet {
        PermissionSet {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            session_duration: self.session_duration.clone().unwrap_or_default(),
            managed_policies: self.managed_policies.clone().unwrap_or_default(),
            inline_policies: self.inline_policies.clone().unwrap_or_default(),
        }
    }

    fn refresh(mut self, remote: PermissionSet) -> Self {
        if !remote.id.is_empty() {
            self.id = Some(remote.id);
        }
        self.name = remote.name;
        self.description = refresh_string(remote.description, self.description.take());
        self.session_duration =
            refresh_string(remote.session_duration, self.session_duration.take());
        self.managed_policies = refresh_list(remote.managed_policies, self.managed_policies.take());
        let prior = self.inline_policies.take();
        let remote = keep_equivalent_documents(remote.inline_policies, prior.as_ref());
        self.inline_policies = refresh_map(remote, prior);
        self
    }
}

/// The backend may reformat policy JSON; keep the prior text when the
/// documents are the same value.
fn keep_equivalent_documents(
    remote: BTreeMap<String, String>,
    prior: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    remote
        .into_iter()
        .map(|(name, document)| {
            let known = prior.and_then(|p| p.get(&name)).filter(|previous| {
                match (
                    serde_json::from_str::<Value>(previous),
                    serde_json::from_str::<Value>(&document),
                ) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            });
            match known {
                Some(previous) => (name, previous.clone()),
                None => (name, document),
            }
        })
        .collect()
}

pub struct PermissionSetResource;

impl TypedResource for PermissionSetResource {
    type Model = PermissionSetModel;

    const TYPE_NAME: &'static str = "prism_permission_set";
    const IMPORT_ATTRIBUTE: &'static str = "id";

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages a permission set.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("name").required().describe("Permission set name."),
                Attribute::string("description").optional(),
                Attribute::string("session_duration")
                    .optional()
                    .describe("ISO-8601 session duration, e.g. PT4H."),
                Attribute::list("managed_policies")
                    .optional()
                    .describe("ARNs of AWS managed policies to attach."),
                Attribute::map("inline_policies")
                    .optional()
                    .describe("Inline policy documents keyed by policy name."),
            ],
        )
    }

    fn validate(&self, model: &PermissionSetModel, diags: &mut Diagnostics) {
        if let Some(duration) = model.session_duration.as_deref() {
            if !is_session_duration(duration) {
                diags.add_attribute_error(
                    "session_duration",
                    "Invalid Session Duration",
                    format!(
                        "\"{}\" is not an ISO-8601 duration such as PT1H or PT4H30M.",
                        duration
                    ),
                );
            }
        }

        for (name, document) in model.inline_policies.iter().flatten() {
            match serde_json::from_str::<Value>(document) {
                Ok(Value::Object(_)) => {}
                Ok(_) => diags.add_attribute_error(
                    "inline_policies",
                    "Invalid Inline Policy",
                    format!("Inline policy \"{}\" must be a JSON object.", name),
                ),
                Err(err) => diags.add_attribute_error(
                    "inline_policies",
                    "Invalid Inline Policy",
                    format!("Inline policy \"{}\" is not valid JSON: {}", name, err),
                ),
            }
        }
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: PermissionSetModel,
        diags: &mut Diagnostics,
    ) -> Option<PermissionSetModel> {
        match env.api.create_permission_set(&plan.to_api()) {
            Ok(created) => {
                tracing::info!(id = %created.id, name = %created.name, "created permission set");
                Some(PermissionSetModel {
                    id: Some(created.id),
                    ..plan
                })
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create permission set, got error: {}", err),
                );
                None
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: PermissionSetModel,
        diags: &mut Diagnostics,
    ) -> Option<PermissionSetModel> {
        let id = state.id.clone().unwrap_or_default();
        match env.api.get_permission_set(&id) {
            Ok(remote) => Some(state.refresh(remote)),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read permission set, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: PermissionSetModel,
        plan: PermissionSetModel,
        diags: &mut Diagnostics,
    ) -> Option<PermissionSetModel> {
        let id = prior.id.unwrap_or_default();
        let plan = PermissionSetModel {
            id: Some(id.clone()),
            ..plan
        };
        match env.api.update_permission_set(&id, &plan.to_api()) {
            Ok(_) => Some(plan),
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to update permission set, got error: {}", err),
                );
                None
            }
        }
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: PermissionSetModel, diags: &mut Diagnostics) {
        let id = state.id.unwrap_or_default();
        let report = purge_assignments(
            env.api,
            env.ctx,
            env.options.cascade,
            CascadeParent::PermissionSet(&id),
        );
        diags.extend_warnings(report.warnings);
        if let Some(interrupt) = report.interrupted {
            diags.add_error(
                "Assignment Cleanup Interrupted",
                sentence(format!(
                    "{} while waiting for assignments of permission set {} to be deleted; the permission set was not deleted.",
                    interrupt, id
                )),
            );
            return;
        }

        match env.api.delete_permission_set(&id) {
            Ok(()) => tracing::info!(id = %id, "deleted permission set"),
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to delete permission set, got error: {}", err),
            ),
        }
    }
}
