//! `prism_permission_set_assignment`
//!
//! One resource covers one permission set, one principal and one or more
//! accounts. The heavy lifting lives in [`crate::assignment`]; this handler
//! maps the attribute model onto it and turns its outcomes into diagnostics.

use serde::{Deserialize, Serialize};

use super::{is_account_id, sentence};
use crate::assignment::{
    AssignmentTarget, CompositeId, ReadOutcome, create_assignment, delete_assignment,
    read_assignment,
};
use crate::models::PrincipalType;
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentModel {
    pub id: Option<String>,
    pub permission_set_id: String,
    pub principal_type: String,
    pub principal_id: String,
    pub account_id: Option<String>,
    pub account_ids: Option<Vec<String>>,
}

impl AssignmentModel {
    /// The accounts named by whichever of the two attributes is set
    fn accounts(&self) -> Vec<String> {
        match (&self.account_id, &self.account_ids) {
            (Some(single), _) if !single.is_empty() => vec![single.clone()],
            (_, Some(many)) => many.clone(),
            _ => Vec::new(),
        }
    }

    fn composite_id(&self, diags: &mut Diagnostics) -> Option<CompositeId> {
        let raw = self.id.as_deref().unwrap_or_default();
        match raw.parse::<CompositeId>() {
            Ok(id) => Some(id),
            Err(err) => {
                diags.add_error(
                    "Invalid Assignment ID",
                    format!("Unable to parse assignment id \"{}\": {}", raw, err),
                );
                None
            }
        }
    }
}

pub struct PermissionSetAssignmentResource;

impl TypedResource for PermissionSetAssignmentResource {
    type Model = AssignmentModel;

    const TYPE_NAME: &'static str = "prism_permission_set_assignment";
    const IMPORT_ATTRIBUTE: &'static str = "id";

    fn schema(&self) -> Schema {
        Schema::new(
            "Assigns a permission set to a user or group on one or more AWS accounts.",
            vec![
                Attribute::string("id")
                    .computed()
                    .describe("Comma-separated ids of the backend assignment rows."),
                Attribute::string("permission_set_id").required().replace(),
                Attribute::string("principal_type")
                    .required()
                    .replace()
                    .one_of(&["USER", "GROUP"]),
                Attribute::string("principal_id")
                    .required()
                    .replace()
                    .describe("Username or group name."),
                Attribute::string("account_id")
                    .optional()
                    .describe("Single AWS account ID. Conflicts with account_ids."),
                Attribute::list("account_ids")
                    .optional()
                    .describe("AWS account IDs. Conflicts with account_id."),
            ],
        )
    }

    fn validate(&self, model: &AssignmentModel, diags: &mut Diagnostics) {
        let single = model.account_id.as_deref().is_some_and(|a| !a.is_empty());
        let many = model.account_ids.as_ref().is_some_and(|a| !a.is_empty());
        if single == many {
            diags.add_attribute_error(
                "account_ids",
                "Invalid Attribute Combination",
                "Exactly one of account_id or account_ids must be set.",
            );
            return;
        }

        for account in model.accounts() {
            if !is_account_id(&account) {
                diags.add_attribute_error(
                    if single { "account_id" } else { "account_ids" },
                    "Invalid AWS Account ID",
                    format!("\"{}\" is not a 12-digit AWS account ID.", account),
                );
            }
        }
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: AssignmentModel,
        diags: &mut Diagnostics,
    ) -> Option<AssignmentModel> {
        let target = plan
            .principal_type
            .parse::<PrincipalType>()
            .and_then(|principal_type| {
                AssignmentTarget::new(
                    plan.permission_set_id.clone(),
                    principal_type,
                    plan.principal_id.clone(),
                    plan.accounts(),
                )
            });
        let target = match target {
            Ok(target) => target,
            Err(err) => {
                diags.add_error("Invalid Plan", sentence(err));
                return None;
            }
        };

        match create_assignment(env.api, env.ctx, env.options.dependency, &target) {
            Ok(created) => {
                diags.extend_warnings(created.warnings);
                Some(AssignmentModel {
                    id: Some(created.id.to_string()),
                    ..plan
                })
            }
            Err(err) => {
                diags.add_error(err.summary(), sentence(&err));
                None
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: AssignmentModel,
        diags: &mut Diagnostics,
    ) -> Option<AssignmentModel> {
        let id = state.composite_id(diags)?;

        match read_assignment(env.api, &id) {
            Ok(ReadOutcome::Gone) => {
                tracing::info!(id = %id, "all assignment rows are gone");
                None
            }
            Ok(ReadOutcome::Present { snapshot, warnings }) => {
                diags.extend_warnings(warnings);
                let (account_id, account_ids) = if state.account_id.is_some() {
                    (snapshot.account_ids.into_iter().next(), None)
                } else {
                    (None, Some(snapshot.account_ids))
                };
                Some(AssignmentModel {
                    // The stored id keeps every row, including drifted ones,
                    // so a later delete still covers them.
                    id: Some(id.to_string()),
                    permission_set_id: snapshot.permission_set_id,
                    principal_type: snapshot.principal_type.to_string(),
                    principal_id: snapshot.principal,
                    account_id,
                    account_ids,
                })
            }
            Err(err) => {
                diags.add_error(
                    "API Error",
                    sentence(format!("Unable to read assignment {}: {}", id, err)),
                );
                None
            }
        }
    }

    fn update(
        &self,
        _env: &ResourceEnv<'_>,
        _prior: AssignmentModel,
        _plan: AssignmentModel,
        diags: &mut Diagnostics,
    ) -> Option<AssignmentModel> {
        diags.add_error(
            "Update Not Supported",
            "Permission set assignments cannot be updated. They must be destroyed and recreated.",
        );
        None
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: AssignmentModel, diags: &mut Diagnostics) {
        let Some(id) = state.composite_id(diags) else {
            return;
        };
        match delete_assignment(env.api, &id) {
            Ok(()) => tracing::info!(id = %id, "deleted permission set assignment"),
            Err(err) => diags.add_error(err.summary(), sentence(&err)),
        }
    }
}
