use serde::{Deserialize, Serialize};

use super::{is_account_id, is_email, sentence};
use crate::assignment::{CascadeParent, purge_assignments};
use crate::models::{AwsAccount, default_role_arn};
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsAccountModel {
    pub id: Option<String>,
    pub account_id: String,
    pub account_name: String,
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub owner_emails: Option<Vec<String>>,
}

impl AwsAccountModel {
    fn to_api(&self) -> AwsAccount {
        AwsAccount {
            account_id: self.account_id.clone(),
            account_name: self.account_name.clone(),
            region: self.region.clone().unwrap_or_default(),
            role_arn: self.role_arn.clone().unwrap_or_default(),
            owner_emails: self.owner_emails.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Onboarding only takes the id and name; the rest needs a follow-up update
    fn needs_follow_up(&self) -> bool {
        self.region.as_deref().is_some_and(|r| !r.is_empty())
            || self.role_arn.as_deref().is_some_and(|r| !r.is_empty())
            || self.owner_emails.as_ref().is_some_and(|e| !e.is_empty())
    }

    fn refresh(mut self, remote: AwsAccount) -> Self {
        if !remote.id.is_empty() {
            self.id = Some(remote.id);
        }
        if !remote.account_name.is_empty() {
            self.account_name = remote.account_name;
        }
        if !remote.region.is_empty() {
            self.region = Some(remote.region);
        }
        if !remote.role_arn.is_empty() {
            self.role_arn = Some(remote.role_arn);
        } else if self.role_arn.as_deref().is_none_or(str::is_empty) {
            self.role_arn = Some(default_role_arn(&self.account_id));
        }
        if !remote.owner_emails.is_empty() {
            self.owner_emails = Some(remote.owner_emails);
        }
        self
    }
}

pub struct AwsAccountResource;

impl TypedResource for AwsAccountResource {
    type Model = AwsAccountModel;

    const TYPE_NAME: &'static str = "prism_aws_account";
    const IMPORT_ATTRIBUTE: &'static str = "account_id";

    fn schema(&self) -> Schema {
        Schema::new(
            "Onboards an AWS account into Prism.",
            vec![
                Attribute::string("id").computed().describe("Internal account identifier."),
                Attribute::string("account_id")
                    .required()
                    .replace()
                    .describe("12-digit AWS account ID."),
                Attribute::string("account_name")
                    .required()
                    .describe("Display name of the account."),
                Attribute::string("region").optional().describe("Primary AWS region."),
                Attribute::string("role_arn")
                    .optional_computed()
                    .describe("Cross-account role assumed by Prism."),
                Attribute::list("owner_emails")
                    .optional()
                    .describe("Email addresses of the account owners."),
            ],
        )
    }

    fn validate(&self, model: &AwsAccountModel, diags: &mut Diagnostics) {
        if !is_account_id(&model.account_id) {
            diags.add_attribute_error(
                "account_id",
                "Invalid AWS Account ID",
                format!("\"{}\" is not a 12-digit AWS account ID.", model.account_id),
            );
        }
        for email in model.owner_emails.iter().flatten() {
            if !is_email(email) {
                diags.add_attribute_error(
                    "owner_emails",
                    "Invalid Email Address",
                    format!("\"{}\" is not a valid email address.", email),
                );
            }
        }
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: AwsAccountModel,
        diags: &mut Diagnostics,
    ) -> Option<AwsAccountModel> {
        let request = plan.to_api();
        let created = match env.api.create_aws_account(&request) {
            Ok(created) => created,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create AWS account, got error: {}", err),
                );
                return None;
            }
        };
        tracing::info!(account_id = %plan.account_id, "onboarded AWS account");

        if !plan.needs_follow_up() {
            return Some(plan.refresh(created));
        }

        match env.api.update_aws_account(&plan.account_id, &request) {
            Ok(updated) => {
                let id = created.id;
                let mut state = plan.refresh(updated);
                if state.id.is_none() && !id.is_empty() {
                    state.id = Some(id);
                }
                Some(state)
            }
            Err(err) => {
                // The account exists now; hand back what we have so it is tracked.
                diags.add_error(
                    "Client Error",
                    format!(
                        "AWS account {} was onboarded but its settings could not be applied, got error: {}",
                        plan.account_id, err
                    ),
                );
                Some(plan.refresh(created))
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: AwsAccountModel,
        diags: &mut Diagnostics,
    ) -> Option<AwsAccountModel> {
        match env.api.get_aws_account(&state.account_id) {
            Ok(remote) => Some(state.refresh(remote)),
            Err(err) if err.is_not_found() => {
                tracing::info!(account_id = %state.account_id, "AWS account no longer exists");
                None
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read AWS account, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: AwsAccountModel,
        plan: AwsAccountModel,
        diags: &mut Diagnostics,
    ) -> Option<AwsAccountModel> {
        match env.api.update_aws_account(&prior.account_id, &plan.to_api()) {
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
                    format!("Unable to update AWS account, got error: {}", err),
                );
                None
            }
        }
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: AwsAccountModel, diags: &mut Diagnostics) {
        let report = purge_assignments(
            env.api,
            env.ctx,
            env.options.cascade,
            CascadeParent::Account(&state.account_id),
        );
        diags.extend_warnings(report.warnings);
        if let Some(interrupt) = report.interrupted {
            diags.add_error(
                "Assignment Cleanup Interrupted",
                sentence(format!(
                    "{} while waiting for assignments of account {} to be deleted; the account was not deboarded.",
                    interrupt, state.account_id
                )),
            );
            return;
        }

        match env.api.delete_aws_account(&state.account_id) {
            Ok(()) => tracing::info!(account_id = %state.account_id, "deboarded AWS account"),
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to delete AWS account, got error: {}", err),
            ),
        }
    }
}
