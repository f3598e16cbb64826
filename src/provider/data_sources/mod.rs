//! Read-only lookups of existing Prism objects
//!
//! Unlike resource reads, a missing object is an error here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::diagnostics::Diagnostics;
use super::resource::{ResourceEnv, TypedDataSource};
use super::schema::{Attribute, Schema};
use crate::models::default_role_arn;

fn read_failed(diags: &mut Diagnostics, what: &str, err: impl std::fmt::Display) {
    diags.add_error(
        "Client Error",
        format!("Unable to read {}, got error: {}", what, err),
    );
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsAccountData {
    pub id: Option<String>,
    pub account_id: String,
    pub account_name: Option<String>,
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub owner_emails: Option<Vec<String>>,
}

pub struct AwsAccountDataSource;

impl TypedDataSource for AwsAccountDataSource {
    type Model = AwsAccountData;

    const TYPE_NAME: &'static str = "prism_aws_account";

    fn schema(&self) -> Schema {
        Schema::new(
            "Looks up an onboarded AWS account.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("account_id").required(),
                Attribute::string("account_name").computed(),
                Attribute::string("region").computed(),
                Attribute::string("role_arn").computed(),
                Attribute::list("owner_emails").computed(),
            ],
        )
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        config: AwsAccountData,
        diags: &mut Diagnostics,
    ) -> Option<AwsAccountData> {
        match env.api.get_aws_account(&config.account_id) {
            Ok(account) => {
                let role_arn = if account.role_arn.is_empty() {
                    default_role_arn(&account.account_id)
                } else {
                    account.role_arn
                };
                Some(AwsAccountData {
                    id: Some(account.id),
                    account_id: config.account_id,
                    account_name: Some(account.account_name),
                    region: Some(account.region),
                    role_arn: Some(role_arn),
                    owner_emails: Some(account.owner_emails),
                })
            }
            Err(err) => {
                read_failed(diags, "AWS account", err);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSetData {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub session_duration: Option<String>,
    pub managed_policies: Option<Vec<String>>,
    pub inline_policies: Option<BTreeMap<String, String>>,
}

pub struct PermissionSetDataSource;

impl TypedDataSource for PermissionSetDataSource {
    type Model = PermissionSetData;

    const TYPE_NAME: &'static str = "prism_permission_set";

    fn schema(&self) -> Schema {
        Schema::new(
            "Looks up a permission set by id.",
            vec![
                Attribute::string("id").required(),
                Attribute::string("name").computed(),
                Attribute::string("description").computed(),
                Attribute::string("session_duration").computed(),
                Attribute::list("managed_policies").computed(),
                Attribute::map("inline_policies").computed(),
            ],
        )
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        config: PermissionSetData,
        diags: &mut Diagnostics,
    ) -> Option<PermissionSetData> {
        match env.api.get_permission_set(&config.id) {
            Ok(ps) => Some(PermissionSetData {
                id: config.id,
                name: Some(ps.name),
                description: Some(ps.description),
                session_duration: Some(ps.session_duration),
                managed_policies: Some(ps.managed_policies),
                inline_policies: Some(ps.inline_policies),
            }),
            Err(err) => {
                read_failed(diags, "permission set", err);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub id: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enabled: Option<bool>,
    pub attributes: Option<BTreeMap<String, String>>,
}

pub struct UserDataSource;

impl TypedDataSource for UserDataSource {
    type Model = UserData;

    const TYPE_NAME: &'static str = "prism_user";

    fn schema(&self) -> Schema {
        Schema::new(
            "Looks up a user by username.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("username").required(),
                Attribute::string("email").computed(),
                Attribute::string("first_name").computed(),
                Attribute::string("last_name").computed(),
                Attribute::bool("enabled").computed(),
                Attribute::map("attributes").computed(),
            ],
        )
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        config: UserData,
        diags: &mut Diagnostics,
    ) -> Option<UserData> {
        match env.api.get_user(&config.username) {
            Ok(user) => Some(UserData {
                attributes: Some(user.first_attribute_values()),
                id: Some(user.id),
                username: config.username,
                email: Some(user.email),
                first_name: Some(user.first_name),
                last_name: Some(user.last_name),
                enabled: Some(user.enabled),
            }),
            Err(err) => {
                read_failed(diags, "user", err);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupData {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub path: Option<String>,
}

pub struct GroupDataSource;

impl TypedDataSource for GroupDataSource {
    type Model = GroupData;

    const TYPE_NAME: &'static str = "prism_group";

    fn schema(&self) -> Schema {
        Schema::new(
            "Looks up a group by name.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("name").required(),
                Attribute::string("description").computed(),
                Attribute::string("path").computed(),
            ],
        )
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        config: GroupData,
        diags: &mut Diagnostics,
    ) -> Option<GroupData> {
        match env.api.get_group(&config.name) {
            Ok(group) => Some(GroupData {
                id: Some(group.id),
                name: config.name,
                description: Some(group.description),
                path: Some(group.path),
            }),
            Err(err) => {
                read_failed(diags, "group", err);
                None
            }
        }
    }
}
