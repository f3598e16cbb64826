use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use super::{is_email, refresh_map, refresh_string};
use crate::models::User;
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub id: Option<String>,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enabled: Option<bool>,
    /// First value of each remote attribute
    pub attributes: Option<BTreeMap<String, String>>,
}

impl UserModel {
    fn to_api(&self) -> User {
        User {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone().unwrap_or_default(),
            last_name: self.last_name.clone().unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            attributes: self
                .attributes
                .as_ref()
                .map(User::attributes_from)
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    fn refresh(mut self, remote: User) -> Self {
        let attributes = remote.first_attribute_values();
        if !remote.id.is_empty() {
            self.id = Some(remote.id);
        }
        self.username = remote.username;
        self.email = remote.email;
        self.first_name = refresh_string(remote.first_name, self.first_name.take());
        self.last_name = refresh_string(remote.last_name, self.last_name.take());
        self.enabled = Some(remote.enabled);
        self.attributes = refresh_map(attributes, self.attributes.take());
        self
    }
}

pub struct UserResource;

impl TypedResource for UserResource {
    type Model = UserModel;

    const TYPE_NAME: &'static str = "prism_user";
    const IMPORT_ATTRIBUTE: &'static str = "username";

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages a Prism user.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("username").required().replace(),
                Attribute::string("email").required(),
                Attribute::string("first_name").optional(),
                Attribute::string("last_name").optional(),
                Attribute::bool("enabled")
                    .optional_computed()
                    .default_value(json!(true)),
                Attribute::map("attributes")
                    .optional()
                    .describe("Custom attributes; only the first value of each key is tracked."),
            ],
        )
    }

    fn validate(&self, model: &UserModel, diags: &mut Diagnostics) {
        if !is_email(&model.email) {
            diags.add_attribute_error(
                "email",
                "Invalid Email Address",
                format!("\"{}\" is not a valid email address.", model.email),
            );
        }
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: UserModel,
        diags: &mut Diagnostics,
    ) -> Option<UserModel> {
        match env.api.create_user(&plan.to_api()) {
            Ok(created) => {
                tracing::info!(username = %created.username, "created user");
                Some(UserModel {
                    id: Some(created.id),
                    enabled: Some(plan.enabled.unwrap_or(true)),
                    ..plan
                })
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create user, got error: {}", err),
                );
                None
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: UserModel,
        diags: &mut Diagnostics,
    ) -> Option<UserModel> {
        match env.api.get_user(&state.username) {
            Ok(remote) => Some(state.refresh(remote)),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read user, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: UserModel,
        plan: UserModel,
        diags: &mut Diagnostics,
    ) -> Option<UserModel> {
        match env.api.update_user(&prior.username, &plan.to_api()) {
            Ok(_) => Some(UserModel {
                id: prior.id,
                enabled: Some(plan.enabled.unwrap_or(true)),
                ..plan
            }),
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to update user, got error: {}", err),
                );
                None
            }
        }
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: UserModel, diags: &mut Diagnostics) {
        match env.api.delete_user(&state.username) {
            Ok(()) => tracing::info!(username = %state.username, "deleted user"),
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to delete user, got error: {}", err),
            ),
        }
    }
}
