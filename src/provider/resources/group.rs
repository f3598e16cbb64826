use serde::{Deserialize, Serialize};

use crate::models::Group;
use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub path: Option<String>,
}

impl GroupModel {
    fn to_api(&self) -> Group {
        Group {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_default(),
            path: self.path.clone().unwrap_or_default(),
            ..Default::default()
        }
    }

    // description and path are optional+computed: the backend value wins
    fn refresh(self, remote: Group) -> Self {
        Self {
            id: if remote.id.is_empty() { self.id } else { Some(remote.id) },
            name: remote.name,
            description: Some(remote.description),
            path: Some(remote.path),
        }
    }
}

pub struct GroupResource;

impl TypedResource for GroupResource {
    type Model = GroupModel;

    const TYPE_NAME: &'static str = "prism_group";
    const IMPORT_ATTRIBUTE: &'static str = "name";

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages a Prism group.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("name").required().replace(),
                Attribute::string("description").optional_computed(),
                Attribute::string("path")
                    .optional_computed()
                    .describe("Hierarchical group path."),
            ],
        )
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: GroupModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupModel> {
        match env.api.create_group(&plan.to_api()) {
            Ok(created) => {
                tracing::info!(name = %created.name, "created group");
                Some(plan.refresh(created))
            }
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to create group, got error: {}", err),
                );
                None
            }
        }
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: GroupModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupModel> {
        match env.api.get_group(&state.name) {
            Ok(remote) => Some(state.refresh(remote)),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read group, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: GroupModel,
        plan: GroupModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupModel> {
        match env.api.update_group(&prior.name, &plan.to_api()) {
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
                    format!("Unable to update group, got error: {}", err),
                );
                None
            }
        }
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: GroupModel, diags: &mut Diagnostics) {
        match env.api.delete_group(&state.name) {
            Ok(()) => tracing::info!(name = %state.name, "deleted group"),
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to delete group, got error: {}", err),
            ),
        }
    }
}
