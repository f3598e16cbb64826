use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::provider::diagnostics::Diagnostics;
use crate::provider::resource::{ResourceEnv, TypedResource};
use crate::provider::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMembershipModel {
    pub id: Option<String>,
    pub group_name: String,
    pub usernames: Vec<String>,
}

/// Entries of `left` missing from `right`, in `left` order
fn missing_from(left: &[String], right: &[String]) -> Vec<String> {
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    left.iter()
        .filter(|name| !right.contains(name.as_str()) && seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Keep the order the user wrote for members that are still present and
/// append members that appeared remotely.
fn merge_order(known: &[String], remote: Vec<String>) -> Vec<String> {
    let remote_set: BTreeSet<&str> = remote.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    let mut merged: Vec<String> = known
        .iter()
        .filter(|name| remote_set.contains(name.as_str()) && seen.insert(name.as_str()))
        .cloned()
        .collect();
    let mut extra: Vec<String> = missing_from(&remote, known);
    extra.sort();
    merged.extend(extra);
    merged
}

pub struct GroupMembershipResource;

impl TypedResource for GroupMembershipResource {
    type Model = GroupMembershipModel;

    const TYPE_NAME: &'static str = "prism_group_membership";
    const IMPORT_ATTRIBUTE: &'static str = "group_name";

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages the member list of a group.",
            vec![
                Attribute::string("id").computed().describe("Same as group_name."),
                Attribute::string("group_name").required().replace(),
                Attribute::list("usernames").required(),
            ],
        )
    }

    fn create(
        &self,
        env: &ResourceEnv<'_>,
        plan: GroupMembershipModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupMembershipModel> {
        if let Err(err) = env.api.add_group_members(&plan.group_name, &plan.usernames) {
            diags.add_error(
                "Client Error",
                format!("Unable to add users to group, got error: {}", err),
            );
            return None;
        }
        Some(GroupMembershipModel {
            id: Some(plan.group_name.clone()),
            ..plan
        })
    }

    fn read(
        &self,
        env: &ResourceEnv<'_>,
        state: GroupMembershipModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupMembershipModel> {
        match env.api.get_group_members(&state.group_name) {
            Ok(remote) => Some(GroupMembershipModel {
                id: Some(state.group_name.clone()),
                usernames: merge_order(&state.usernames, remote),
                group_name: state.group_name,
            }),
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.add_error(
                    "Client Error",
                    format!("Unable to read group members, got error: {}", err),
                );
                None
            }
        }
    }

    fn update(
        &self,
        env: &ResourceEnv<'_>,
        prior: GroupMembershipModel,
        plan: GroupMembershipModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupMembershipModel> {
        let to_add = missing_from(&plan.usernames, &prior.usernames);
        let to_remove = missing_from(&prior.usernames, &plan.usernames);
        tracing::debug!(group = %plan.group_name, add = ?to_add, remove = ?to_remove, "updating group members");

        if !to_add.is_empty() {
            if let Err(err) = env.api.add_group_members(&plan.group_name, &to_add) {
                diags.add_error(
                    "Client Error",
                    format!("Unable to add users to group, got error: {}", err),
                );
                return None;
            }
        }

        if !to_remove.is_empty() {
            if let Err(err) = env.api.remove_group_members(&plan.group_name, &to_remove) {
                diags.add_error(
                    "Client Error",
                    format!("Unable to remove users from group, got error: {}", err),
                );
                return None;
            }
        }

        Some(GroupMembershipModel {
            id: Some(plan.group_name.clone()),
            ..plan
        })
    }

    fn delete(&self, env: &ResourceEnv<'_>, state: GroupMembershipModel, diags: &mut Diagnostics) {
        if state.usernames.is_empty() {
            return;
        }
        match env
            .api
            .remove_group_members(&state.group_name, &state.usernames)
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => diags.add_error(
                "Client Error",
                format!("Unable to remove users from group, got error: {}", err),
            ),
        }
    }
}
