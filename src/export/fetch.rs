use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::client::PrismApi;
use crate::models::{AwsAccount, Group, PermissionSet, PermissionSetAssignment, User};
use crate::traits::Output;

/// Everything the exporter knows about one customer, sorted for stable output
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub accounts: Vec<AwsAccount>,
    pub permission_sets: Vec<PermissionSet>,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
    /// Group name to sorted member usernames
    pub memberships: BTreeMap<String, Vec<String>>,
    pub assignments: Vec<PermissionSetAssignment>,
    pub warnings: Vec<String>,
}

impl Inventory {
    pub fn account(&self, account_id: &str) -> Option<&AwsAccount> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    pub fn permission_set(&self, id: &str) -> Option<&PermissionSet> {
        self.permission_sets.iter().find(|ps| ps.id == id)
    }
}

/// Fetch the customer's full inventory.
///
/// Listing failures abort the export. A failure to list one group's members
/// only produces a warning.
pub fn fetch_all(api: &dyn PrismApi, output: &dyn Output) -> Result<Inventory> {
    let mut inventory = Inventory::default();

    output.dimmed("  → Fetching AWS accounts...");
    inventory.accounts = api
        .list_aws_accounts()
        .context("Failed to fetch AWS accounts")?;
    inventory
        .accounts
        .sort_by(|a, b| a.account_id.cmp(&b.account_id));
    output.info(&format!("Found {} AWS accounts", inventory.accounts.len()));

    output.dimmed("  → Fetching permission sets...");
    inventory.permission_sets = api
        .list_permission_sets()
        .context("Failed to fetch permission sets")?;
    inventory
        .permission_sets
        .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
    output.info(&format!(
        "Found {} permission sets",
        inventory.permission_sets.len()
    ));

    output.dimmed("  → Fetching users...");
    inventory.users = api.list_users().context("Failed to fetch users")?;
    inventory.users.sort_by(|a, b| a.username.cmp(&b.username));
    output.info(&format!("Found {} users", inventory.users.len()));

    output.dimmed("  → Fetching groups...");
    inventory.groups = api.list_groups().context("Failed to fetch groups")?;
    inventory.groups.sort_by(|a, b| a.name.cmp(&b.name));
    output.info(&format!("Found {} groups", inventory.groups.len()));

    output.dimmed("  → Fetching group memberships...");
    for group in &inventory.groups {
        match api.get_group_members(&group.name) {
            Ok(mut members) => {
                members.sort();
                members.dedup();
                inventory.memberships.insert(group.name.clone(), members);
            }
            Err(err) => {
                let warning = format!("Failed to fetch members for group {}: {}", group.name, err);
                tracing::warn!(group = %group.name, error = %err, "membership fetch failed");
                output.warning(&warning);
                inventory.warnings.push(warning);
            }
        }
    }

    output.dimmed("  → Fetching permission set assignments...");
    inventory.assignments = api
        .list_assignments()
        .context("Failed to fetch permission set assignments")?;
    inventory.assignments.sort_by(|a, b| {
        (
            &a.permission_set_id,
            a.principal_type,
            a.principal(),
            &a.account_id,
            &a.id,
        )
            .cmp(&(
                &b.permission_set_id,
                b.principal_type,
                b.principal(),
                &b.account_id,
                &b.id,
            ))
    });
    output.info(&format!(
        "Found {} permission set assignments",
        inventory.assignments.len()
    ));

    Ok(inventory)
}
