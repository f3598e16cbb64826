//! Renders Terraform configuration and the import script for an [`Inventory`]
//!
//! Resource labels are assigned once per export and shared by the `.tf` files
//! and `import.sh`, so every import line addresses a resource that exists in
//! the generated configuration. References to objects outside the inventory
//! fall back to string literals.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::fetch::Inventory;
use super::naming::{
    NameTable, escape_hcl, escape_template_sequences, indent, shell_quote, to_var_name,
};
use crate::models::PrincipalType;

pub const IMPORT_SCRIPT: &str = "import.sh";

const TEMPLATES: &[(&str, &str)] = &[
    ("provider.tf", include_str!("templates/provider.tf.hbs")),
    ("variables.tf", include_str!("templates/variables.tf.hbs")),
    ("terraform.tfvars", include_str!("templates/terraform.tfvars.hbs")),
    ("aws_accounts.tf", include_str!("templates/aws_accounts.tf.hbs")),
    ("permission_sets.tf", include_str!("templates/permission_sets.tf.hbs")),
    ("users.tf", include_str!("templates/users.tf.hbs")),
    ("groups.tf", include_str!("templates/groups.tf.hbs")),
    ("assignments.tf", include_str!("templates/assignments.tf.hbs")),
    (IMPORT_SCRIPT, include_str!("templates/import.sh.hbs")),
];

/// One rendered output file
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub name: &'static str,
    pub contents: String,
    pub executable: bool,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub generated_at: DateTime<Utc>,
    /// Written into the provider block when set
    pub region: Option<String>,
}

/// Variables for account ids referenced by more than one assignment row.
///
/// Returns account id to variable name. Accounts missing from the inventory
/// get no variable.
pub fn extract_variables(inventory: &Inventory) -> BTreeMap<String, String> {
    let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &inventory.assignments {
        *usage.entry(row.account_id.as_str()).or_default() += 1;
    }

    let mut taken = BTreeSet::new();
    let mut variables = BTreeMap::new();
    for (account_id, count) in usage {
        if count < 2 {
            continue;
        }
        let Some(account) = inventory.account(account_id) else {
            continue;
        };

        let mut base = to_var_name(&account.account_name);
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base = format!("account_{}", base.trim_start_matches('_'));
            if base == "account_" {
                base = format!("account_{}", account_id);
            }
        }

        let mut name = format!("{}_account_id", base);
        let mut n = 2;
        while !taken.insert(name.clone()) {
            name = format!("{}_{}_account_id", base, n);
            n += 1;
        }
        variables.insert(account_id.to_string(), name);
    }
    variables
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_hcl(s))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn inline_policy_value(document: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(document)
        .and_then(|value| serde_json::to_string_pretty(&value))
    {
        Ok(pretty) => format!(
            "<<-EOT\n{}\n    EOT",
            indent(&escape_template_sequences(&pretty), 6)
        ),
        Err(_) => quoted(document),
    }
}

/// Resource labels keyed by the identity each resource imports by
#[derive(Debug, Default)]
struct Labels {
    accounts: BTreeMap<String, String>,
    permission_sets: BTreeMap<String, String>,
    users: BTreeMap<String, String>,
    groups: BTreeMap<String, String>,
}

impl Labels {
    fn assign(inventory: &Inventory) -> Self {
        let mut labels = Labels::default();

        let mut names = NameTable::new();
        for account in &inventory.accounts {
            let fallback = format!("account_{}", account.account_id);
            labels.accounts.insert(
                account.account_id.clone(),
                names.claim(&account.account_name, &fallback),
            );
        }

        let mut names = NameTable::new();
        for ps in &inventory.permission_sets {
            labels
                .permission_sets
                .insert(ps.id.clone(), names.claim(&ps.name, "permission_set"));
        }

        let mut names = NameTable::new();
        for user in &inventory.users {
            labels
                .users
                .insert(user.username.clone(), names.claim(&user.username, "user"));
        }

        let mut names = NameTable::new();
        for group in &inventory.groups {
            labels
                .groups
                .insert(group.name.clone(), names.claim(&group.name, "group"));
        }

        labels
    }

    fn account_ref(&self, account_id: &str) -> String {
        match self.accounts.get(account_id) {
            Some(label) => format!("prism_aws_account.{}.account_id", label),
            None => quoted(account_id),
        }
    }

    fn permission_set_ref(&self, id: &str) -> String {
        match self.permission_sets.get(id) {
            Some(label) => format!("prism_permission_set.{}.id", label),
            None => quoted(id),
        }
    }

    fn user_ref(&self, username: &str) -> String {
        match self.users.get(username) {
            Some(label) => format!("prism_user.{}.username", label),
            None => quoted(username),
        }
    }

    fn group_ref(&self, name: &str) -> String {
        match self.groups.get(name) {
            Some(label) => format!("prism_group.{}.name", label),
            None => quoted(name),
        }
    }
}

#[derive(Debug, Serialize)]
struct VariableView {
    name: String,
    account_id: String,
}

#[derive(Debug, Serialize)]
struct Entry {
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct AccountView {
    label: String,
    account_id: String,
    account_name: String,
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct PermissionSetView {
    label: String,
    name: String,
    description: Option<String>,
    session_duration: Option<String>,
    managed_policies: Vec<String>,
    inline_policies: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct UserView {
    label: String,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    enabled: bool,
    attributes: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct GroupView {
    label: String,
    name: String,
    description: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Serialize)]
struct MembershipView {
    label: String,
    group_ref: String,
    members: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AssignmentView {
    label: String,
    permission_set_ref: String,
    principal_type: &'static str,
    principal_ref: String,
    accounts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ImportEntry {
    label: String,
    import_id: String,
}

#[derive(Debug, Default, Serialize)]
struct ImportView {
    accounts: Vec<ImportEntry>,
    permission_sets: Vec<ImportEntry>,
    users: Vec<ImportEntry>,
    groups: Vec<ImportEntry>,
    memberships: Vec<ImportEntry>,
    assignments: Vec<ImportEntry>,
}

impl ImportView {
    fn push(list: &mut Vec<ImportEntry>, label: &str, import_id: &str) {
        list.push(ImportEntry {
            label: label.to_string(),
            import_id: shell_quote(import_id),
        });
    }
}

/// Template context shared by every output file
#[derive(Debug, Serialize)]
struct ExportView {
    generated_at: String,
    region: Option<String>,
    account_variables: Vec<VariableView>,
    accounts: Vec<AccountView>,
    permission_sets: Vec<PermissionSetView>,
    users: Vec<UserView>,
    groups: Vec<GroupView>,
    memberships: Vec<MembershipView>,
    assignments: Vec<AssignmentView>,
    imports: ImportView,
}

impl ExportView {
    fn build(
        inventory: &Inventory,
        variables: &BTreeMap<String, String>,
        options: &GenerateOptions,
    ) -> Self {
        let labels = Labels::assign(inventory);
        let mut imports = ImportView::default();

        let account_variables = variables
            .iter()
            .map(|(account_id, name)| VariableView {
                name: name.clone(),
                account_id: account_id.clone(),
            })
            .collect();

        let mut accounts = Vec::new();
        for account in &inventory.accounts {
            let label = labels.accounts[&account.account_id].clone();
            ImportView::push(&mut imports.accounts, &label, &account.account_id);
            accounts.push(AccountView {
                label,
                account_id: account.account_id.clone(),
                account_name: account.account_name.clone(),
                region: non_empty(&account.region),
            });
        }

        let mut permission_sets = Vec::new();
        for ps in &inventory.permission_sets {
            let label = labels.permission_sets[&ps.id].clone();
            ImportView::push(&mut imports.permission_sets, &label, &ps.id);
            permission_sets.push(PermissionSetView {
                label,
                name: ps.name.clone(),
                description: non_empty(&ps.description),
                session_duration: non_empty(&ps.session_duration),
                managed_policies: ps.managed_policies.clone(),
                inline_policies: ps
                    .inline_policies
                    .iter()
                    .map(|(name, document)| Entry {
                        key: quoted(name),
                        value: inline_policy_value(document),
                    })
                    .collect(),
            });
        }

        let mut users = Vec::new();
        for user in &inventory.users {
            let label = labels.users[&user.username].clone();
            ImportView::push(&mut imports.users, &label, &user.username);
            users.push(UserView {
                label,
                username: user.username.clone(),
                email: user.email.clone(),
                first_name: non_empty(&user.first_name),
                last_name: non_empty(&user.last_name),
                enabled: user.enabled,
                attributes: user
                    .first_attribute_values()
                    .into_iter()
                    .map(|(key, value)| Entry { key, value })
                    .collect(),
            });
        }

        let mut groups = Vec::new();
        let mut memberships = Vec::new();
        for group in &inventory.groups {
            let label = labels.groups[&group.name].clone();
            ImportView::push(&mut imports.groups, &label, &group.name);

            let members = inventory
                .memberships
                .get(&group.name)
                .filter(|members| !members.is_empty());
            if let Some(members) = members {
                let membership_label = format!("{}_members", label);
                ImportView::push(&mut imports.memberships, &membership_label, &group.name);
                memberships.push(MembershipView {
                    label: membership_label,
                    group_ref: labels.group_ref(&group.name),
                    members: members.iter().map(|m| labels.user_ref(m)).collect(),
                });
            }

            groups.push(GroupView {
                label,
                name: group.name.clone(),
                description: non_empty(&group.description),
                path: non_empty(&group.path),
            });
        }

        // One resource per (permission set, principal); rows are per account
        let mut grouped: BTreeMap<(&str, PrincipalType, &str), (Vec<&str>, Vec<&str>)> =
            BTreeMap::new();
        for row in &inventory.assignments {
            let (account_ids, row_ids) = grouped
                .entry((
                    row.permission_set_id.as_str(),
                    row.principal_type,
                    row.principal(),
                ))
                .or_default();
            if !account_ids.contains(&row.account_id.as_str()) {
                account_ids.push(row.account_id.as_str());
            }
            row_ids.push(row.id.as_str());
        }

        let mut names = NameTable::new();
        let mut assignments = Vec::new();
        for (index, ((ps_id, principal_type, principal), (account_ids, row_ids))) in
            grouped.into_iter().enumerate()
        {
            let source = match inventory.permission_set(ps_id) {
                Some(ps) if !ps.name.is_empty() && !principal.is_empty() => {
                    format!("{}_{}", ps.name, principal)
                }
                _ => String::new(),
            };
            let label = names.claim(&source, &format!("assignment_{}", index + 1));
            ImportView::push(&mut imports.assignments, &label, &row_ids.join(","));

            let principal_ref = match principal_type {
                PrincipalType::User => labels.user_ref(principal),
                PrincipalType::Group => labels.group_ref(principal),
            };
            assignments.push(AssignmentView {
                label,
                permission_set_ref: labels.permission_set_ref(ps_id),
                principal_type: principal_type.as_str(),
                principal_ref,
                accounts: account_ids
                    .into_iter()
                    .map(|id| labels.account_ref(id))
                    .collect(),
            });
        }

        Self {
            generated_at: options
                .generated_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
            region: options.region.clone(),
            account_variables,
            accounts,
            permission_sets,
            users,
            groups,
            memberships,
            assignments,
            imports,
        }
    }

    /// Resource files for empty kinds are skipped
    fn includes(&self, file: &str) -> bool {
        match file {
            "aws_accounts.tf" => !self.accounts.is_empty(),
            "permission_sets.tf" => !self.permission_sets.is_empty(),
            "users.tf" => !self.users.is_empty(),
            "groups.tf" => !self.groups.is_empty(),
            "assignments.tf" => !self.assignments.is_empty(),
            _ => true,
        }
    }
}

/// Handlebars renderer with HCL string escaping
pub struct Generator {
    handlebars: Handlebars<'static>,
}

impl Generator {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(escape_hcl);

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, *source)
                .with_context(|| format!("Failed to register template: {}", name))?;
        }

        Ok(Self { handlebars })
    }

    pub fn generate(
        &self,
        inventory: &Inventory,
        variables: &BTreeMap<String, String>,
        options: &GenerateOptions,
    ) -> Result<Vec<GeneratedFile>> {
        let view = ExportView::build(inventory, variables, options);

        let mut files = Vec::new();
        for (name, _) in TEMPLATES {
            if !view.includes(name) {
                continue;
            }
            let contents = self
                .handlebars
                .render(name, &view)
                .with_context(|| format!("Failed to render template: {}", name))?;
            files.push(GeneratedFile {
                name: *name,
                contents,
                executable: *name == IMPORT_SCRIPT,
            });
        }

        Ok(files)
    }
}
