//! Test helpers: an in-memory Prism backend and fixture builders
//!
//! `MockPrismApi` keeps accounts, permission sets, assignments, users, groups,
//! memberships and identity providers in memory and records every call as
//! `"METHOD /path"`. Builder methods seed data and inject the backend quirks
//! the provider has to cope with: late visibility after create, rows that
//! linger after delete, rows missing from list results and hard failures.

#![cfg(test)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::client::PrismApi;
use crate::error::{PrismError, PrismResult};
use crate::models::{
    AwsAccount, Group, IdentityProvider, IdentityProviderType, PermissionSet,
    PermissionSetAssignment, PrincipalType, User,
};
use crate::wait::PollPolicy;

/// Poll policy short enough for unit tests
pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        timeout: Duration::from_millis(200),
        interval: Duration::from_millis(5),
    }
}

#[derive(Default)]
struct MockState {
    accounts: BTreeMap<String, AwsAccount>,
    permission_sets: BTreeMap<String, PermissionSet>,
    assignments: Vec<PermissionSetAssignment>,
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    members: BTreeMap<String, BTreeSet<String>>,
    identity_providers: BTreeMap<String, IdentityProvider>,
    calls: Vec<String>,
    failures: HashMap<String, (u16, String)>,
    not_found_budget: HashMap<String, u32>,
    lingering: HashMap<String, u32>,
    linger_config: HashMap<String, u32>,
    hidden_accounts: HashSet<String>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn not_found(what: &str) -> PrismError {
    PrismError::Status {
        status: 404,
        body: format!("{{\"success\":false,\"error\":\"{} not found\"}}", what),
    }
}

/// In-memory backend implementing [`PrismApi`]
pub struct MockPrismApi {
    state: Mutex<MockState>,
}

impl Default for MockPrismApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPrismApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_account(self, account_id: &str, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("acc");
            state.accounts.insert(
                account_id.to_string(),
                AwsAccount {
                    id,
                    customer_id: "cust-1".to_string(),
                    account_id: account_id.to_string(),
                    account_name: name.to_string(),
                    ..Default::default()
                },
            );
        }
        self
    }

    pub fn with_permission_set(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().permission_sets.insert(
            id.to_string(),
            PermissionSet {
                id: id.to_string(),
                name: name.to_string(),
                session_duration: "PT1H".to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_full_permission_set(self, permission_set: PermissionSet) -> Self {
        self.state
            .lock()
            .unwrap()
            .permission_sets
            .insert(permission_set.id.clone(), permission_set);
        self
    }

    pub fn with_user(self, username: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("user");
            state.users.insert(
                username.to_string(),
                User {
                    id,
                    customer_id: "cust-1".to_string(),
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                    enabled: true,
                    ..Default::default()
                },
            );
        }
        self
    }

    pub fn with_full_user(self, user: User) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.username.clone(), user);
        self
    }

    pub fn with_group(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id("group");
            state.groups.insert(
                name.to_string(),
                Group {
                    id,
                    customer_id: "cust-1".to_string(),
                    name: name.to_string(),
                    path: format!("/{}", name),
                    ..Default::default()
                },
            );
        }
        self
    }

    pub fn with_members(self, group: &str, usernames: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .members
            .entry(group.to_string())
            .or_default()
            .extend(usernames.iter().map(|u| u.to_string()));
        self
    }

    pub fn with_assignment(
        self,
        id: &str,
        permission_set_id: &str,
        principal_type: PrincipalType,
        principal: &str,
        account_id: &str,
    ) -> Self {
        let mut row = PermissionSetAssignment::request(
            permission_set_id,
            principal_type,
            principal,
            &[],
        );
        row.id = id.to_string();
        row.customer_id = "cust-1".to_string();
        row.principal_id = format!("{}-uuid", principal);
        row.account_id = account_id.to_string();
        self.state.lock().unwrap().assignments.push(row);
        self
    }

    pub fn with_identity_provider(self, idp: IdentityProvider) -> Self {
        self.state
            .lock()
            .unwrap()
            .identity_providers
            .insert(idp.provider_type.as_str().to_string(), idp);
        self
    }

    /// Every call matching `label` fails with the given status
    pub fn fail(self, label: &str, status: u16, body: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(label.to_string(), (status, body.to_string()));
        self
    }

    /// The next `times` calls matching `label` answer 404 before normal service
    pub fn not_found_times(self, label: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .not_found_budget
            .insert(label.to_string(), times);
        self
    }

    /// After deletion, `GET` of the row keeps succeeding `times` more times
    pub fn linger_after_delete(self, assignment_id: &str, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .linger_config
            .insert(assignment_id.to_string(), times);
        self
    }

    /// Rows on this account are left out of list results
    pub fn hide_from_list_for_account(self, account_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .hidden_accounts
            .insert(account_id.to_string());
        self
    }

    /// Out-of-band removal, not recorded as a call
    pub fn remove_assignment(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .assignments
            .retain(|row| row.id != id);
    }

    pub fn remove_user(&self, username: &str) {
        self.state.lock().unwrap().users.remove(username);
    }

    pub fn assignment(&self, id: &str) -> Option<PermissionSetAssignment> {
        self.state
            .lock()
            .unwrap()
            .assignments
            .iter()
            .find(|row| row.id == id)
            .cloned()
    }

    pub fn assignment_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .assignments
            .iter()
            .map(|row| row.id.clone())
            .collect()
    }

    pub fn account(&self, account_id: &str) -> Option<AwsAccount> {
        self.state.lock().unwrap().accounts.get(account_id).cloned()
    }

    pub fn permission_set(&self, id: &str) -> Option<PermissionSet> {
        self.state.lock().unwrap().permission_sets.get(id).cloned()
    }

    pub fn user(&self, username: &str) -> Option<User> {
        self.state.lock().unwrap().users.get(username).cloned()
    }

    pub fn group(&self, name: &str) -> Option<Group> {
        self.state.lock().unwrap().groups.get(name).cloned()
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .members
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn identity_provider(&self, provider_type: IdentityProviderType) -> Option<IdentityProvider> {
        self.state
            .lock()
            .unwrap()
            .identity_providers
            .get(provider_type.as_str())
            .cloned()
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, label: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == label).count()
    }

    pub fn count_calls_with_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Record the call and apply injected failures
    fn enter(&self, method: &str, path: &str) -> PrismResult<()> {
        let label = format!("{} {}", method, path);
        let mut state = self.state.lock().unwrap();
        state.calls.push(label.clone());

        if let Some((status, body)) = state.failures.get(&label) {
            return Err(PrismError::Status {
                status: *status,
                body: body.clone(),
            });
        }

        if let Some(remaining) = state.not_found_budget.get_mut(&label) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(not_found(path));
            }
        }

        Ok(())
    }
}

impl PrismApi for MockPrismApi {
    fn create_aws_account(&self, account: &AwsAccount) -> PrismResult<AwsAccount> {
        self.enter("POST", "/accounts/onboard")?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("acc");
        let stored = AwsAccount {
            id,
            customer_id: "cust-1".to_string(),
            account_id: account.account_id.clone(),
            account_name: account.account_name.clone(),
            ..Default::default()
        };
        state
            .accounts
            .insert(stored.account_id.clone(), stored.clone());
        Ok(stored)
    }

    fn get_aws_account(&self, account_id: &str) -> PrismResult<AwsAccount> {
        self.enter("GET", &format!("/aws-accounts/{}", account_id))?;
        self.account(account_id)
            .ok_or_else(|| not_found("AWS account"))
    }

    fn update_aws_account(
        &self,
        account_id: &str,
        account: &AwsAccount,
    ) -> PrismResult<AwsAccount> {
        self.enter("PUT", &format!("/aws-accounts/{}", account_id))?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| not_found("AWS account"))?;
        existing.account_name = account.account_name.clone();
        existing.region = account.region.clone();
        existing.role_arn = account.role_arn.clone();
        existing.owner_emails = account.owner_emails.clone();
        Ok(existing.clone())
    }

    fn delete_aws_account(&self, account_id: &str) -> PrismResult<()> {
        self.enter("DELETE", &format!("/aws-accounts/{}/deboard", account_id))?;
        self.state
            .lock()
            .unwrap()
            .accounts
            .remove(account_id)
            .map(|_| ())
            .ok_or_else(|| not_found("AWS account"))
    }

    fn list_aws_accounts(&self) -> PrismResult<Vec<AwsAccount>> {
        self.enter("GET", "/aws-accounts")?;
        Ok(self.state.lock().unwrap().accounts.values().cloned().collect())
    }

    fn create_permission_set(&self, permission_set: &PermissionSet) -> PrismResult<PermissionSet> {
        self.enter("POST", "/permission-sets")?;
        let mut state = self.state.lock().unwrap();
        let mut stored = permission_set.clone();
        stored.id = state.next_id("ps");
        state
            .permission_sets
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn get_permission_set(&self, id: &str) -> PrismResult<PermissionSet> {
        self.enter("GET", &format!("/permission-sets/{}", id))?;
        self.permission_set(id)
            .ok_or_else(|| not_found("permission set"))
    }

    fn update_permission_set(
        &self,
        id: &str,
        permission_set: &PermissionSet,
    ) -> PrismResult<PermissionSet> {
        self.enter("PUT", &format!("/permission-sets/{}", id))?;
        let mut state = self.state.lock().unwrap();
        if !state.permission_sets.contains_key(id) {
            return Err(not_found("permission set"));
        }
        let mut stored = permission_set.clone();
        stored.id = id.to_string();
        state.permission_sets.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    fn delete_permission_set(&self, id: &str) -> PrismResult<()> {
        self.enter("DELETE", &format!("/permission-sets/{}", id))?;
        self.state
            .lock()
            .unwrap()
            .permission_sets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("permission set"))
    }

    fn list_permission_sets(&self) -> PrismResult<Vec<PermissionSet>> {
        self.enter("GET", "/permission-sets")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .permission_sets
            .values()
            .cloned()
            .collect())
    }

    // One row per account; only the first row is echoed back.
    fn create_assignment(
        &self,
        assignment: &PermissionSetAssignment,
    ) -> PrismResult<PermissionSetAssignment> {
        self.enter("POST", "/permission-set-assignments")?;
        let mut state = self.state.lock().unwrap();
        let principal = assignment.principal().to_string();

        let mut first = None;
        for account_id in &assignment.account_ids {
            let mut row = assignment.clone();
            row.id = state.next_id("asg");
            row.customer_id = "cust-1".to_string();
            row.principal_id = format!("{}-uuid", principal);
            row.account_id = account_id.clone();
            row.account_ids = Vec::new();
            if first.is_none() {
                first = Some(row.clone());
            }
            state.assignments.push(row);
        }

        first.ok_or_else(|| PrismError::Envelope("accountIds must not be empty".to_string()))
    }

    fn get_assignment(&self, id: &str) -> PrismResult<PermissionSetAssignment> {
        self.enter("GET", &format!("/permission-set-assignments/{}", id))?;
        let mut state = self.state.lock().unwrap();

        if let Some(remaining) = state.lingering.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(PermissionSetAssignment {
                    id: id.to_string(),
                    ..PermissionSetAssignment::request("", PrincipalType::User, "", &[])
                });
            }
        }

        state
            .assignments
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or_else(|| not_found("assignment"))
    }

    fn delete_assignment(&self, id: &str) -> PrismResult<()> {
        self.enter("DELETE", &format!("/permission-set-assignments/{}", id))?;
        let mut state = self.state.lock().unwrap();
        let before = state.assignments.len();
        state.assignments.retain(|row| row.id != id);
        if state.assignments.len() == before {
            return Err(not_found("assignment"));
        }
        if let Some(times) = state.linger_config.get(id).copied() {
            state.lingering.insert(id.to_string(), times);
        }
        Ok(())
    }

    fn list_assignments(&self) -> PrismResult<Vec<PermissionSetAssignment>> {
        self.enter("GET", "/permission-set-assignments")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .assignments
            .iter()
            .filter(|row| !state.hidden_accounts.contains(&row.account_id))
            .cloned()
            .collect())
    }

    fn create_user(&self, user: &User) -> PrismResult<User> {
        self.enter("POST", "/users")?;
        let mut state = self.state.lock().unwrap();
        if state.users.contains_key(&user.username) {
            return Err(PrismError::Status {
                status: 409,
                body: "user already exists".to_string(),
            });
        }
        let mut stored = user.clone();
        stored.id = state.next_id("user");
        stored.customer_id = "cust-1".to_string();
        state.users.insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }

    fn get_user(&self, username: &str) -> PrismResult<User> {
        self.enter("GET", &format!("/users/{}", username))?;
        self.user(username).ok_or_else(|| not_found("user"))
    }

    fn update_user(&self, username: &str, user: &User) -> PrismResult<User> {
        self.enter("PUT", &format!("/users/{}", username))?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .users
            .get_mut(username)
            .ok_or_else(|| not_found("user"))?;
        let id = existing.id.clone();
        *existing = User {
            id,
            customer_id: "cust-1".to_string(),
            ..user.clone()
        };
        Ok(existing.clone())
    }

    fn delete_user(&self, username: &str) -> PrismResult<()> {
        self.enter("DELETE", &format!("/users/{}", username))?;
        self.state
            .lock()
            .unwrap()
            .users
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| not_found("user"))
    }

    fn list_users(&self) -> PrismResult<Vec<User>> {
        self.enter("GET", "/users")?;
        Ok(self.state.lock().unwrap().users.values().cloned().collect())
    }

    fn create_group(&self, group: &Group) -> PrismResult<Group> {
        self.enter("POST", "/groups")?;
        let mut state = self.state.lock().unwrap();
        let mut stored = group.clone();
        stored.id = state.next_id("group");
        stored.customer_id = "cust-1".to_string();
        if stored.path.is_empty() {
            stored.path = format!("/{}", stored.name);
        }
        state.groups.insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    fn get_group(&self, name: &str) -> PrismResult<Group> {
        self.enter("GET", &format!("/groups/{}", name))?;
        self.group(name).ok_or_else(|| not_found("group"))
    }

    fn update_group(&self, name: &str, group: &Group) -> PrismResult<Group> {
        self.enter("PUT", &format!("/groups/{}", name))?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .groups
            .get_mut(name)
            .ok_or_else(|| not_found("group"))?;
        existing.description = group.description.clone();
        if !group.path.is_empty() {
            existing.path = group.path.clone();
        }
        Ok(existing.clone())
    }

    fn delete_group(&self, name: &str) -> PrismResult<()> {
        self.enter("DELETE", &format!("/groups/{}", name))?;
        let mut state = self.state.lock().unwrap();
        state.members.remove(name);
        state
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("group"))
    }

    fn list_groups(&self) -> PrismResult<Vec<Group>> {
        self.enter("GET", "/groups")?;
        Ok(self.state.lock().unwrap().groups.values().cloned().collect())
    }

    fn add_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()> {
        self.enter("POST", &format!("/groups/{}/members", group))?;
        let mut state = self.state.lock().unwrap();
        if !state.groups.contains_key(group) {
            return Err(not_found("group"));
        }
        state
            .members
            .entry(group.to_string())
            .or_default()
            .extend(usernames.iter().cloned());
        Ok(())
    }

    fn remove_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()> {
        self.enter("DELETE", &format!("/groups/{}/members", group))?;
        let mut state = self.state.lock().unwrap();
        if !state.groups.contains_key(group) {
            return Err(not_found("group"));
        }
        if let Some(members) = state.members.get_mut(group) {
            for username in usernames {
                members.remove(username);
            }
        }
        Ok(())
    }

    fn get_group_members(&self, group: &str) -> PrismResult<Vec<String>> {
        self.enter("GET", &format!("/groups/{}/members", group))?;
        let state = self.state.lock().unwrap();
        if !state.groups.contains_key(group) {
            return Err(not_found("group"));
        }
        Ok(state
            .members
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn create_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider> {
        let key = idp.provider_type.as_str();
        self.enter("POST", &format!("/identity-providers/{}", key))?;
        let mut stored = idp.clone();
        stored.id = idp.alias.clone();
        self.state
            .lock()
            .unwrap()
            .identity_providers
            .insert(key.to_string(), stored.clone());
        Ok(stored)
    }

    fn get_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        _alias: &str,
    ) -> PrismResult<IdentityProvider> {
        self.enter("GET", &format!("/identity-providers/{}", provider_type))?;
        self.identity_provider(provider_type)
            .ok_or_else(|| not_found("identity provider"))
    }

    fn update_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider> {
        let key = idp.provider_type.as_str();
        self.enter("PUT", &format!("/identity-providers/{}", key))?;
        let mut state = self.state.lock().unwrap();
        if !state.identity_providers.contains_key(key) {
            return Err(not_found("identity provider"));
        }
        let mut stored = idp.clone();
        stored.id = idp.alias.clone();
        state
            .identity_providers
            .insert(key.to_string(), stored.clone());
        Ok(stored)
    }

    fn delete_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        _alias: &str,
    ) -> PrismResult<()> {
        self.enter("DELETE", &format!("/identity-providers/{}", provider_type))?;
        self.state
            .lock()
            .unwrap()
            .identity_providers
            .remove(provider_type.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found("identity provider"))
    }
}
