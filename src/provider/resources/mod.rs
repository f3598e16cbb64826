mod aws_account;
mod group;
mod group_membership;
mod identity_provider;
mod permission_set;
mod permission_set_assignment;
mod user;

pub use aws_account::{AwsAccountModel, AwsAccountResource};
pub use group::{GroupModel, GroupResource};
pub use group_membership::{GroupMembershipModel, GroupMembershipResource};
pub use identity_provider::{IdentityProviderModel, IdentityProviderResource};
pub use permission_set::{PermissionSetModel, PermissionSetResource};
pub use permission_set_assignment::{AssignmentModel, PermissionSetAssignmentResource};
pub use user::{UserModel, UserResource};

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref ACCOUNT_ID: Regex = Regex::new(r"^\d{12}$").unwrap();
    static ref SESSION_DURATION: Regex =
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap();
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_account_id(value: &str) -> bool {
    ACCOUNT_ID.is_match(value)
}

/// ISO-8601 time duration such as `PT4H` or `PT1H30M`
pub(crate) fn is_session_duration(value: &str) -> bool {
    SESSION_DURATION
        .captures(value)
        .is_some_and(|caps| caps.iter().skip(1).any(|group| group.is_some()))
}

pub(crate) fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Refresh an optional string from the API.
///
/// An empty remote value keeps a prior empty string (the user wrote `""`)
/// and otherwise clears the attribute.
pub(crate) fn refresh_string(remote: String, prior: Option<String>) -> Option<String> {
    if remote.is_empty() {
        prior.filter(String::is_empty)
    } else {
        Some(remote)
    }
}

pub(crate) fn refresh_list(remote: Vec<String>, prior: Option<Vec<String>>) -> Option<Vec<String>> {
    if remote.is_empty() {
        prior.filter(Vec::is_empty)
    } else {
        Some(remote)
    }
}

pub(crate) fn refresh_map(
    remote: BTreeMap<String, String>,
    prior: Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    if remote.is_empty() {
        prior.filter(BTreeMap::is_empty)
    } else {
        Some(remote)
    }
}

/// Upper-case the first letter of an error message for a diagnostic detail
pub(crate) fn sentence(message: impl ToString) -> String {
    let message = message.to_string();
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => message,
    }
}
