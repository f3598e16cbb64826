use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PrismError;

/// Kind of principal a permission set is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalType {
    User,
    Group,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::User => "USER",
            PrincipalType::Group => "GROUP",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(PrincipalType::User),
            "GROUP" => Ok(PrincipalType::Group),
            other => Err(PrismError::validation(
                "principal_type",
                format!("expected USER or GROUP, got '{}'", other),
            )),
        }
    }
}

/// One backend assignment row, or a create request spanning several accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSetAssignment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id: String,
    pub permission_set_id: String,
    pub principal_type: PrincipalType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_name: String,
}

impl PermissionSetAssignment {
    /// Create request for one principal across several accounts
    pub fn request(
        permission_set_id: &str,
        principal_type: PrincipalType,
        principal: &str,
        account_ids: &[String],
    ) -> Self {
        let (username, group_name) = match principal_type {
            PrincipalType::User => (principal.to_string(), String::new()),
            PrincipalType::Group => (String::new(), principal.to_string()),
        };

        Self {
            id: String::new(),
            customer_id: String::new(),
            permission_set_id: permission_set_id.to_string(),
            principal_type,
            principal_id: String::new(),
            account_id: String::new(),
            account_ids: account_ids.to_vec(),
            username,
            group_name,
        }
    }

    /// The principal's identity for this row's principal type
    pub fn principal(&self) -> &str {
        let named = match self.principal_type {
            PrincipalType::User => &self.username,
            PrincipalType::Group => &self.group_name,
        };
        if named.is_empty() {
            &self.principal_id
        } else {
            named
        }
    }

    /// Whether this row belongs to the given logical assignment on `account_id`
    pub fn matches(
        &self,
        permission_set_id: &str,
        principal_type: PrincipalType,
        principal: &str,
        account_id: &str,
    ) -> bool {
        self.permission_set_id == permission_set_id
            && self.principal_type == principal_type
            && self.account_id == account_id
            && self.principal() == principal
    }
}

/// `GET /permission-set-assignments` payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentList {
    #[serde(default)]
    pub assignments: Vec<PermissionSetAssignment>,
    #[serde(default)]
    pub count: usize,
}
