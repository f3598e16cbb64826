use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub customer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// Body of add/remove member calls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMembers {
    pub users: Vec<String>,
}

/// `GET /groups/{name}/members` payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupMembersResponse {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub members: Vec<MemberRef>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub realm: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberRef {
    pub username: String,
}

impl GroupMembersResponse {
    pub fn usernames(self) -> Vec<String> {
        self.members.into_iter().map(|m| m.username).collect()
    }
}
