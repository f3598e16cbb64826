use serde::{Deserialize, Serialize};

/// AWS account as returned by get, update and list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsAccount {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub customer_id: String,
    pub account_id: String,
    #[serde(rename = "name")]
    pub account_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_emails: Vec<String>,
}

/// Body of `POST /accounts/onboard`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardAccountRequest {
    pub account_id: String,
    pub account_name: String,
}

impl From<&AwsAccount> for OnboardAccountRequest {
    fn from(account: &AwsAccount) -> Self {
        Self {
            account_id: account.account_id.clone(),
            account_name: account.account_name.clone(),
        }
    }
}

/// Onboarding response; the account record sits under `account`
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardAccountResponse {
    pub account: OnboardedAccount,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardedAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub role_arn: String,
}

impl From<OnboardAccountResponse> for AwsAccount {
    fn from(response: OnboardAccountResponse) -> Self {
        let account = response.account;
        AwsAccount {
            id: account.id,
            customer_id: String::new(),
            account_id: account.account_id,
            account_name: account.name,
            region: account.region,
            role_arn: account.role_arn,
            owner_emails: Vec::new(),
        }
    }
}

/// Role assumed in onboarded accounts when the backend reports none
pub fn default_role_arn(account_id: &str) -> String {
    format!("arn:aws:iam::{}:role/CloudKeeper-SSO-Role", account_id)
}
