//! Prism REST API client
//!
//! Every call goes to `<base>/api/v1/customers/<subdomain>/<path>` and every
//! response is wrapped in `{success, message, error, data}`. The client holds
//! only connection settings, so one instance is shared by all handlers.

pub mod transport;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ProviderConfig;
use crate::error::{PrismError, PrismResult};
use crate::models::{
    AssignmentList, AwsAccount, Group, GroupMembers, GroupMembersResponse, IdentityProvider,
    IdentityProviderEnvelope, IdentityProviderType, OnboardAccountRequest, OnboardAccountResponse,
    PermissionSet, PermissionSetAssignment, User,
};

pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};

/// Operations the provider and the export tool need from the backend
pub trait PrismApi: Send + Sync {
    fn create_aws_account(&self, account: &AwsAccount) -> PrismResult<AwsAccount>;
    fn get_aws_account(&self, account_id: &str) -> PrismResult<AwsAccount>;
    fn update_aws_account(&self, account_id: &str, account: &AwsAccount)
    -> PrismResult<AwsAccount>;
    fn delete_aws_account(&self, account_id: &str) -> PrismResult<()>;
    fn list_aws_accounts(&self) -> PrismResult<Vec<AwsAccount>>;

    fn create_permission_set(&self, permission_set: &PermissionSet) -> PrismResult<PermissionSet>;
    fn get_permission_set(&self, id: &str) -> PrismResult<PermissionSet>;
    fn update_permission_set(
        &self,
        id: &str,
        permission_set: &PermissionSet,
    ) -> PrismResult<PermissionSet>;
    fn delete_permission_set(&self, id: &str) -> PrismResult<()>;
    fn list_permission_sets(&self) -> PrismResult<Vec<PermissionSet>>;

    fn create_assignment(
        &self,
        assignment: &PermissionSetAssignment,
    ) -> PrismResult<PermissionSetAssignment>;
    fn get_assignment(&self, id: &str) -> PrismResult<PermissionSetAssignment>;
    fn delete_assignment(&self, id: &str) -> PrismResult<()>;
    fn list_assignments(&self) -> PrismResult<Vec<PermissionSetAssignment>>;

    fn create_user(&self, user: &User) -> PrismResult<User>;
    fn get_user(&self, username: &str) -> PrismResult<User>;
    fn update_user(&self, username: &str, user: &User) -> PrismResult<User>;
    fn delete_user(&self, username: &str) -> PrismResult<()>;
    fn list_users(&self) -> PrismResult<Vec<User>>;

    fn create_group(&self, group: &Group) -> PrismResult<Group>;
    fn get_group(&self, name: &str) -> PrismResult<Group>;
    fn update_group(&self, name: &str, group: &Group) -> PrismResult<Group>;
    fn delete_group(&self, name: &str) -> PrismResult<()>;
    fn list_groups(&self) -> PrismResult<Vec<Group>>;

    fn add_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()>;
    fn remove_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()>;
    fn get_group_members(&self, group: &str) -> PrismResult<Vec<String>>;

    fn create_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider>;
    fn get_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        alias: &str,
    ) -> PrismResult<IdentityProvider>;
    fn update_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider>;
    fn delete_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        alias: &str,
    ) -> PrismResult<()>;
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Extract `data` from a response envelope
pub fn unwrap_envelope(body: &str) -> PrismResult<Value> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|source| PrismError::Decode {
        what: "API response",
        source,
    })?;

    if !envelope.success {
        // Some failures only fill in `message`
        let reason = if envelope.error.is_empty() {
            envelope.message
        } else {
            envelope.error
        };
        return Err(PrismError::Envelope(reason));
    }

    Ok(envelope.data.unwrap_or(Value::Null))
}

pub struct PrismClient<T: HttpTransport = ReqwestTransport> {
    base: Url,
    subdomain: String,
    token: String,
    transport: T,
}

impl PrismClient<ReqwestTransport> {
    pub fn new(config: &ProviderConfig) -> PrismResult<Self> {
        Self::with_transport(config, ReqwestTransport::new()?)
    }
}

impl<T: HttpTransport> PrismClient<T> {
    pub fn with_transport(config: &ProviderConfig, transport: T) -> PrismResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| PrismError::validation("base_url", e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(PrismError::validation(
                "base_url",
                format!("'{}' cannot be used as a base URL", config.base_url),
            ));
        }

        Ok(Self {
            base,
            subdomain: config.subdomain.clone(),
            token: config.token.clone(),
            transport,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "v1", "customers", self.subdomain.as_str()])
                .extend(segments.iter().copied());
        }
        url
    }

    fn execute(&self, method: Method, segments: &[&str], body: Option<String>) -> PrismResult<Value> {
        let url = self.endpoint(segments);
        tracing::debug!(%method, path = %url.path(), "prism request");

        let response = self.transport.send(HttpRequest {
            method,
            url: url.to_string(),
            token: self.token.clone(),
            body,
        })?;

        if response.status >= 400 {
            tracing::debug!(%method, path = %url.path(), status = response.status, "prism request failed");
            return Err(PrismError::Status {
                status: response.status,
                body: response.body,
            });
        }

        unwrap_envelope(&response.body)
    }

    fn call<R: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        what: &'static str,
    ) -> PrismResult<R> {
        let data = self.execute(method, segments, None)?;
        decode(data, what)
    }

    fn call_with<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        what: &'static str,
    ) -> PrismResult<R> {
        let data = self.execute(method, segments, Some(encode(body)?))?;
        decode(data, what)
    }

    fn discard(&self, method: Method, segments: &[&str], body: Option<String>) -> PrismResult<()> {
        self.execute(method, segments, body).map(|_| ())
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> PrismResult<String> {
    serde_json::to_string(body).map_err(PrismError::Encode)
}

fn decode<R: DeserializeOwned>(data: Value, what: &'static str) -> PrismResult<R> {
    serde_json::from_value(data).map_err(|source| PrismError::Decode { what, source })
}

impl<T: HttpTransport> PrismApi for PrismClient<T> {
    fn create_aws_account(&self, account: &AwsAccount) -> PrismResult<AwsAccount> {
        let request = OnboardAccountRequest::from(account);
        let response: OnboardAccountResponse =
            self.call_with(Method::Post, &["accounts", "onboard"], &request, "onboarding response")?;
        Ok(response.into())
    }

    fn get_aws_account(&self, account_id: &str) -> PrismResult<AwsAccount> {
        self.call(Method::Get, &["aws-accounts", account_id], "AWS account")
    }

    fn update_aws_account(
        &self,
        account_id: &str,
        account: &AwsAccount,
    ) -> PrismResult<AwsAccount> {
        self.call_with(Method::Put, &["aws-accounts", account_id], account, "AWS account")
    }

    fn delete_aws_account(&self, account_id: &str) -> PrismResult<()> {
        self.discard(Method::Delete, &["aws-accounts", account_id, "deboard"], None)
    }

    fn list_aws_accounts(&self) -> PrismResult<Vec<AwsAccount>> {
        self.call(Method::Get, &["aws-accounts"], "AWS account list")
    }

    fn create_permission_set(&self, permission_set: &PermissionSet) -> PrismResult<PermissionSet> {
        self.call_with(Method::Post, &["permission-sets"], permission_set, "permission set")
    }

    fn get_permission_set(&self, id: &str) -> PrismResult<PermissionSet> {
        self.call(Method::Get, &["permission-sets", id], "permission set")
    }

    fn update_permission_set(
        &self,
        id: &str,
        permission_set: &PermissionSet,
    ) -> PrismResult<PermissionSet> {
        self.call_with(Method::Put, &["permission-sets", id], permission_set, "permission set")
    }

    fn delete_permission_set(&self, id: &str) -> PrismResult<()> {
        self.discard(Method::Delete, &["permission-sets", id], None)
    }

    fn list_permission_sets(&self) -> PrismResult<Vec<PermissionSet>> {
        self.call(Method::Get, &["permission-sets"], "permission set list")
    }

    fn create_assignment(
        &self,
        assignment: &PermissionSetAssignment,
    ) -> PrismResult<PermissionSetAssignment> {
        self.call_with(
            Method::Post,
            &["permission-set-assignments"],
            assignment,
            "permission set assignment",
        )
    }

    fn get_assignment(&self, id: &str) -> PrismResult<PermissionSetAssignment> {
        self.call(
            Method::Get,
            &["permission-set-assignments", id],
            "permission set assignment",
        )
    }

    fn delete_assignment(&self, id: &str) -> PrismResult<()> {
        self.discard(Method::Delete, &["permission-set-assignments", id], None)
    }

    fn list_assignments(&self) -> PrismResult<Vec<PermissionSetAssignment>> {
        let list: AssignmentList =
            self.call(Method::Get, &["permission-set-assignments"], "assignment list")?;
        Ok(list.assignments)
    }

    fn create_user(&self, user: &User) -> PrismResult<User> {
        self.call_with(Method::Post, &["users"], user, "user")
    }

    fn get_user(&self, username: &str) -> PrismResult<User> {
        self.call(Method::Get, &["users", username], "user")
    }

    fn update_user(&self, username: &str, user: &User) -> PrismResult<User> {
        self.call_with(Method::Put, &["users", username], user, "user")
    }

    fn delete_user(&self, username: &str) -> PrismResult<()> {
        self.discard(Method::Delete, &["users", username], None)
    }

    fn list_users(&self) -> PrismResult<Vec<User>> {
        self.call(Method::Get, &["users"], "user list")
    }

    fn create_group(&self, group: &Group) -> PrismResult<Group> {
        self.call_with(Method::Post, &["groups"], group, "group")
    }

    fn get_group(&self, name: &str) -> PrismResult<Group> {
        self.call(Method::Get, &["groups", name], "group")
    }

    fn update_group(&self, name: &str, group: &Group) -> PrismResult<Group> {
        self.call_with(Method::Put, &["groups", name], group, "group")
    }

    fn delete_group(&self, name: &str) -> PrismResult<()> {
        self.discard(Method::Delete, &["groups", name], None)
    }

    fn list_groups(&self) -> PrismResult<Vec<Group>> {
        self.call(Method::Get, &["groups"], "group list")
    }

    fn add_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()> {
        let body = encode(&GroupMembers {
            users: usernames.to_vec(),
        })?;
        self.discard(Method::Post, &["groups", group, "members"], Some(body))
    }

    fn remove_group_members(&self, group: &str, usernames: &[String]) -> PrismResult<()> {
        let body = encode(&GroupMembers {
            users: usernames.to_vec(),
        })?;
        self.discard(Method::Delete, &["groups", group, "members"], Some(body))
    }

    fn get_group_members(&self, group: &str) -> PrismResult<Vec<String>> {
        let response: GroupMembersResponse =
            self.call(Method::Get, &["groups", group, "members"], "group members")?;
        Ok(response.usernames())
    }

    fn create_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider> {
        let envelope: IdentityProviderEnvelope = self.call_with(
            Method::Post,
            &["identity-providers", idp.provider_type.as_str()],
            &idp.request_body(),
            "identity provider",
        )?;
        Ok(envelope.into_provider(idp.provider_type))
    }

    // The backend keeps one provider per type; the alias is not part of the path.
    fn get_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        _alias: &str,
    ) -> PrismResult<IdentityProvider> {
        let envelope: IdentityProviderEnvelope = self.call(
            Method::Get,
            &["identity-providers", provider_type.as_str()],
            "identity provider",
        )?;
        Ok(envelope.into_provider(provider_type))
    }

    fn update_identity_provider(&self, idp: &IdentityProvider) -> PrismResult<IdentityProvider> {
        let envelope: IdentityProviderEnvelope = self.call_with(
            Method::Put,
            &["identity-providers", idp.provider_type.as_str()],
            &idp.request_body(),
            "identity provider",
        )?;
        Ok(envelope.into_provider(idp.provider_type))
    }

    fn delete_identity_provider(
        &self,
        provider_type: IdentityProviderType,
        _alias: &str,
    ) -> PrismResult<()> {
        self.discard(
            Method::Delete,
            &["identity-providers", provider_type.as_str()],
            None,
        )
    }
}
