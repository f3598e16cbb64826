//! Records exchanged with the Prism API
//!
//! Field names follow the wire format of each endpoint, which is not
//! consistent across the API: accounts and permission sets use snake_case,
//! everything else camelCase.

pub mod account;
pub mod assignment;
pub mod group;
pub mod identity_provider;
pub mod permission_set;
pub mod user;

pub use account::{AwsAccount, OnboardAccountRequest, OnboardAccountResponse, default_role_arn};
pub use assignment::{AssignmentList, PermissionSetAssignment, PrincipalType};
pub use group::{Group, GroupMembers, GroupMembersResponse, MemberRef};
pub use identity_provider::{IdentityProvider, IdentityProviderEnvelope, IdentityProviderType};
pub use permission_set::PermissionSet;
pub use user::User;
