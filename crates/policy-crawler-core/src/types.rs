//! Response types mirroring the AWS CLI's JSON output.
//!
//! Records keep the fields the crawler relies on as typed fields and carry
//! every other field verbatim in `extra`, so artifacts retain whatever the
//! CLI reported.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CrawlError;

/// Organization policy types that can be enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    ServiceControlPolicy,
    TagPolicy,
    BackupPolicy,
    AiservicesOptOutPolicy,
}

impl PolicyType {
    pub const ALL: [PolicyType; 4] = [
        PolicyType::ServiceControlPolicy,
        PolicyType::TagPolicy,
        PolicyType::BackupPolicy,
        PolicyType::AiservicesOptOutPolicy,
    ];

    /// Value passed to `--filter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::ServiceControlPolicy => "SERVICE_CONTROL_POLICY",
            PolicyType::TagPolicy => "TAG_POLICY",
            PolicyType::BackupPolicy => "BACKUP_POLICY",
            PolicyType::AiservicesOptOutPolicy => "AISERVICES_OPT_OUT_POLICY",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                CrawlError::config(format!(
                    "unknown policy type `{}` (expected one of: {})",
                    s,
                    Self::ALL.map(|t| t.as_str()).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// A listing response that may span several pages.
///
/// With `--no-paginate` the CLI returns one API page per call. Organizations
/// listings continue with `--next-token <NextToken>`, IAM listings with
/// `--marker <Marker>` while `IsTruncated` is set.
pub trait Listing: DeserializeOwned + Default + Send {
    /// `(argument, token)` requesting the following page, if any.
    fn continuation(&self) -> Option<(&'static str, String)>;

    /// Append the items of `page` and adopt its continuation.
    fn extend_page(&mut self, page: Self);
}

macro_rules! organizations_listing {
    ($ty:ty, $items:ident) => {
        impl Listing for $ty {
            fn continuation(&self) -> Option<(&'static str, String)> {
                self.next_token.clone().map(|token| ("next-token", token))
            }

            fn extend_page(&mut self, page: Self) {
                self.$items.extend(page.$items);
                self.next_token = page.next_token;
            }
        }
    };
}

macro_rules! iam_listing {
    ($ty:ty, $items:ident) => {
        impl Listing for $ty {
            fn continuation(&self) -> Option<(&'static str, String)> {
                if !self.is_truncated {
                    return None;
                }
                self.marker.clone().map(|marker| ("marker", marker))
            }

            fn extend_page(&mut self, page: Self) {
                self.$items.extend(page.$items);
                self.is_truncated = page.is_truncated;
                self.marker = page.marker;
            }
        }
    };
}

organizations_listing!(ListPoliciesResponse, policies);
organizations_listing!(ListRootsResponse, roots);
organizations_listing!(ListChildrenResponse, children);
organizations_listing!(ListAccountsResponse, accounts);

iam_listing!(ListUsersResponse, users);
iam_listing!(ListGroupsForUserResponse, groups);
iam_listing!(ListAttachedPoliciesResponse, attached_policies);
iam_listing!(ListPolicyNamesResponse, policy_names);

// ---------------------------------------------------------------------------
// Organizations
// ---------------------------------------------------------------------------

/// A root, organizational unit or account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrgEntity {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrgEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            arn: None,
            extra: Map::new(),
        }
    }
}

/// Summary returned by `list-policies` and `list-policies-for-target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicySummary {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "Type", skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_managed: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full policy returned by `describe-policy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_summary: PolicySummary,

    /// Policy document as returned by the CLI (a JSON string).
    #[serde(default)]
    pub content: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPoliciesResponse {
    #[serde(default)]
    pub policies: Vec<PolicySummary>,

    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribePolicyResponse {
    pub policy: Policy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListRootsResponse {
    #[serde(default)]
    pub roots: Vec<OrgEntity>,

    #[serde(default)]
    pub next_token: Option<String>,
}

/// Entry of `list-children`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Child {
    pub id: String,

    #[serde(default, rename = "Type")]
    pub child_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListChildrenResponse {
    #[serde(default)]
    pub children: Vec<Child>,

    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeOrganizationalUnitResponse {
    pub organizational_unit: OrgEntity,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<OrgEntity>,

    #[serde(default)]
    pub next_token: Option<String>,
}

// ---------------------------------------------------------------------------
// IAM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub user_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersResponse {
    #[serde(default)]
    pub users: Vec<User>,

    #[serde(default)]
    pub is_truncated: bool,

    #[serde(default)]
    pub marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    pub group_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListGroupsForUserResponse {
    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub is_truncated: bool,

    #[serde(default)]
    pub marker: Option<String>,
}

/// Managed policy reference attached to a user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedPolicy {
    #[serde(default)]
    pub policy_name: String,
    pub policy_arn: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAttachedPoliciesResponse {
    #[serde(default)]
    pub attached_policies: Vec<AttachedPolicy>,

    #[serde(default)]
    pub is_truncated: bool,

    #[serde(default)]
    pub marker: Option<String>,
}

/// `list-user-policies` / `list-group-policies`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPolicyNamesResponse {
    #[serde(default)]
    pub policy_names: Vec<String>,

    #[serde(default)]
    pub is_truncated: bool,

    #[serde(default)]
    pub marker: Option<String>,
}

/// `get-user-policy` / `get-group-policy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicyResponse {
    #[serde(default)]
    pub group_name: Option<String>,
    pub policy_name: String,
    #[serde(default)]
    pub policy_document: Value,
}

/// Inline policy embedded on a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: Value,
}

/// Inline policy embedded on one of the user's groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlineGroupPolicy {
    pub group_name: String,
    pub policy_name: String,
    pub policy_document: Value,
}

/// Managed policy metadata from `get-policy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_version_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetPolicyResponse {
    pub policy: ManagedPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyVersion {
    #[serde(default)]
    pub document: Value,

    #[serde(default)]
    pub version_id: Option<String>,

    #[serde(default)]
    pub is_default_version: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetPolicyVersionResponse {
    pub policy_version: PolicyVersion,
}

/// `sts get-caller-identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub arn: Option<String>,
}
