//! Aggregated crawl results written to artifacts.
//!
//! Top-level keys (`Roots`, `OUs`, `ACCs`, `SCPs`, `Users`, `PoliciesArn`,
//! `PoliciesDocument`) form the artifact format. Maps and sets are ordered
//! by key so two crawls of unchanged state serialize identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::error::CrawlError;
use crate::types::{
    AttachedPolicy, Group, InlineGroupPolicy, InlinePolicy, ManagedPolicy, OrgEntity, Policy,
    PolicySummary, PolicyType, User,
};

/// A crawl result that can be written as an artifact.
pub trait CrawlReport: Serialize {
    /// Fetches recorded instead of aborting the crawl.
    fn failures(&self) -> &[FetchFailure];
}

/// Policy type → policies attached directly to one target.
pub type AttachedPolicies = BTreeMap<PolicyType, Vec<PolicySummary>>;

/// A fetch that failed and was recorded instead of aborting the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FetchFailure {
    pub command: String,
    pub error: String,
}

impl From<&CrawlError> for FetchFailure {
    fn from(err: &CrawlError) -> Self {
        Self {
            command: err.command().unwrap_or_default().to_string(),
            error: err.to_string(),
        }
    }
}

/// A root or account with its directly attached policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetNode {
    #[serde(flatten)]
    pub entity: OrgEntity,

    #[serde(flatten)]
    pub policies: AttachedPolicies,
}

/// An organizational unit: its description, its child units keyed by id
/// (empty at leaves) and its attached policies, merged into one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OuNode {
    #[serde(flatten)]
    pub unit: OrgEntity,

    #[serde(flatten)]
    pub children: BTreeMap<String, OuNode>,

    #[serde(flatten)]
    pub policies: AttachedPolicies,
}

impl OuNode {
    /// Number of units in this subtree, including this one.
    pub fn unit_count(&self) -> usize {
        1 + self.children.values().map(OuNode::unit_count).sum::<usize>()
    }
}

/// Organization crawl result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrgReport {
    #[serde(rename = "Roots")]
    pub roots: BTreeMap<String, TargetNode>,

    /// Top-level units; nested units live inside their parent's record.
    #[serde(rename = "OUs")]
    pub units: BTreeMap<String, OuNode>,

    #[serde(rename = "ACCs")]
    pub accounts: BTreeMap<String, TargetNode>,

    #[serde(rename = "SCPs")]
    pub policies: BTreeMap<PolicyType, BTreeMap<String, Policy>>,

    #[serde(rename = "Failures", skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FetchFailure>,
}

impl CrawlReport for OrgReport {
    fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }
}

impl OrgReport {
    pub fn unit_count(&self) -> usize {
        self.units.values().map(OuNode::unit_count).sum()
    }
}

/// Distinct managed policy ARNs seen across users and groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PolicyRegistry(BTreeSet<String>);

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the ARN was not present yet.
    pub fn insert(&mut self, arn: &str) -> bool {
        if self.0.contains(arn) {
            return false;
        }
        self.0.insert(arn.to_string())
    }

    pub fn register_all(&mut self, attached: &[AttachedPolicy]) {
        for policy in attached {
            self.insert(&policy.policy_arn);
        }
    }

    pub fn contains(&self, arn: &str) -> bool {
        self.0.contains(arn)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A group membership with its attached managed policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
    #[serde(flatten)]
    pub group: Group,

    #[serde(rename = "AttachedPolicies")]
    pub attached_policies: Vec<AttachedPolicy>,
}

/// A user with attached, inline and group policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserNode {
    #[serde(flatten)]
    pub user: User,

    pub attached_policies: Vec<AttachedPolicy>,

    pub group_names: BTreeMap<String, GroupNode>,

    pub inline_user_policies: Vec<InlinePolicy>,

    pub inline_group_policies: Vec<InlineGroupPolicy>,
}

impl UserNode {
    pub fn new(user: User) -> Self {
        Self {
            user,
            attached_policies: Vec::new(),
            group_names: BTreeMap::new(),
            inline_user_policies: Vec::new(),
            inline_group_policies: Vec::new(),
        }
    }

    /// Managed policy ARNs reaching this user directly or through a group.
    pub fn managed_policy_arns(&self) -> BTreeSet<&str> {
        self.attached_policies
            .iter()
            .chain(
                self.group_names
                    .values()
                    .flat_map(|g| g.attached_policies.iter()),
            )
            .map(|p| p.policy_arn.as_str())
            .collect()
    }
}

/// Managed policy metadata merged with its default version's document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedPolicyDocument {
    #[serde(flatten)]
    pub policy: ManagedPolicy,

    #[serde(rename = "Document")]
    pub document: Value,
}

/// Identity crawl result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityReport {
    #[serde(rename = "Users")]
    pub users: BTreeMap<String, UserNode>,

    #[serde(rename = "PoliciesArn")]
    pub policy_arns: PolicyRegistry,

    #[serde(rename = "PoliciesDocument")]
    pub policy_documents: BTreeMap<String, ManagedPolicyDocument>,

    #[serde(rename = "Failures", skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FetchFailure>,
}

impl CrawlReport for IdentityReport {
    fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(id: &str) -> PolicySummary {
        serde_json::from_value(json!({"Id": id, "Name": id})).unwrap()
    }

    #[test]
    fn test_registry_deduplicates() {
        let mut registry = PolicyRegistry::new();
        assert!(registry.insert("arn:aws:iam::aws:policy/ReadOnlyAccess"));
        assert!(!registry.insert("arn:aws:iam::aws:policy/ReadOnlyAccess"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            serde_json::to_value(&registry).unwrap(),
            json!(["arn:aws:iam::aws:policy/ReadOnlyAccess"])
        );
    }

    #[test]
    fn test_ou_node_flattens_children_and_policies() {
        let leaf = OuNode {
            unit: OrgEntity::new("ou-leaf"),
            children: BTreeMap::new(),
            policies: AttachedPolicies::from([(PolicyType::ServiceControlPolicy, vec![])]),
        };
        let parent = OuNode {
            unit: OrgEntity::new("ou-parent"),
            children: BTreeMap::from([("ou-leaf".to_string(), leaf)]),
            policies: AttachedPolicies::from([(
                PolicyType::ServiceControlPolicy,
                vec![summary("p-FullAWSAccess")],
            )]),
        };

        assert_eq!(parent.unit_count(), 2);
        assert_eq!(
            serde_json::to_value(&parent).unwrap(),
            json!({
                "Id": "ou-parent",
                "ou-leaf": {"Id": "ou-leaf", "SERVICE_CONTROL_POLICY": []},
                "SERVICE_CONTROL_POLICY": [{"Id": "p-FullAWSAccess", "Name": "p-FullAWSAccess"}]
            })
        );
    }

    #[test]
    fn test_failures_omitted_when_empty() {
        let report = OrgReport::default();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"Roots": {}, "OUs": {}, "ACCs": {}, "SCPs": {}}));

        let report = IdentityReport {
            failures: vec![FetchFailure {
                command: "aws iam list-users --profile p --no-paginate".into(),
                error: "boom".into(),
            }],
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["Failures"][0]["Error"], "boom");
    }

    #[test]
    fn test_user_managed_policy_arns_union() {
        let user: User = serde_json::from_value(json!({"UserName": "alice"})).unwrap();
        let group: Group = serde_json::from_value(json!({"GroupName": "devs"})).unwrap();
        let attached = |arn: &str| AttachedPolicy {
            policy_name: arn.rsplit('/').next().unwrap_or_default().to_string(),
            policy_arn: arn.to_string(),
        };

        let mut node = UserNode::new(user);
        node.attached_policies = vec![attached("arn:aws:iam::aws:policy/A")];
        node.group_names.insert(
            "devs".into(),
            GroupNode {
                group,
                attached_policies: vec![
                    attached("arn:aws:iam::aws:policy/A"),
                    attached("arn:aws:iam::aws:policy/B"),
                ],
            },
        );

        let arns: Vec<_> = node.managed_policy_arns().into_iter().collect();
        assert_eq!(
            arns,
            vec!["arn:aws:iam::aws:policy/A", "arn:aws:iam::aws:policy/B"]
        );
    }
}
