//! IAM crawler: users, their groups, attached and inline policies, and the
//! default-version document of every distinct managed policy.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{CrawlError, CrawlResult};
use crate::fanout::fan_out;
use crate::report::{
    FetchFailure, GroupNode, IdentityReport, ManagedPolicyDocument, PolicyRegistry, UserNode,
};
use crate::session::CrawlSession;
use crate::types::{
    GetPolicyResponse, GetPolicyVersionResponse, Group, InlineGroupPolicy, InlinePolicy,
    InlinePolicyResponse, ListAttachedPoliciesResponse, ListGroupsForUserResponse,
    ListPolicyNamesResponse, ListUsersResponse, User,
};

/// Crawl users, groups and policies of the session's profile.
pub async fn crawl_identities(session: &CrawlSession) -> CrawlResult<IdentityReport> {
    let mut report = IdentityReport::default();

    let listing: ListUsersResponse = session
        .fetch_listing(&session.iam("list-users"), &mut report.failures)
        .await?;

    for user in listing.users {
        let name = user.user_name.clone();
        let node = crawl_user(
            session,
            user,
            &mut report.policy_arns,
            &mut report.failures,
        )
        .await?;
        report.users.insert(name, node);
    }

    report.policy_documents =
        resolve_managed_policies(session, &report.policy_arns, &mut report.failures).await?;

    info!(
        profile = %session.profile(),
        users = report.users.len(),
        managed_policies = report.policy_arns.len(),
        failures = report.failures.len(),
        "identity crawl complete"
    );

    Ok(report)
}

/// One user's attached, inline and group policies. Managed policy ARNs are
/// added to `registry`.
pub async fn crawl_user(
    session: &CrawlSession,
    user: User,
    registry: &mut PolicyRegistry,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<UserNode> {
    let user_name = user.user_name.clone();
    debug!(user = %user_name, "crawling user");
    let mut node = UserNode::new(user);

    let attached: ListAttachedPoliciesResponse = session
        .fetch_listing(
            &session
                .iam("list-attached-user-policies")
                .arg("user-name", user_name.as_str()),
            failures,
        )
        .await?;
    registry.register_all(&attached.attached_policies);
    node.attached_policies = attached.attached_policies;

    let inline_names: ListPolicyNamesResponse = session
        .fetch_listing(
            &session
                .iam("list-user-policies")
                .arg("user-name", user_name.as_str()),
            failures,
        )
        .await?;

    for policy_name in inline_names.policy_names {
        let invocation = session
            .iam("get-user-policy")
            .arg("user-name", user_name.as_str())
            .arg("policy-name", policy_name);
        if let Some(policy) = session
            .fetch_optional::<InlinePolicyResponse>(&invocation, failures)
            .await?
        {
            node.inline_user_policies.push(InlinePolicy {
                policy_name: policy.policy_name,
                policy_document: policy.policy_document,
            });
        }
    }

    let groups: ListGroupsForUserResponse = session
        .fetch_listing(
            &session
                .iam("list-groups-for-user")
                .arg("user-name", user_name.as_str()),
            failures,
        )
        .await?;

    for group in groups.groups {
        let group_name = group.group_name.clone();
        let (group_node, inline) = crawl_group(session, group, registry, failures).await?;
        node.group_names.insert(group_name, group_node);
        node.inline_group_policies.extend(inline);
    }

    Ok(node)
}

/// A group's attached policies and inline documents.
pub async fn crawl_group(
    session: &CrawlSession,
    group: Group,
    registry: &mut PolicyRegistry,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<(GroupNode, Vec<InlineGroupPolicy>)> {
    let group_name = group.group_name.clone();

    let attached: ListAttachedPoliciesResponse = session
        .fetch_listing(
            &session
                .iam("list-attached-group-policies")
                .arg("group-name", group_name.as_str()),
            failures,
        )
        .await?;
    registry.register_all(&attached.attached_policies);

    let inline_names: ListPolicyNamesResponse = session
        .fetch_listing(
            &session
                .iam("list-group-policies")
                .arg("group-name", group_name.as_str()),
            failures,
        )
        .await?;

    let mut inline = Vec::with_capacity(inline_names.policy_names.len());
    for policy_name in inline_names.policy_names {
        let invocation = session
            .iam("get-group-policy")
            .arg("group-name", group_name.as_str())
            .arg("policy-name", policy_name);
        if let Some(policy) = session
            .fetch_optional::<InlinePolicyResponse>(&invocation, failures)
            .await?
        {
            inline.push(InlineGroupPolicy {
                group_name: policy.group_name.unwrap_or_else(|| group_name.clone()),
                policy_name: policy.policy_name,
                policy_document: policy.policy_document,
            });
        }
    }

    Ok((
        GroupNode {
            group,
            attached_policies: attached.attached_policies,
        },
        inline,
    ))
}

/// Resolve each ARN once: metadata, then the document of its default version.
pub async fn resolve_managed_policies(
    session: &CrawlSession,
    registry: &PolicyRegistry,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<BTreeMap<String, ManagedPolicyDocument>> {
    let arns: Vec<String> = registry.iter().map(String::from).collect();
    debug!(count = arns.len(), "resolving managed policies");

    let fetcher = session.clone();
    let results = fan_out(
        arns,
        session.concurrency(),
        session.stops_on_error(),
        move |arn| {
            let session = fetcher.clone();
            async move { resolve_managed_policy(&session, &arn).await }
        },
    )
    .await?;

    let mut documents = BTreeMap::new();
    for (arn, result) in results {
        match result {
            Ok(document) => {
                documents.insert(arn, document);
            }
            Err(e) => session.absorb(e, failures)?,
        }
    }
    Ok(documents)
}

async fn resolve_managed_policy(
    session: &CrawlSession,
    arn: &str,
) -> CrawlResult<ManagedPolicyDocument> {
    let get_policy = session.iam("get-policy").arg("policy-arn", arn);
    let policy = session.fetch::<GetPolicyResponse>(&get_policy).await?.policy;

    let version_id = policy
        .default_version_id
        .clone()
        .ok_or_else(|| CrawlError::MissingField {
            command: get_policy.to_string(),
            field: "Policy.DefaultVersionId".to_string(),
        })?;

    let get_version = session
        .iam("get-policy-version")
        .arg("policy-arn", arn)
        .arg("version-id", version_id);
    let version = session
        .fetch::<GetPolicyVersionResponse>(&get_version)
        .await?
        .policy_version;

    Ok(ManagedPolicyDocument {
        policy,
        document: version.document,
    })
}
