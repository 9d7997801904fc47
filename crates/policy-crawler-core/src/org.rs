//! Organization crawler: roots, organizational units, accounts and the
//! policies attached to each of them.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::error::{CrawlError, CrawlResult};
use crate::fanout::fan_out;
use crate::report::{AttachedPolicies, FetchFailure, OrgReport, OuNode, TargetNode};
use crate::session::CrawlSession;
use crate::types::{
    DescribeOrganizationalUnitResponse, DescribePolicyResponse, ListAccountsResponse,
    ListChildrenResponse, ListPoliciesResponse, ListRootsResponse, OrgEntity, Policy, PolicyType,
};

type UnitsFuture<'a> =
    Pin<Box<dyn Future<Output = CrawlResult<BTreeMap<String, OuNode>>> + Send + 'a>>;

/// Crawl the organization visible to the session's profile.
pub async fn crawl_organization(session: &CrawlSession) -> CrawlResult<OrgReport> {
    let mut report = OrgReport::default();

    report.policies = collect_policy_documents(session, &mut report.failures).await?;

    let roots: ListRootsResponse = session
        .fetch_listing(&session.organizations("list-roots"), &mut report.failures)
        .await?;

    for root in roots.roots {
        let policies = attached_policies(session, &root.id, &mut report.failures).await?;
        let units = walk_units(session, root.id.clone(), &mut report.failures).await?;
        report.units.extend(units);
        report.roots.insert(
            root.id.clone(),
            TargetNode {
                entity: root,
                policies,
            },
        );
    }

    report.accounts = collect_accounts(session, &mut report.failures).await?;

    info!(
        profile = %session.profile(),
        roots = report.roots.len(),
        units = report.unit_count(),
        accounts = report.accounts.len(),
        failures = report.failures.len(),
        "organization crawl complete"
    );

    Ok(report)
}

/// Every policy of each configured type, with its full document.
pub async fn collect_policy_documents(
    session: &CrawlSession,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<BTreeMap<PolicyType, BTreeMap<String, Policy>>> {
    let mut by_type = BTreeMap::new();

    for &policy_type in session.policy_types() {
        let listing: ListPoliciesResponse = session
            .fetch_listing(
                &session
                    .organizations("list-policies")
                    .arg("filter", policy_type.as_str()),
                failures,
            )
            .await?;

        let ids: Vec<String> = listing.policies.into_iter().map(|p| p.id).collect();
        debug!(policy_type = %policy_type, count = ids.len(), "describing policies");

        let fetcher = session.clone();
        let described = fan_out(
            ids,
            session.concurrency(),
            session.stops_on_error(),
            move |id| {
                let session = fetcher.clone();
                async move {
                    let invocation = session
                        .organizations("describe-policy")
                        .arg("policy-id", id);
                    session.fetch::<DescribePolicyResponse>(&invocation).await
                }
            },
        )
        .await?;

        let mut documents = BTreeMap::new();
        for (id, result) in described {
            match result {
                Ok(response) => {
                    documents.insert(id, response.policy);
                }
                Err(e) => session.absorb(e, failures)?,
            }
        }
        by_type.insert(policy_type, documents);
    }

    Ok(by_type)
}

/// Policies attached directly to `target_id`, per configured policy type.
pub async fn attached_policies(
    session: &CrawlSession,
    target_id: &str,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<AttachedPolicies> {
    let mut policies = AttachedPolicies::new();
    for &policy_type in session.policy_types() {
        let invocation = session
            .organizations("list-policies-for-target")
            .arg("filter", policy_type.as_str())
            .arg("target-id", target_id);
        let listing: ListPoliciesResponse =
            session.fetch_listing(&invocation, failures).await?;
        policies.insert(policy_type, listing.policies);
    }
    Ok(policies)
}

/// Child units of `parent_id`, each merged with its own subtree and
/// attached policies. Returns an empty map when there are no child units.
pub fn walk_units<'a>(
    session: &'a CrawlSession,
    parent_id: String,
    failures: &'a mut Vec<FetchFailure>,
) -> UnitsFuture<'a> {
    Box::pin(async move {
        let mut units = BTreeMap::new();

        let invocation = session
            .organizations("list-children")
            .arg("child-type", "ORGANIZATIONAL_UNIT")
            .arg("parent-id", parent_id.as_str());
        let children: ListChildrenResponse =
            session.fetch_listing(&invocation, failures).await?;

        if children.children.is_empty() {
            return Ok(units);
        }

        for child in children.children {
            let described: Option<DescribeOrganizationalUnitResponse> = session
                .fetch_optional(
                    &session
                        .organizations("describe-organizational-unit")
                        .arg("organizational-unit-id", child.id.as_str()),
                    failures,
                )
                .await?;
            let unit = described
                .map(|d| d.organizational_unit)
                .unwrap_or_else(|| OrgEntity::new(child.id.clone()));

            let nested = walk_units(session, child.id.clone(), &mut *failures).await?;
            let policies = attached_policies(session, &child.id, failures).await?;

            units.insert(
                child.id,
                OuNode {
                    unit,
                    children: nested,
                    policies,
                },
            );
        }

        Ok(units)
    })
}

/// All accounts in the organization with their attached policies.
pub async fn collect_accounts(
    session: &CrawlSession,
    failures: &mut Vec<FetchFailure>,
) -> CrawlResult<BTreeMap<String, TargetNode>> {
    let listing: ListAccountsResponse = session
        .fetch_listing(&session.organizations("list-accounts"), failures)
        .await?;

    let fetcher = session.clone();
    let results = fan_out(
        listing.accounts,
        session.concurrency(),
        session.stops_on_error(),
        move |account| {
            let session = fetcher.clone();
            async move {
                let mut task_failures = Vec::new();
                let policies =
                    attached_policies(&session, &account.id, &mut task_failures).await?;
                Ok::<_, CrawlError>((policies, task_failures))
            }
        },
    )
    .await?;

    let mut accounts = BTreeMap::new();
    for (account, result) in results {
        let policies = match result {
            Ok((policies, task_failures)) => {
                failures.extend(task_failures);
                policies
            }
            Err(e) => {
                session.absorb(e, failures)?;
                AttachedPolicies::new()
            }
        };
        accounts.insert(
            account.id.clone(),
            TargetNode {
                entity: account,
                policies,
            },
        );
    }

    Ok(accounts)
}
