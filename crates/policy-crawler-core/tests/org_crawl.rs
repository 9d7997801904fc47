//! Organization crawl against canned CLI responses.

use std::sync::Arc;

use policy_crawler_core::{
    crawl_organization, CrawlError, CrawlSession, ErrorPolicy, PolicyType, StaticRunner,
};
use serde_json::{json, Value};

const PROFILE: &str = "demo";

fn cmd(rest: &str) -> String {
    format!("aws organizations {rest} --profile {PROFILE} --no-paginate")
}

fn scp(id: &str) -> Value {
    json!({
        "Id": id,
        "Arn": format!("arn:aws:organizations::111111111111:policy/o-demo/service_control_policy/{id}"),
        "Name": id,
        "Description": "",
        "Type": "SERVICE_CONTROL_POLICY",
        "AwsManaged": id == "p-FullAWSAccess"
    })
}

fn described(id: &str, content: &str) -> Value {
    json!({"Policy": {"PolicySummary": scp(id), "Content": content}})
}

fn attached(target: &str, policies: Vec<Value>) -> (String, Value) {
    (
        cmd(&format!(
            "list-policies-for-target --filter SERVICE_CONTROL_POLICY --target-id {target}"
        )),
        json!({ "Policies": policies }),
    )
}

fn children(parent: &str, ids: &[&str]) -> (String, Value) {
    let children: Vec<Value> = ids
        .iter()
        .map(|id| json!({"Id": id, "Type": "ORGANIZATIONAL_UNIT"}))
        .collect();
    (
        cmd(&format!(
            "list-children --child-type ORGANIZATIONAL_UNIT --parent-id {parent}"
        )),
        json!({ "Children": children }),
    )
}

fn unit(id: &str, name: &str) -> (String, Value) {
    (
        cmd(&format!(
            "describe-organizational-unit --organizational-unit-id {id}"
        )),
        json!({"OrganizationalUnit": {"Id": id, "Name": name, "Arn": format!("arn:aws:organizations::111111111111:ou/o-demo/{id}")}}),
    )
}

fn account(id: &str, name: &str) -> Value {
    json!({"Id": id, "Name": name, "Email": format!("{name}@example.com"), "Status": "ACTIVE"})
}

fn with(runner: StaticRunner, entries: Vec<(String, Value)>) -> StaticRunner {
    entries
        .into_iter()
        .fold(runner, |r, (command, value)| r.with_response(command, value))
}

/// root → ou-a → ou-b, two accounts, two SCPs.
fn organization() -> StaticRunner {
    let runner = StaticRunner::new()
        .with_response(
            cmd("list-policies --filter SERVICE_CONTROL_POLICY"),
            json!({"Policies": [scp("p-FullAWSAccess"), scp("p-deny-leave")]}),
        )
        .with_response(
            cmd("describe-policy --policy-id p-FullAWSAccess"),
            described(
                "p-FullAWSAccess",
                r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#,
            ),
        )
        .with_response(
            cmd("describe-policy --policy-id p-deny-leave"),
            described(
                "p-deny-leave",
                r#"{"Version":"2012-10-17","Statement":[{"Effect":"Deny","Action":"organizations:LeaveOrganization","Resource":"*"}]}"#,
            ),
        )
        .with_response(
            cmd("list-roots"),
            json!({"Roots": [{"Id": "r-root", "Name": "Root", "PolicyTypes": [{"Type": "SERVICE_CONTROL_POLICY", "Status": "ENABLED"}]}]}),
        )
        .with_response(
            cmd("list-accounts"),
            json!({"Accounts": [account("111111111111", "mgmt"), account("222222222222", "workload")]}),
        );

    with(
        runner,
        vec![
            attached("r-root", vec![scp("p-FullAWSAccess")]),
            children("r-root", &["ou-a"]),
            unit("ou-a", "Workloads"),
            children("ou-a", &["ou-b"]),
            unit("ou-b", "Prod"),
            children("ou-b", &[]),
            attached("ou-b", vec![scp("p-deny-leave")]),
            attached("ou-a", vec![scp("p-FullAWSAccess")]),
            attached("111111111111", vec![scp("p-FullAWSAccess")]),
            attached("222222222222", vec![scp("p-FullAWSAccess"), scp("p-deny-leave")]),
        ],
    )
}

fn session(runner: StaticRunner) -> CrawlSession {
    CrawlSession::new(Arc::new(runner), PROFILE)
}

#[tokio::test]
async fn test_policy_registry_has_exactly_configured_types() {
    let report = crawl_organization(&session(organization())).await.unwrap();

    let types: Vec<_> = report.policies.keys().copied().collect();
    assert_eq!(types, vec![PolicyType::ServiceControlPolicy]);

    let scps = &report.policies[&PolicyType::ServiceControlPolicy];
    assert_eq!(scps.len(), 2);
    assert!(scps["p-deny-leave"]
        .content
        .contains("organizations:LeaveOrganization"));
    assert_eq!(scps["p-FullAWSAccess"].policy_summary.aws_managed, Some(true));
}

#[tokio::test]
async fn test_tree_shape() {
    let report = crawl_organization(&session(organization())).await.unwrap();

    assert_eq!(report.roots.len(), 1);
    let root = &report.roots["r-root"];
    assert_eq!(root.policies[&PolicyType::ServiceControlPolicy].len(), 1);

    assert_eq!(report.units.len(), 1, "only top-level units at the top");
    let ou_a = &report.units["ou-a"];
    assert_eq!(ou_a.unit.name.as_deref(), Some("Workloads"));
    assert_eq!(ou_a.children.len(), 1);
    assert_eq!(report.unit_count(), 2);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["OUs"]["ou-a"]["ou-b"]["Name"], "Prod");
    assert_eq!(
        value["OUs"]["ou-a"]["ou-b"]["SERVICE_CONTROL_POLICY"][0]["Id"],
        "p-deny-leave"
    );
    assert_eq!(value["Roots"]["r-root"]["PolicyTypes"][0]["Status"], "ENABLED");
}

#[tokio::test]
async fn test_leaf_unit_has_empty_child_map() {
    let report = crawl_organization(&session(organization())).await.unwrap();

    let ou_b = &report.units["ou-a"].children["ou-b"];
    assert!(ou_b.children.is_empty());

    let value = serde_json::to_value(ou_b).unwrap();
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert!(
        keys.iter().all(|k| !k.starts_with("ou-")),
        "leaf must not carry child unit keys: {keys:?}"
    );
}

#[tokio::test]
async fn test_every_account_appears_once() {
    let runner = organization();
    let session = CrawlSession::new(Arc::new(runner), PROFILE);
    let report = crawl_organization(&session).await.unwrap();

    let ids: Vec<_> = report.accounts.keys().cloned().collect();
    assert_eq!(ids, vec!["111111111111", "222222222222"]);
    assert_eq!(
        report.accounts["222222222222"].policies[&PolicyType::ServiceControlPolicy].len(),
        2
    );
    assert_eq!(
        report.accounts["111111111111"].entity.extra["Email"],
        "mgmt@example.com"
    );
}

#[tokio::test]
async fn test_accounts_listed_once() {
    let runner = Arc::new(organization());
    let session = CrawlSession::new(runner.clone(), PROFILE);
    crawl_organization(&session).await.unwrap();

    assert_eq!(runner.call_count(&cmd("list-accounts")), 1);
    assert_eq!(runner.call_count(&cmd("describe-policy --policy-id p-deny-leave")), 1);
}

#[tokio::test]
async fn test_single_account_without_units() {
    let runner = with(
        StaticRunner::new()
            .with_response(
                cmd("list-policies --filter SERVICE_CONTROL_POLICY"),
                json!({"Policies": [scp("p-FullAWSAccess")]}),
            )
            .with_response(
                cmd("describe-policy --policy-id p-FullAWSAccess"),
                described("p-FullAWSAccess", "{}"),
            )
            .with_response(cmd("list-roots"), json!({"Roots": [{"Id": "r-solo"}]}))
            .with_response(
                cmd("list-accounts"),
                json!({"Accounts": [account("333333333333", "solo")]}),
            ),
        vec![
            attached("r-solo", vec![scp("p-FullAWSAccess")]),
            children("r-solo", &[]),
            attached("333333333333", vec![scp("p-FullAWSAccess")]),
        ],
    );

    let report = crawl_organization(&session(runner)).await.unwrap();
    assert!(report.units.is_empty());
    assert_eq!(report.accounts.len(), 1);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["OUs"], json!({}));
    assert_eq!(
        value["ACCs"]["333333333333"]["SERVICE_CONTROL_POLICY"][0]["Id"],
        "p-FullAWSAccess"
    );
}

#[tokio::test]
async fn test_crawl_is_idempotent_across_concurrency_levels() {
    let sequential = crawl_organization(&session(organization()).with_concurrency(1))
        .await
        .unwrap();
    let parallel = crawl_organization(&session(organization()).with_concurrency(8))
        .await
        .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(
        serde_json::to_string(&sequential).unwrap(),
        serde_json::to_string(&parallel).unwrap()
    );
}

#[tokio::test]
async fn test_sequential_call_order() {
    let runner = Arc::new(organization());
    let session = CrawlSession::new(runner.clone(), PROFILE).with_concurrency(1);
    crawl_organization(&session).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0], cmd("list-policies --filter SERVICE_CONTROL_POLICY"));
    assert_eq!(calls[1], cmd("describe-policy --policy-id p-FullAWSAccess"));
    assert_eq!(calls[2], cmd("describe-policy --policy-id p-deny-leave"));
    assert_eq!(calls[3], cmd("list-roots"));
    assert_eq!(calls.last(), Some(&attached("222222222222", vec![]).0));
}

#[tokio::test]
async fn test_multiple_policy_types() {
    let runner = with(
        organization(),
        vec![
            (
                cmd("list-policies --filter TAG_POLICY"),
                json!({"Policies": []}),
            ),
            (
                cmd("list-policies-for-target --filter TAG_POLICY --target-id r-root"),
                json!({}),
            ),
            (
                cmd("list-policies-for-target --filter TAG_POLICY --target-id ou-a"),
                json!({}),
            ),
            (
                cmd("list-policies-for-target --filter TAG_POLICY --target-id ou-b"),
                json!({}),
            ),
            (
                cmd("list-policies-for-target --filter TAG_POLICY --target-id 111111111111"),
                json!({}),
            ),
            (
                cmd("list-policies-for-target --filter TAG_POLICY --target-id 222222222222"),
                json!({}),
            ),
        ],
    );
    let session = session(runner).with_policy_types(vec![
        PolicyType::ServiceControlPolicy,
        PolicyType::TagPolicy,
    ]);

    let report = crawl_organization(&session).await.unwrap();
    let types: Vec<_> = report.policies.keys().copied().collect();
    assert_eq!(
        types,
        vec![PolicyType::ServiceControlPolicy, PolicyType::TagPolicy]
    );
    assert!(report.policies[&PolicyType::TagPolicy].is_empty());
    assert!(report.roots["r-root"].policies[&PolicyType::TagPolicy].is_empty());
}

#[tokio::test]
async fn test_abort_on_failed_describe() {
    let runner = organization().with_failure(
        cmd("describe-policy --policy-id p-deny-leave"),
        "An error occurred (AccessDeniedException)",
    );

    let err = crawl_organization(&session(runner)).await.unwrap_err();
    assert!(matches!(err, CrawlError::CommandFailed { .. }));
}

#[tokio::test]
async fn test_record_on_failed_describe() {
    let runner = organization().with_failure(
        cmd("describe-policy --policy-id p-deny-leave"),
        "An error occurred (AccessDeniedException)",
    );
    let session = session(runner).with_error_policy(ErrorPolicy::Record);

    let report = crawl_organization(&session).await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].command,
        cmd("describe-policy --policy-id p-deny-leave")
    );
    assert_eq!(report.policies[&PolicyType::ServiceControlPolicy].len(), 1);
    assert_eq!(report.accounts.len(), 2, "crawl continues after a failure");

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["Failures"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_listing_is_decode_error() {
    let runner = organization().with_response(cmd("list-roots"), json!({"Roots": "nope"}));
    let err = crawl_organization(&session(runner)).await.unwrap_err();
    assert!(matches!(err, CrawlError::Decode { .. }));
}

#[tokio::test]
async fn test_accounts_span_pages() {
    let runner = Arc::new(
        organization()
            .with_response(
                cmd("list-accounts"),
                json!({"Accounts": [account("111111111111", "mgmt")], "NextToken": "page-2"}),
            )
            .with_response(
                cmd("list-accounts --next-token page-2"),
                json!({"Accounts": [account("222222222222", "workload")]}),
            ),
    );
    let session = CrawlSession::new(runner.clone(), PROFILE);
    let report = crawl_organization(&session).await.unwrap();

    let ids: Vec<_> = report.accounts.keys().cloned().collect();
    assert_eq!(ids, vec!["111111111111", "222222222222"]);
    assert!(report.failures.is_empty());
    assert_eq!(runner.call_count(&cmd("list-accounts --next-token page-2")), 1);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["ACCs"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_policies_span_pages() {
    let runner = organization()
        .with_response(
            cmd("list-policies --filter SERVICE_CONTROL_POLICY"),
            json!({"Policies": [scp("p-FullAWSAccess")], "NextToken": "scp-2"}),
        )
        .with_response(
            cmd("list-policies --filter SERVICE_CONTROL_POLICY --next-token scp-2"),
            json!({"Policies": [scp("p-deny-leave")]}),
        );

    let report = crawl_organization(&session(runner)).await.unwrap();
    let scps = &report.policies[&PolicyType::ServiceControlPolicy];
    assert_eq!(scps.len(), 2);
    assert!(scps.contains_key("p-deny-leave"));
}

#[tokio::test]
async fn test_abort_stops_account_fan_out() {
    let runner = Arc::new(organization().with_failure(
        attached("111111111111", vec![]).0,
        "An error occurred (AccessDeniedException)",
    ));
    let session = CrawlSession::new(runner.clone(), PROFILE).with_concurrency(1);

    let err = crawl_organization(&session).await.unwrap_err();
    assert!(matches!(err, CrawlError::CommandFailed { .. }));
    assert_eq!(runner.call_count(&attached("222222222222", vec![]).0), 0);
}
