//! End-to-end authorization scenarios over fixture models and policies.

use turnstile_enforcer::{Enforcer, MappingPolicy, MemoryAdapter};
use turnstile_matcher::Value;
use turnstile_model::Model;

fn fixture(name: &str) -> String {
    format!(
        "{}/tests/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    )
}

async fn enforcer_from_fixtures(model: &str, policy: &str) -> Enforcer {
    let mut e = Enforcer::new(fixture(model), None)
        .await
        .expect("model fixture loads");
    e.load_policies_from_file(fixture(policy))
        .await
        .expect("policy fixture loads");
    e.load_mapping_policies_from_file(fixture(policy))
        .await
        .expect("mapping fixture loads");
    e
}

#[tokio::test]
async fn acl_allows_exactly_the_listed_tuples() {
    let e = enforcer_from_fixtures("acl.conf", "acl_policy.csv").await;

    assert!(e.enforce(["alice", "blog_post", "read"]));
    assert!(!e.enforce(["bob", "blog_post", "read"]));
    assert!(e.enforce(["bob", "blog_post", "write"]));
    // A deny rule does not grant under allow-override.
    assert!(!e.enforce(["peter", "blog_post", "modify"]));
    assert!(!e.enforce(["alice", "secret", "read"]));
}

#[tokio::test]
async fn superuser_clause_bypasses_the_policy_lookup() {
    let mut e = Enforcer::new(fixture("acl_superuser.conf"), None)
        .await
        .unwrap();
    e.load_policies_from_file(fixture("acl_policy.csv"))
        .await
        .unwrap();

    assert!(e.enforce(["root", "anything", "anything"]));
    assert!(e.enforce(["alice", "blog_post", "read"]));
    assert!(!e.enforce(["bob", "blog_post", "read"]));
}

#[tokio::test]
async fn rbac_roles_are_transitive() {
    let e = enforcer_from_fixtures("rbac.conf", "rbac_policy.csv").await;

    // admin -> author -> reader, so alice can do all three.
    assert!(e.enforce(["alice", "blog_post", "read"]));
    assert!(e.enforce(["alice", "blog_post", "modify"]));
    assert!(e.enforce(["alice", "blog_post", "delete"]));

    // bob is only a reader.
    assert!(e.enforce(["bob", "blog_post", "read"]));
    assert!(!e.enforce(["bob", "blog_post", "modify"]));

    // peter is an author, which includes reading but not deleting.
    assert!(e.enforce(["peter", "blog_post", "modify"]));
    assert!(e.enforce(["peter", "blog_post", "read"]));
    assert!(!e.enforce(["peter", "blog_post", "delete"]));
}

#[tokio::test]
async fn restful_matching_with_a_user_defined_regex_function() {
    let model: Model = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = r.sub == p.sub && match?(r.obj, p.obj) && r.act == p.act
"#
    .parse()
    .unwrap();
    let mut e = Enforcer::with_model(model, Some(Box::new(MemoryAdapter::new())));
    e.add_fun("match?", |args| {
        let ok = match args {
            [Value::Str(key), Value::Str(pattern)] => regex::Regex::new(&format!("^{pattern}$"))
                .is_ok_and(|re| re.is_match(key)),
            _ => false,
        };
        Ok(Value::Bool(ok))
    });
    e.add_policy(
        "p",
        vec![
            Value::from("alice"),
            Value::from("/alice_data/.*"),
            Value::from("GET"),
        ],
    )
    .await
    .unwrap();

    assert!(e.enforce(["alice", "/alice_data/foo", "GET"]));
    assert!(!e.enforce(["alice", "/bob_data/foo", "GET"]));
    assert!(!e.enforce(["alice", "/alice_data/foo", "POST"]));
}

#[tokio::test]
async fn rbac_with_domains_isolates_tenants() {
    let e = enforcer_from_fixtures("rbac_domains.conf", "rbac_domains_policy.csv").await;

    // alice -> admin -> reader inside domain1.
    assert!(e.enforce(["alice", "domain1", "data", "read"]));
    assert!(!e.enforce(["alice", "domain2", "data", "read"]));
    assert!(!e.enforce(["bob", "domain1", "data", "read"]));
}

#[tokio::test]
async fn domain_mappings_added_programmatically_behave_the_same() {
    let mut e = Enforcer::new(fixture("rbac_domains.conf"), Some(Box::new(MemoryAdapter::new())))
        .await
        .unwrap();
    e.add_policy(
        "p",
        ["reader", "domain1", "data", "read"].map(Value::from).to_vec(),
    )
    .await
    .unwrap();
    e.add_mapping_policy(MappingPolicy::with_domain("g", "alice", "admin", "domain1"))
        .await
        .unwrap();
    e.add_mapping_policy(MappingPolicy::with_domain("g", "admin", "reader", "domain1"))
        .await
        .unwrap();

    assert!(e.enforce(["alice", "domain1", "data", "read"]));
    assert!(!e.enforce(["alice", "domain2", "data", "read"]));

    e.remove_mapping_policy(MappingPolicy::with_domain("g", "alice", "admin", "domain1"))
        .await
        .unwrap();
    assert!(!e.enforce(["alice", "domain1", "data", "read"]));
}

#[tokio::test]
async fn path_segments_match_with_key_match2() {
    let mut e = Enforcer::new(fixture("restful.conf"), Some(Box::new(MemoryAdapter::new())))
        .await
        .unwrap();
    e.add_policy(
        "p",
        ["alice", "/alice_data/:a/using/:b", "GET"]
            .map(Value::from)
            .to_vec(),
    )
    .await
    .unwrap();

    assert!(e.enforce(["alice", "/alice_data/1/using/2", "GET"]));
    assert!(!e.enforce(["alice", "/alice_data/1/using/2", "POST"]));
    assert!(!e.enforce(["alice", "/alice_data/1/using", "GET"]));
    assert!(!e.enforce(["bob", "/alice_data/1/using/2", "GET"]));
}

#[tokio::test]
async fn deny_override_vacuously_allows_with_no_matches() {
    let model: Model = r"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[policy_effect]
e = !some(where (p.eft == deny))

[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
"
    .parse()
    .unwrap();
    let mut e = Enforcer::with_model(model, Some(Box::new(MemoryAdapter::new())));

    // No policies at all: nothing denies, so everything is allowed.
    assert!(e.enforce(["anyone", "anything", "whatever"]));

    e.add_policy(
        "p",
        ["alice", "data", "read", "deny"].map(Value::from).to_vec(),
    )
    .await
    .unwrap();
    assert!(!e.enforce(["alice", "data", "read"]));
    assert!(e.enforce(["alice", "data", "write"]));
}

#[tokio::test]
async fn saving_and_reloading_round_trips_the_state() -> anyhow::Result<()> {
    let mut e = enforcer_from_fixtures("rbac.conf", "rbac_policy.csv").await;
    e.set_persist_adapter(Box::new(MemoryAdapter::new()));
    e.save_policies().await?;

    let policies = e.policies().len();
    let mappings = e.mapping_policies().len();

    e.reset_configuration();
    assert!(!e.enforce(["alice", "blog_post", "read"]));

    e.load_policies().await?;
    e.load_mapping_policies().await?;
    assert_eq!(e.policies().len(), policies);
    assert_eq!(e.mapping_policies().len(), mappings);
    assert!(e.enforce(["alice", "blog_post", "read"]));
    Ok(())
}
