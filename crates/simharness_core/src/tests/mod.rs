
use fixtures::{LoopbackHarness, remote_namespace};

use crate::provisioning::{
    distributor::{DistributionPlan, Strategy},
    error::ProvisionError,
    tree::{NamespaceNode, NamespaceTree},
};

#[tokio::test]
async fn integration_provision_then_distribute_general() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let plan = DistributionPlan::new(6, 2, 1, "x").unwrap();
    assert_eq!(plan.strategy(), Strategy::General);

    harness.provisioner.provision_flat("/base", plan.num_namespaces()).await.unwrap();
    assert_eq!(harness.distributor.distribute("/base", &plan).await, Ok(6));

    assert_mappings!(
        harness,
        [
            ("nsim=x0-1", "/base/base-0"),
            ("nsim=x1-1", "/base/base-0"),
            ("nsim=x2-1", "/base/base-1"),
            ("nsim=x3-1", "/base/base-1"),
            ("nsim=x4-1", "/base/base-2"),
            ("nsim=x5-1", "/base/base-2"),
        ]
    );
}

#[tokio::test]
async fn integration_provision_then_distribute_degenerate() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let plan = DistributionPlan::new(1200, 300, 300, "p").unwrap();
    assert_eq!(plan.strategy(), Strategy::Degenerate);

    harness.provisioner.provision_flat("/base", plan.num_namespaces()).await.unwrap();
    assert_eq!(harness.distributor.distribute("/base", &plan).await, Ok(4));

    assert_mappings!(
        harness,
        [
            ("simbase-p-1", "/base/base-0"),
            ("simbase-p-2", "/base/base-1"),
            ("simbase-p-3", "/base/base-2"),
            ("simbase-p-4", "/base/base-3"),
        ]
    );
}

#[tokio::test]
async fn integration_flat_provisioning_pre_order() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let perf = NamespaceTree::new(NamespaceNode::new("perf"), Vec::new());
    harness.provisioner.provision("/", Some(&perf)).await.unwrap();
    harness.provisioner.provision_flat("/perf/sim", 3).await.unwrap();

    assert_eq!(
        harness.attempted_namespaces(),
        ["/perf", "/perf/sim", "/perf/sim/sim-0", "/perf/sim/sim-1", "/perf/sim/sim-2"]
    );
    let created = harness.store.created_namespaces();
    assert_eq!(created[1].1.associated_tags, ["creator=simulator-test-harness"]);
    assert_eq!(created[3].1.associated_tags, ["child=1", "creator=simulator-test-harness"]);
}

#[tokio::test]
async fn integration_failure_halts_walk() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let tree = NamespaceTree::new(
        NamespaceNode::new("r").with_children(vec![
            NamespaceNode::new("a")
                .with_children(vec![NamespaceNode::new("a1"), NamespaceNode::new("a2")]),
            NamespaceNode::new("b"),
        ]),
        Vec::new(),
    );
    harness.store.fail_on("a1");

    let err = harness.provisioner.provision("/", Some(&tree)).await.unwrap_err();
    let ProvisionError::Nested { name, source } = &err else {
        panic!("Expected ProvisionError::Nested");
    };
    assert_eq!(name, "a");
    assert!(matches!(&**source, ProvisionError::Nested { name, .. } if name == "a1"));
    assert!(matches!(
        err.root_cause(),
        ProvisionError::RemoteCreateFailure { name, .. } if name == "a1"
    ));

    // later siblings are never attempted and nothing is rolled back
    assert_eq!(harness.attempted_namespaces(), ["/r", "/r/a", "/r/a/a1"]);
    assert!(harness.store.contains_namespace("/r/a"));
    assert_eq!(harness.delete_calls(), 0);
}

#[tokio::test]
async fn integration_delete_lookup() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();

    assert_eq!(
        harness.provisioner.delete("/perf/sim").await,
        Err(ProvisionError::NotFound("/perf/sim".to_string()))
    );

    harness.store.insert_raw("/perf", remote_namespace("1", "/perf/sim"));
    harness.store.insert_raw("/perf", remote_namespace("2", "/perf/sim"));
    assert_eq!(
        harness.provisioner.delete("/perf/sim").await,
        Err(ProvisionError::Ambiguous { path: "/perf/sim".to_string(), count: 2 })
    );
    assert_eq!(harness.delete_calls(), 0);
}

#[tokio::test]
async fn integration_provision_and_delete() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    harness.provisioner.provision_flat("/sim", 2).await.unwrap();
    harness.provisioner.delete("/sim").await.unwrap();

    assert_eq!(harness.delete_calls(), 1);
    assert_eq!(harness.store.namespace_count(), 0);
}

#[tokio::test]
async fn integration_concurrent_distribution() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::with_concurrency(8);
    let plan = DistributionPlan::new(100, 30, 7, "c").unwrap();
    harness.provisioner.provision_flat("/sim", plan.num_namespaces()).await.unwrap();

    // the namespace count is a hard ceiling: every bin is filled to capacity
    assert_eq!(harness.distributor.distribute("/sim", &plan).await, Ok(120));

    let mut expected: Vec<_> =
        plan.assignments("/sim").map(|a| (a.tag, a.target_namespace)).collect();
    let mut actual = harness.mappings();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn integration_distribution_needs_capacity_namespaces() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let plan = DistributionPlan::new(4, 2, 1, "m").unwrap();
    harness.provisioner.provision_flat("/sim", 0).await.unwrap();

    let err = harness.distributor.distribute("/sim", &plan).await.unwrap_err();
    assert!(matches!(err, ProvisionError::RemoteCreateFailure { name, .. } if name == "nsim=m0-1"));
    assert!(harness.mappings().is_empty());
}

#[tokio::test]
async fn integration_distribution_needs_source_namespace() {
    crate::simharness_tracing::init();
    let harness = LoopbackHarness::new();
    let plan = DistributionPlan::new(4, 2, 1, "m").unwrap();

    let err = harness.distributor.distribute("/missing", &plan).await.unwrap_err();
    assert!(matches!(err, ProvisionError::RemoteCreateFailure { name, .. } if name == "nsim=m0-1"));
    assert!(harness.mappings().is_empty());
}
