//! CLI entry point for sim-mapper
//!
//! Prepares a policy control-plane for a simulated agent run: creates the
//! capacity namespaces under a base namespace and the mapping policies that
//! bind agents to them.
//!
//! # Examples
//!
//! 1200 agents in namespaces of 300, 100 agents per tag batch:
//! ```bash
//! sim-mapper --namespace /perf/sim --simulators 1200 --capacity 300 --batch 100 \
//!     --prefix run1 --create-namespaces --multi-mapping
//! ```
//!
//! Against the in-memory store, without touching any backend:
//! ```bash
//! RUST_LOG=debug sim-mapper --namespace /perf/sim --create-namespaces --multi-mapping --dry-run
//! ```

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use simharness_core::{
    config::BackendDetails,
    provisioning::{
        api::{RemoteObject, StoreRequest, StoreResponse},
        distributor::DistributionPlan,
        error::ProvisionError,
        init_provisioning, naming,
        tree::{NamespaceNode, NamespaceTree},
    },
    transport::loopback::StoreLoopback,
};
use tower::Service;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "sim-mapper")]
#[command(
    about = "Create capacity namespaces and mapping policies for simulated agents",
    long_about = None
)]
struct Args {
    /// The number of simulators to map
    #[arg(long, default_value_t = 300)]
    simulators: usize,

    /// The base namespace to create the flat namespace hierarchy and/or mapping
    #[arg(long, default_value = "")]
    namespace: String,

    /// The target namespace, relative to the base namespace, of the single mapping
    #[arg(long, default_value = "")]
    target: String,

    /// The prefix of the generated agent tags
    #[arg(long, default_value = "")]
    prefix: String,

    /// The number of agents sharing a tag batch
    #[arg(long, default_value_t = 300)]
    batch: usize,

    /// The tag of the agents matched by the single mapping
    #[arg(long, default_value = "")]
    tag: String,

    /// The capacity of each namespace
    #[arg(long, default_value_t = 300)]
    capacity: usize,

    /// Path to a YAML or JSON namespace tree document to create under the base namespace
    #[arg(long)]
    tree: Option<String>,

    /// Create simulators/capacity namespaces under the base namespace
    #[arg(long, default_value_t = false)]
    create_namespaces: bool,

    /// Create mapping policies from the base namespace to each capacity namespace
    #[arg(long, default_value_t = false)]
    multi_mapping: bool,

    /// Create one mapping policy from the base namespace to the target namespace
    #[arg(long, default_value_t = false, conflicts_with = "multi_mapping")]
    single_mapping: bool,

    /// Path to the application credential file
    #[arg(long, default_value = "apoctl.json")]
    appcred: String,

    /// Path to a YAML backend configuration, used instead of the application credential
    #[arg(long)]
    backend: Option<String>,

    /// Bound on every backend call in milliseconds, 0 to wait indefinitely
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Maximum mapping policies in flight per capacity namespace
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Run against an in-memory store instead of the backend
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Delete the base namespace and everything under it, then exit
    #[arg(
        long,
        default_value_t = false,
        conflicts_with_all = ["tree", "create_namespaces", "multi_mapping", "single_mapping"]
    )]
    delete: bool,
}

impl Args {
    fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_target(false).with_env_filter(filter).init();

    let args = Args::parse();

    if args.dry_run {
        info!("dry run, using an in-memory policy store");
        let store = StoreLoopback::default();
        seed_ancestors(&store, &args.namespace)?;
        run(&args, store).await
    } else {
        let backend = match &args.backend {
            Some(path) => BackendDetails::from_file(path)
                .with_context(|| format!("loading backend from {path}"))?,
            None => BackendDetails::from_appcred(&args.appcred)
                .with_context(|| format!("loading backend from {}", args.appcred))?,
        };
        let store = backend.connect().context("connecting to the backend")?;
        run(&args, store).await
    }
}

/// Creates the ancestors of `namespace` in the in-memory store, so that a dry
/// run behaves as if the base namespace lived in an existing hierarchy.
fn seed_ancestors(store: &StoreLoopback, namespace: &str) -> anyhow::Result<()> {
    if namespace.is_empty() {
        return Ok(());
    }
    let depth = naming::depth(namespace)?;
    let mut ancestors = Vec::with_capacity(depth);
    let mut current = naming::parent(namespace);
    while current != naming::ROOT {
        ancestors.push(current.clone());
        current = naming::parent(&current);
    }
    for (id, path) in ancestors.into_iter().rev().enumerate() {
        let parent = naming::parent(&path);
        let object = RemoteObject { id: format!("seed-{id}"), name: path, namespace: parent.clone() };
        store.insert_raw(&parent, object);
    }
    Ok(())
}

async fn run<S>(args: &Args, store: S) -> anyhow::Result<()>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvisionError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
{
    if args.namespace.is_empty() {
        bail!("a base namespace is required");
    }
    let (provisioner, distributor) = init_provisioning(store, args.timeout(), args.concurrency);

    if args.delete {
        provisioner
            .delete(&args.namespace)
            .await
            .with_context(|| format!("deleting namespace {}", args.namespace))?;
        return Ok(());
    }

    if args.tree.is_none() && !(args.create_namespaces || args.multi_mapping || args.single_mapping)
    {
        warn!("nothing to do, use --tree, --create-namespaces, --multi-mapping or --single-mapping");
        return Ok(());
    }

    if let Some(path) = &args.tree {
        let root = NamespaceNode::from_file(path)
            .with_context(|| format!("loading namespace tree from {path}"))?;
        provisioner
            .provision(&args.namespace, Some(&NamespaceTree::new(root, Vec::new())))
            .await
            .context("creating namespace tree")?;
    }

    if args.create_namespaces {
        if args.capacity == 0 {
            bail!("capacity must be positive");
        }
        let num_namespaces = args.simulators.div_ceil(args.capacity);
        provisioner
            .provision_flat(&args.namespace, num_namespaces)
            .await
            .context("creating namespaces")?;
    }

    if args.multi_mapping {
        let plan = DistributionPlan::new(args.simulators, args.capacity, args.batch, &args.prefix)
            .context("creating multi mappings")?;
        let created = distributor
            .distribute(&args.namespace, &plan)
            .await
            .context("creating multi mappings")?;
        info!(created, strategy = ?plan.strategy(), "multi mapping done");
    }

    if args.single_mapping {
        distributor
            .map_single(&args.tag, &args.namespace, &args.target)
            .await
            .context("creating one mapping policy")?;
        info!(tag = %args.tag, target = %args.target, "single mapping done");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sim-mapper").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn unit_args_defaults() {
        let args = args(&[]);
        assert_eq!(args.simulators, 300);
        assert_eq!(args.batch, 300);
        assert_eq!(args.capacity, 300);
        assert_eq!(args.appcred, "apoctl.json");
        assert_eq!(args.concurrency, 1);
        assert_eq!(args.timeout(), Some(Duration::from_secs(30)));
        assert!(!args.create_namespaces && !args.multi_mapping && !args.single_mapping);
    }

    #[test]
    fn unit_args_exclusive_mappings() {
        assert!(
            Args::try_parse_from(["sim-mapper", "--multi-mapping", "--single-mapping"]).is_err()
        );
        assert!(Args::try_parse_from(["sim-mapper", "--delete", "--create-namespaces"]).is_err());
        assert_eq!(args(&["--timeout-ms", "0"]).timeout(), None);
    }

    #[tokio::test]
    async fn unit_run_dry_multi_mapping() {
        let args = args(&[
            "--namespace",
            "/perf/sim",
            "--simulators",
            "6",
            "--capacity",
            "2",
            "--batch",
            "1",
            "--prefix",
            "x",
            "--create-namespaces",
            "--multi-mapping",
        ]);
        let store = StoreLoopback::default();
        seed_ancestors(&store, &args.namespace).unwrap();
        run(&args, store.clone()).await.unwrap();

        assert!(store.contains_namespace("/perf/sim/sim-2"));
        let policies = store.mapping_policies();
        assert_eq!(policies.len(), 6);
        assert!(policies.iter().all(|(namespace, _)| namespace == "/perf/sim"));
        assert_eq!(policies[5].1.mapped_namespace, "/perf/sim/sim-2");
    }

    #[tokio::test]
    async fn unit_run_rejects_large_batch() {
        let args = args(&["--namespace", "/sim", "--simulators", "10", "--multi-mapping"]);
        let err = run(&args, StoreLoopback::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn unit_run_dry_single_mapping_and_delete() {
        let store = StoreLoopback::default();
        let create = args(&[
            "--namespace",
            "/sim",
            "--simulators",
            "2",
            "--capacity",
            "1",
            "--create-namespaces",
        ]);
        run(&create, store.clone()).await.unwrap();

        let single =
            args(&["--namespace", "/sim", "--single-mapping", "--tag", "t", "--target", "sim-1"]);
        run(&single, store.clone()).await.unwrap();
        assert_eq!(store.mapping_policies()[0].1.mapped_namespace, "/sim/sim-1");

        let delete = args(&["--namespace", "/sim", "--delete"]);
        run(&delete, store.clone()).await.unwrap();
        assert!(!store.contains_namespace("/sim"));
    }

    #[tokio::test]
    async fn unit_run_dry_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.yaml");
        std::fs::write(&path, "name: root\nchildren:\n  - name: a\n  - name: b\n    tags: [x=1]\n")
            .unwrap();

        let store = StoreLoopback::default();
        let args = args(&["--namespace", "/", "--tree", path.to_str().unwrap()]);
        run(&args, store.clone()).await.unwrap();

        assert!(store.contains_namespace("/root/a"));
        assert_eq!(store.created_namespaces()[2].1.associated_tags, ["x=1"]);
    }
}
