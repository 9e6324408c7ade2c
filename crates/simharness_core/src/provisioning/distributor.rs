//! Capacity-bounded distribution of namespace mapping policies.
//!
//! Simulated agents are bound to the capacity namespaces of a source namespace
//! (`<source>/<base>-<i>`, see [`naming::child_path`]) by mapping policies
//! created in the source namespace. Each policy matches agents carrying one
//! tag and maps them into one capacity namespace.
//!
//! Two strategies produce the sequence of assignments:
//!
//! - **Degenerate**, when the batch size equals the capacity: one policy per
//!   capacity namespace, tagged `simbase-<prefix>-<n>` for `n` in `1..=N`.
//! - **General**, otherwise: agents are placed one after the other into
//!   fixed-capacity bins, moving to the next bin when the running total of
//!   policies is a multiple of the capacity, and stopping as soon as all `N`
//!   bins are full. Tags are `nsim=<prefix><batch>-<i>`, `i` running over
//!   `1..=batch_size` in each batch. A batch may straddle two bins.
//!
//! Both sequences are fully determined by their inputs, so two runs with the
//! same parameters produce the same tags targeting the same namespaces.
//! Capacity namespaces are never created here, they must already exist.

use futures::{TryStreamExt, stream};
use tower::Service;
use tracing::{debug, info};

use crate::provisioning::{
    api::{MappingPolicyObject, StoreObject, StoreRequest, StoreResponse},
    client::StoreClient,
    error::ProvisionError,
    naming,
};

/// One agent binding: agents tagged `tag` in `source_namespace` are mapped
/// into `target_namespace`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingAssignment {
    pub tag: String,
    pub source_namespace: String,
    /// Full path of the capacity namespace
    pub target_namespace: String,
    /// Index of the capacity namespace, in `[0, N)`
    pub target_index: usize,
}

impl MappingAssignment {
    fn new(tag: String, source_namespace: &str, target_index: usize) -> Self {
        Self {
            tag,
            source_namespace: source_namespace.to_string(),
            target_namespace: naming::child_path(source_namespace, target_index),
            target_index,
        }
    }

    /// Simple name of the target namespace, e.g. `sim-2`.
    pub fn target_name(&self) -> String {
        naming::base_name(&self.target_namespace)
    }
}

/// Assignments of the degenerate strategy: one per capacity namespace.
#[derive(Debug, Clone)]
pub struct DegenerateAssignments {
    source_namespace: String,
    prefix: String,
    num_namespaces: usize,
    batch: usize,
}

impl DegenerateAssignments {
    pub fn new(source_namespace: &str, num_namespaces: usize, prefix: &str) -> Self {
        Self {
            source_namespace: source_namespace.to_string(),
            prefix: prefix.to_string(),
            num_namespaces,
            batch: 1,
        }
    }
}

impl Iterator for DegenerateAssignments {
    type Item = MappingAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch > self.num_namespaces {
            return None;
        }
        let batch = self.batch;
        self.batch += 1;
        Some(MappingAssignment::new(
            format!("simbase-{}-{batch}", self.prefix),
            &self.source_namespace,
            batch - 1,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.num_namespaces + 1).saturating_sub(self.batch);
        (remaining, Some(remaining))
    }
}

/// Assignments of the general strategy: sequential placement into
/// `num_namespaces` bins of `capacity` each.
#[derive(Debug, Clone)]
pub struct GeneralAssignments {
    source_namespace: String,
    prefix: String,
    num_namespaces: usize,
    capacity: usize,
    batch_size: usize,
    namespace_index: usize,
    mappings_created: usize,
    batch_index: usize,
    /// Position in the current batch, in `1..=batch_size`
    position: usize,
}

impl GeneralAssignments {
    pub fn new(
        source_namespace: &str,
        num_namespaces: usize,
        capacity: usize,
        batch_size: usize,
        prefix: &str,
    ) -> Self {
        Self {
            source_namespace: source_namespace.to_string(),
            prefix: prefix.to_string(),
            num_namespaces,
            capacity,
            batch_size,
            namespace_index: 0,
            mappings_created: 0,
            batch_index: 0,
            position: 1,
        }
    }
}

impl Iterator for GeneralAssignments {
    type Item = MappingAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.namespace_index >= self.num_namespaces || self.capacity == 0 || self.batch_size == 0
        {
            return None;
        }

        let assignment = MappingAssignment::new(
            format!("nsim={}{}-{}", self.prefix, self.batch_index, self.position),
            &self.source_namespace,
            self.namespace_index,
        );

        self.mappings_created += 1;
        if self.position == self.batch_size {
            self.position = 1;
            self.batch_index += 1;
        } else {
            self.position += 1;
        }
        // rollover follows the running total, not the position in the batch
        if self.mappings_created % self.capacity == 0 {
            self.namespace_index += 1;
        }
        Some(assignment)
    }
}

/// Distribution strategy selected by a [`DistributionPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Batch size equals capacity: one policy per capacity namespace
    Degenerate,
    /// Sequential placement into capacity-bounded bins
    General,
}

/// Validated parameters of a distribution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub total_agents: usize,
    pub capacity: usize,
    pub batch_size: usize,
    pub prefix: String,
}

impl DistributionPlan {
    /// Validates the run parameters.
    ///
    /// # Errors
    ///
    /// `ConfigError` when any count is zero or the batch size exceeds the total
    /// number of agents.
    pub fn new(
        total_agents: usize,
        capacity: usize,
        batch_size: usize,
        prefix: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        if total_agents == 0 {
            return Err(ProvisionError::ConfigError("total agents must be positive".to_string()));
        }
        if capacity == 0 {
            return Err(ProvisionError::ConfigError("capacity must be positive".to_string()));
        }
        if batch_size == 0 {
            return Err(ProvisionError::ConfigError("batch size must be positive".to_string()));
        }
        if batch_size > total_agents {
            return Err(ProvisionError::ConfigError(format!(
                "batch size {batch_size} cannot be larger than total agents {total_agents}"
            )));
        }
        Ok(Self { total_agents, capacity, batch_size, prefix: prefix.into() })
    }

    /// Number of capacity namespaces needed to hold every agent.
    pub fn num_namespaces(&self) -> usize {
        self.total_agents.div_ceil(self.capacity)
    }

    pub fn strategy(&self) -> Strategy {
        if self.batch_size == self.capacity { Strategy::Degenerate } else { Strategy::General }
    }

    /// Assignments of this plan for `source_namespace`, in creation order.
    pub fn assignments(
        &self,
        source_namespace: &str,
    ) -> Box<dyn Iterator<Item = MappingAssignment> + Send> {
        match self.strategy() {
            Strategy::Degenerate => Box::new(DegenerateAssignments::new(
                source_namespace,
                self.num_namespaces(),
                &self.prefix,
            )),
            Strategy::General => Box::new(GeneralAssignments::new(
                source_namespace,
                self.num_namespaces(),
                self.capacity,
                self.batch_size,
                &self.prefix,
            )),
        }
    }
}

/// Creates mapping policies through a policy store client.
///
/// Policies are created one at a time by default. With a concurrency above
/// one, the policies targeting the same capacity namespace are created
/// concurrently, with at most that many in flight, while capacity namespaces
/// are still filled one after the other. The first failure stops the run.
#[derive(Debug, Clone)]
pub struct MappingDistributor<S> {
    client: StoreClient<S>,
    concurrency: usize,
}

impl<S> MappingDistributor<S> {
    pub fn new(client: StoreClient<S>) -> Self {
        Self { client, concurrency: 1 }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl<S> MappingDistributor<S>
where
    S: Service<StoreRequest, Response = StoreResponse, Error = ProvisionError>
        + Clone
        + Send
        + Sync,
    S::Future: Send,
{
    /// Runs `plan` against `source_namespace` with the strategy it selects.
    /// Returns the number of mapping policies created.
    pub async fn distribute(
        &self,
        source_namespace: &str,
        plan: &DistributionPlan,
    ) -> Result<usize, ProvisionError> {
        info!(
            source_namespace,
            strategy = ?plan.strategy(),
            num_namespaces = plan.num_namespaces(),
            "applying mapping policies"
        );
        let created = self.apply(plan.assignments(source_namespace)).await?;
        info!(created, "mapping policies are applied");
        Ok(created)
    }

    /// Creates one mapping policy per capacity namespace.
    pub async fn map_degenerate(
        &self,
        source_namespace: &str,
        num_namespaces: usize,
        prefix: &str,
    ) -> Result<usize, ProvisionError> {
        info!(source_namespace, num_namespaces, "applying batch mapping policies");
        let created =
            self.apply(DegenerateAssignments::new(source_namespace, num_namespaces, prefix)).await?;
        info!(created, "mapping policies are applied");
        Ok(created)
    }

    /// Fills `num_namespaces` capacity namespaces of `capacity` policies each.
    pub async fn map_general(
        &self,
        source_namespace: &str,
        num_namespaces: usize,
        capacity: usize,
        batch_size: usize,
        prefix: &str,
    ) -> Result<usize, ProvisionError> {
        if capacity == 0 || batch_size == 0 {
            return Err(ProvisionError::ConfigError(
                "capacity and batch size must be positive".to_string(),
            ));
        }
        info!(source_namespace, num_namespaces, capacity, batch_size, "applying mapping policies");
        let created = self
            .apply(GeneralAssignments::new(
                source_namespace,
                num_namespaces,
                capacity,
                batch_size,
                prefix,
            ))
            .await?;
        info!(created, "mapping policies are applied");
        Ok(created)
    }

    /// Creates a single mapping policy from `source_namespace` to its child
    /// `target`, matching agents tagged `tag`.
    pub async fn map_single(
        &self,
        tag: &str,
        source_namespace: &str,
        target: &str,
    ) -> Result<(), ProvisionError> {
        let target_namespace = naming::join(source_namespace, target);
        naming::depth(&target_namespace)?;
        self.create_mapping(tag, source_namespace, &target_namespace).await
    }

    async fn create_mapping(
        &self,
        tag: &str,
        source_namespace: &str,
        target_namespace: &str,
    ) -> Result<(), ProvisionError> {
        debug!(tag, target_namespace, "creating mapping policy");
        let policy = MappingPolicyObject::for_enforcers(tag, target_namespace);
        self.client
            .create_in_namespace(source_namespace, StoreObject::MappingPolicy(policy))
            .await
            .map_err(|err| ProvisionError::create_failure(tag, err))
    }

    async fn create_assignment(&self, assignment: MappingAssignment) -> Result<(), ProvisionError> {
        self.create_mapping(
            &assignment.tag,
            &assignment.source_namespace,
            &assignment.target_namespace,
        )
        .await
    }

    /// Creates a mapping policy for every assignment, stopping at the first
    /// failure. Returns the number of policies created.
    pub async fn apply<I>(&self, assignments: I) -> Result<usize, ProvisionError>
    where
        I: IntoIterator<Item = MappingAssignment>,
    {
        let mut created = 0;
        if self.concurrency == 1 {
            for assignment in assignments {
                self.create_assignment(assignment).await?;
                created += 1;
            }
            return Ok(created);
        }

        let mut assignments = assignments.into_iter().peekable();
        while let Some(first) = assignments.next() {
            let target_index = first.target_index;
            let mut bin = vec![first];
            while let Some(next) = assignments.next_if(|next| next.target_index == target_index) {
                bin.push(next);
            }
            let count = bin.len();
            stream::iter(bin.into_iter().map(Ok::<_, ProvisionError>))
                .try_for_each_concurrent(self.concurrency, |assignment| {
                    self.create_assignment(assignment)
                })
                .await?;
            created += count;
            debug!(target_index, count, "capacity namespace filled");
        }
        Ok(created)
    }
}
