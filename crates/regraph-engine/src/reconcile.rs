use crate::delete::{delete_dataset_completely, Pause, RetryPolicy, ThreadPause};
use regraph_core::{
    ActorId, DatasetId, DatasetState, GraphStore, OrganizationId, PartitionedGraphView,
    RelationalStore, StoreError,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

/// Batch bounds used for orphan deletion.
pub const DELETE_BATCH_SIZE: u32 = 1000;
pub const DELETE_BATCH_DURATION_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// An orphan's relational record turned out to be in a live state.
    /// Deleting its graph data would lose data the relational store still
    /// considers real, so the pass aborts instead.
    #[error(
        "dataset {dataset} in organization {organization} is {state} in the relational \
         store; refusing to delete its graph data"
    )]
    LiveDataset {
        organization: OrganizationId,
        dataset: DatasetId,
        state: DatasetState,
    },
}

/// Diffs dataset ids across the two stores for one organization and deletes
/// (or, in dry-run mode, reports) every dataset the graph store holds that is
/// no longer live in the relational store.
///
/// The relational store is the sole source of truth for whether a dataset
/// should exist; the graph store is a derived projection, which is what lets
/// cleanup be a set difference instead of a distributed transaction.
pub fn reconcile_organization(
    relational: &dyn RelationalStore,
    graph: &dyn GraphStore,
    organization: OrganizationId,
    dry_run: bool,
) -> Result<(), ReconcileError> {
    reconcile_organization_with(
        relational,
        graph,
        organization,
        dry_run,
        &RetryPolicy::default(),
        &ThreadPause,
    )
}

/// [`reconcile_organization`] with an explicit retry policy and pause seam.
pub fn reconcile_organization_with(
    relational: &dyn RelationalStore,
    graph: &dyn GraphStore,
    organization: OrganizationId,
    dry_run: bool,
    policy: &RetryPolicy,
    pause: &dyn Pause,
) -> Result<(), ReconcileError> {
    let live: BTreeSet<DatasetId> = relational.live_dataset_ids(organization)?.into_iter().collect();
    let present: BTreeSet<DatasetId> = graph.dataset_ids(organization)?.into_iter().collect();
    let orphaned: Vec<DatasetId> = present.difference(&live).copied().collect();

    if dry_run {
        info!("{0} DRY RUN {0}", "*".repeat(20));
    }
    info!(
        organization = %organization,
        "found {} orphaned dataset(s)",
        orphaned.len()
    );

    for dataset in orphaned {
        let record = relational.dataset(organization, dataset)?;
        if let Some(record) = &record {
            if !record.state.is_deleting() {
                return Err(ReconcileError::LiveDataset {
                    organization,
                    dataset,
                    state: record.state,
                });
            }
        }

        let entities = graph.entity_count(organization, dataset)?;
        if dry_run {
            info!(
                organization = %organization,
                dataset = %dataset,
                entities,
                "would delete: {record:?}"
            );
            continue;
        }

        info!(
            organization = %organization,
            dataset = %dataset,
            entities,
            "deleting: {record:?}"
        );
        let view =
            PartitionedGraphView::new(graph, organization, dataset, ActorId::reconciliation());
        let counts = delete_dataset_completely(
            &view,
            DELETE_BATCH_SIZE,
            DELETE_BATCH_DURATION_MS,
            policy,
            pause,
        )?;
        info!(organization = %organization, dataset = %dataset, "deleted {counts}");
    }

    info!(organization = %organization, "reconciliation done");
    Ok(())
}

/// Reconciles every organization the relational store knows about, in turn.
pub fn reconcile_all_organizations(
    relational: &dyn RelationalStore,
    graph: &dyn GraphStore,
    dry_run: bool,
) -> Result<(), ReconcileError> {
    let policy = RetryPolicy::default();
    for organization in relational.organizations()? {
        info!("*** organization {organization} ***");
        reconcile_organization_with(relational, graph, organization, dry_run, &policy, &ThreadPause)?;
    }
    Ok(())
}
