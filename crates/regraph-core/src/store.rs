use crate::counts::DeletionBatch;
use crate::model::{ActorId, DatasetId, DatasetRecord, OrganizationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("query failure: {0}")]
    Query(String),
    #[error("{0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
#[error("failed to open tunnel to {host}:{port}: {reason}")]
pub struct TunnelError {
    pub host: String,
    pub port: u16,
    pub reason: String,
}

/// Read-mostly surface over the relational store. This engine never mutates
/// dataset existence records; the lock operations are the only write and are
/// gated on [`RelationalStore::supports_locking`].
pub trait RelationalStore {
    fn organizations(&self) -> Result<Vec<OrganizationId>, StoreError>;

    /// Live dataset ids for the organization, ordered by id. Rows in the
    /// `DELETING` state are excluded.
    fn live_dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError>;

    fn dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<Option<DatasetRecord>, StoreError>;

    /// Whether exclusive dataset locks exist in this store. Implementations
    /// that return `false` must fail fast from the lock operations rather
    /// than silently no-op.
    fn supports_locking(&self) -> bool;

    fn lock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError>;

    fn unlock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError>;
}

/// Surface over the partitioned graph store.
pub trait GraphStore {
    /// Dataset ids the graph store currently holds data for.
    fn dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError>;

    fn entity_count(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<u64, StoreError>;

    /// Delete at most `batch_size` entities within `duration_ms`, reporting
    /// the removed counts and whether the dataset graph is now empty.
    fn delete_batch(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        actor: &ActorId,
        batch_size: u32,
        duration_ms: u64,
    ) -> Result<DeletionBatch, StoreError>;

    /// Flip the organization's service-enablement flag, marking cutover to
    /// the partitioned store. Idempotent.
    fn enable_service(&self, organization: OrganizationId) -> Result<(), StoreError>;
}

/// A handle into the graph store scoped to one organization, dataset, and
/// acting user.
pub struct PartitionedGraphView<'a> {
    graph: &'a dyn GraphStore,
    pub organization: OrganizationId,
    pub dataset: DatasetId,
    pub actor: ActorId,
}

impl<'a> PartitionedGraphView<'a> {
    pub fn new(
        graph: &'a dyn GraphStore,
        organization: OrganizationId,
        dataset: DatasetId,
        actor: ActorId,
    ) -> Self {
        Self {
            graph,
            organization,
            dataset,
            actor,
        }
    }

    pub fn delete_batch(
        &self,
        batch_size: u32,
        duration_ms: u64,
    ) -> Result<DeletionBatch, StoreError> {
        self.graph.delete_batch(
            self.organization,
            self.dataset,
            &self.actor,
            batch_size,
            duration_ms,
        )
    }

    pub fn entity_count(&self) -> Result<u64, StoreError> {
        self.graph.entity_count(self.organization, self.dataset)
    }
}

/// Everything the import pipeline needs to load one exported dataset into the
/// partitioned store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub organization: OrganizationId,
    pub dataset: DatasetId,
    /// Blob-storage bucket the export was written to.
    pub bucket: String,
    /// Key prefix within the bucket, `{organization}/{dataset}`.
    pub prefix: String,
    pub cutover: bool,
    pub remove_existing: bool,
    pub smoke_test: bool,
    pub remap_ids: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("import of dataset {dataset} in organization {organization} failed: {message}")]
pub struct ImportError {
    pub organization: OrganizationId,
    pub dataset: DatasetId,
    pub message: String,
}

/// External import pipeline. Must be idempotent under re-invocation when
/// `remove_existing` is unset.
pub trait ImportPipeline {
    fn import(
        &self,
        view: &PartitionedGraphView<'_>,
        request: &ImportRequest,
    ) -> Result<(), ImportError>;
}

/// Acquires secure network paths to remote hosts. A failure to open aborts
/// the whole operation before any store access.
pub trait TunnelService {
    fn open(
        &self,
        remote_host: &str,
        remote_port: u16,
        local_port: u16,
    ) -> Result<Box<dyn Tunnel>, TunnelError>;
}

/// An open tunnel; the remote service is reachable on the local endpoint for
/// as long as the value is held. Closed on drop.
pub trait Tunnel {
    fn host(&self) -> String;
    fn port(&self) -> u16;
}
