pub mod counts;
pub mod job;
pub mod model;
pub mod store;

pub use counts::{DeletionBatch, DeletionCounts};
pub use job::{JobConfigError, MigrationJob};
pub use model::{
    ActorId, DatasetId, DatasetRecord, DatasetState, Endpoint, MigrationPhase, OrganizationId,
};
pub use store::{
    GraphStore, ImportError, ImportPipeline, ImportRequest, PartitionedGraphView, RelationalStore,
    StoreError, Tunnel, TunnelError, TunnelService,
};
