//! Dataset lifecycle engine: orphan reconciliation between the relational
//! store and the partitioned graph store, and per-dataset migration from the
//! legacy bulk graph (lock, export, import, unlock, organization cutover).

pub mod delete;
pub mod export;
pub mod migrate;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod testing;

pub use delete::{delete_dataset_completely, Pause, RetryPolicy, ThreadPause};
pub use export::{DatasetExporter, ExportError, ExporterConfig, SubprocessExporter};
pub use migrate::{DatasetOutcome, MigrationError, MigrationReport, Migrator};
pub use reconcile::{reconcile_all_organizations, reconcile_organization, ReconcileError};
