use crate::export::{DatasetExporter, ExportError};
use regraph_core::{
    ActorId, DatasetId, GraphStore, ImportError, ImportPipeline, ImportRequest, JobConfigError,
    MigrationJob, MigrationPhase, OrganizationId, PartitionedGraphView, RelationalStore,
    StoreError,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] JobConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(
        "organization {organization} still has live datasets that were not migrated: {missing:?}"
    )]
    UnmigratedDatasets {
        organization: OrganizationId,
        missing: Vec<DatasetId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOutcome {
    pub dataset: DatasetId,
    pub phase: MigrationPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub organization: OrganizationId,
    pub outcomes: Vec<DatasetOutcome>,
    /// Whether the organization's service-enablement flag was flipped.
    pub cutover: bool,
}

/// Holds a dataset's exclusive lock for the lock→unlock window.
///
/// Release is explicit on the normal path so its error can propagate; drop is
/// the backstop for early returns, which only logs.
struct DatasetLock<'a> {
    relational: &'a dyn RelationalStore,
    organization: OrganizationId,
    dataset: DatasetId,
    held: bool,
}

impl<'a> DatasetLock<'a> {
    fn acquire(
        relational: &'a dyn RelationalStore,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<Self, StoreError> {
        if !relational.supports_locking() {
            warn!(
                %organization,
                %dataset,
                "relational store does not support dataset locks; migrating without one"
            );
            return Ok(Self {
                relational,
                organization,
                dataset,
                held: false,
            });
        }
        relational.lock_dataset(organization, dataset)?;
        Ok(Self {
            relational,
            organization,
            dataset,
            held: true,
        })
    }

    fn held(&self) -> bool {
        self.held
    }

    fn release(mut self) -> Result<(), StoreError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        self.relational.unlock_dataset(self.organization, self.dataset)
    }
}

impl Drop for DatasetLock<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Err(err) = self
                .relational
                .unlock_dataset(self.organization, self.dataset)
            {
                error!(
                    organization = %self.organization,
                    dataset = %self.dataset,
                    "failed to release dataset lock: {err}"
                );
            }
        }
    }
}

/// Drives each target dataset through lock → export → import → unlock, and
/// for organization-wide jobs validates the result and flips the cutover
/// flag.
pub struct Migrator<'a> {
    relational: &'a dyn RelationalStore,
    graph: &'a dyn GraphStore,
    exporter: &'a dyn DatasetExporter,
    importer: &'a dyn ImportPipeline,
    export_bucket: String,
}

impl<'a> Migrator<'a> {
    pub fn new(
        relational: &'a dyn RelationalStore,
        graph: &'a dyn GraphStore,
        exporter: &'a dyn DatasetExporter,
        importer: &'a dyn ImportPipeline,
        export_bucket: impl Into<String>,
    ) -> Self {
        Self {
            relational,
            graph,
            exporter,
            importer,
            export_bucket: export_bucket.into(),
        }
    }

    pub fn run(&self, job: &MigrationJob) -> Result<MigrationReport, MigrationError> {
        job.validate()?;

        let organization = job.organization;
        let datasets = match &job.datasets {
            Some(ids) => ids.clone(),
            None => self.relational.live_dataset_ids(organization)?,
        };

        let mut report = MigrationReport {
            organization,
            outcomes: Vec::new(),
            cutover: false,
        };

        for dataset in datasets {
            match self.migrate_dataset(job, dataset) {
                Ok(()) => report.outcomes.push(DatasetOutcome {
                    dataset,
                    phase: MigrationPhase::Unlocked,
                }),
                Err(err) => {
                    // No partial-job continuation: remaining datasets are not
                    // attempted.
                    error!(
                        %organization,
                        %dataset,
                        "migration failed, aborting the remaining job: {err}"
                    );
                    return Err(err);
                }
            }
        }

        if job.targets_entire_organization() {
            info!(%organization, "validating organization migration");
            let live = self.relational.live_dataset_ids(organization)?;
            let processed: BTreeSet<DatasetId> =
                report.outcomes.iter().map(|outcome| outcome.dataset).collect();
            let missing: Vec<DatasetId> = live
                .into_iter()
                .filter(|id| !processed.contains(id))
                .collect();
            if !missing.is_empty() {
                return Err(MigrationError::UnmigratedDatasets {
                    organization,
                    missing,
                });
            }
            self.graph.enable_service(organization)?;
            report.cutover = true;
            info!(%organization, "organization cutover complete");
        }

        info!(%organization, migrated = report.outcomes.len(), "migration done");
        Ok(report)
    }

    fn migrate_dataset(&self, job: &MigrationJob, dataset: DatasetId) -> Result<(), MigrationError> {
        let organization = job.organization;
        info!(%organization, %dataset, "migrating dataset");

        let lock = DatasetLock::acquire(self.relational, organization, dataset)?;
        if lock.held() {
            debug!(%organization, %dataset, phase = %MigrationPhase::Locked, "dataset locked");
        }

        let attempt = self.export_and_import(job, dataset);
        // Whatever happened above, the lock must not outlive the attempt.
        let unlocked = lock.release();

        if let Err(err) = &attempt {
            warn!(
                %organization,
                %dataset,
                phase = %MigrationPhase::Failed,
                "migration attempt failed: {err}"
            );
        }
        attempt?;
        unlocked?;
        debug!(%organization, %dataset, phase = %MigrationPhase::Unlocked, "dataset migrated");
        Ok(())
    }

    fn export_and_import(
        &self,
        job: &MigrationJob,
        dataset: DatasetId,
    ) -> Result<(), MigrationError> {
        let organization = job.organization;

        self.exporter.export(organization, dataset, job.smoke_test)?;
        debug!(%organization, %dataset, phase = %MigrationPhase::Exported, "export complete");

        let view =
            PartitionedGraphView::new(self.graph, organization, dataset, ActorId::migration());
        let request = ImportRequest {
            organization,
            dataset,
            bucket: self.export_bucket.clone(),
            prefix: format!("{organization}/{dataset}"),
            cutover: true,
            remove_existing: job.remove_existing,
            smoke_test: job.smoke_test,
            remap_ids: job.remap_ids,
        };
        self.importer.import(&view, &request)?;
        debug!(%organization, %dataset, phase = %MigrationPhase::Imported, "import complete");
        Ok(())
    }
}
