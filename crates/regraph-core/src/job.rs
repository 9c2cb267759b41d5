use crate::model::{DatasetId, OrganizationId};
use thiserror::Error;

/// Invalid flag combination, rejected before any tunnel or store connection
/// is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobConfigError {
    #[error(
        "cannot remove existing graph data while migrating more than one dataset \
         in organization {organization}"
    )]
    RemoveExistingScope { organization: OrganizationId },
    #[error("ids can only be remapped for a single target dataset")]
    RemapIdsScope,
    #[error("migration of organization {organization} was given an empty dataset list")]
    NoTargetDatasets { organization: OrganizationId },
}

/// One migration run. Ephemeral and in-memory only: the durable record of
/// progress is the data in the target store and the organization cutover
/// flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationJob {
    pub organization: OrganizationId,
    /// Explicit target datasets, or `None` for every live dataset in the
    /// organization.
    pub datasets: Option<Vec<DatasetId>>,
    /// Drop previously imported data for the target dataset first. Only legal
    /// with a single explicit target.
    pub remove_existing: bool,
    /// Generate smoke-test sample data during export.
    pub smoke_test: bool,
    /// Remap identifiers on import. Only legal with a single explicit target.
    pub remap_ids: bool,
}

impl MigrationJob {
    pub fn entire_organization(organization: OrganizationId) -> Self {
        Self {
            organization,
            datasets: None,
            remove_existing: false,
            smoke_test: true,
            remap_ids: false,
        }
    }

    pub fn targets_entire_organization(&self) -> bool {
        self.datasets.is_none()
    }

    /// Eager configuration check; must pass before any network resource is
    /// acquired.
    pub fn validate(&self) -> Result<(), JobConfigError> {
        let explicit = self.datasets.as_deref();
        if let Some([]) = explicit {
            return Err(JobConfigError::NoTargetDatasets {
                organization: self.organization,
            });
        }
        if self.remove_existing && !matches!(explicit, Some([_])) {
            return Err(JobConfigError::RemoveExistingScope {
                organization: self.organization,
            });
        }
        if self.remap_ids && !matches!(explicit, Some([_])) {
            return Err(JobConfigError::RemapIdsScope);
        }
        Ok(())
    }
}
