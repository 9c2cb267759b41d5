//! Scripted in-memory fakes for the collaborator contracts, shared by the
//! unit tests in this crate.

use crate::delete::Pause;
use crate::export::{DatasetExporter, ExportError};
use regraph_core::{
    ActorId, DatasetId, DatasetRecord, DatasetState, DeletionBatch, DeletionCounts, GraphStore,
    ImportError, ImportPipeline, ImportRequest, OrganizationId, PartitionedGraphView,
    RelationalStore, StoreError,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Ordered record of collaborator calls, shared across fakes so tests can
/// assert cross-collaborator sequencing.
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct NoPause;

impl Pause for NoPause {
    fn pause(&self, _: Duration) {}
}

pub struct FakeRelational {
    organizations: RefCell<Vec<OrganizationId>>,
    live: RefCell<BTreeMap<i64, Vec<i64>>>,
    /// Listings consumed before falling back to `live`, per organization.
    queued_live: RefCell<BTreeMap<i64, VecDeque<Vec<i64>>>>,
    records: RefCell<BTreeMap<(i64, i64), DatasetRecord>>,
    locking: Cell<bool>,
    pub live_fetches: Cell<u32>,
    journal: Journal,
}

impl FakeRelational {
    pub fn with_live(organization: i64, ids: &[i64]) -> Self {
        let fake = Self {
            organizations: RefCell::new(Vec::new()),
            live: RefCell::new(BTreeMap::new()),
            queued_live: RefCell::new(BTreeMap::new()),
            records: RefCell::new(BTreeMap::new()),
            locking: Cell::new(true),
            live_fetches: Cell::new(0),
            journal: journal(),
        };
        fake.add_organization_live(organization, ids);
        fake
    }

    pub fn with_journal(self, journal: Journal) -> Self {
        Self { journal, ..self }
    }

    pub fn without_locking(self) -> Self {
        self.locking.set(false);
        self
    }

    pub fn add_organization_live(&self, organization: i64, ids: &[i64]) {
        self.organizations
            .borrow_mut()
            .push(OrganizationId(organization));
        self.live.borrow_mut().insert(organization, ids.to_vec());
    }

    pub fn insert_record(&self, organization: i64, dataset: i64, state: DatasetState) {
        self.records.borrow_mut().insert(
            (organization, dataset),
            DatasetRecord {
                id: DatasetId(dataset),
                name: Some(format!("dataset-{dataset}")),
                state,
                updated_at: None,
            },
        );
    }

    /// Serves `ids` for the next live listing of `organization`, ahead of the
    /// standing list.
    pub fn queue_live_listing(&self, organization: i64, ids: &[i64]) {
        self.queued_live
            .borrow_mut()
            .entry(organization)
            .or_default()
            .push_back(ids.to_vec());
    }
}

impl RelationalStore for FakeRelational {
    fn organizations(&self) -> Result<Vec<OrganizationId>, StoreError> {
        Ok(self.organizations.borrow().clone())
    }

    fn live_dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError> {
        self.live_fetches.set(self.live_fetches.get() + 1);
        let queued = self
            .queued_live
            .borrow_mut()
            .get_mut(&organization.0)
            .and_then(VecDeque::pop_front);
        let ids = match queued {
            Some(ids) => ids,
            None => self
                .live
                .borrow()
                .get(&organization.0)
                .cloned()
                .unwrap_or_default(),
        };
        Ok(ids.into_iter().map(DatasetId).collect())
    }

    fn dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<Option<DatasetRecord>, StoreError> {
        Ok(self
            .records
            .borrow()
            .get(&(organization.0, dataset.0))
            .cloned())
    }

    fn supports_locking(&self) -> bool {
        self.locking.get()
    }

    fn lock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError> {
        if !self.locking.get() {
            return Err(StoreError::Unsupported(
                "dataset locks are not supported".to_string(),
            ));
        }
        self.journal
            .borrow_mut()
            .push(format!("lock {organization}/{dataset}"));
        Ok(())
    }

    fn unlock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError> {
        if !self.locking.get() {
            return Err(StoreError::Unsupported(
                "dataset locks are not supported".to_string(),
            ));
        }
        self.journal
            .borrow_mut()
            .push(format!("unlock {organization}/{dataset}"));
        Ok(())
    }
}

pub struct FakeGraph {
    datasets: RefCell<BTreeMap<i64, Vec<i64>>>,
    scripted: RefCell<BTreeMap<i64, VecDeque<Result<DeletionBatch, StoreError>>>>,
    batch_calls: RefCell<Vec<(i64, u32, u64)>>,
    deleted: RefCell<Vec<(OrganizationId, DatasetId)>>,
    counted: RefCell<Vec<(OrganizationId, DatasetId)>>,
    pub service_enabled: RefCell<Vec<OrganizationId>>,
    journal: Journal,
}

impl FakeGraph {
    pub fn with_datasets(organization: i64, ids: &[i64]) -> Self {
        let fake = Self {
            datasets: RefCell::new(BTreeMap::new()),
            scripted: RefCell::new(BTreeMap::new()),
            batch_calls: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
            counted: RefCell::new(Vec::new()),
            service_enabled: RefCell::new(Vec::new()),
            journal: journal(),
        };
        fake.add_organization(organization, ids);
        fake
    }

    pub fn with_journal(self, journal: Journal) -> Self {
        Self { journal, ..self }
    }

    pub fn add_organization(&self, organization: i64, ids: &[i64]) {
        self.datasets.borrow_mut().insert(organization, ids.to_vec());
    }

    pub fn script_batches(&self, dataset: i64, batches: Vec<(DeletionCounts, bool)>) {
        self.scripted.borrow_mut().insert(
            dataset,
            batches
                .into_iter()
                .map(|(counts, done)| Ok(DeletionBatch { counts, done }))
                .collect(),
        );
    }

    pub fn script_failures(&self, dataset: i64, failures: u32) {
        let script = (1..=failures)
            .map(|attempt| Err(StoreError::Query(format!("batch failure {attempt}"))))
            .collect();
        self.scripted.borrow_mut().insert(dataset, script);
    }

    pub fn deleted_datasets(&self) -> Vec<DatasetId> {
        self.deleted.borrow().iter().map(|(_, ds)| *ds).collect()
    }

    pub fn counted(&self) -> Vec<(OrganizationId, DatasetId)> {
        self.counted.borrow().clone()
    }

    pub fn counted_datasets(&self) -> Vec<DatasetId> {
        self.counted.borrow().iter().map(|(_, ds)| *ds).collect()
    }

    pub fn batch_calls(&self, dataset: i64) -> Vec<(u32, u64)> {
        self.batch_calls
            .borrow()
            .iter()
            .filter(|(ds, _, _)| *ds == dataset)
            .map(|(_, size, duration)| (*size, *duration))
            .collect()
    }
}

impl GraphStore for FakeGraph {
    fn dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError> {
        Ok(self
            .datasets
            .borrow()
            .get(&organization.0)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(DatasetId)
            .collect())
    }

    fn entity_count(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<u64, StoreError> {
        self.counted.borrow_mut().push((organization, dataset));
        Ok(42)
    }

    fn delete_batch(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        _actor: &ActorId,
        batch_size: u32,
        duration_ms: u64,
    ) -> Result<DeletionBatch, StoreError> {
        self.batch_calls
            .borrow_mut()
            .push((dataset.0, batch_size, duration_ms));
        let scripted = self
            .scripted
            .borrow_mut()
            .get_mut(&dataset.0)
            .and_then(VecDeque::pop_front);
        let batch = match scripted {
            Some(batch) => batch?,
            // Unscripted datasets empty out in a single batch.
            None => DeletionBatch {
                counts: DeletionCounts {
                    nodes: 10,
                    relationships: 5,
                    properties: 0,
                },
                done: true,
            },
        };
        if batch.done {
            self.deleted.borrow_mut().push((organization, dataset));
        }
        Ok(batch)
    }

    fn enable_service(&self, organization: OrganizationId) -> Result<(), StoreError> {
        self.journal
            .borrow_mut()
            .push(format!("cutover {organization}"));
        self.service_enabled.borrow_mut().push(organization);
        Ok(())
    }
}

pub struct FakeExporter {
    fail_for: RefCell<BTreeSet<i64>>,
    pub calls: RefCell<Vec<(OrganizationId, DatasetId, bool)>>,
    journal: Journal,
}

impl FakeExporter {
    pub fn new(journal: Journal) -> Self {
        Self {
            fail_for: RefCell::new(BTreeSet::new()),
            calls: RefCell::new(Vec::new()),
            journal,
        }
    }

    pub fn fail_for(&self, dataset: i64) {
        self.fail_for.borrow_mut().insert(dataset);
    }
}

impl DatasetExporter for FakeExporter {
    fn export(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        smoke_test: bool,
    ) -> Result<(), ExportError> {
        self.journal
            .borrow_mut()
            .push(format!("export {organization}/{dataset}"));
        self.calls
            .borrow_mut()
            .push((organization, dataset, smoke_test));
        if self.fail_for.borrow().contains(&dataset.0) {
            use std::os::unix::process::ExitStatusExt;
            return Err(ExportError::Failed {
                command: "bulk-export".to_string(),
                status: std::process::ExitStatus::from_raw(1 << 8),
            });
        }
        Ok(())
    }
}

pub struct FakeImporter {
    fail_for: RefCell<BTreeSet<i64>>,
    pub requests: RefCell<Vec<ImportRequest>>,
    pub actors: RefCell<Vec<ActorId>>,
    journal: Journal,
}

impl FakeImporter {
    pub fn new(journal: Journal) -> Self {
        Self {
            fail_for: RefCell::new(BTreeSet::new()),
            requests: RefCell::new(Vec::new()),
            actors: RefCell::new(Vec::new()),
            journal,
        }
    }

    pub fn fail_for(&self, dataset: i64) {
        self.fail_for.borrow_mut().insert(dataset);
    }
}

impl ImportPipeline for FakeImporter {
    fn import(
        &self,
        view: &PartitionedGraphView<'_>,
        request: &ImportRequest,
    ) -> Result<(), ImportError> {
        self.journal
            .borrow_mut()
            .push(format!("import {}/{}", request.organization, request.dataset));
        self.requests.borrow_mut().push(request.clone());
        self.actors.borrow_mut().push(view.actor.clone());
        if self.fail_for.borrow().contains(&request.dataset.0) {
            return Err(ImportError {
                organization: request.organization,
                dataset: request.dataset,
                message: "loader rejected the export".to_string(),
            });
        }
        Ok(())
    }
}
