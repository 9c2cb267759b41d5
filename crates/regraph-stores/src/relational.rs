use chrono::{DateTime, Utc};
use regraph_core::{
    DatasetId, DatasetRecord, DatasetState, OrganizationId, RelationalStore, StoreError,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Read-only handle over the relational store, one Postgres schema per
/// organization. The async driver is an implementation detail; the surface
/// is blocking, matching the strictly sequential engine.
pub struct PgRelationalStore {
    runtime: Runtime,
    pool: PgPool,
}

impl PgRelationalStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(2)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(url),
            )
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(Self { runtime, pool })
    }

    /// Dataset rows live in a per-organization schema. The id is an integer,
    /// so interpolating it cannot break out of the identifier.
    fn datasets_table(organization: OrganizationId) -> String {
        format!("\"{}\".datasets", organization.0)
    }
}

fn query_error(err: sqlx::Error) -> StoreError {
    StoreError::Query(err.to_string())
}

impl RelationalStore for PgRelationalStore {
    fn organizations(&self) -> Result<Vec<OrganizationId>, StoreError> {
        let ids: Vec<i64> = self
            .runtime
            .block_on(
                sqlx::query_scalar("SELECT id FROM organizations ORDER BY id")
                    .fetch_all(&self.pool),
            )
            .map_err(query_error)?;
        Ok(ids.into_iter().map(OrganizationId).collect())
    }

    fn live_dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError> {
        let sql = format!(
            "SELECT id FROM {} WHERE state <> 'DELETING' ORDER BY id",
            Self::datasets_table(organization)
        );
        let ids: Vec<i64> = self
            .runtime
            .block_on(sqlx::query_scalar(&sql).fetch_all(&self.pool))
            .map_err(query_error)?;
        Ok(ids.into_iter().map(DatasetId).collect())
    }

    fn dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<Option<DatasetRecord>, StoreError> {
        let sql = format!(
            "SELECT id, name, state, updated_at FROM {} WHERE id = $1",
            Self::datasets_table(organization)
        );
        let row = self
            .runtime
            .block_on(sqlx::query(&sql).bind(dataset.0).fetch_optional(&self.pool))
            .map_err(query_error)?;
        row.map(|row| {
            let state: String = row.try_get("state").map_err(query_error)?;
            Ok(DatasetRecord {
                id: DatasetId(row.try_get::<i64, _>("id").map_err(query_error)?),
                name: row
                    .try_get::<Option<String>, _>("name")
                    .map_err(query_error)?,
                state: state.parse::<DatasetState>().map_err(StoreError::Query)?,
                updated_at: row
                    .try_get::<Option<DateTime<Utc>>, _>("updated_at")
                    .map_err(query_error)?,
            })
        })
        .transpose()
    }

    fn supports_locking(&self) -> bool {
        // The locked column no longer exists on dataset rows.
        false
    }

    fn lock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(format!(
            "dataset locks are no longer supported by the relational store \
             (organization {organization}, dataset {dataset})"
        )))
    }

    fn unlock_dataset(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(format!(
            "dataset locks are no longer supported by the relational store \
             (organization {organization}, dataset {dataset})"
        )))
    }
}
