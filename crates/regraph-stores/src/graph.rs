use regraph_core::{
    ActorId, DatasetId, DeletionBatch, GraphStore, ImportError, ImportPipeline, ImportRequest,
    OrganizationId, PartitionedGraphView, StoreError,
};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Imports run inside the request; give them room.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// Client for the partitioned graph service.
pub struct HttpGraphStore {
    client: Client,
    base_url: String,
}

impl HttpGraphStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = self.endpoint(path);
        let response = self.client.get(&url).send().map_err(connection_error)?;
        decode(response, &url)
    }
}

fn connection_error(err: reqwest::Error) -> StoreError {
    StoreError::Connection(err.to_string())
}

fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, StoreError> {
    let status = response.status();
    if !status.is_success() {
        return Err(StoreError::Query(format!("{url} returned {status}")));
    }
    response
        .json()
        .map_err(|err| StoreError::Query(format!("{url}: {err}")))
}

impl GraphStore for HttpGraphStore {
    fn dataset_ids(&self, organization: OrganizationId) -> Result<Vec<DatasetId>, StoreError> {
        self.get_json(&format!("/organizations/{organization}/datasets"))
    }

    fn entity_count(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
    ) -> Result<u64, StoreError> {
        self.get_json(&format!(
            "/organizations/{organization}/datasets/{dataset}/entities/count"
        ))
    }

    fn delete_batch(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        actor: &ActorId,
        batch_size: u32,
        duration_ms: u64,
    ) -> Result<DeletionBatch, StoreError> {
        let url = self.endpoint(&format!(
            "/organizations/{organization}/datasets/{dataset}/delete"
        ));
        let response = self
            .client
            .post(&url)
            .query(&[
                ("batchSize", batch_size.to_string()),
                ("duration", duration_ms.to_string()),
                ("actor", actor.to_string()),
            ])
            .send()
            .map_err(connection_error)?;
        decode(response, &url)
    }

    fn enable_service(&self, organization: OrganizationId) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("/organizations/{organization}/service/enable"));
        let response = self.client.post(&url).send().map_err(connection_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Query(format!("{url} returned {status}")));
        }
        Ok(())
    }
}

impl ImportPipeline for HttpGraphStore {
    fn import(
        &self,
        view: &PartitionedGraphView<'_>,
        request: &ImportRequest,
    ) -> Result<(), ImportError> {
        let url = self.endpoint(&format!(
            "/organizations/{}/datasets/{}/import",
            request.organization, request.dataset
        ));
        let import_error = |message: String| ImportError {
            organization: request.organization,
            dataset: request.dataset,
            message,
        };
        let response = self
            .client
            .post(&url)
            .query(&[("actor", view.actor.to_string())])
            .json(request)
            .send()
            .map_err(|err| import_error(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(import_error(format!("{url} returned {status}")));
        }
        Ok(())
    }
}
