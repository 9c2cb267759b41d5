use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scopes both stores; every dataset operation is partitioned by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrganizationId(pub i64);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique within an organization only; always paired with an [`OrganizationId`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DatasetId(pub i64);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Audit attribute recorded against graph mutations. Not an authorization
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    /// Synthetic system actor for orphan-reconciliation deletes.
    pub fn reconciliation() -> Self {
        Self("dataset-delete-migration".to_string())
    }

    /// Synthetic system actor for migration imports.
    pub fn migration() -> Self {
        Self("dataset-migrate".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a dataset row in the relational store. `Deleting` rows
/// are excluded from live listings and are the only non-absent state an
/// orphan is allowed to be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetState {
    Ready,
    Deleting,
    Errored,
}

impl DatasetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetState::Ready => "READY",
            DatasetState::Deleting => "DELETING",
            DatasetState::Errored => "ERRORED",
        }
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self, DatasetState::Deleting)
    }
}

impl fmt::Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_uppercase().as_str() {
            "READY" => Ok(DatasetState::Ready),
            "DELETING" => Ok(DatasetState::Deleting),
            "ERRORED" => Ok(DatasetState::Errored),
            other => Err(format!("unknown dataset state: {other}")),
        }
    }
}

/// Read-only projection of a dataset's existence record in the relational
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub name: Option<String>,
    pub state: DatasetState,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-dataset progress through a migration. `Unlocked` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationPhase {
    Pending,
    Locked,
    Exported,
    Imported,
    Unlocked,
    Failed,
}

impl MigrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Pending => "pending",
            MigrationPhase::Locked => "locked",
            MigrationPhase::Exported => "exported",
            MigrationPhase::Imported => "imported",
            MigrationPhase::Unlocked => "unlocked",
            MigrationPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationPhase::Unlocked | MigrationPhase::Failed)
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reachable service address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
