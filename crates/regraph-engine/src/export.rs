use regraph_core::{DatasetId, Endpoint, OrganizationId};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to launch export command `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed reading export output: {0}")]
    Output(#[from] std::io::Error),
    #[error("export command `{command}` exited with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// Runs the bulk export of one dataset's graph data to blob storage.
pub trait DatasetExporter {
    fn export(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        smoke_test: bool,
    ) -> Result<(), ExportError>;
}

/// Everything the export process needs, passed in at call time rather than
/// read from process-wide state.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub program: String,
    pub args: Vec<String>,
    pub export_bucket: String,
    pub relational: Endpoint,
    pub relational_user: String,
    pub relational_password: String,
    /// Legacy bulk-graph endpoint the export reads from.
    pub source_graph: Endpoint,
    /// Cache/queue endpoint the export process coordinates through.
    pub cache: Endpoint,
}

/// Shells out to the bulk-export process, describing the source and target
/// endpoints through its environment. Stdout is streamed to the log as it
/// arrives so operators can follow long exports; a non-zero exit is fatal
/// and is never retried here.
pub struct SubprocessExporter {
    config: ExporterConfig,
}

impl SubprocessExporter {
    pub fn new(config: ExporterConfig) -> Self {
        Self { config }
    }

    fn rendered_command(&self) -> String {
        let mut rendered = self.config.program.clone();
        for arg in &self.config.args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }
}

impl DatasetExporter for SubprocessExporter {
    fn export(
        &self,
        organization: OrganizationId,
        dataset: DatasetId,
        smoke_test: bool,
    ) -> Result<(), ExportError> {
        let config = &self.config;
        let rendered = self.rendered_command();
        info!(
            organization = %organization,
            dataset = %dataset,
            command = %rendered,
            "starting export"
        );

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .env("ORGANIZATION_ID", organization.to_string())
            .env("DATASET_ID", dataset.to_string())
            .env("EXPORT_BUCKET", &config.export_bucket)
            .env("RELATIONAL_HOST", &config.relational.host)
            .env("RELATIONAL_PORT", config.relational.port.to_string())
            .env("RELATIONAL_USER", &config.relational_user)
            .env("RELATIONAL_PASSWORD", &config.relational_password)
            .env("SOURCE_GRAPH_HOST", &config.source_graph.host)
            .env("SOURCE_GRAPH_PORT", config.source_graph.port.to_string())
            .env("CACHE_HOST", &config.cache.host)
            .env("CACHE_PORT", config.cache.port.to_string())
            .env("GENERATE_SAMPLES", smoke_test.to_string())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| ExportError::Launch {
                command: rendered.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line?;
                info!("export: {}", line.trim_end());
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(ExportError::Failed {
                command: rendered,
                status,
            });
        }
        Ok(())
    }
}
