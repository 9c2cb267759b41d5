use anyhow::{Context, Result};
use regraph_core::Endpoint;
use regraph_stores::SessionConfig;
use std::env;

/// Remote endpoints, credentials, and export tooling, loaded from the
/// environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub relational: Endpoint,
    pub relational_user: String,
    pub relational_password: String,
    pub relational_database: String,
    pub graph: Endpoint,
    pub source_graph: Endpoint,
    pub cache: Endpoint,
    pub export_bucket: String,
    pub export_program: String,
    pub export_args: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let (export_program, export_args) = parse_command(&require("EXPORT_COMMAND")?)?;
        Ok(Self {
            relational: endpoint("RELATIONAL_HOST", "RELATIONAL_PORT")?,
            relational_user: require("RELATIONAL_USER")?,
            relational_password: require("RELATIONAL_PASSWORD")?,
            relational_database: require("RELATIONAL_DATABASE")?,
            graph: endpoint("GRAPH_HOST", "GRAPH_PORT")?,
            source_graph: endpoint("SOURCE_GRAPH_HOST", "SOURCE_GRAPH_PORT")?,
            cache: endpoint("CACHE_HOST", "CACHE_PORT")?,
            export_bucket: require("EXPORT_BUCKET")?,
            export_program,
            export_args,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            relational: self.relational.clone(),
            relational_user: self.relational_user.clone(),
            relational_password: self.relational_password.clone(),
            relational_database: self.relational_database.clone(),
            graph: self.graph.clone(),
            source_graph: self.source_graph.clone(),
            cache: self.cache.clone(),
        }
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing environment variable {name}"))
}

fn endpoint(host_var: &str, port_var: &str) -> Result<Endpoint> {
    let host = require(host_var)?;
    let port: u16 = require(port_var)?
        .parse()
        .with_context(|| format!("invalid port in {port_var}"))?;
    Ok(Endpoint::new(host, port))
}

fn parse_command(raw: &str) -> Result<(String, Vec<String>)> {
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts.next().context("EXPORT_COMMAND is empty")?;
    Ok((program, parts.collect()))
}
