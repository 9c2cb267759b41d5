//! Concrete store handles and the tunnel-scoped session: the Postgres-backed
//! relational store, the HTTP client for the partitioned graph service, and
//! `ssh`-based tunnels with scoped teardown.

pub mod graph;
pub mod relational;
pub mod session;
pub mod tunnel;

pub use graph::HttpGraphStore;
pub use relational::PgRelationalStore;
pub use session::{
    MigrationSession, Session, SessionConfig, SessionError, CACHE_TUNNEL_PORT, GRAPH_TUNNEL_PORT,
    RELATIONAL_TUNNEL_PORT, SOURCE_GRAPH_TUNNEL_PORT,
};
pub use tunnel::SshTunnelService;
