/*!
 * Environment Configuration
 */

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Listener port when `REDIS_PORT` is unset.
pub const DEFAULT_PORT: u16 = 6379;

/// Default append-only file path.
pub const DEFAULT_AOF_PATH: &str = "database.aof";

/// Runtime settings, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the listener binds on localhost.
    pub port: u16,
    /// Local identity for the consensus collaborator, when replication is
    /// wanted.
    pub node_id: Option<String>,
    /// Transport port handed to the consensus collaborator.
    pub raft_port: Option<u16>,
    /// Location of the append-only file.
    pub aof_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            node_id: None,
            raft_port: None,
            aof_path: DEFAULT_AOF_PATH.into(),
        }
    }
}

impl Config {
    /// Read `REDIS_PORT`, `NODE_ID` and `RAFT_PORT` from the environment,
    /// folding a `.env` file in first when one is present.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self {
            port: env::var("REDIS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            node_id: env::var("NODE_ID").ok().filter(|id| !id.is_empty()),
            raft_port: env::var("RAFT_PORT").ok().and_then(|p| p.parse().ok()),
            ..Self::default()
        }
    }

    /// Loopback address the listener binds.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }
}
