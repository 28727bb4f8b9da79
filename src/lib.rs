// Core modules for the EmberKV key-value store
pub mod aof; // append-only file + keyed offset index
pub mod batch; // MULTI/EXEC queue
pub mod command; // dispatch table + handlers
pub mod config; // environment configuration
pub mod error; // crate-wide error type
pub mod net; // listener, replay driver, accept loop
pub mod protocol; // RESP frame codec
pub mod replicate; // consensus collaborator seam
pub mod session; // per-connection request loop
pub mod storage; // string + hash keyspace

// Re-export the public surface for flat access
pub use aof::Aof;
pub use batch::Batch;
pub use command::{lookup, Handler};
pub use config::{Config, DEFAULT_AOF_PATH, DEFAULT_PORT};
pub use error::{Error, Result};
pub use net::Server;
pub use protocol::{Frame, FrameReader, FrameWriter};
pub use replicate::{Applier, Consensus, LocalConsensus, SUBMIT_TIMEOUT};
pub use session::Session;
pub use storage::Store;
