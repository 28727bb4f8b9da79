/*!
 * Replication Seam
 *
 * The consensus library is an external collaborator; this module pins down
 * the two surfaces the core touches. Outbound, the session submits an
 * encoded command frame and waits for the committed reply. Inbound, the
 * collaborator drives [`Applier::apply`] on every replica, the submitting
 * leader included, and that call is the only place replicated mutations
 * reach the append-only file and the keyspace.
 */

use crate::aof::Aof;
use crate::command;
use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameReader};
use crate::storage::Store;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// How long a submitted entry may wait for commitment.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound half of the consensus contract.
pub trait Consensus: Send + Sync {
    /// Replicate one encoded command frame, blocking until the entry is
    /// committed and applied or the timeout passes. The reply is whatever
    /// the local [`Applier`] produced for the entry.
    fn submit(&self, entry: &[u8], timeout: Duration) -> Result<Frame>;
}

/// Inbound half: the state machine the collaborator invokes with each
/// committed entry.
pub struct Applier {
    store: Arc<Store>,
    aof: Arc<Aof>,
}

impl Applier {
    pub fn new(store: Arc<Store>, aof: Arc<Aof>) -> Self {
        Self { store, aof }
    }

    /// Decode a committed entry, persist it, and run it against the local
    /// keyspace. Never fails outward; problems come back as error frames
    /// so every replica settles on the same reply.
    pub fn apply(&self, entry: &[u8]) -> Frame {
        let frame = match FrameReader::new(entry).read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Frame::error("ERR empty log entry"),
            Err(e) => return Frame::error(format!("ERR {e}")),
        };
        let name = match frame.command_name() {
            Ok(name) => name,
            Err(e) => return Frame::error(format!("ERR {e}")),
        };
        match name.as_str() {
            "SET" | "HSET" => {
                if let Err(e) = self.aof.write(&frame) {
                    return Frame::error(format!("ERR {e}"));
                }
            }
            "DELETE" => match self.aof.delete(&frame) {
                // Nothing persisted for the key; the handler still owes
                // the client its missing-key reply.
                Err(Error::MissingOffset) => {
                    debug!("apply: delete for unindexed key");
                }
                Err(e) => return Frame::error(format!("ERR {e}")),
                Ok(()) => {}
            },
            _ => {}
        }
        match command::lookup(&name) {
            Some(handler) => handler(&self.store, frame.args()),
            None => Frame::error(format!("ERR invalid command: {name}")),
        }
    }
}

/// Collaborator stand-in for a single-node group: every submission commits
/// immediately by applying the entry inline.
pub struct LocalConsensus {
    applier: Applier,
}

impl LocalConsensus {
    pub fn new(applier: Applier) -> Self {
        Self { applier }
    }
}

impl Consensus for LocalConsensus {
    fn submit(&self, entry: &[u8], _timeout: Duration) -> Result<Frame> {
        Ok(self.applier.apply(entry))
    }
}
