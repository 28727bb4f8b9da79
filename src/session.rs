/*!
 * Per-Connection Session
 *
 * Each accepted connection runs one session: a loop that decodes a command
 * frame, routes it through the MULTI/EXEC state machine, and writes the
 * reply. Replies on a connection always come back in the order their
 * requests arrived. A decode error or a failed reply write closes the
 * session; a malformed-but-framed request is logged and skipped.
 */

use crate::aof::Aof;
use crate::batch::Batch;
use crate::command;
use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameReader, FrameWriter};
use crate::replicate::{Consensus, SUBMIT_TIMEOUT};
use crate::storage::Store;
use log::{debug, warn};
use std::io::{Read, Write};
use std::sync::Arc;

pub struct Session {
    store: Arc<Store>,
    aof: Arc<Aof>,
    consensus: Option<Arc<dyn Consensus>>,
    batch: Batch,
}

impl Session {
    pub fn new(
        store: Arc<Store>,
        aof: Arc<Aof>,
        consensus: Option<Arc<dyn Consensus>>,
    ) -> Self {
        Self {
            store,
            aof,
            consensus,
            batch: Batch::new(),
        }
    }

    /// Serve one connection until the peer closes it, the stream fails, or
    /// a frame fails to decode.
    pub fn run<R: Read, W: Write>(&mut self, source: R, sink: W) {
        let mut reader = FrameReader::new(source);
        let mut writer = FrameWriter::new(sink);
        loop {
            let frame = match reader.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => {
                    warn!("session: closing on read error: {e}");
                    return;
                }
            };
            let name = match frame.command_name() {
                Ok(name) => name,
                Err(e) => {
                    warn!("session: {e}");
                    continue;
                }
            };
            if let Err(e) = self.dispatch(frame, &name, &mut writer) {
                warn!("session: closing on write error: {e}");
                return;
            }
        }
    }

    /// Route one validated command frame. `Err` only for a failed reply
    /// write; everything else is answered or logged in place.
    fn dispatch<W: Write>(
        &mut self,
        frame: Frame,
        name: &str,
        writer: &mut FrameWriter<W>,
    ) -> Result<()> {
        match name {
            "MULTI" => {
                self.batch.activate();
                writer.write(&Frame::simple(""))
            }
            "EXEC" => {
                // EXEC with no open batch produces no reply at all.
                if !self.batch.is_active() {
                    return Ok(());
                }
                let queued = self.batch.drain();
                let mut results = Vec::with_capacity(queued.len());
                for frame in queued {
                    results.push(self.execute(&frame, writer)?);
                }
                writer.write(&Frame::Array(results))
            }
            _ if self.batch.is_active() => {
                self.batch.push(frame);
                writer.write(&Frame::simple("QUEUED"))
            }
            _ => match self.handle_request(&frame, name, writer) {
                Ok(reply) => writer.write(&reply),
                Err(Error::Io(e)) => Err(e.into()),
                Err(e @ Error::UnknownCommand(_)) => {
                    // handle_request already answered with an empty string.
                    warn!("session: {e}");
                    Ok(())
                }
                Err(e) => writer.write(&Frame::error(format!("ERR {e}"))),
            },
        }
    }

    /// One queued command during EXEC: errors become error frames in the
    /// result array, except a failed write which ends the session.
    fn execute<W: Write>(&self, frame: &Frame, writer: &mut FrameWriter<W>) -> Result<Frame> {
        let reply = frame
            .command_name()
            .and_then(|name| self.handle_request(frame, &name, writer));
        match reply {
            Ok(reply) => Ok(reply),
            Err(Error::Io(e)) => Err(e.into()),
            Err(e) => Ok(Frame::error(e.to_string())),
        }
    }

    /// Persist, replicate, and execute one command.
    ///
    /// With a consensus collaborator configured, every command except the
    /// two point reads is submitted to the replicated log and the local
    /// mutation happens when the collaborator applies the entry here; the
    /// committed reply is returned as-is. Without one, the append-only
    /// file is updated first and the handler runs directly.
    fn handle_request<W: Write>(
        &self,
        frame: &Frame,
        name: &str,
        writer: &mut FrameWriter<W>,
    ) -> Result<Frame> {
        let Some(handler) = command::lookup(name) else {
            writer.write(&Frame::simple(""))?;
            return Err(Error::UnknownCommand(name.to_string()));
        };

        if let Some(consensus) = &self.consensus {
            if name != "GET" && name != "HGET" {
                return consensus.submit(&frame.encode(), SUBMIT_TIMEOUT);
            }
        }

        match name {
            "SET" | "HSET" => self.aof.write(frame)?,
            "DELETE" => match self.aof.delete(frame) {
                // Key was never persisted; the handler still replies
                // `ERR key doesn't exist` to the client.
                Err(Error::MissingOffset) => debug!("aof: delete for unindexed key"),
                Err(e) => return Err(e),
                Ok(()) => {}
            },
            _ => {}
        }

        Ok(handler(&self.store, frame.args()))
    }
}
