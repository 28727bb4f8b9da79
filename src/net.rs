/*!
 * TCP Server and Replay Driver
 *
 * Owns the pieces every connection shares: the listener, the keyspace, the
 * append-only file and the optional consensus collaborator. Startup opens
 * the log and replays it into the keyspace; after that the accept loop
 * hands each connection its own thread running a session.
 */

use crate::aof::Aof;
use crate::command;
use crate::config::Config;
use crate::error::Result;
use crate::replicate::{Applier, Consensus, LocalConsensus};
use crate::session::Session;
use crate::storage::Store;
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

pub struct Server {
    listener: TcpListener,
    store: Arc<Store>,
    aof: Arc<Aof>,
    consensus: Option<Arc<dyn Consensus>>,
}

impl Server {
    /// Bind the listener and open the append-only file. Either failure is
    /// fatal to startup. With a `NODE_ID` configured, mutations are routed
    /// through the consensus collaborator; a single-node group commits
    /// locally.
    pub fn bind(config: &Config) -> Result<Self> {
        let listener = bind_listener(config.listen_addr())?;
        let aof = Aof::open(&config.aof_path)?;
        let store = Arc::new(Store::new());
        let consensus = config.node_id.as_ref().map(|id| {
            info!("replication: node {id} commits entries locally");
            Arc::new(LocalConsensus::new(Applier::new(
                Arc::clone(&store),
                Arc::clone(&aof),
            ))) as Arc<dyn Consensus>
        });
        Ok(Self {
            listener,
            store,
            aof,
            consensus,
        })
    }

    /// Rebuild the keyspace by replaying every command in the append-only
    /// file. Frames that are not commands are logged and skipped.
    pub fn load_state(&self) -> Result<()> {
        let mut replayed = 0u64;
        self.aof.replay(|frame| {
            let name = match frame.command_name() {
                Ok(name) => name,
                Err(e) => {
                    error!("replay: {e}");
                    return;
                }
            };
            let Some(handler) = command::lookup(&name) else {
                error!("replay: invalid command: {name}");
                return;
            };
            handler(&self.store, frame.args());
            debug!("replay: executed {name}");
            replayed += 1;
        })?;
        info!("replay: restored {replayed} commands");
        Ok(())
    }

    /// Accept connections until the listener fails, one session thread per
    /// connection.
    pub fn serve(&self) -> Result<()> {
        info!("listening on {}", self.listener.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept()?;
            stream.set_nodelay(true).ok();
            debug!("accepted {peer}");
            let store = Arc::clone(&self.store);
            let aof = Arc::clone(&self.aof);
            let consensus = self.consensus.clone();
            std::thread::spawn(move || {
                let source = match stream.try_clone() {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("session: could not split stream for {peer}: {e}");
                        return;
                    }
                };
                Session::new(store, aof, consensus).run(source, stream);
                debug!("closed {peer}");
            });
        }
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn aof(&self) -> &Arc<Aof> {
        &self.aof
    }
}

/// Bind through socket2 so the listener can be tuned before it starts
/// accepting: address reuse on restart and an explicit backlog.
fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    Ok(socket.into())
}
