/*!
 * Append-Only File Persistence
 *
 * Mutating commands are persisted as RESP frames in a single flat file,
 * `database.aof` by default. An in-memory index maps each logical key to
 * the byte extent of its most recent record: a same-size mutation is
 * overwritten in place, a different-size mutation or a delete splices the
 * old record out and the index is rebuilt from the file. A background
 * thread syncs OS buffers to disk every second, so a crash loses at most
 * one second of writes and possibly a partial trailing frame, which replay
 * tolerates.
 */

use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameReader};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use hashbrown::HashMap;
use log::warn;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Cadence of the background disk sync.
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Durable log of mutations with a keyed offset index.
///
/// One mutex guards the file handle, the index and the write offset; every
/// operation holds it across its file I/O.
pub struct Aof {
    inner: Mutex<AofInner>,
    sync_stop: Sender<()>,
}

struct AofInner {
    file: File,
    /// Logical key -> `[start, end)` extent of its most recent record.
    index: HashMap<String, (u64, u64)>,
    /// File length at quiescence; the next append lands here.
    offset: u64,
}

impl Aof {
    /// Open (creating if absent) the log at `path` and start the sync
    /// thread. The thread stops when [`Aof::close`] is called or the last
    /// handle is dropped.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let (sync_stop, stop_rx) = bounded(1);
        let aof = Arc::new(Self {
            inner: Mutex::new(AofInner {
                file,
                index: HashMap::new(),
                offset: 0,
            }),
            sync_stop,
        });
        let weak = Arc::downgrade(&aof);
        std::thread::Builder::new()
            .name("aof-sync".into())
            .spawn(move || sync_loop(weak, stop_rx))?;
        Ok(aof)
    }

    /// Persist one mutation frame.
    ///
    /// A key already indexed with an equal-size record is overwritten in
    /// place (minus the trailing CRLF, which the old record already
    /// carries), so rewriting the same record is idempotent. When sizes
    /// differ the stale record is spliced out first and the fresh one
    /// appended, never written short.
    pub fn write(&self, frame: &Frame) -> Result<()> {
        let key = frame.logical_key()?;
        let buf = frame.encode();
        let mut inner = self.inner.lock();
        if let Some(&(start, end)) = inner.index.get(&key) {
            if (end - start) as usize == buf.len() {
                inner.file.seek(SeekFrom::Start(start))?;
                inner.file.write_all(&buf[..buf.len() - 2])?;
                return Ok(());
            }
            inner.splice(start, end)?;
            inner.rescan(|_| {})?;
        }
        inner.append(&key, &buf)
    }

    /// Splice the record for this frame's key out of the file, then
    /// rebuild the index from the on-disk bytes (every extent past the
    /// hole has shifted).
    pub fn delete(&self, frame: &Frame) -> Result<()> {
        let key = frame.logical_key()?;
        let mut inner = self.inner.lock();
        let (start, end) = *inner.index.get(&key).ok_or(Error::MissingOffset)?;
        inner.splice(start, end)?;
        inner.rescan(|_| {})
    }

    /// Scan the whole file, invoking `callback` for every decoded frame
    /// while the index and offset are rebuilt. A decode error (e.g. a
    /// partial trailing frame left by a crash) ends the scan.
    pub fn replay<F: FnMut(&Frame)>(&self, callback: F) -> Result<()> {
        self.inner.lock().rescan(callback)
    }

    /// Force OS buffers to disk now.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_data()?;
        Ok(())
    }

    /// Final sync and cooperative shutdown of the sync thread.
    pub fn close(&self) {
        if let Err(e) = self.sync() {
            warn!("aof: final sync failed: {e}");
        }
        let _ = self.sync_stop.try_send(());
    }

    /// Byte length of the indexed portion of the file.
    pub fn len(&self) -> u64 {
        self.inner.lock().offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the keyed offset index, for inspection and tests.
    pub fn extents(&self) -> Vec<(String, (u64, u64))> {
        let inner = self.inner.lock();
        let mut extents: Vec<_> = inner
            .index
            .iter()
            .map(|(k, &range)| (k.clone(), range))
            .collect();
        extents.sort_by_key(|&(_, (start, _))| start);
        extents
    }
}

impl AofInner {
    fn append(&mut self, key: &str, buf: &[u8]) -> Result<()> {
        let start = self.offset;
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(buf)?;
        let end = start + buf.len() as u64;
        self.index.insert(key.to_string(), (start, end));
        self.offset = end;
        Ok(())
    }

    /// Remove the bytes `[start, end)` by copying the tail of the file
    /// down over them and shrinking the file afterwards, so no stale bytes
    /// survive past the new end.
    fn splice(&mut self, start: u64, end: u64) -> Result<()> {
        let mut tail = vec![0u8; (self.offset - end) as usize];
        self.file.seek(SeekFrom::Start(end))?;
        self.file.read_exact(&mut tail)?;
        self.file.seek(SeekFrom::Start(start))?;
        self.file.write_all(&tail)?;
        self.file.set_len(start + tail.len() as u64)?;
        Ok(())
    }

    fn rescan<F: FnMut(&Frame)>(&mut self, mut callback: F) -> Result<()> {
        self.file.sync_data()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.index.clear();
        self.offset = 0;
        let mut frames = FrameReader::new(&self.file);
        loop {
            let frame = match frames.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!("aof: scan stopped on decode error: {e}");
                    return Ok(());
                }
            };
            let key = match frame.logical_key() {
                Ok(key) => key,
                Err(e) => {
                    warn!("aof: scan stopped on unkeyed frame: {e}");
                    return Ok(());
                }
            };
            callback(&frame);
            let len = frame.encode().len() as u64;
            self.index.insert(key, (self.offset, self.offset + len));
            self.offset += len;
        }
    }
}

fn sync_loop(aof: Weak<Aof>, stop: Receiver<()>) {
    loop {
        match stop.recv_timeout(SYNC_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => match aof.upgrade() {
                Some(aof) => {
                    if let Err(e) = aof.sync() {
                        warn!("aof: background sync failed: {e}");
                    }
                }
                None => return,
            },
            // Explicit close, or every handle gone.
            _ => return,
        }
    }
}
