/*!
 * RESP Frame Codec
 *
 * Implements the Redis Serialization Protocol framing used on the wire and
 * in the append-only file: a blocking reader that consumes exactly one
 * frame per call, a writer that serializes a frame in a single write, and
 * the logical-key derivation used to index persisted command frames.
 */

use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::borrow::Cow;
use std::io::{BufRead, BufReader, Read, Write};

/// One RESP value, the unit of read/write on the wire.
///
/// `Null` is the distinguished null bulk (`$-1\r\n`) used to answer lookups
/// with no value. Commands always arrive as an `Array` of `Bulk` elements,
/// the first naming the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Short UTF-8 status line (`+OK\r\n`).
    Simple(String),
    /// Short UTF-8 error line (`-ERR ...\r\n`).
    Error(String),
    /// Signed 64-bit integer (`:42\r\n`).
    Integer(i64),
    /// Length-prefixed opaque byte payload.
    Bulk(Vec<u8>),
    /// Null bulk string.
    Null,
    /// Length-prefixed sequence of nested frames.
    Array(Vec<Frame>),
}

impl Frame {
    /// Build a simple-string frame.
    pub fn simple(s: impl Into<String>) -> Frame {
        Frame::Simple(s.into())
    }

    /// Build an error frame.
    pub fn error(s: impl Into<String>) -> Frame {
        Frame::Error(s.into())
    }

    /// Build a bulk frame from raw bytes.
    pub fn bulk(b: impl Into<Vec<u8>>) -> Frame {
        Frame::Bulk(b.into())
    }

    /// Build a command frame: an array of bulk strings.
    pub fn command<S: AsRef<[u8]>>(parts: &[S]) -> Frame {
        Frame::Array(
            parts
                .iter()
                .map(|p| Frame::Bulk(p.as_ref().to_vec()))
                .collect(),
        )
    }

    /// Text of a bulk payload; empty for every other variant.
    pub fn bulk_text(&self) -> Cow<'_, str> {
        match self {
            Frame::Bulk(b) => String::from_utf8_lossy(b),
            _ => Cow::Borrowed(""),
        }
    }

    /// Uppercased command name from a command frame.
    pub fn command_name(&self) -> Result<String> {
        match self {
            Frame::Array(items) if !items.is_empty() => {
                Ok(items[0].bulk_text().to_ascii_uppercase())
            }
            Frame::Array(_) => Err(Error::Protocol(
                "invalid request, expected array length > 0".into(),
            )),
            _ => Err(Error::Protocol("invalid request, expected array".into())),
        }
    }

    /// Argument frames of a command frame (everything after the name).
    pub fn args(&self) -> &[Frame] {
        match self {
            Frame::Array(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// The string under which a mutation is indexed in the append-only
    /// file: the bare key for flat commands, `hash/field` for hash
    /// commands.
    pub fn logical_key(&self) -> Result<String> {
        let name = self.command_name()?;
        let args = self.args();
        match name.as_str() {
            "HSET" | "HGET" => {
                if args.len() < 2 {
                    return Err(Error::Protocol(format!(
                        "'{name}' frame too short to derive a key"
                    )));
                }
                Ok(format!("{}/{}", args[0].bulk_text(), args[1].bulk_text()))
            }
            _ => match args.first() {
                Some(key) => Ok(key.bulk_text().into_owned()),
                None => Err(Error::Protocol(format!(
                    "'{name}' frame too short to derive a key"
                ))),
            },
        }
    }

    /// Serialize into `buf` in canonical wire form.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Error(s) => {
                buf.put_u8(b'-');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Frame::Bulk(b) => {
                buf.put_u8(b'$');
                buf.put_slice(b.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(b);
                buf.put_slice(b"\r\n");
            }
            Frame::Null => buf.put_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                buf.put_u8(b'*');
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }

    /// Canonical wire encoding as an owned buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }
}

/// Blocking frame reader over any byte source.
pub struct FrameReader<R: Read> {
    inner: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
        }
    }

    /// Consume exactly one frame, leaving the source positioned at the
    /// next byte. Returns `Ok(None)` on clean end of input, meaning no
    /// bytes arrived at a frame boundary.
    ///
    /// Clients speak in arrays of bulk strings, so only `$` and `*` are
    /// accepted here; nested elements may carry any tag.
    pub fn read(&mut self) -> Result<Option<Frame>> {
        let tag = match self.read_tag()? {
            Some(t) => t,
            None => return Ok(None),
        };
        match tag {
            b'*' => self.read_array().map(Some),
            b'$' => self.read_bulk().map(Some),
            other => Err(Error::Protocol(format!(
                "unknown type tag: {:?}",
                other as char
            ))),
        }
    }

    /// One frame of any variant; used below the top level.
    fn read_value(&mut self) -> Result<Frame> {
        let tag = match self.read_tag()? {
            Some(t) => t,
            None => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "input ended inside a frame",
                )))
            }
        };
        match tag {
            b'*' => self.read_array(),
            b'$' => self.read_bulk(),
            b'+' => Ok(Frame::Simple(self.read_text_line()?)),
            b'-' => Ok(Frame::Error(self.read_text_line()?)),
            b':' => Ok(Frame::Integer(self.read_decimal()?)),
            other => Err(Error::Protocol(format!(
                "unknown type tag: {:?}",
                other as char
            ))),
        }
    }

    fn read_array(&mut self) -> Result<Frame> {
        let len = self.read_decimal()?;
        if len < 0 {
            return Err(Error::Protocol(format!("bad array length: {len}")));
        }
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        Ok(Frame::Array(items))
    }

    fn read_bulk(&mut self) -> Result<Frame> {
        let len = self.read_decimal()?;
        if len == -1 {
            return Ok(Frame::Null);
        }
        if len < 0 {
            return Err(Error::Protocol(format!("bad bulk length: {len}")));
        }
        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload)?;
        let mut crlf = [0u8; 2];
        self.inner.read_exact(&mut crlf)?;
        if &crlf != b"\r\n" {
            return Err(Error::Protocol("bulk payload not CRLF-terminated".into()));
        }
        Ok(Frame::Bulk(payload))
    }

    /// Next tag byte, or `None` on end of input.
    fn read_tag(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.inner.read_exact(&mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes up to CRLF; both terminator bytes are consumed and stripped.
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        self.inner.read_until(b'\n', &mut line)?;
        if line.len() < 2 || !line.ends_with(b"\r\n") {
            return Err(Error::Protocol("line not CRLF-terminated".into()));
        }
        line.truncate(line.len() - 2);
        Ok(line)
    }

    fn read_text_line(&mut self) -> Result<String> {
        let line = self.read_line()?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// ASCII base-10 line. A leading `-` is allowed (null bulk lengths);
    /// anything else non-numeric is a protocol error.
    fn read_decimal(&mut self) -> Result<i64> {
        let line = self.read_line()?;
        let digits = match line.split_first() {
            Some((b'-', rest)) => rest,
            _ => &line[..],
        };
        let ok = !digits.is_empty() && digits.iter().all(u8::is_ascii_digit);
        ok.then(|| std::str::from_utf8(&line).ok()?.parse::<i64>().ok())
            .flatten()
            .ok_or_else(|| {
                Error::Protocol(format!("bad decimal: {:?}", String::from_utf8_lossy(&line)))
            })
    }
}

/// Frame writer that serializes into a reused scratch buffer and hands the
/// whole encoding to the sink in one write.
pub struct FrameWriter<W: Write> {
    sink: W,
    scratch: BytesMut,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            scratch: BytesMut::new(),
        }
    }

    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        self.scratch.clear();
        frame.encode_into(&mut self.scratch);
        self.sink.write_all(&self.scratch)?;
        self.sink.flush()?;
        Ok(())
    }
}
