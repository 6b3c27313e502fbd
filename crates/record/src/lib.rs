//! # Record — fixed-width records and the shuffle wire format
//!
//! Every record handled by the sort is exactly [`RECORD_SIZE`] bytes. The
//! first [`KEY_SIZE`] bytes are the key, compared as unsigned bytes
//! (most-significant first); the remainder is an opaque payload.
//!
//! ## Wire Frame Format
//!
//! ```text
//! [tag: u8][body: RECORD_SIZE bytes]
//! ```
//!
//! `tag = 0` carries one record in the body. `tag = 1` is the end-of-stream
//! sentinel; its body is zeroed on write and ignored on read. There is no
//! length prefix: both ends agree on [`FRAME_SIZE`].
//!
//! ## Input Shards
//!
//! A shard is a raw concatenation of records with no header. [`ShardReader`]
//! yields them one at a time; a short chunk at the very end of the file ends
//! the stream and is reported through [`ShardReader::trailing_bytes`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::{Frame, ShardReader};
//!
//! let mut shard = ShardReader::open("input.dat").unwrap();
//! let mut wire = Vec::new();
//! while let Some(rec) = shard.next_record().unwrap() {
//!     Frame::Data(rec).write_to(&mut wire).unwrap();
//! }
//! Frame::EndOfStream.write_to(&mut wire).unwrap();
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;

/// Size of one record in bytes.
pub const RECORD_SIZE: usize = 100;

/// Size of the key prefix in bytes.
pub const KEY_SIZE: usize = 10;

/// Size of one wire frame: the tag byte plus a record body.
pub const FRAME_SIZE: usize = RECORD_SIZE + 1;

/// Tag byte of a data frame.
pub const TAG_DATA: u8 = 0;

/// Tag byte of an end-of-stream sentinel.
pub const TAG_END: u8 = 1;

/// Errors raised while decoding frames or records.
#[derive(Debug, Error)]
pub enum FrameError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended part-way through a frame.
    #[error("stream closed mid-frame")]
    Truncated,

    /// The leading byte was neither a data nor a sentinel tag.
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),

    /// A record was built from a slice of the wrong length.
    #[error("record must be 100 bytes, got {0}")]
    BadLength(usize),
}

/// One fixed-width record.
#[derive(Clone, PartialEq, Eq)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    pub fn new(bytes: [u8; RECORD_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copies a record out of `bytes`, which must be exactly [`RECORD_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        let arr: [u8; RECORD_SIZE] = bytes
            .try_into()
            .map_err(|_| FrameError::BadLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// The leading [`KEY_SIZE`] bytes.
    pub fn key(&self) -> &[u8] {
        &self.0[..KEY_SIZE]
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[KEY_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record(key=")?;
        for b in self.key() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// A single unit exchanged over a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Carries one record destined for the receiving node.
    Data(Record),
    /// The sender has nothing more to send on this link.
    EndOfStream,
}

impl Frame {
    /// Encodes the frame into a caller-supplied buffer.
    pub fn encode_into(&self, buf: &mut [u8; FRAME_SIZE]) {
        match self {
            Frame::Data(rec) => {
                buf[0] = TAG_DATA;
                buf[1..].copy_from_slice(rec.as_bytes());
            }
            Frame::EndOfStream => {
                buf[0] = TAG_END;
                buf[1..].fill(0);
            }
        }
    }

    /// Writes the encoded frame to `w` with a single `write_all`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut buf = [0u8; FRAME_SIZE];
        self.encode_into(&mut buf);
        w.write_all(&buf)
    }

    /// Reads the next frame from `r`.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** before the tag byte -> `Ok(None)`.
    /// - **EOF inside the body** -> `Err(FrameError::Truncated)`.
    /// - **Unknown tag** -> `Err(FrameError::UnknownTag(..))`.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Option<Frame>, FrameError> {
        let tag = match r.read_u8() {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(FrameError::Io(e)),
        };

        let mut body = [0u8; RECORD_SIZE];
        match r.read_exact(&mut body) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(FrameError::Truncated)
            }
            Err(e) => return Err(FrameError::Io(e)),
        }

        match tag {
            TAG_DATA => Ok(Some(Frame::Data(Record(body)))),
            TAG_END => Ok(Some(Frame::EndOfStream)),
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

/// Writes a node id preamble (`u32` LE) identifying the sender of a link.
pub fn write_node_id<W: Write>(w: &mut W, id: usize) -> io::Result<()> {
    let id = u32::try_from(id).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "node id exceeds u32::MAX")
    })?;
    w.write_u32::<LittleEndian>(id)
}

/// Reads the node id preamble written by [`write_node_id`].
pub fn read_node_id<R: Read>(r: &mut R) -> Result<usize, FrameError> {
    match r.read_u32::<LittleEndian>() {
        Ok(id) => Ok(id as usize),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FrameError::Truncated),
        Err(e) => Err(FrameError::Io(e)),
    }
}

/// Sequential reader over a raw shard of concatenated records.
///
/// Generic over any `Read` implementor so tests can feed in-memory buffers.
pub struct ShardReader<R: Read> {
    rdr: BufReader<R>,
    records_read: u64,
    trailing: usize,
}

impl ShardReader<File> {
    /// Opens a shard file for sequential reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ShardReader<File>, FrameError> {
        let f = File::open(path)?;
        Ok(Self::from_reader(f))
    }
}

impl<R: Read> ShardReader<R> {
    pub fn from_reader(reader: R) -> Self {
        ShardReader {
            rdr: BufReader::new(reader),
            records_read: 0,
            trailing: 0,
        }
    }

    /// Returns the next full record, or `None` at end of input.
    ///
    /// A partial chunk at the end of the input also returns `None`; its
    /// length is kept in [`trailing_bytes`](Self::trailing_bytes).
    pub fn next_record(&mut self) -> Result<Option<Record>, FrameError> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;

        while filled < RECORD_SIZE {
            match self.rdr.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FrameError::Io(e)),
            }
        }

        if filled < RECORD_SIZE {
            self.trailing = filled;
            return Ok(None);
        }

        self.records_read += 1;
        Ok(Some(Record(buf)))
    }

    /// Number of complete records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Bytes left over after the last complete record (0 for a well-formed shard).
    pub fn trailing_bytes(&self) -> usize {
        self.trailing
    }
}
