use futures_io::AsyncRead;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Result};

/// A byte stream used as the body of requests and responses.
///
/// Backed by an in-memory buffer, a file, or any other reader. Implements the std io traits for
/// synchronous use and `AsyncRead` so that clients and emitters can stream it.
pub struct Stream {
    inner: Inner,
    eof: bool,
}

enum Inner {
    Memory(io::Cursor<Vec<u8>>),
    File {
        file: File,
        readable: bool,
        writable: bool,
    },
    Reader {
        reader: Box<dyn Read + Send + Sync + 'static>,
        length: Option<u64>,
        position: u64,
    },
    Closed,
}

impl Stream {
    /// Create an empty, writable in-memory Stream
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Create a Stream from bytes. The cursor starts at the beginning.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            inner: Inner::Memory(io::Cursor::new(bytes)),
            eof: false,
        }
    }

    /// Create a Stream from a type implementing Read
    ///
    /// `len` is reported as the stream size; `None` means unknown. Reader streams are neither
    /// writable nor seekable.
    pub fn from_reader(reader: impl Read + Send + Sync + 'static, len: Option<u64>) -> Self {
        Self {
            inner: Inner::Reader {
                reader: Box::new(reader),
                length: len,
                position: 0,
            },
            eof: false,
        }
    }

    /// Wrap an already open file. Readability and writability are whatever the handle was
    /// opened with; misuse surfaces as io errors.
    pub fn from_file(file: File) -> Self {
        Self::from_file_with_access(file, true, true)
    }

    pub(crate) fn from_file_with_access(file: File, readable: bool, writable: bool) -> Self {
        Self {
            inner: Inner::File {
                file,
                readable,
                writable,
            },
            eof: false,
        }
    }

    /// Open `path` with an fopen style `mode` (`r`, `w`, `a`, `x`, `c`, optionally with `+`).
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        let mode = OpenMode::parse(mode)?;
        let file = mode.options().open(path)?;
        Ok(Self::from_file_with_access(file, mode.read, mode.write))
    }

    /// Size in bytes, if it can be known without reading.
    pub fn size(&self) -> Option<u64> {
        match &self.inner {
            Inner::Memory(cursor) => Some(cursor.get_ref().len() as u64),
            Inner::File { file, .. } => file.metadata().ok().map(|m| m.len()),
            Inner::Reader { length, .. } => *length,
            Inner::Closed => None,
        }
    }

    /// Current position of the read/write cursor.
    pub fn tell(&mut self) -> Result<u64> {
        match &mut self.inner {
            Inner::Memory(cursor) => Ok(cursor.position()),
            Inner::File { file, .. } => Ok(file.seek(SeekFrom::Current(0))?),
            Inner::Reader { position, .. } => Ok(*position),
            Inner::Closed => Err(closed().into()),
        }
    }

    /// True once a read has hit the end of the stream.
    pub fn eof(&self) -> bool {
        self.eof || matches!(self.inner, Inner::Closed)
    }

    pub fn is_readable(&self) -> bool {
        match &self.inner {
            Inner::Memory(_) | Inner::Reader { .. } => true,
            Inner::File { readable, .. } => *readable,
            Inner::Closed => false,
        }
    }

    pub fn is_writable(&self) -> bool {
        match &self.inner {
            Inner::Memory(_) => true,
            Inner::File { writable, .. } => *writable,
            Inner::Reader { .. } | Inner::Closed => false,
        }
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.inner, Inner::Memory(_) | Inner::File { .. })
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Read the remainder of the stream into a String.
    pub fn contents(&mut self) -> Result<String> {
        let mut buf = String::with_capacity(self.remaining_hint());
        self.read_to_string(&mut buf)?;
        Ok(buf)
    }

    /// Read the remainder of the stream into bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.remaining_hint());
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Release the underlying resource. Later reads and writes fail.
    pub fn close(&mut self) {
        self.inner = Inner::Closed;
    }

    /// Take the underlying file out of a file-backed stream.
    pub fn into_file(self) -> Option<File> {
        match self.inner {
            Inner::File { file, .. } => Some(file),
            _ => None,
        }
    }

    fn remaining_hint(&self) -> usize {
        match &self.inner {
            Inner::Memory(cursor) => cursor.get_ref().len().saturating_sub(cursor.position() as usize),
            _ => 0,
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<String> for Stream {
    fn from(s: String) -> Self {
        Self::from_bytes(s.into_bytes())
    }
}

impl<'a> From<&'a str> for Stream {
    fn from(s: &'a str) -> Self {
        Self::from_bytes(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Stream {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<File> for Stream {
    fn from(file: File) -> Self {
        Self::from_file(file)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            Inner::Memory(_) => "memory",
            Inner::File { .. } => "file",
            Inner::Reader { .. } => "reader",
            Inner::Closed => "closed",
        };
        f.debug_struct("Stream")
            .field("kind", &kind)
            .field("size", &self.size())
            .field("eof", &self.eof)
            .finish()
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.inner {
            Inner::Memory(cursor) => cursor.read(buf)?,
            Inner::File { file, readable, .. } => {
                if !*readable {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream is not readable"));
                }
                file.read(buf)?
            }
            Inner::Reader { reader, position, .. } => {
                let n = reader.read(buf)?;
                *position += n as u64;
                n
            }
            Inner::Closed => return Err(closed()),
        };
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Memory(cursor) => cursor.write(buf),
            Inner::File { file, writable, .. } => {
                if !*writable {
                    return Err(io::Error::new(io::ErrorKind::PermissionDenied, "stream is not writable"));
                }
                file.write(buf)
            }
            Inner::Reader { .. } => Err(io::Error::new(io::ErrorKind::Other, "stream is not writable")),
            Inner::Closed => Err(closed()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::File { file, .. } => file.flush(),
            _ => Ok(()),
        }
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match &mut self.inner {
            Inner::Memory(cursor) => cursor.seek(pos)?,
            Inner::File { file, .. } => file.seek(pos)?,
            Inner::Reader { .. } => return Err(io::Error::new(io::ErrorKind::Other, "stream is not seekable")),
            Inner::Closed => return Err(closed()),
        };
        self.eof = false;
        Ok(new_pos)
    }
}

// Memory and file reads do not block for long; the reader variant is the caller's choice.
impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Read::read(self.get_mut(), buf))
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "stream is closed")
}

/// fopen style open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenMode {
    pub(crate) read: bool,
    pub(crate) write: bool,
    append: bool,
    create: bool,
    create_new: bool,
    truncate: bool,
}

const OPEN_MODES: [char; 5] = ['r', 'w', 'a', 'x', 'c'];

impl OpenMode {
    /// Only the first character picks the mode; `+` anywhere after it adds the missing access.
    /// Other trailing flags (`b`, `t`, `e`) are accepted and ignored.
    pub(crate) fn parse(mode: &str) -> Result<Self> {
        let first = mode.chars().next().filter(|c| OPEN_MODES.contains(c));
        let first = match first {
            Some(c) => c,
            None => {
                tracing::debug!("rejecting file opening mode {:?}", mode);
                return Err(Error::InvalidMode(mode.to_owned()));
            }
        };
        let plus = mode[1..].contains('+');

        let mut open_mode = OpenMode {
            read: plus,
            write: plus,
            append: false,
            create: false,
            create_new: false,
            truncate: false,
        };
        match first {
            'r' => open_mode.read = true,
            'w' => {
                open_mode.write = true;
                open_mode.create = true;
                open_mode.truncate = true;
            }
            'a' => {
                open_mode.write = true;
                open_mode.append = true;
                open_mode.create = true;
            }
            'x' => {
                open_mode.write = true;
                open_mode.create_new = true;
            }
            'c' => {
                open_mode.write = true;
                open_mode.create = true;
            }
            _ => unreachable!("first char checked against OPEN_MODES"),
        }
        Ok(open_mode)
    }

    fn options(&self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        opts.read(self.read)
            .write(self.write && !self.append)
            .append(self.append)
            .create(self.create)
            .create_new(self.create_new)
            .truncate(self.truncate);
        opts
    }
}
