//! Byte streams that persisted resources are moved through.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::resource::{Operation, ResourceKind};

/// One load or store of a resource family.
///
/// A load fills the buffer it is given, a store drains it. Either way the return value is the
/// number of bytes moved; anything short of the buffer length means the stream ended or
/// failed, and [`Transfer::finish`] reports which.
pub trait Transfer {
    fn transfer(&mut self, buf: &mut [u8]) -> usize;

    /// Ends the transfer, flushing a store. Returns the first failure seen.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Where the resource families are kept between jobs.
pub trait ResourceStore {
    fn start(&mut self, kind: ResourceKind, op: Operation) -> Result<Box<dyn Transfer + '_>>;

    /// Forgets every persisted family.
    fn clear(&mut self) -> Result<()>;
}

/// Keeps each family in its own file under one directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ResourceKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

impl ResourceStore for DirStore {
    fn start(&mut self, kind: ResourceKind, op: Operation) -> Result<Box<dyn Transfer + '_>> {
        let path = self.path(kind);
        tracing::debug!(path = %path.display(), ?op, "starting resource transfer");
        Ok(match op {
            // A family never stored yet reads as empty.
            Operation::Load => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?;
                Box::new(FileLoad {
                    reader: BufReader::new(file),
                    error: None,
                })
            }
            Operation::Store => Box::new(FileStore {
                writer: BufWriter::new(File::create(&path)?),
                error: None,
            }),
        })
    }

    fn clear(&mut self) -> Result<()> {
        for kind in ResourceKind::ALL {
            match fs::remove_file(self.path(kind)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

struct FileLoad {
    reader: BufReader<File>,
    error: Option<io::Error>,
}

impl Transfer for FileLoad {
    fn transfer(&mut self, buf: &mut [u8]) -> usize {
        if self.error.is_some() {
            return 0;
        }
        let mut moved = 0;
        while moved < buf.len() {
            match self.reader.read(&mut buf[moved..]) {
                Ok(0) => break,
                Ok(n) => moved += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.error = Some(err);
                    break;
                }
            }
        }
        moved
    }

    fn finish(self: Box<Self>) -> Result<()> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

struct FileStore {
    writer: BufWriter<File>,
    error: Option<io::Error>,
}

impl Transfer for FileStore {
    fn transfer(&mut self, buf: &mut [u8]) -> usize {
        if self.error.is_some() {
            return 0;
        }
        match self.writer.write_all(buf) {
            Ok(()) => buf.len(),
            Err(err) => {
                self.error = Some(err);
                0
            }
        }
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Keeps each family in memory. A store replaces the family only once it finishes.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    streams: HashMap<ResourceKind, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self, kind: ResourceKind) -> &[u8] {
        self.streams.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn insert(&mut self, kind: ResourceKind, bytes: Vec<u8>) {
        self.streams.insert(kind, bytes);
    }
}

impl ResourceStore for MemoryStore {
    fn start(&mut self, kind: ResourceKind, op: Operation) -> Result<Box<dyn Transfer + '_>> {
        Ok(match op {
            Operation::Load => Box::new(MemoryLoad {
                bytes: self.bytes(kind),
            }),
            Operation::Store => Box::new(MemoryStoreTransfer {
                target: self.streams.entry(kind).or_default(),
                pending: Vec::new(),
            }),
        })
    }

    fn clear(&mut self) -> Result<()> {
        self.streams.clear();
        Ok(())
    }
}

struct MemoryLoad<'a> {
    bytes: &'a [u8],
}

impl Transfer for MemoryLoad<'_> {
    fn transfer(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.bytes.len());
        buf[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes = &self.bytes[n..];
        n
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct MemoryStoreTransfer<'a> {
    target: &'a mut Vec<u8>,
    pending: Vec<u8>,
}

impl Transfer for MemoryStoreTransfer<'_> {
    fn transfer(&mut self, buf: &mut [u8]) -> usize {
        self.pending.extend_from_slice(buf);
        buf.len()
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let Self { target, pending } = *self;
        *target = pending;
        Ok(())
    }
}
