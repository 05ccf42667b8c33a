use crate::error::PkgError;
use std::{
    fmt::{self, Debug},
    io::{Seek, Write},
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Longest entry path accepted in the output archive.
pub const MAX_PATH: usize = 1024;

const LARGE_FILE_SIZE: u64 = 0xFFFF_FFFF;

/// Destination archive the unpacker writes into.
///
/// Exactly one file entry may be open at a time: `begin_file`, any number
/// of `write_chunk`, then `end_file`.
pub trait ArchiveSink: Debug {
    /// `path` must end with `/`.
    fn add_folder(&mut self, path: &str) -> anyhow::Result<()>;
    fn begin_file(&mut self, path: &str, size: u64) -> anyhow::Result<()>;
    fn write_chunk(&mut self, buf: &[u8]) -> anyhow::Result<()>;
    fn end_file(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    open: Option<String>,
    closed: bool,
}

impl<W: Write + Seek> Debug for ZipSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipSink")
            .field("open", &self.open)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: ZipWriter::new(inner),
            open: None,
            closed: false,
        }
    }

    fn check_path(path: &str) -> anyhow::Result<()> {
        if path.len() >= MAX_PATH {
            return Err(PkgError::format(format!(
                "archive path is too long: {}",
                path
            )));
        }
        Ok(())
    }

    fn check_idle(&self, action: &str) -> anyhow::Result<()> {
        if self.closed {
            return Err(PkgError::format(format!(
                "cannot {}: archive is closed",
                action
            )));
        }
        match &self.open {
            Some(open) => Err(PkgError::format(format!(
                "cannot {}: '{}' is still open",
                action, open
            ))),
            None => Ok(()),
        }
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn add_folder(&mut self, path: &str) -> anyhow::Result<()> {
        self.check_idle("add folder")?;
        Self::check_path(path)?;
        log::debug!("Adding folder: {}", path);
        self.writer.add_directory(path, FileOptions::default())?;
        Ok(())
    }

    fn begin_file(&mut self, path: &str, size: u64) -> anyhow::Result<()> {
        self.check_idle("begin file")?;
        Self::check_path(path)?;
        log::debug!("Adding file: {} ({} bytes)", path, size);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= LARGE_FILE_SIZE);
        self.writer.start_file(path, options)?;
        self.open = Some(path.to_owned());
        Ok(())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        if self.open.is_none() {
            return Err(PkgError::format("cannot write: no file is open"));
        }
        self.writer.write_all(buf)?;
        Ok(())
    }

    fn end_file(&mut self) -> anyhow::Result<()> {
        match self.open.take() {
            Some(_) => Ok(()),
            None => Err(PkgError::format("cannot end file: no file is open")),
        }
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.check_idle("close")?;
        self.writer.finish()?;
        self.closed = true;
        Ok(())
    }
}
