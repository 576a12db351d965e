//! Build context packaging.
//!
//! The engine's build endpoint expects the build context as a tar stream.
//! Entries are written with GNU headers (long names use the GNU long-name
//! extension) and the archive is always finalized before the buffer is
//! handed out, so the daemon never sees a stream without its trailer.

use crate::container::{ContainerError, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Contexts above this size are packaged anyway but logged.
const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

/// Mode applied to every packaged file.
const ENTRY_MODE: u32 = 0o644;

const BLOCK_SIZE: u64 = 512;

/// Two zero blocks close every finalized archive.
const TRAILER_SIZE: u64 = 2 * BLOCK_SIZE;

/// One named payload inside a build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the file within the archive
    pub name: String,
    /// Raw file content
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(name: S, content: B) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Declared size written into the entry header.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A build definition (Dockerfile) read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDefinition {
    name: String,
    content: Vec<u8>,
}

impl BuildDefinition {
    pub fn new<S: Into<String>, B: Into<Vec<u8>>>(name: S, content: B) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a definition from `path`, to be stored in the archive as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] if the file cannot be opened or fully read.
    pub async fn read(path: &Path, name: &str) -> Result<Self> {
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(name, content))
    }

    /// Write `content` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] if the file cannot be written.
    pub async fn write_literal(path: &Path, content: &str) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Package this definition as a single-entry build context.
    pub fn package(self) -> Result<Vec<u8>> {
        package(&[self.into()])
    }
}

impl From<BuildDefinition> for ArchiveEntry {
    fn from(definition: BuildDefinition) -> Self {
        ArchiveEntry {
            name: definition.name,
            content: definition.content,
        }
    }
}

/// Package `entries`, in order, into a finalized tar archive.
///
/// # Errors
///
/// Returns [`ContainerError::ArchiveWrite`] if an entry name is invalid or a
/// header or content block cannot be written. The partial buffer is dropped.
pub fn package(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let builder = tar::Builder::new(Vec::new());
    let archive = write_entries(builder, entries)?
        .into_inner()
        .map_err(|e| ContainerError::ArchiveWrite(format!("failed to finalize archive: {}", e)))?;

    debug!(
        "Build context packaged: {} entries, {} bytes",
        entries.len(),
        archive.len()
    );
    check_context_size(archive.len());

    Ok(archive)
}

/// Package `entries` into a gzip-compressed tar archive.
///
/// The engine accepts compressed contexts transparently.
pub fn package_compressed(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let builder = tar::Builder::new(encoder);
    let archive = write_entries(builder, entries)?
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| ContainerError::ArchiveWrite(format!("failed to finalize archive: {}", e)))?;

    debug!(
        "Compressed build context packaged: {} entries, {} bytes",
        entries.len(),
        archive.len()
    );
    check_context_size(archive.len());

    Ok(archive)
}

/// Read a file and package it as a single entry called `name`.
///
/// # Errors
///
/// Returns [`ContainerError::Io`] if the file cannot be read, or
/// [`ContainerError::ArchiveWrite`] if packaging fails.
pub async fn package_file(path: &Path, name: &str) -> Result<Vec<u8>> {
    BuildDefinition::read(path, name).await?.package()
}

/// Unpack an archive produced by [`package`] or [`package_compressed`].
///
/// Every entry's content is checked against its declared size and the
/// end-of-archive trailer must follow the last entry, so a truncated or
/// unfinalized archive is reported instead of silently returning short data.
///
/// # Errors
///
/// Returns [`ContainerError::ArchiveRead`] for malformed, truncated or
/// unfinalized input.
pub fn unpack(archive: &[u8]) -> Result<Vec<ArchiveEntry>> {
    if archive.starts_with(&[0x1f, 0x8b]) {
        let mut raw = Vec::new();
        GzDecoder::new(archive)
            .read_to_end(&mut raw)
            .map_err(|e| ContainerError::ArchiveRead(format!("corrupt gzip stream: {}", e)))?;
        read_entries(&raw)
    } else {
        read_entries(archive)
    }
}

fn write_entries<W: Write>(
    mut builder: tar::Builder<W>,
    entries: &[ArchiveEntry],
) -> Result<tar::Builder<W>> {
    for entry in entries {
        validate_name(&entry.name)?;

        let mut header = tar::Header::new_gnu();
        header.set_size(entry.size());
        header.set_mode(ENTRY_MODE);
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);

        builder
            .append_data(&mut header, &entry.name, entry.content.as_slice())
            .map_err(|e| {
                ContainerError::ArchiveWrite(format!("failed to append '{}': {}", entry.name, e))
            })?;
    }

    Ok(builder)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ContainerError::ArchiveWrite(
            "entry name must not be empty".to_string(),
        ));
    }
    if Path::new(name).is_absolute() {
        return Err(ContainerError::ArchiveWrite(format!(
            "entry name must be relative: {}",
            name
        )));
    }
    Ok(())
}

fn read_entries(raw: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let malformed = |e: std::io::Error| ContainerError::ArchiveRead(format!("malformed archive: {}", e));

    let mut archive = tar::Archive::new(raw);
    let mut entries = Vec::new();
    let mut end_of_entries = 0;

    for entry in archive.entries().map_err(malformed)? {
        let mut entry = entry.map_err(malformed)?;
        let declared = entry.header().size().map_err(malformed)?;
        let name = entry.path().map_err(malformed)?.to_string_lossy().into_owned();
        let data_start = entry.raw_file_position();

        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(malformed)?;

        if content.len() as u64 != declared {
            return Err(ContainerError::ArchiveRead(format!(
                "truncated archive: entry '{}' declares {} bytes but only {} are present",
                name,
                declared,
                content.len()
            )));
        }

        end_of_entries = data_start + declared.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        entries.push(ArchiveEntry { name, content });
    }

    check_trailer(raw, end_of_entries)?;
    Ok(entries)
}

/// The two zero blocks must directly follow the last entry.
fn check_trailer(raw: &[u8], end_of_entries: u64) -> Result<()> {
    let trailer = usize::try_from(end_of_entries)
        .ok()
        .and_then(|start| raw.get(start..start + TRAILER_SIZE as usize));

    match trailer {
        Some(block) if block.iter().all(|b| *b == 0) => Ok(()),
        _ => Err(ContainerError::ArchiveRead(
            "archive was not finalized: end-of-archive trailer missing".to_string(),
        )),
    }
}

fn check_context_size(size: usize) {
    if size > MAX_CONTEXT_SIZE {
        warn!(
            "Build context is large ({}MB); consider a .dockerignore file",
            size / 1024 / 1024
        );
    }
}
