//! Sdist writing.
//!
//! A source distribution is a gzip'd tarball with a single
//! `{name}-{version}/` top-level directory. Ownership fields are zeroed
//! and timestamps fixed so identical inputs produce identical bytes.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use flate2::{Compression, GzBuilder};
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;

use crate::dist::layout::ManifestEntry;
use crate::dist::metadata::DistName;
use crate::errors::{ArchiveError, BuildError};
use crate::util::context::ArchiveTimestamp;
use crate::util::{fs, BuildContext};

/// A source distribution under construction.
///
/// Content streams into a temporary file in the target directory and is
/// renamed into place on completion.
pub struct SdistWriter {
    file_name: String,
    dir_name: String,
    builder: tar::Builder<GzEncoder<File>>,
    temp: NamedTempFile,
    final_path: PathBuf,
    timestamp: ArchiveTimestamp,
}

impl SdistWriter {
    /// Start an sdist in `target_dir`.
    pub fn create(
        target_dir: &Path,
        dist: &DistName,
        ctx: &BuildContext,
    ) -> Result<Self, BuildError> {
        let file_name = dist.sdist_file();
        let io_err = |e: anyhow::Error| ArchiveError::Io {
            artifact: file_name.clone(),
            inner: e,
        };

        fs::ensure_dir(target_dir).map_err(io_err)?;
        let temp = NamedTempFile::new_in(target_dir).map_err(|e| io_err(e.into()))?;
        let file = temp.reopen().map_err(|e| io_err(e.into()))?;

        // fix the gzip header's mtime as well; it would otherwise record
        // the wall clock and break byte-for-byte reproducibility
        let encoder = GzBuilder::new().mtime(ctx.timestamp().epoch() as u32).write(
            file,
            Compression::default(),
        );

        Ok(SdistWriter {
            dir_name: dist.sdist_dir(),
            file_name: file_name.clone(),
            builder: tar::Builder::new(encoder),
            temp,
            final_path: target_dir.join(&file_name),
            timestamp: ctx.timestamp(),
        })
    }

    fn io_error(&self, e: impl Into<anyhow::Error>) -> BuildError {
        ArchiveError::Io {
            artifact: self.file_name.clone(),
            inner: e.into(),
        }
        .into()
    }

    fn base_header(&self, mode: u32, size: u64) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_mode(mode);
        header.set_size(size);
        header.set_mtime(self.timestamp.epoch());
        header.set_uid(0);
        header.set_gid(0);
        header
    }

    /// Write a generated text file at `path` under the sdist directory.
    pub fn write_text(&mut self, path: &str, text: &str) -> Result<(), BuildError> {
        let data = text.as_bytes();
        let mut header = self.base_header(0o644, data.len() as u64);
        let full_path = format!("{}/{}", self.dir_name, path);
        self.builder
            .append_data(&mut header, full_path, Cursor::new(data))
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Copy a manifest entry into the sdist.
    pub fn write_entry(&mut self, entry: &ManifestEntry) -> Result<(), BuildError> {
        let mode = fs::normalize_file_mode(source_mode(&entry.source));
        let mut header = self.base_header(mode, entry.size);
        let full_path = format!("{}/{}", self.dir_name, entry.archive_path);

        let source = File::open(&entry.source).map_err(|e| self.io_error(e))?;
        self.builder
            .append_data(&mut header, full_path, source)
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Close the archive and move it into place; returns its file name.
    pub fn finish(self) -> Result<String, BuildError> {
        let encoder = self.builder.into_inner().map_err(|e| ArchiveError::Io {
            artifact: self.file_name.clone(),
            inner: e.into(),
        })?;
        encoder.finish().map_err(|e| ArchiveError::Io {
            artifact: self.file_name.clone(),
            inner: e.into(),
        })?;

        self.temp
            .persist(&self.final_path)
            .map_err(|e| ArchiveError::Io {
                artifact: self.file_name.clone(),
                inner: e.error.into(),
            })?;

        tracing::info!(sdist = %self.file_name, "wrote sdist");
        Ok(self.file_name)
    }
}

#[cfg(unix)]
fn source_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644)
}

#[cfg(not(unix))]
fn source_mode(_path: &Path) -> u32 {
    0o644
}
