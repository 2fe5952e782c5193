//! Wheel writing.
//!
//! A wheel is a zip archive: package files at the top level, a
//! `.dist-info` directory, and a RECORD file written last since it
//! describes everything else. Two writers share one payload path: the
//! zip-backed [`WheelWriter`] and the folder-backed [`MetadataDir`] used
//! by the metadata-only hook.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::workspace::Workspace;
use crate::core::MergedDescriptor;
use crate::dist::layout::{ArchiveManifest, ManifestEntry};
use crate::dist::metadata::{core_metadata, entry_points_ini, wheel_info, DistName};
use crate::errors::{ArchiveError, BuildError};
use crate::util::context::ArchiveTimestamp;
use crate::util::{fs, BuildContext, ContentHash};

/// Destination for wheel-shaped content.
///
/// Paths are forward-slash, relative to the wheel root.
pub trait ArtifactSink {
    fn write_bytes(&mut self, path: &str, data: &[u8]) -> Result<(), BuildError>;

    fn write_entry(&mut self, entry: &ManifestEntry) -> Result<(), BuildError>;

    fn write_text(&mut self, path: &str, text: &str) -> Result<(), BuildError> {
        self.write_bytes(path, text.as_bytes())
    }
}

/// Write the importable payload: every manifest entry, unchanged.
pub fn write_payload(
    sink: &mut dyn ArtifactSink,
    manifest: &ArchiveManifest,
) -> Result<(), BuildError> {
    for entry in &manifest.entries {
        sink.write_entry(entry)?;
    }
    Ok(())
}

/// Write the editable redirection file instead of the payload: a
/// `<name>.pth` listing each member module's parent directory, so the
/// interpreter imports straight from the source tree.
pub fn write_editable_redirects(
    sink: &mut dyn ArtifactSink,
    workspace: &Workspace,
    merged: &MergedDescriptor,
) -> Result<(), BuildError> {
    let mut dirs: Vec<String> = Vec::new();
    for member in workspace.members() {
        if let Some(module) = &member.module {
            let parent = module.path.parent().unwrap_or(&module.path);
            let dir = fs::normalize_path(parent).display().to_string();
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }

    sink.write_text(&format!("{}.pth", merged.snake_name()), &dirs.join("\n"))
}

/// Write the `.dist-info` directory: license files, WHEEL, METADATA, and
/// entry_points.txt.
pub fn write_dist_info(
    sink: &mut dyn ArtifactSink,
    merged: &MergedDescriptor,
    dist: &DistName,
    ctx: &BuildContext,
) -> Result<(), BuildError> {
    let dist_info = dist.dist_info();

    for license_file in &merged.license_files {
        let rel = fs::relative_path(ctx.root(), license_file);
        let entry = license_entry(license_file, &format!(
            "{}/licenses/{}",
            dist_info,
            fs::archive_path(&rel)
        ))?;
        sink.write_entry(&entry)?;
    }

    sink.write_text(
        &format!("{}/WHEEL", dist_info),
        &wheel_info(dist, &ctx.generator()),
    )?;
    sink.write_text(
        &format!("{}/METADATA", dist_info),
        &core_metadata(merged, ctx.root())?,
    )?;

    let entrypoints = entry_points_ini(merged);
    if !entrypoints.is_empty() {
        sink.write_text(&format!("{}/entry_points.txt", dist_info), &entrypoints)?;
    }

    Ok(())
}

fn license_entry(source: &Path, archive_path: &str) -> Result<ManifestEntry, BuildError> {
    let hash = ContentHash::of_file(source).map_err(|e| ArchiveError::Io {
        artifact: source.display().to_string(),
        inner: e,
    })?;
    let size = std::fs::metadata(source)
        .map_err(|e| ArchiveError::Io {
            artifact: source.display().to_string(),
            inner: e.into(),
        })?
        .len();
    Ok(ManifestEntry {
        source: source.to_path_buf(),
        archive_path: archive_path.to_string(),
        hash,
        size,
    })
}

/// A wheel archive under construction.
///
/// Content streams into a temporary file in the target directory; the
/// final name only appears once the archive is complete, so an
/// interrupted build never leaves a partial wheel behind.
pub struct WheelWriter {
    dist_info: String,
    file_name: String,
    zip: ZipWriter<File>,
    temp: NamedTempFile,
    final_path: PathBuf,
    timestamp: ArchiveTimestamp,
    records: Vec<(String, String, u64)>,
}

impl WheelWriter {
    /// Start a wheel in `target_dir`.
    pub fn create(
        target_dir: &Path,
        dist: &DistName,
        ctx: &BuildContext,
    ) -> Result<Self, BuildError> {
        let file_name = dist.wheel_file();
        let io_err = |e: anyhow::Error| ArchiveError::Io {
            artifact: file_name.clone(),
            inner: e,
        };

        fs::ensure_dir(target_dir).map_err(io_err)?;
        let temp = NamedTempFile::new_in(target_dir)
            .map_err(|e| io_err(e.into()))?;
        let file = temp.reopen().map_err(|e| io_err(e.into()))?;

        Ok(WheelWriter {
            dist_info: dist.dist_info(),
            file_name: file_name.clone(),
            zip: ZipWriter::new(file),
            temp,
            final_path: target_dir.join(&file_name),
            timestamp: ctx.timestamp(),
            records: Vec::new(),
        })
    }

    fn options(&self, mode: u32) -> Result<SimpleFileOptions, BuildError> {
        let (year, month, day, hour, minute, second) = self.timestamp.calendar();
        let modified = zip::DateTime::from_date_and_time(year, month, day, hour, minute, second)
            .map_err(|e| ArchiveError::Io {
                artifact: self.file_name.clone(),
                inner: anyhow::anyhow!("invalid archive timestamp: {e}"),
            })?;

        Ok(SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(modified)
            .unix_permissions(mode))
    }

    fn io_error(&self, e: impl Into<anyhow::Error>) -> BuildError {
        ArchiveError::Io {
            artifact: self.file_name.clone(),
            inner: e.into(),
        }
        .into()
    }

    /// Write the RECORD file, close the archive, and move it into place.
    ///
    /// Returns the wheel's file name.
    pub fn finish(mut self) -> Result<String, BuildError> {
        let mut record_text = String::new();
        for (path, hash, size) in &self.records {
            record_text.push_str(&format!("{},{},{}\n", path, hash, size));
        }
        // the RECORD file cannot describe itself
        record_text.push_str(&format!("{}/RECORD,,\n", self.dist_info));

        let record_path = format!("{}/RECORD", self.dist_info);
        let options = self.options(0o644)?;
        self.zip
            .start_file(&record_path, options)
            .map_err(|e| self.io_error(e))?;
        self.zip
            .write_all(record_text.as_bytes())
            .map_err(|e| self.io_error(e))?;

        self.zip.finish().map_err(|e| ArchiveError::Io {
            artifact: self.file_name.clone(),
            inner: e.into(),
        })?;

        self.temp
            .persist(&self.final_path)
            .map_err(|e| ArchiveError::Io {
                artifact: self.file_name.clone(),
                inner: e.error.into(),
            })?;

        tracing::info!(wheel = %self.file_name, "wrote wheel");
        Ok(self.file_name)
    }
}

impl ArtifactSink for WheelWriter {
    fn write_bytes(&mut self, path: &str, data: &[u8]) -> Result<(), BuildError> {
        let options = self.options(0o644)?;
        self.zip
            .start_file(path, options)
            .map_err(|e| self.io_error(e))?;
        self.zip.write_all(data).map_err(|e| self.io_error(e))?;

        let hash = ContentHash::of_bytes(data);
        self.records
            .push((path.to_string(), hash.record(), data.len() as u64));
        Ok(())
    }

    fn write_entry(&mut self, entry: &ManifestEntry) -> Result<(), BuildError> {
        let mode = fs::normalize_file_mode(source_mode(&entry.source));
        let options = self.options(mode)?;
        self.zip
            .start_file(&entry.archive_path, options)
            .map_err(|e| self.io_error(e))?;

        let mut source = File::open(&entry.source).map_err(|e| self.io_error(e))?;
        std::io::copy(&mut source, &mut self.zip)
            .map_err(|e| self.io_error(e))?;

        self.records.push((
            entry.archive_path.clone(),
            entry.hash.record(),
            entry.size,
        ));
        Ok(())
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

/// A bare `.dist-info` directory, for the metadata-only hook.
pub struct MetadataDir {
    target_dir: PathBuf,
    dist_info: String,
    records: Vec<(String, String, u64)>,
}

impl MetadataDir {
    /// Start a dist-info directory in `target_dir`.
    pub fn create(target_dir: &Path, dist: &DistName) -> Result<Self, BuildError> {
        let dist_info = dist.dist_info();
        fs::ensure_dir(&target_dir.join(&dist_info)).map_err(|e| ArchiveError::Io {
            artifact: dist_info.clone(),
            inner: e,
        })?;

        Ok(MetadataDir {
            target_dir: target_dir.to_path_buf(),
            dist_info,
            records: Vec::new(),
        })
    }

    /// Write the RECORD file and return the dist-info directory name.
    pub fn finish(mut self) -> Result<String, BuildError> {
        let mut record_text = String::new();
        for (path, hash, size) in &self.records {
            record_text.push_str(&format!("{},{},{}\n", path, hash, size));
        }
        record_text.push_str(&format!("{}/RECORD,,\n", self.dist_info));

        let record_path = format!("{}/RECORD", self.dist_info);
        let full = self.target_dir.join(&record_path);
        fs::write_string(&full, &record_text).map_err(|e| ArchiveError::Io {
            artifact: record_path,
            inner: e,
        })?;
        self.records.clear();

        tracing::info!(dist_info = %self.dist_info, "wrote metadata directory");
        Ok(self.dist_info)
    }
}

impl ArtifactSink for MetadataDir {
    fn write_bytes(&mut self, path: &str, data: &[u8]) -> Result<(), BuildError> {
        let full = self.target_dir.join(path);
        if let Some(parent) = full.parent() {
            fs::ensure_dir(parent).map_err(|e| ArchiveError::Io {
                artifact: path.to_string(),
                inner: e,
            })?;
        }
        std::fs::write(&full, data).map_err(|e| ArchiveError::Io {
            artifact: path.to_string(),
            inner: e.into(),
        })?;

        let hash = ContentHash::of_bytes(data);
        self.records
            .push((path.to_string(), hash.record(), data.len() as u64));
        Ok(())
    }

    fn write_entry(&mut self, entry: &ManifestEntry) -> Result<(), BuildError> {
        let full = self.target_dir.join(&entry.archive_path);
        if let Some(parent) = full.parent() {
            fs::ensure_dir(parent).map_err(|e| ArchiveError::Io {
                artifact: entry.archive_path.clone(),
                inner: e,
            })?;
        }
        std::fs::copy(&entry.source, &full).map_err(|e| ArchiveError::Io {
            artifact: entry.archive_path.clone(),
            inner: e.into(),
        })?;

        self.records.push((
            entry.archive_path.clone(),
            entry.hash.record(),
            entry.size,
        ));
        Ok(())
    }
}
