//! The build-protocol operations invoked by a packaging frontend.
//!
//! Each operation runs the full resolve → merge → assemble pipeline from
//! scratch; nothing is cached between calls, so a frontend may call the
//! metadata hook and then a build hook and observe identical resolution.
//! Errors propagate unmodified; only the failing phase is attached.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::workspace::Workspace;
use crate::core::{merge, MergedDescriptor};
use crate::dist::layout::{sdist_layout, wheel_layout};
use crate::dist::metadata::{core_metadata, DistName};
use crate::dist::sdist::SdistWriter;
use crate::dist::wheel::{
    write_dist_info, write_editable_redirects, write_payload, MetadataDir, WheelWriter,
};
use crate::errors::{BuildError, ProtocolError};
use crate::util::BuildContext;

/// The kind of artifact a frontend is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Wheel,
    Sdist,
    Editable,
}

impl FromStr for BuildKind {
    type Err = ProtocolError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "wheel" => Ok(BuildKind::Wheel),
            "sdist" => Ok(BuildKind::Sdist),
            "editable" => Ok(BuildKind::Editable),
            other => Err(ProtocolError::UnknownBuildKind {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildKind::Wheel => write!(f, "wheel"),
            BuildKind::Sdist => write!(f, "sdist"),
            BuildKind::Editable => write!(f, "editable"),
        }
    }
}

/// Options for [`build_wheel`].
#[derive(Debug, Clone, Default)]
pub struct WheelOptions {
    /// Emit path redirections instead of copying member sources.
    ///
    /// Development convenience only; never the default for a
    /// distributable artifact.
    pub editable: bool,

    /// A metadata directory previously produced by [`prepare_metadata`],
    /// if the frontend passes one back.
    pub metadata_dir: Option<PathBuf>,
}

/// Requirements needed to perform the build itself, per artifact kind.
///
/// The backend is self-contained, so every kind resolves to an empty
/// list; the hook exists because the protocol requires an answer.
pub fn get_requires_for_build(kind: BuildKind) -> Vec<String> {
    tracing::debug!(%kind, "no extra build requirements");
    Vec::new()
}

/// Write the `{name}-{version}.dist-info` directory to `target_dir` and
/// return its name. Stops before any file-copy step.
pub fn prepare_metadata(ctx: &BuildContext, target_dir: &Path) -> Result<String, BuildError> {
    let (_, merged, dist) = resolve_and_merge(ctx)?;

    let mut sink = MetadataDir::create(target_dir, &dist)?;
    write_dist_info(&mut sink, &merged, &dist, ctx)?;
    sink.finish()
}

/// Build a wheel into `target_dir` and return its file name.
pub fn build_wheel(
    ctx: &BuildContext,
    target_dir: &Path,
    options: &WheelOptions,
) -> Result<String, BuildError> {
    let (workspace, merged, dist) = resolve_and_merge(ctx)?;

    if let Some(metadata_dir) = &options.metadata_dir {
        let got = metadata_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if got != dist.dist_info() {
            return Err(ProtocolError::MetadataDirMismatch {
                expected: dist.dist_info(),
                got,
            }
            .into());
        }
    }

    let mut wheel = WheelWriter::create(target_dir, &dist, ctx)?;
    if options.editable {
        write_editable_redirects(&mut wheel, &workspace, &merged)?;
    } else {
        let manifest = wheel_layout(&workspace)?;
        write_payload(&mut wheel, &manifest)?;
    }
    write_dist_info(&mut wheel, &merged, &dist, ctx)?;
    wheel.finish()
}

/// Build a source distribution into `target_dir` and return its file
/// name.
pub fn build_sdist(ctx: &BuildContext, target_dir: &Path) -> Result<String, BuildError> {
    let (workspace, merged, dist) = resolve_and_merge(ctx)?;

    let manifest = sdist_layout(&workspace, ctx.root())?;
    let mut sdist = SdistWriter::create(target_dir, &dist, ctx)?;
    for entry in &manifest.entries {
        sdist.write_entry(entry)?;
    }
    sdist.write_text("PKG-INFO", &core_metadata(&merged, ctx.root())?)?;
    sdist.finish()
}

fn resolve_and_merge(
    ctx: &BuildContext,
) -> Result<(Workspace, MergedDescriptor, DistName), BuildError> {
    let workspace = Workspace::resolve(ctx)?;
    tracing::debug!(
        root = %workspace.root().name,
        members = workspace.members().len(),
        "resolved workspace"
    );
    let merged = merge(&workspace)?;
    let dist = DistName::new(&merged);
    Ok((workspace, merged, dist))
}
