//! Workspace resolution: pattern expansion and member loading.
//!
//! A workspace's members are discovered afresh on every build invocation;
//! nothing is cached across calls, so re-resolution is idempotent and
//! side-effect-free.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::project::{ProjectDescriptor, CONFIG_FILE};
use crate::errors::{BuildError, ConfigError, WorkspaceError};
use crate::util::{fs, BuildContext};

/// The root-level workspace declaration from `[tool.wharf.workspace]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSpec {
    /// Glob patterns identifying member directories, in declaration order
    pub patterns: Vec<String>,

    /// Patterns subtracted from the matches
    pub excluded: Vec<String>,
}

/// A resolved workspace: the root descriptor plus its members in
/// resolution order.
///
/// A root without a workspace declaration is self-contained: it is the
/// sole member of its own build.
#[derive(Debug)]
pub struct Workspace {
    root: ProjectDescriptor,
    members: Vec<ProjectDescriptor>,
}

impl Workspace {
    /// Resolve the workspace rooted at the context's project directory.
    pub fn resolve(ctx: &BuildContext) -> Result<Self, BuildError> {
        let root = ProjectDescriptor::load(ctx.root())?;

        let members = match &root.workspace {
            Some(spec) => {
                let dirs = expand_patterns(ctx.root(), spec)?;
                if dirs.is_empty() {
                    return Err(WorkspaceError::NoMembers {
                        patterns: spec.patterns.clone(),
                    }
                    .into());
                }
                load_members(&dirs)?
            }
            None => {
                tracing::debug!(name = %root.name, "root is self-contained");
                vec![root.clone()]
            }
        };

        Ok(Workspace { root, members })
    }

    /// The root descriptor.
    pub fn root(&self) -> &ProjectDescriptor {
        &self.root
    }

    /// Member descriptors in resolution order.
    pub fn members(&self) -> &[ProjectDescriptor] {
        &self.members
    }

    /// Whether the root itself is the sole member.
    pub fn is_self_contained(&self) -> bool {
        self.root.workspace.is_none()
    }
}

/// Expand member patterns into an ordered, deduplicated list of
/// directories containing a recognizable project configuration file.
fn expand_patterns(root: &Path, spec: &WorkspaceSpec) -> Result<Vec<PathBuf>, BuildError> {
    let excluded = expand_exclusions(root, &spec.excluded)?;

    let mut seen = BTreeSet::new();
    let mut dirs = Vec::new();

    for pattern in &spec.patterns {
        validate_pattern(pattern)?;

        let full_pattern = root.join(pattern);
        let entries = glob::glob(&full_pattern.to_string_lossy()).map_err(|e| {
            WorkspaceError::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }
        })?;

        // lexicographic within one pattern, for determinism across
        // platforms and filesystem orderings
        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| WorkspaceError::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            if !path.is_dir() {
                continue;
            }
            if !path.join(CONFIG_FILE).exists() {
                tracing::debug!(path = %path.display(), "skipping non-project directory");
                continue;
            }
            matches.push(path);
        }
        matches.sort();

        for path in matches {
            let canonical = fs::normalize_path(&path);
            if excluded.contains(&canonical) {
                tracing::debug!(path = %path.display(), "member excluded");
                continue;
            }
            if seen.insert(canonical) {
                dirs.push(path);
            }
        }
    }

    Ok(dirs)
}

fn expand_exclusions(root: &Path, patterns: &[String]) -> Result<BTreeSet<PathBuf>, BuildError> {
    let mut excluded = BTreeSet::new();

    for pattern in patterns {
        validate_pattern(pattern)?;

        let full_pattern = root.join(pattern);
        let entries = glob::glob(&full_pattern.to_string_lossy()).map_err(|e| {
            WorkspaceError::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        for entry in entries.flatten() {
            excluded.insert(fs::normalize_path(&entry));
        }
    }

    Ok(excluded)
}

fn validate_pattern(pattern: &str) -> Result<(), WorkspaceError> {
    if Path::new(pattern).is_absolute() {
        return Err(WorkspaceError::Pattern {
            pattern: pattern.to_string(),
            reason: "pattern must be relative".to_string(),
        });
    }
    if Path::new(pattern).components().any(|c| c.as_os_str() == "..") {
        return Err(WorkspaceError::Pattern {
            pattern: pattern.to_string(),
            reason: "pattern must not contain `..`".to_string(),
        });
    }
    Ok(())
}

fn load_members(dirs: &[PathBuf]) -> Result<Vec<ProjectDescriptor>, BuildError> {
    let mut members = Vec::with_capacity(dirs.len());
    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();

    for dir in dirs {
        let member = ProjectDescriptor::load(dir)?;
        if member.is_workspace() {
            return Err(ConfigError::NestedWorkspace { dir: dir.clone() }.into());
        }
        // members feed the merge; only the root may defer fields to it
        if !member.dynamic.is_empty() {
            return Err(ConfigError::Parse {
                path: dir.join(CONFIG_FILE),
                reason: "workspace members must declare all metadata statically".to_string(),
            }
            .into());
        }
        if let Some(first) = by_name.get(&member.name) {
            return Err(ConfigError::DuplicateMemberName {
                name: member.name.clone(),
                first: first.clone(),
                second: dir.clone(),
            }
            .into());
        }
        by_name.insert(member.name.clone(), dir.clone());
        tracing::debug!(name = %member.name, path = %dir.display(), "loaded member");
        members.push(member);
    }

    Ok(members)
}
