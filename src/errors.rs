//! Error taxonomy for the build pipeline.
//!
//! Every fatal error carries enough structure (phase, offending members,
//! field) to be actionable without rerunning in a verbose mode. Nothing is
//! downgraded to a warning and nothing is retried.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::Diagnostic;

/// Pipeline phase in which an error arose.
///
/// Attached by the hook adapter when propagating to the frontend; the
/// underlying error is never translated or rewrapped beyond this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Merge,
    Assemble,
    Hook,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => write!(f, "resolve"),
            Phase::Merge => write!(f, "merge"),
            Phase::Assemble => write!(f, "assemble"),
            Phase::Hook => write!(f, "hook"),
        }
    }
}

/// Any fatal error from the pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BuildError {
    /// The pipeline phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            BuildError::Workspace(_) => Phase::Resolve,
            BuildError::Config(_) => Phase::Resolve,
            BuildError::Conflict(_) => Phase::Merge,
            BuildError::Archive(_) => Phase::Assemble,
            BuildError::Protocol(_) => Phase::Hook,
        }
    }
}

/// Error while discovering workspace members.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no workspace members matched patterns: {}", patterns.join(", "))]
    NoMembers { patterns: Vec<String> },

    #[error("invalid member pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },
}

/// A member or the root is missing required configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no pyproject.toml found in {}", dir.display())]
    MissingConfig { dir: PathBuf },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("project in {} is missing required field `name`", dir.display())]
    MissingName { dir: PathBuf },

    #[error("project in {} is missing required field `version`", dir.display())]
    MissingVersion { dir: PathBuf },

    #[error("invalid version `{value}` in {}: {reason}", path.display())]
    InvalidVersion {
        path: PathBuf,
        value: String,
        reason: String,
    },

    #[error("invalid requires-python `{value}` in {}: {reason}", path.display())]
    InvalidRequiresPython {
        path: PathBuf,
        value: String,
        reason: String,
    },

    #[error("unknown dynamic field `{field}` (expected one of: {allowed})")]
    UnknownDynamic { field: String, allowed: String },

    #[error(
        "field `{field}` is declared dynamic but also set statically in [project]; \
         remove one declaration"
    )]
    DynamicOverlap { field: String },

    #[error("cannot declare both [tool.wharf.workspace] and [tool.wharf.package] in {}", path.display())]
    WorkspaceAndPackage { path: PathBuf },

    #[error("workspaces cannot contain other workspaces: {}", dir.display())]
    NestedWorkspace { dir: PathBuf },

    #[error(
        "duplicate member name `{name}` in {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateMemberName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("could not find module `{module}` for project in {}", dir.display())]
    ModuleNotFound { module: String, dir: PathBuf },

    #[error(
        "multiple possible module paths for `{module}`: {} and {}",
        first.display(),
        second.display()
    )]
    AmbiguousModule {
        module: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(
        "member `{dependent}` requires `{requirement}` but workspace bundles \
         `{member}` version {version}"
    )]
    MemberVersionMismatch {
        dependent: String,
        requirement: String,
        member: String,
        version: String,
    },
}

/// One or more merge conflicts, batched so a single run surfaces every
/// problem.
#[derive(Debug, Error)]
pub struct ConflictError {
    pub conflicts: Vec<Conflict>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} merge conflict(s):", self.conflicts.len())?;
        for conflict in &self.conflicts {
            write!(f, "{}", conflict.to_diagnostic().format())?;
        }
        Ok(())
    }
}

/// A single cross-member conflict detected while folding metadata.
#[derive(Debug, Clone)]
pub enum Conflict {
    /// Same entry-point group+name with different targets in two members.
    DuplicateEntryPoint {
        group: String,
        name: String,
        first_member: String,
        second_member: String,
    },

    /// The members' interpreter ranges have no common version.
    EmptyVersionIntersection {
        /// `(member name, declared range)` for every contributor
        constraints: Vec<(String, String)>,
    },

    /// Multiple members declare different licenses and the root pins none.
    AmbiguousLicense {
        /// `(member name, license)` for each distinct declaration
        values: Vec<(String, String)>,
    },

    /// A member descriptor reached the merge without a name.
    MissingMemberIdentity { dir: PathBuf },
}

impl Conflict {
    /// Short kind tag, used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Conflict::DuplicateEntryPoint { .. } => "duplicate-entry-point",
            Conflict::EmptyVersionIntersection { .. } => "empty-version-intersection",
            Conflict::AmbiguousLicense { .. } => "ambiguous-license",
            Conflict::MissingMemberIdentity { .. } => "missing-member-identity",
        }
    }

    /// Convert to a user-facing diagnostic naming every offending member.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Conflict::DuplicateEntryPoint {
                group,
                name,
                first_member,
                second_member,
            } => Diagnostic::error(format!("entry point `{}.{}` defined twice", group, name))
                .with_context(format!("first defined by member `{}`", first_member))
                .with_context(format!("also defined by member `{}`", second_member))
                .with_suggestion("Rename one of the entry points".to_string()),

            Conflict::EmptyVersionIntersection { constraints } => {
                let mut diag =
                    Diagnostic::error("no interpreter version satisfies every member");
                for (member, range) in constraints {
                    diag = diag.with_context(format!("`{}` requires {}", member, range));
                }
                diag.with_suggestion(
                    "Relax the requires-python range of one of the members".to_string(),
                )
            }

            Conflict::AmbiguousLicense { values } => {
                let mut diag = Diagnostic::error("members declare different licenses");
                for (member, value) in values {
                    diag = diag.with_context(format!("`{}` declares `{}`", member, value));
                }
                diag.with_suggestion(
                    "Declare the combined license explicitly in the root [project]".to_string(),
                )
            }

            Conflict::MissingMemberIdentity { dir } => {
                Diagnostic::error("member has no project name")
                    .with_location(dir.clone())
                    .with_suggestion("Add a `name` to the member's [project] table".to_string())
            }
        }
    }
}

/// I/O or layout failure while producing the artifact.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(
        "members `{first_member}` and `{second_member}` both provide `{path}`"
    )]
    DuplicateImportPath {
        path: String,
        first_member: String,
        second_member: String,
    },

    #[error("failed to write {artifact}: {inner:#}")]
    Io { artifact: String, inner: anyhow::Error },
}

/// Hook called with arguments incompatible with declared capabilities.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("metadata directory `{got}` does not match computed `{expected}`")]
    MetadataDirMismatch { expected: String, got: String },

    #[error("unknown build kind `{kind}` (expected wheel, sdist, or editable)")]
    UnknownBuildKind { kind: String },

    #[error("cannot build {operation}: {reason}")]
    Unsupported { operation: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_attribution() {
        let err = BuildError::from(WorkspaceError::NoMembers {
            patterns: vec!["packages/*".to_string()],
        });
        assert_eq!(err.phase(), Phase::Resolve);

        let err = BuildError::from(ConflictError { conflicts: vec![] });
        assert_eq!(err.phase(), Phase::Merge);

        let err = BuildError::from(ProtocolError::UnknownBuildKind {
            kind: "zipapp".to_string(),
        });
        assert_eq!(err.phase(), Phase::Hook);
    }

    #[test]
    fn test_conflict_diagnostic_names_both_members() {
        let conflict = Conflict::DuplicateEntryPoint {
            group: "console_scripts".to_string(),
            name: "run".to_string(),
            first_member: "pkg-a".to_string(),
            second_member: "pkg-b".to_string(),
        };

        let output = conflict.to_diagnostic().format();
        assert!(output.contains("console_scripts.run"));
        assert!(output.contains("pkg-a"));
        assert!(output.contains("pkg-b"));
    }

    #[test]
    fn test_conflict_error_reports_all() {
        let err = ConflictError {
            conflicts: vec![
                Conflict::MissingMemberIdentity {
                    dir: PathBuf::from("packages/a"),
                },
                Conflict::AmbiguousLicense {
                    values: vec![
                        ("pkg-a".to_string(), "MIT".to_string()),
                        ("pkg-b".to_string(), "Apache-2.0".to_string()),
                    ],
                },
            ],
        };

        let text = err.to_string();
        assert!(text.contains("2 merge conflict(s)"));
        assert!(text.contains("packages/a"));
        assert!(text.contains("Apache-2.0"));
    }
}
