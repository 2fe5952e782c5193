//! Project configuration parsing and schema.
//!
//! Every member directory (and the workspace root) carries a
//! `pyproject.toml`; this module turns one into a validated
//! [`ProjectDescriptor`]. Raw serde structs mirror the file, then
//! conversion applies the identity, dynamic-field, and module-discovery
//! rules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::Deserialize;

use crate::core::requirement::Requirement;
use crate::core::requires::RequiresPython;
use crate::core::workspace::WorkspaceSpec;
use crate::errors::ConfigError;

/// The recognizable project configuration file.
pub const CONFIG_FILE: &str = "pyproject.toml";

/// Metadata fields the root may defer to merged resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicField {
    Dependencies,
    EntryPoints,
    Scripts,
    GuiScripts,
    License,
    RequiresPython,
}

impl DynamicField {
    pub const ALL: [DynamicField; 6] = [
        DynamicField::Dependencies,
        DynamicField::EntryPoints,
        DynamicField::Scripts,
        DynamicField::GuiScripts,
        DynamicField::License,
        DynamicField::RequiresPython,
    ];

    /// The configuration-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            DynamicField::Dependencies => "dependencies",
            DynamicField::EntryPoints => "entry-points",
            DynamicField::Scripts => "scripts",
            DynamicField::GuiScripts => "gui-scripts",
            DynamicField::License => "license",
            DynamicField::RequiresPython => "requires-python",
        }
    }

    fn parse(input: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == input)
    }
}

/// License declaration: an identifier or a file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum License {
    /// SPDX-style identifier or free text
    Text(String),
    /// Path to a license file, relative to the project root
    File(PathBuf),
}

impl License {
    /// Display form used in conflict reports.
    pub fn describe(&self) -> String {
        match self {
            License::Text(text) => text.clone(),
            License::File(path) => format!("file:{}", path.display()),
        }
    }
}

/// Readme declaration, passed through into the rendered metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readme {
    pub path: Option<PathBuf>,
    pub text: Option<String>,
    pub content_type: Option<String>,
}

/// An author or maintainer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// The importable package a member contributes to the distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Import name (snake case)
    pub name: String,
    /// On-disk location: a package directory or a single-file module
    pub path: PathBuf,
}

/// Sdist file-selection configuration from `[tool.wharf.sdist]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdistConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// A parsed, validated project: one per member, one for the root.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    pub readme: Option<Readme>,
    pub requires_python: Option<RequiresPython>,
    pub dependencies: Vec<Requirement>,
    /// group name -> entry name -> target reference
    pub entry_points: BTreeMap<String, BTreeMap<String, String>>,
    pub scripts: BTreeMap<String, String>,
    pub gui_scripts: BTreeMap<String, String>,
    pub license: Option<License>,
    pub keywords: Vec<String>,
    pub classifiers: Vec<String>,
    pub urls: BTreeMap<String, String>,
    pub authors: Vec<Author>,
    /// Fields the root defers to merged resolution
    pub dynamic: Vec<DynamicField>,
    /// The directory this descriptor was loaded from
    pub source_root: PathBuf,
    /// The importable package; absent for a workspace root
    pub module: Option<ModuleSource>,
    /// Present when this project declares `[tool.wharf.workspace]`
    pub workspace: Option<WorkspaceSpec>,
    pub sdist: SdistConfig,
}

impl ProjectDescriptor {
    /// Load and validate the configuration in a directory.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Err(ConfigError::MissingConfig {
                dir: dir.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, dir)
    }

    /// Parse configuration content for a project rooted at `dir`.
    pub fn parse(content: &str, dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let raw: RawPyproject = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let project = raw.project.unwrap_or_default();
        let tool = raw.tool.unwrap_or_default().wharf.unwrap_or_default();

        let name = match project.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ConfigError::MissingName {
                    dir: dir.to_path_buf(),
                })
            }
        };

        let version = match project.version {
            Some(value) => value.parse().map_err(|e: semver::Error| {
                ConfigError::InvalidVersion {
                    path: path.clone(),
                    value,
                    reason: e.to_string(),
                }
            })?,
            None => {
                return Err(ConfigError::MissingVersion {
                    dir: dir.to_path_buf(),
                })
            }
        };

        if tool.workspace.is_some() && tool.package.is_some() {
            return Err(ConfigError::WorkspaceAndPackage { path });
        }

        let requires_python = project
            .requires_python
            .map(|value| {
                RequiresPython::parse(&value).map_err(|reason| {
                    ConfigError::InvalidRequiresPython {
                        path: path.clone(),
                        value,
                        reason,
                    }
                })
            })
            .transpose()?;

        let dependencies = project
            .dependencies
            .iter()
            .map(|dep| {
                Requirement::parse(dep).map_err(|reason| ConfigError::Parse {
                    path: path.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dynamic = project
            .dynamic
            .iter()
            .map(|field| {
                DynamicField::parse(field).ok_or_else(|| ConfigError::UnknownDynamic {
                    field: field.clone(),
                    allowed: DynamicField::ALL
                        .iter()
                        .map(|f| f.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let license = project.license.map(|raw| raw.into_license(&path)).transpose()?;
        let readme = project.readme.map(RawReadme::into_readme);

        let workspace = match tool.workspace {
            Some(ws) => {
                if ws.packages.is_empty() {
                    return Err(ConfigError::Parse {
                        path,
                        reason: "workspace must list at least one package pattern".to_string(),
                    });
                }
                Some(WorkspaceSpec {
                    patterns: ws.packages,
                    excluded: ws.excluded,
                })
            }
            None => None,
        };

        let module = if workspace.is_some() {
            None
        } else {
            Some(discover_module(
                dir,
                &name,
                tool.package.and_then(|p| p.module).as_deref(),
            )?)
        };

        let descriptor = ProjectDescriptor {
            name,
            version,
            description: project.description,
            readme,
            requires_python,
            dependencies,
            entry_points: project.entry_points,
            scripts: project.scripts,
            gui_scripts: project.gui_scripts,
            license,
            keywords: project.keywords,
            classifiers: project.classifiers,
            urls: project.urls,
            authors: project
                .authors
                .into_iter()
                .map(|a| Author {
                    name: a.name,
                    email: a.email,
                })
                .collect(),
            dynamic,
            source_root: dir.to_path_buf(),
            module,
            workspace,
            sdist: SdistConfig {
                include: tool.sdist.as_ref().map(|s| s.include.clone()).unwrap_or_default(),
                exclude: tool.sdist.as_ref().map(|s| s.exclude.clone()).unwrap_or_default(),
            },
        };

        descriptor.check_dynamic_overlap()?;
        Ok(descriptor)
    }

    /// The import-name form of the project name.
    pub fn snake_name(&self) -> String {
        self.name.replace('-', "_")
    }

    /// Whether this project declares workspace membership patterns.
    pub fn is_workspace(&self) -> bool {
        self.workspace.is_some()
    }

    /// Whether a field is deferred to merged resolution.
    pub fn is_dynamic(&self, field: DynamicField) -> bool {
        self.dynamic.contains(&field)
    }

    /// A field may be dynamic or statically declared, never both.
    fn check_dynamic_overlap(&self) -> Result<(), ConfigError> {
        for field in &self.dynamic {
            let statically_present = match field {
                DynamicField::Dependencies => !self.dependencies.is_empty(),
                DynamicField::EntryPoints => !self.entry_points.is_empty(),
                DynamicField::Scripts => !self.scripts.is_empty(),
                DynamicField::GuiScripts => !self.gui_scripts.is_empty(),
                DynamicField::License => self.license.is_some(),
                DynamicField::RequiresPython => self.requires_python.is_some(),
            };
            if statically_present {
                return Err(ConfigError::DynamicOverlap {
                    field: field.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Locate a project's importable package.
///
/// Probes `<dir>/<module>`, `<dir>/src/<module>`, `<dir>/<module>.py`,
/// `<dir>/src/<module>.py`; exactly one must exist.
fn discover_module(
    dir: &Path,
    project_name: &str,
    override_name: Option<&str>,
) -> Result<ModuleSource, ConfigError> {
    let module = override_name
        .map(str::to_string)
        .unwrap_or_else(|| project_name.replace('-', "_"));

    let candidates = [
        dir.join(&module),
        dir.join("src").join(&module),
        dir.join(format!("{module}.py")),
        dir.join("src").join(format!("{module}.py")),
    ];

    let mut found: Option<PathBuf> = None;
    for candidate in candidates {
        if candidate.exists() {
            if let Some(first) = &found {
                return Err(ConfigError::AmbiguousModule {
                    module,
                    first: first.clone(),
                    second: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    match found {
        Some(path) => Ok(ModuleSource { name: module, path }),
        None => Err(ConfigError::ModuleNotFound {
            module,
            dir: dir.to_path_buf(),
        }),
    }
}

// --- raw configuration as deserialized from TOML ---

#[derive(Debug, Default, Deserialize)]
struct RawPyproject {
    #[serde(default)]
    project: Option<RawProject>,

    #[serde(default)]
    tool: Option<RawTool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTool {
    #[serde(default)]
    wharf: Option<RawWharf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWharf {
    #[serde(default)]
    workspace: Option<RawWorkspace>,

    #[serde(default)]
    package: Option<RawPackage>,

    #[serde(default)]
    sdist: Option<RawSdist>,
}

#[derive(Debug, Deserialize)]
struct RawWorkspace {
    #[serde(default)]
    packages: Vec<String>,

    #[serde(default)]
    excluded: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    #[serde(default)]
    module: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSdist {
    #[serde(default)]
    include: Vec<String>,

    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    name: Option<String>,

    version: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    readme: Option<RawReadme>,

    #[serde(default, rename = "requires-python")]
    requires_python: Option<String>,

    #[serde(default)]
    dependencies: Vec<String>,

    #[serde(default)]
    license: Option<RawLicense>,

    #[serde(default)]
    dynamic: Vec<String>,

    #[serde(default)]
    scripts: BTreeMap<String, String>,

    #[serde(default, rename = "gui-scripts")]
    gui_scripts: BTreeMap<String, String>,

    #[serde(default, rename = "entry-points")]
    entry_points: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    keywords: Vec<String>,

    #[serde(default)]
    classifiers: Vec<String>,

    #[serde(default)]
    urls: BTreeMap<String, String>,

    #[serde(default)]
    authors: Vec<RawAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLicense {
    Identifier(String),
    Table {
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

impl RawLicense {
    fn into_license(self, path: &Path) -> Result<License, ConfigError> {
        match self {
            RawLicense::Identifier(text) => Ok(License::Text(text)),
            RawLicense::Table { file: Some(file), text: None } => {
                Ok(License::File(PathBuf::from(file)))
            }
            RawLicense::Table { file: None, text: Some(text) } => Ok(License::Text(text)),
            RawLicense::Table { .. } => Err(ConfigError::Parse {
                path: path.to_path_buf(),
                reason: "license table must set exactly one of `file` or `text`".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawReadme {
    Path(String),
    Table {
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default, rename = "content-type")]
        content_type: Option<String>,
    },
}

impl RawReadme {
    fn into_readme(self) -> Readme {
        match self {
            RawReadme::Path(file) => Readme {
                path: Some(PathBuf::from(file)),
                text: None,
                content_type: None,
            },
            RawReadme::Table {
                file,
                text,
                content_type,
            } => Readme {
                path: file.map(PathBuf::from),
                text,
                content_type,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn member_dir(content: &str, module: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), content).unwrap();
        let pkg = tmp.path().join(module);
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("__init__.py"), "").unwrap();
        tmp
    }

    #[test]
    fn test_parse_basic_member() {
        let tmp = member_dir(
            r#"
[project]
name = "pkg-a"
version = "0.1.0"
requires-python = ">=3.8"
dependencies = ["requests>=2"]
"#,
            "pkg_a",
        );

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert_eq!(desc.name, "pkg-a");
        assert_eq!(desc.version, Version::new(0, 1, 0));
        assert_eq!(desc.snake_name(), "pkg_a");
        assert_eq!(desc.dependencies.len(), 1);
        assert!(desc.module.is_some());
        assert!(!desc.is_workspace());
    }

    #[test]
    fn test_module_discovery_src_layout() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[project]\nname = \"pkg-b\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();
        let pkg = tmp.path().join("src").join("pkg_b");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("__init__.py"), "").unwrap();

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        let module = desc.module.unwrap();
        assert_eq!(module.name, "pkg_b");
        assert!(module.path.ends_with("src/pkg_b"));
    }

    #[test]
    fn test_module_override() {
        let tmp = member_dir(
            r#"
[project]
name = "pkg-c"
version = "1.0.0"

[tool.wharf.package]
module = "cee"
"#,
            "cee",
        );

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert_eq!(desc.module.unwrap().name, "cee");
    }

    #[test]
    fn test_ambiguous_module_rejected() {
        let tmp = member_dir(
            "[project]\nname = \"pkg\"\nversion = \"1.0.0\"\n",
            "pkg",
        );
        let other = tmp.path().join("src").join("pkg");
        std::fs::create_dir_all(&other).unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousModule { .. }));
    }

    #[test]
    fn test_missing_module_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[project]\nname = \"ghost\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ModuleNotFound { .. }));
    }

    #[test]
    fn test_workspace_root_has_no_module() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[project]
name = "mono"
version = "1.0.0"
dynamic = ["dependencies"]

[tool.wharf.workspace]
packages = ["packages/*"]
excluded = ["packages/experimental"]
"#,
        )
        .unwrap();

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert!(desc.is_workspace());
        assert!(desc.module.is_none());
        let spec = desc.workspace.as_ref().unwrap();
        assert_eq!(spec.patterns, vec!["packages/*"]);
        assert_eq!(spec.excluded, vec!["packages/experimental"]);
        assert!(desc.is_dynamic(DynamicField::Dependencies));
    }

    #[test]
    fn test_missing_name_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "[project]\nversion = \"1.0.0\"\n")
            .unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingName { .. }));
    }

    #[test]
    fn test_workspace_and_package_tables_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[project]
name = "both"
version = "1.0.0"

[tool.wharf.workspace]
packages = ["packages/*"]

[tool.wharf.package]
module = "both"
"#,
        )
        .unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::WorkspaceAndPackage { .. }));
    }

    #[test]
    fn test_dynamic_and_static_overlap_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[project]
name = "mono"
version = "1.0.0"
dependencies = ["click"]
dynamic = ["dependencies"]

[tool.wharf.workspace]
packages = ["packages/*"]
"#,
        )
        .unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DynamicOverlap { .. }));
    }

    #[test]
    fn test_unknown_dynamic_field_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[project]
name = "mono"
version = "1.0.0"
dynamic = ["version"]

[tool.wharf.workspace]
packages = ["packages/*"]
"#,
        )
        .unwrap();

        let err = ProjectDescriptor::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDynamic { .. }));
    }

    #[test]
    fn test_license_forms() {
        let tmp = member_dir(
            r#"
[project]
name = "lic"
version = "1.0.0"
license = { file = "LICENSE" }
"#,
            "lic",
        );

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert_eq!(desc.license, Some(License::File(PathBuf::from("LICENSE"))));

        let tmp = member_dir(
            "[project]\nname = \"lic\"\nversion = \"1.0.0\"\nlicense = \"MIT\"\n",
            "lic",
        );
        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert_eq!(desc.license, Some(License::Text("MIT".to_string())));
    }

    #[test]
    fn test_entry_points_and_scripts() {
        let tmp = member_dir(
            r#"
[project]
name = "tools"
version = "1.0.0"

[project.scripts]
tool = "tools.cli:main"

[project.entry-points."flake8.extension"]
T1 = "tools.checker:Checker"
"#,
            "tools",
        );

        let desc = ProjectDescriptor::load(tmp.path()).unwrap();
        assert_eq!(desc.scripts["tool"], "tools.cli:main");
        assert_eq!(
            desc.entry_points["flake8.extension"]["T1"],
            "tools.checker:Checker"
        );
    }
}
