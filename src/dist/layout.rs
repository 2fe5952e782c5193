//! Archive layout: mapping member source trees into archive paths.
//!
//! Produces the ordered manifest consumed by the wheel and sdist writers.
//! Ordering is members in resolution order, lexicographic within a member,
//! so two runs over the same tree lay out identically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::workspace::Workspace;
use crate::core::ProjectDescriptor;
use crate::errors::{ArchiveError, BuildError, ConfigError, ProtocolError};
use crate::util::{fs, ContentHash};

/// One file destined for the archive.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    /// Where the content comes from
    pub source: PathBuf,
    /// Forward-slash path inside the archive
    pub archive_path: String,
    /// SHA-256 of the content
    pub hash: ContentHash,
    /// Size in bytes
    pub size: u64,
}

/// The ordered set of files to archive.
#[derive(Debug, Default)]
pub struct ArchiveManifest {
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    fn push(
        &mut self,
        owners: &mut BTreeMap<String, String>,
        owner: &str,
        source: PathBuf,
        archive_path: String,
    ) -> Result<(), BuildError> {
        if let Some(first) = owners.get(&archive_path) {
            return Err(ArchiveError::DuplicateImportPath {
                path: archive_path,
                first_member: first.clone(),
                second_member: owner.to_string(),
            }
            .into());
        }
        owners.insert(archive_path.clone(), owner.to_string());

        let hash = ContentHash::of_file(&source).map_err(|e| ArchiveError::Io {
            artifact: source.display().to_string(),
            inner: e,
        })?;
        let size = std::fs::metadata(&source)
            .map_err(|e| ArchiveError::Io {
                artifact: source.display().to_string(),
                inner: e.into(),
            })?
            .len();

        self.entries.push(ManifestEntry {
            source,
            archive_path,
            hash,
            size,
        });
        Ok(())
    }
}

/// Lay out a wheel: each member's importable package tree, unchanged,
/// in the archive's package namespace.
pub fn wheel_layout(workspace: &Workspace) -> Result<ArchiveManifest, BuildError> {
    let mut manifest = ArchiveManifest::default();
    let mut owners = BTreeMap::new();

    for member in workspace.members() {
        let module = member_module(member)?;

        if module.path.is_dir() {
            check_no_symlinks(&module.path, &member.name, "wheel")?;

            // file paths are rooted at the module's parent so the package
            // keeps its import name inside the archive
            let base = module.path.parent().unwrap_or(&module.path);
            for file in fs::collect_files(&module.path).map_err(|e| ArchiveError::Io {
                artifact: module.path.display().to_string(),
                inner: e,
            })? {
                let rel = fs::relative_path(base, &file);
                let archive_path = fs::archive_path(&rel);
                manifest.push(&mut owners, &member.name, file, archive_path)?;
            }
        } else {
            let file_name = format!("{}.py", module.name);
            manifest.push(&mut owners, &member.name, module.path.clone(), file_name)?;
        }

        tracing::debug!(member = %member.name, module = %module.name, "laid out member");
    }

    Ok(manifest)
}

/// Lay out an sdist: the root configuration file and top-level files,
/// plus every member's full source tree under its root-relative
/// subdirectory. Paths are relative to the root; the writer adds the
/// `{name}-{version}/` prefix.
pub fn sdist_layout(workspace: &Workspace, root_dir: &Path) -> Result<ArchiveManifest, BuildError> {
    let mut manifest = ArchiveManifest::default();
    let mut owners = BTreeMap::new();
    let root = workspace.root();

    let mut sources: Vec<PathBuf> = Vec::new();

    if workspace.is_self_contained() {
        check_no_symlinks(root_dir, &root.name, "sdist")?;
        sources.extend(collect_tree(root_dir)?);
    } else {
        // root configuration and sibling top-level files
        let read_dir = std::fs::read_dir(root_dir).map_err(|e| ArchiveError::Io {
            artifact: root_dir.display().to_string(),
            inner: e.into(),
        })?;
        for entry in read_dir {
            let entry = entry.map_err(|e| ArchiveError::Io {
                artifact: root_dir.display().to_string(),
                inner: e.into(),
            })?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if path.is_file() && !hidden {
                sources.push(path);
            }
        }

        for member in workspace.members() {
            check_no_symlinks(&member.source_root, &member.name, "sdist")?;
            sources.extend(collect_tree(&member.source_root)?);
        }
    }

    // user-selected extras and exclusions
    sources.extend(
        fs::glob_files(root_dir, &root.sdist.include).map_err(|e| ArchiveError::Io {
            artifact: root_dir.display().to_string(),
            inner: e,
        })?,
    );
    let excluded = fs::glob_files(root_dir, &root.sdist.exclude).map_err(|e| ArchiveError::Io {
        artifact: root_dir.display().to_string(),
        inner: e,
    })?;
    sources.retain(|path| !excluded.contains(path));

    sources.sort();
    sources.dedup();

    for source in sources {
        let rel = fs::relative_path(root_dir, &source);
        let archive_path = fs::archive_path(&rel);
        manifest.push(&mut owners, &root.name, source, archive_path)?;
    }

    Ok(manifest)
}

fn member_module(member: &ProjectDescriptor) -> Result<&crate::core::ModuleSource, BuildError> {
    member.module.as_ref().ok_or_else(|| {
        ConfigError::ModuleNotFound {
            module: member.snake_name(),
            dir: member.source_root.clone(),
        }
        .into()
    })
}

fn collect_tree(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let files = fs::collect_files(dir).map_err(|e| ArchiveError::Io {
        artifact: dir.display().to_string(),
        inner: e,
    })?;
    Ok(files
        .into_iter()
        .filter(|f| !is_hidden(&fs::relative_path(dir, f)))
        .collect())
}

/// Neither archive form represents symbolic links, and skipping one would
/// silently drop a file the member ships.
fn check_no_symlinks(dir: &Path, member: &str, format: &str) -> Result<(), BuildError> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| ArchiveError::Io {
            artifact: dir.display().to_string(),
            inner: e.into(),
        })?;
        if is_hidden(&fs::relative_path(dir, entry.path())) {
            continue;
        }
        if entry.path_is_symlink() {
            return Err(ProtocolError::Unsupported {
                operation: format.to_string(),
                reason: format!(
                    "member `{}` includes symbolic link `{}`",
                    member,
                    entry.path().display()
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Hidden check over a root-relative path.
fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('.') && name != "." && name != ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::BuildContext;
    use tempfile::TempDir;

    fn write_member(root: &Path, rel: &str, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("pyproject.toml"),
            format!("[project]\nname = \"{name}\"\nversion = \"0.1.0\"\n"),
        )
        .unwrap();
        for (path, content) in files {
            let full = dir.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
    }

    fn workspace(root: &Path) -> Workspace {
        Workspace::resolve(&BuildContext::new(root).unwrap()).unwrap()
    }

    #[test]
    fn test_wheel_layout_maps_modules() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n",
        )
        .unwrap();
        write_member(
            tmp.path(),
            "packages/a",
            "pkg-a",
            &[("pkg_a/__init__.py", ""), ("pkg_a/sub/mod.py", "x = 1")],
        );
        write_member(
            tmp.path(),
            "packages/b",
            "pkg-b",
            &[("src/pkg_b/__init__.py", "")],
        );

        let manifest = wheel_layout(&workspace(tmp.path())).unwrap();
        let paths: Vec<_> = manifest
            .entries
            .iter()
            .map(|e| e.archive_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["pkg_a/__init__.py", "pkg_a/sub/mod.py", "pkg_b/__init__.py"]
        );
    }

    #[test]
    fn test_wheel_layout_single_file_module() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"solo\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("solo.py"), "print('hi')").unwrap();

        let manifest = wheel_layout(&workspace(tmp.path())).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].archive_path, "solo.py");
    }

    #[test]
    fn test_duplicate_import_path_names_both_members() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n",
        )
        .unwrap();
        // both members claim the `pkg` import namespace
        write_member(tmp.path(), "packages/a", "pkg-a", &[("pkg/util.py", "a")]);
        std::fs::write(
            tmp.path().join("packages/a/pyproject.toml"),
            "[project]\nname = \"pkg-a\"\nversion = \"0.1.0\"\n\n[tool.wharf.package]\nmodule = \"pkg\"\n",
        )
        .unwrap();
        write_member(tmp.path(), "packages/b", "pkg-b", &[("pkg/util.py", "b")]);
        std::fs::write(
            tmp.path().join("packages/b/pyproject.toml"),
            "[project]\nname = \"pkg-b\"\nversion = \"0.1.0\"\n\n[tool.wharf.package]\nmodule = \"pkg\"\n",
        )
        .unwrap();

        let err = wheel_layout(&workspace(tmp.path())).unwrap_err();
        match err {
            BuildError::Archive(ArchiveError::DuplicateImportPath {
                path,
                first_member,
                second_member,
            }) => {
                assert_eq!(path, "pkg/util.py");
                assert_eq!(first_member, "pkg-a");
                assert_eq!(second_member, "pkg-b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_in_module_tree_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n",
        )
        .unwrap();
        write_member(
            tmp.path(),
            "packages/a",
            "pkg-a",
            &[("pkg_a/__init__.py", ""), ("pkg_a/real.py", "x = 1")],
        );
        std::os::unix::fs::symlink(
            tmp.path().join("packages/a/pkg_a/real.py"),
            tmp.path().join("packages/a/pkg_a/alias.py"),
        )
        .unwrap();

        let err = wheel_layout(&workspace(tmp.path())).unwrap_err();
        match err {
            BuildError::Protocol(ProtocolError::Unsupported { operation, reason }) => {
                assert_eq!(operation, "wheel");
                assert!(reason.contains("pkg-a"));
                assert!(reason.contains("alias.py"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_in_member_tree_rejected_for_sdist() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n",
        )
        .unwrap();
        write_member(
            tmp.path(),
            "packages/a",
            "pkg-a",
            &[("pkg_a/__init__.py", ""), ("notes.txt", "scratch")],
        );
        std::os::unix::fs::symlink(
            tmp.path().join("packages/a/notes.txt"),
            tmp.path().join("packages/a/notes-link.txt"),
        )
        .unwrap();

        let ws = workspace(tmp.path());
        let err = sdist_layout(&ws, &fs::normalize_path(tmp.path())).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Protocol(ProtocolError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_sdist_layout_keeps_member_subdirectories() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("README.md"), "readme").unwrap();
        write_member(
            tmp.path(),
            "packages/a",
            "pkg-a",
            &[("pkg_a/__init__.py", ""), ("tests/test_a.py", "")],
        );

        let ws = workspace(tmp.path());
        let manifest = sdist_layout(&ws, &fs::normalize_path(tmp.path())).unwrap();
        let paths: Vec<_> = manifest
            .entries
            .iter()
            .map(|e| e.archive_path.as_str())
            .collect();
        assert!(paths.contains(&"pyproject.toml"));
        assert!(paths.contains(&"README.md"));
        assert!(paths.contains(&"packages/a/pyproject.toml"));
        assert!(paths.contains(&"packages/a/pkg_a/__init__.py"));
        assert!(paths.contains(&"packages/a/tests/test_a.py"));
    }

    #[test]
    fn test_sdist_exclude_patterns() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"mono\"\nversion = \"1.0.0\"\n\n[tool.wharf.workspace]\npackages = [\"packages/*\"]\n\n[tool.wharf.sdist]\nexclude = [\"packages/*/notes.txt\"]\n",
        )
        .unwrap();
        write_member(
            tmp.path(),
            "packages/a",
            "pkg-a",
            &[("pkg_a/__init__.py", ""), ("notes.txt", "scratch")],
        );

        let ws = workspace(tmp.path());
        let manifest = sdist_layout(&ws, &fs::normalize_path(tmp.path())).unwrap();
        let paths: Vec<_> = manifest
            .entries
            .iter()
            .map(|e| e.archive_path.as_str())
            .collect();
        assert!(!paths.contains(&"packages/a/notes.txt"));
        assert!(paths.contains(&"packages/a/pkg_a/__init__.py"));
    }

    #[test]
    fn test_manifest_entries_carry_hash_and_size() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("solo")).unwrap();
        std::fs::write(tmp.path().join("solo/__init__.py"), "x = 1\n").unwrap();
        std::fs::write(
            tmp.path().join("pyproject.toml"),
            "[project]\nname = \"solo\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        let manifest = wheel_layout(&workspace(tmp.path())).unwrap();
        let entry = &manifest.entries[0];
        assert_eq!(entry.size, 6);
        assert_eq!(entry.hash, ContentHash::of_bytes(b"x = 1\n"));
    }
}
