//! CLI integration tests for Wharf.
//!
//! These tests drive the hook-protocol binary over a fixture workspace,
//! from metadata preparation through wheel and sdist builds.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the wharf binary command.
fn wharf() -> Command {
    let mut cmd = Command::cargo_bin("wharf").unwrap();
    // pin the archive timestamp so runs compare byte-for-byte
    cmd.env("SOURCE_DATE_EPOCH", "1451606400");
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// Lay down a two-member fixture workspace.
fn write_workspace(root: &Path) {
    fs::write(
        root.join("pyproject.toml"),
        r#"
[project]
name = "acme-suite"
version = "1.0.0"
description = "Internal tooling, bundled"
dynamic = ["dependencies", "scripts", "entry-points", "requires-python", "license"]

[tool.wharf.workspace]
packages = ["packages/*"]
"#,
    )
    .unwrap();
    fs::write(root.join("README.md"), "# acme-suite\n").unwrap();

    let a = root.join("packages/alpha");
    fs::create_dir_all(a.join("acme_alpha")).unwrap();
    fs::write(a.join("acme_alpha/__init__.py"), "__version__ = \"0.3.0\"\n").unwrap();
    fs::write(a.join("acme_alpha/cli.py"), "def main():\n    pass\n").unwrap();
    fs::write(
        a.join("pyproject.toml"),
        r#"
[project]
name = "acme-alpha"
version = "0.3.0"
requires-python = ">=3.9"
dependencies = ["requests>=2"]
license = "MIT"

[project.scripts]
alpha = "acme_alpha.cli:main"
"#,
    )
    .unwrap();

    let b = root.join("packages/beta");
    fs::create_dir_all(b.join("src/acme_beta")).unwrap();
    fs::write(b.join("src/acme_beta/__init__.py"), "").unwrap();
    fs::write(
        b.join("pyproject.toml"),
        r#"
[project]
name = "acme-beta"
version = "0.1.0"
requires-python = "<3.13"
dependencies = ["requests>=2", "click>=8"]
license = "MIT"

[project.scripts]
beta = "acme_beta:main"
"#,
    )
    .unwrap();
}

// ============================================================================
// wharf metadata
// ============================================================================

#[test]
fn test_metadata_writes_dist_info() {
    let project = temp_dir();
    write_workspace(project.path());
    let out = temp_dir();

    wharf()
        .args(["metadata", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme_suite-1.0.0.dist-info"));

    let dist_info = out.path().join("acme_suite-1.0.0.dist-info");
    assert!(dist_info.join("METADATA").exists());
    assert!(dist_info.join("WHEEL").exists());
    assert!(dist_info.join("entry_points.txt").exists());
    assert!(dist_info.join("RECORD").exists());

    let metadata = fs::read_to_string(dist_info.join("METADATA")).unwrap();
    assert!(metadata.contains("Name: acme-suite"));
    assert!(metadata.contains("Requires-Python: >=3.9, <3.13"));
    assert!(metadata.contains("Requires-Dist: requests>=2"));
    assert!(metadata.contains("Requires-Dist: click>=8"));
    assert!(metadata.contains("License: MIT"));

    let entry_points = fs::read_to_string(dist_info.join("entry_points.txt")).unwrap();
    assert!(entry_points.contains("[console_scripts]"));
    assert!(entry_points.contains("alpha=acme_alpha.cli:main"));
    assert!(entry_points.contains("beta=acme_beta:main"));
}

// ============================================================================
// wharf wheel
// ============================================================================

#[test]
fn test_wheel_bundles_every_member() {
    let project = temp_dir();
    write_workspace(project.path());
    let out = temp_dir();

    wharf()
        .args(["wheel", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme_suite-1.0.0-py3-none-any.whl"));

    let wheel = out.path().join("acme_suite-1.0.0-py3-none-any.whl");
    let mut archive = zip::ZipArchive::new(fs::File::open(&wheel).unwrap()).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    assert!(names.contains(&"acme_alpha/__init__.py".to_string()));
    assert!(names.contains(&"acme_alpha/cli.py".to_string()));
    assert!(names.contains(&"acme_beta/__init__.py".to_string()));
    assert!(names.contains(&"acme_suite-1.0.0.dist-info/METADATA".to_string()));
    assert!(names.contains(&"acme_suite-1.0.0.dist-info/RECORD".to_string()));

    // RECORD rows carry hash and size for everything but itself
    let mut record = String::new();
    archive
        .by_name("acme_suite-1.0.0.dist-info/RECORD")
        .unwrap()
        .read_to_string(&mut record)
        .unwrap();
    for line in record.lines() {
        if line.ends_with(",,") {
            assert_eq!(line, "acme_suite-1.0.0.dist-info/RECORD,,");
        } else {
            assert!(line.contains(",sha256="), "unhashed row: {line}");
        }
    }
}

#[test]
fn test_wheel_builds_are_byte_identical() {
    let project = temp_dir();
    write_workspace(project.path());
    let out_a = temp_dir();
    let out_b = temp_dir();

    for out in [&out_a, &out_b] {
        wharf()
            .args(["wheel", out.path().to_str().unwrap()])
            .args(["--root", project.path().to_str().unwrap()])
            .assert()
            .success();
    }

    let name = "acme_suite-1.0.0-py3-none-any.whl";
    let bytes_a = fs::read(out_a.path().join(name)).unwrap();
    let bytes_b = fs::read(out_b.path().join(name)).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_editable_wheel_points_at_sources() {
    let project = temp_dir();
    write_workspace(project.path());
    let out = temp_dir();

    wharf()
        .args(["wheel", out.path().to_str().unwrap(), "--editable"])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .success();

    let wheel = out.path().join("acme_suite-1.0.0-py3-none-any.whl");
    let mut archive = zip::ZipArchive::new(fs::File::open(&wheel).unwrap()).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"acme_suite.pth".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("acme_alpha/")));

    let mut pth = String::new();
    archive
        .by_name("acme_suite.pth")
        .unwrap()
        .read_to_string(&mut pth)
        .unwrap();
    assert_eq!(pth.lines().count(), 2);
}

// ============================================================================
// wharf sdist
// ============================================================================

#[test]
fn test_sdist_preserves_member_trees() {
    let project = temp_dir();
    write_workspace(project.path());
    let out = temp_dir();

    wharf()
        .args(["sdist", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme_suite-1.0.0.tar.gz"));

    let sdist = out.path().join("acme_suite-1.0.0.tar.gz");
    let mut archive =
        tar::Archive::new(flate2::read::GzDecoder::new(fs::File::open(&sdist).unwrap()));
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().display().to_string())
        .collect();

    assert!(names.contains(&"acme_suite-1.0.0/pyproject.toml".to_string()));
    assert!(names.contains(&"acme_suite-1.0.0/README.md".to_string()));
    assert!(names.contains(&"acme_suite-1.0.0/packages/alpha/pyproject.toml".to_string()));
    assert!(names
        .contains(&"acme_suite-1.0.0/packages/beta/src/acme_beta/__init__.py".to_string()));
    assert!(names.contains(&"acme_suite-1.0.0/PKG-INFO".to_string()));
}

// ============================================================================
// wharf requires
// ============================================================================

#[test]
fn test_requires_prints_empty_json_array() {
    for kind in ["wheel", "sdist", "editable"] {
        wharf()
            .args(["requires", kind])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }
}

#[test]
fn test_requires_rejects_unknown_kind() {
    wharf()
        .args(["requires", "zipapp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown build kind"));
}

// ============================================================================
// failure modes
// ============================================================================

#[test]
fn test_conflicting_entry_points_fail_naming_both_members() {
    let project = temp_dir();
    write_workspace(project.path());
    // make beta claim alpha's script name with a different target
    let beta = project.path().join("packages/beta/pyproject.toml");
    let content = fs::read_to_string(&beta)
        .unwrap()
        .replace("beta = \"acme_beta:main\"", "alpha = \"acme_beta:other\"");
    fs::write(&beta, content).unwrap();
    let out = temp_dir();

    wharf()
        .args(["wheel", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("merge phase failed")
                .and(predicate::str::contains("acme-alpha"))
                .and(predicate::str::contains("acme-beta")),
        );
}

#[test]
fn test_empty_workspace_fails_in_resolve_phase() {
    let project = temp_dir();
    fs::write(
        project.path().join("pyproject.toml"),
        r#"
[project]
name = "empty"
version = "1.0.0"

[tool.wharf.workspace]
packages = ["packages/*"]
"#,
    )
    .unwrap();
    let out = temp_dir();

    wharf()
        .args(["wheel", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("resolve phase failed")
                .and(predicate::str::contains("no workspace members matched")),
        );
}

#[test]
fn test_self_contained_root_builds_alone() {
    let project = temp_dir();
    fs::create_dir_all(project.path().join("solo")).unwrap();
    fs::write(project.path().join("solo/__init__.py"), "").unwrap();
    fs::write(
        project.path().join("pyproject.toml"),
        "[project]\nname = \"solo\"\nversion = \"2.0.0\"\n",
    )
    .unwrap();
    let out = temp_dir();

    wharf()
        .args(["wheel", out.path().to_str().unwrap()])
        .args(["--root", project.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("solo-2.0.0-py3-none-any.whl"));
}
