//! Metadata merging and conflict detection.
//!
//! Folds every member descriptor, in resolution order, into the root's
//! declared fields for each field the root marks dynamic. Conflicts are
//! detected at the point of folding so each one can name the offending
//! members, and they are collected rather than failing fast: one run
//! surfaces every problem.

use std::collections::BTreeMap;
use std::path::PathBuf;

use semver::Version;

use crate::core::project::{
    Author, DynamicField, License, ProjectDescriptor, Readme,
};
use crate::core::requirement::{normalize_name, Requirement};
use crate::core::requires::RequiresPython;
use crate::core::workspace::Workspace;
use crate::errors::{BuildError, ConfigError, Conflict, ConflictError};

/// The single aggregate descriptor fed to the distribution assembler.
#[derive(Debug, Clone)]
pub struct MergedDescriptor {
    pub name: String,
    pub version: Version,
    pub description: Option<String>,
    pub readme: Option<Readme>,
    pub keywords: Vec<String>,
    pub classifiers: Vec<String>,
    pub urls: BTreeMap<String, String>,
    pub authors: Vec<Author>,
    pub requires_python: Option<RequiresPython>,
    pub dependencies: Vec<Requirement>,
    pub entry_points: BTreeMap<String, BTreeMap<String, String>>,
    pub scripts: BTreeMap<String, String>,
    pub gui_scripts: BTreeMap<String, String>,
    pub license: Option<License>,
    /// Absolute paths of every declared license file, in member order
    pub license_files: Vec<PathBuf>,
}

impl MergedDescriptor {
    /// The import-name form of the distribution name.
    pub fn snake_name(&self) -> String {
        self.name.replace('-', "_")
    }
}

/// Merge a resolved workspace into one descriptor.
pub fn merge(workspace: &Workspace) -> Result<MergedDescriptor, BuildError> {
    merge_descriptors(workspace.root(), workspace.members())
}

/// Fold member descriptors into the root's fields.
///
/// Exposed separately from [`merge`] so the fold order (members in
/// resolution order, root's own statics last) is directly testable.
pub fn merge_descriptors(
    root: &ProjectDescriptor,
    members: &[ProjectDescriptor],
) -> Result<MergedDescriptor, BuildError> {
    let mut conflicts = Vec::new();

    // Identity first: a nameless member cannot be reported against later,
    // so it is excluded from every fold below.
    let named: Vec<&ProjectDescriptor> = members
        .iter()
        .filter(|member| {
            if member.name.is_empty() {
                conflicts.push(Conflict::MissingMemberIdentity {
                    dir: member.source_root.clone(),
                });
                false
            } else {
                true
            }
        })
        .collect();

    let dependencies = if root.is_dynamic(DynamicField::Dependencies) {
        fold_dependencies(root, &named)?
    } else {
        root.dependencies.clone()
    };

    let entry_points = if root.is_dynamic(DynamicField::EntryPoints) {
        fold_entry_points(root, &named, &mut conflicts)
    } else {
        root.entry_points.clone()
    };

    let scripts = if root.is_dynamic(DynamicField::Scripts) {
        fold_flat_group("scripts", &named, root, |p| &p.scripts, &mut conflicts)
    } else {
        root.scripts.clone()
    };

    let gui_scripts = if root.is_dynamic(DynamicField::GuiScripts) {
        fold_flat_group("gui-scripts", &named, root, |p| &p.gui_scripts, &mut conflicts)
    } else {
        root.gui_scripts.clone()
    };

    let requires_python = if root.is_dynamic(DynamicField::RequiresPython) {
        fold_requires_python(root, &named, &mut conflicts)
    } else {
        root.requires_python.clone()
    };

    let license = if root.is_dynamic(DynamicField::License) {
        fold_license(&named, &mut conflicts)
    } else {
        root.license.clone()
    };

    if !conflicts.is_empty() {
        for conflict in &conflicts {
            tracing::debug!(kind = conflict.kind(), "merge conflict");
        }
        return Err(ConflictError { conflicts }.into());
    }

    let license_files = collect_license_files(root, &named);

    Ok(MergedDescriptor {
        name: root.name.clone(),
        version: root.version.clone(),
        description: root.description.clone(),
        readme: root.readme.clone(),
        keywords: root.keywords.clone(),
        classifiers: root.classifiers.clone(),
        urls: root.urls.clone(),
        authors: root.authors.clone(),
        requires_python,
        dependencies,
        entry_points,
        scripts,
        gui_scripts,
        license,
        license_files,
    })
}

/// Concatenate member requirement lists in resolution order, append the
/// root's own statics last, and drop exact duplicates keeping the first
/// occurrence. Requirements naming a bundled member are checked against
/// that member's version and omitted.
fn fold_dependencies(
    root: &ProjectDescriptor,
    members: &[&ProjectDescriptor],
) -> Result<Vec<Requirement>, BuildError> {
    let bundled: BTreeMap<String, &Version> = members
        .iter()
        .map(|m| (normalize_name(&m.name), &m.version))
        .collect();

    let mut seen = Vec::new();
    let mut merged = Vec::new();

    let root_deps = root.dependencies.iter().map(|req| (&root.name, req));
    let all = members
        .iter()
        .flat_map(|m| m.dependencies.iter().map(move |req| (&m.name, req)))
        .chain(root_deps);

    for (declarer, req) in all {
        if let Some(version) = bundled.get(req.name()) {
            // the member ships inside this artifact; its requirement is
            // satisfied internally or not at all
            if normalize_name(declarer) == req.name() {
                continue;
            }
            if !req.admits(version) {
                return Err(ConfigError::MemberVersionMismatch {
                    dependent: declarer.clone(),
                    requirement: req.as_str().to_string(),
                    member: req.name().to_string(),
                    version: version.to_string(),
                }
                .into());
            }
            continue;
        }
        if !seen.contains(&req.as_str().to_string()) {
            seen.push(req.as_str().to_string());
            merged.push(req.clone());
        }
    }

    Ok(merged)
}

fn fold_entry_points(
    root: &ProjectDescriptor,
    members: &[&ProjectDescriptor],
    conflicts: &mut Vec<Conflict>,
) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut groups: Vec<&str> = members
        .iter()
        .flat_map(|m| m.entry_points.keys())
        .chain(root.entry_points.keys())
        .map(String::as_str)
        .collect();
    groups.sort_unstable();
    groups.dedup();

    let mut merged = BTreeMap::new();
    for group in groups {
        let member_maps: Vec<(&str, &BTreeMap<String, String>)> = members
            .iter()
            .filter_map(|m| m.entry_points.get(group).map(|eps| (m.name.as_str(), eps)))
            .collect();
        let root_map = root.entry_points.get(group);

        let folded = fold_group(group, &member_maps, root_map, &root.name, conflicts);
        if !folded.is_empty() {
            merged.insert(group.to_string(), folded);
        }
    }
    merged
}

fn fold_flat_group(
    group: &str,
    members: &[&ProjectDescriptor],
    root: &ProjectDescriptor,
    accessor: for<'a> fn(&'a ProjectDescriptor) -> &'a BTreeMap<String, String>,
    conflicts: &mut Vec<Conflict>,
) -> BTreeMap<String, String> {
    let member_maps: Vec<(&str, &BTreeMap<String, String>)> = members
        .iter()
        .map(|m| (m.name.as_str(), accessor(m)))
        .filter(|(_, map)| !map.is_empty())
        .collect();

    fold_group(group, &member_maps, Some(accessor(root)), &root.name, conflicts)
}

/// Merge `name -> target` maps key by key. The first declarer of a name
/// owns it; a later declarer with a different target is a conflict, and an
/// identical re-declaration is tolerated.
fn fold_group(
    group: &str,
    member_maps: &[(&str, &BTreeMap<String, String>)],
    root_map: Option<&BTreeMap<String, String>>,
    root_name: &str,
    conflicts: &mut Vec<Conflict>,
) -> BTreeMap<String, String> {
    let mut owners: BTreeMap<String, (String, String)> = BTreeMap::new();

    let root_iter = root_map
        .into_iter()
        .map(|map| (root_name, map));
    for (declarer, map) in member_maps.iter().copied().chain(root_iter) {
        for (name, target) in map {
            match owners.get(name) {
                None => {
                    owners.insert(name.clone(), (declarer.to_string(), target.clone()));
                }
                Some((first, existing)) if existing != target => {
                    conflicts.push(Conflict::DuplicateEntryPoint {
                        group: group.to_string(),
                        name: name.clone(),
                        first_member: first.clone(),
                        second_member: declarer.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    owners
        .into_iter()
        .map(|(name, (_, target))| (name, target))
        .collect()
}

/// Intersect every member's interpreter range, and the root's own last.
fn fold_requires_python(
    root: &ProjectDescriptor,
    members: &[&ProjectDescriptor],
    conflicts: &mut Vec<Conflict>,
) -> Option<RequiresPython> {
    let contributors: Vec<(&str, &RequiresPython)> = members
        .iter()
        .filter_map(|m| m.requires_python.as_ref().map(|r| (m.name.as_str(), r)))
        .chain(
            root.requires_python
                .as_ref()
                .map(|r| (root.name.as_str(), r)),
        )
        .collect();

    let merged = contributors
        .iter()
        .map(|(_, range)| (*range).clone())
        .reduce(|a, b| a.intersect(&b))?;

    if merged.is_unsatisfiable() {
        conflicts.push(Conflict::EmptyVersionIntersection {
            constraints: contributors
                .iter()
                .map(|(name, range)| (name.to_string(), range.to_string()))
                .collect(),
        });
        return None;
    }

    Some(merged)
}

/// Members must agree on a single license; differing declarations force
/// the root to pin one explicitly.
fn fold_license(
    members: &[&ProjectDescriptor],
    conflicts: &mut Vec<Conflict>,
) -> Option<License> {
    let mut distinct: Vec<(&str, &License)> = Vec::new();

    for member in members {
        let Some(license) = &member.license else {
            continue;
        };
        if let License::Text(text) = license {
            if text.is_empty() {
                continue;
            }
        }
        if !distinct.iter().any(|(_, seen)| *seen == license) {
            distinct.push((member.name.as_str(), license));
        }
    }

    match distinct.as_slice() {
        [] => None,
        [(_, license)] => Some((*license).clone()),
        multiple => {
            conflicts.push(Conflict::AmbiguousLicense {
                values: multiple
                    .iter()
                    .map(|(name, license)| (name.to_string(), license.describe()))
                    .collect(),
            });
            None
        }
    }
}

fn collect_license_files(
    root: &ProjectDescriptor,
    members: &[&ProjectDescriptor],
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let all = members
        .iter()
        .copied()
        .chain(std::iter::once(root));
    for project in all {
        if let Some(License::File(path)) = &project.license {
            let absolute = project.source_root.join(path);
            if !files.contains(&absolute) {
                files.push(absolute);
            }
        }
    }

    files
}
