//! Rendering of the synthesized distribution metadata.
//!
//! The merged descriptor becomes three generated texts: the core metadata
//! file (`METADATA` in a wheel, `PKG-INFO` in an sdist), the wheel's
//! `WHEEL` file, and `entry_points.txt`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::project::License;
use crate::core::MergedDescriptor;
use crate::errors::{ArchiveError, BuildError};

/// Distribution file naming for a pure, interpreter-independent wheel.
#[derive(Debug, Clone)]
pub struct DistName {
    name: String,
    version: String,
}

impl DistName {
    pub fn new(merged: &MergedDescriptor) -> Self {
        DistName {
            name: escape_component(&merged.name),
            version: escape_component(&merged.version.to_string()),
        }
    }

    /// The wheel tag; everything built here is pure Python.
    pub fn tag(&self) -> &'static str {
        "py3-none-any"
    }

    /// `{name}-{version}-py3-none-any.whl`
    pub fn wheel_file(&self) -> String {
        format!("{}-{}-{}.whl", self.name, self.version, self.tag())
    }

    /// `{name}-{version}.dist-info`
    pub fn dist_info(&self) -> String {
        format!("{}-{}.dist-info", self.name, self.version)
    }

    /// `{name}-{version}.tar.gz`
    pub fn sdist_file(&self) -> String {
        format!("{}-{}.tar.gz", self.name, self.version)
    }

    /// The sdist's single top-level directory, `{name}-{version}`.
    pub fn sdist_dir(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Escape a filename component: runs of characters outside `[A-Za-z0-9.]`
/// collapse to a single underscore.
fn escape_component(value: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"[^\w\d.]+").unwrap());
    pattern.replace_all(value, "_").into_owned()
}

/// Render the `WHEEL` file.
pub fn wheel_info(dist: &DistName, generator: &str) -> String {
    format!(
        "Wheel-Version: 1.0\n\
         Generator: {}\n\
         Root-Is-Purelib: true\n\
         Tag: {}\n",
        generator,
        dist.tag()
    )
}

/// Render the core metadata text (`METADATA` / `PKG-INFO`).
///
/// Field order follows the metadata specification: headers first, the
/// readme as the body after a blank line.
pub fn core_metadata(merged: &MergedDescriptor, root: &Path) -> Result<String, BuildError> {
    let mut text = String::from("Metadata-Version: 2.1\n");
    text.push_str(&format!("Name: {}\n", merged.name));
    text.push_str(&format!("Version: {}\n", merged.version));

    if let Some(description) = &merged.description {
        text.push_str(&format!("Summary: {}\n", description));
    }

    let mut names = Vec::new();
    let mut emails = Vec::new();
    for author in &merged.authors {
        match (&author.name, &author.email) {
            (Some(name), Some(email)) => emails.push(format!("{} <{}>", name, email)),
            (None, Some(email)) => emails.push(email.clone()),
            (Some(name), None) => names.push(name.clone()),
            (None, None) => {}
        }
    }
    if !names.is_empty() {
        text.push_str(&format!("Author: {}\n", names.join(", ")));
    }
    if !emails.is_empty() {
        text.push_str(&format!("Author-email: {}\n", emails.join(", ")));
    }

    if !merged.keywords.is_empty() {
        text.push_str(&format!("Keywords: {}\n", merged.keywords.join(",")));
    }
    for (name, url) in &merged.urls {
        text.push_str(&format!("Project-URL: {}, {}\n", name, url));
    }
    for classifier in &merged.classifiers {
        text.push_str(&format!("Classifier: {}\n", classifier));
    }
    if let Some(License::Text(license)) = &merged.license {
        text.push_str(&format!("License: {}\n", license));
    }
    if let Some(requires_python) = &merged.requires_python {
        text.push_str(&format!("Requires-Python: {}\n", requires_python));
    }
    for requirement in &merged.dependencies {
        text.push_str(&format!("Requires-Dist: {}\n", requirement));
    }

    if let Some(readme) = &merged.readme {
        if let Some(content_type) = &readme.content_type {
            text.push_str(&format!("Description-Content-Type: {}\n", content_type));
        }
        if let Some(body) = &readme.text {
            text.push_str(&format!("\n{}\n", body));
        } else if let Some(path) = &readme.path {
            let full = root.join(path);
            let body = std::fs::read_to_string(&full).map_err(|e| ArchiveError::Io {
                artifact: full.display().to_string(),
                inner: e.into(),
            })?;
            text.push_str(&format!("\n{}\n", body));
        }
    }

    text.push('\n');
    Ok(text)
}

/// Render `entry_points.txt`: INI-style groups, sorted, with the script
/// tables folded in under their conventional group names.
pub fn entry_points_ini(merged: &MergedDescriptor) -> String {
    let mut groups: BTreeMap<&str, &BTreeMap<String, String>> = merged
        .entry_points
        .iter()
        .map(|(group, entries)| (group.as_str(), entries))
        .collect();
    if !merged.scripts.is_empty() {
        groups.insert("console_scripts", &merged.scripts);
    }
    if !merged.gui_scripts.is_empty() {
        groups.insert("gui_scripts", &merged.gui_scripts);
    }

    let mut text = String::new();
    for (group, entries) in groups {
        text.push_str(&format!("[{}]\n", group));
        for (name, target) in entries {
            text.push_str(&format!("{}={}\n", name, target));
        }
        text.push('\n');
    }
    text
}
