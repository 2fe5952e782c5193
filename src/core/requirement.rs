//! Requirement strings.
//!
//! Requirements are aggregated, never solved, so the string stays canonical
//! end to end. Only the distribution name and the version specifier are
//! pulled out: the name keys deduplication and the intra-workspace check,
//! the specifier lets that check probe whether a bundled member's version
//! is admitted.

use std::fmt;

use semver::{Version, VersionReq};

/// A single declared requirement, e.g. `requests[socks]>=2.28; python_version < "3.12"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    raw: String,
    name: String,
    specifier: Option<String>,
}

impl Requirement {
    /// Parse a requirement string.
    ///
    /// The name must lead the string; everything after it (extras,
    /// specifier, marker, URL) is preserved verbatim in the canonical form.
    pub fn parse(input: &str) -> Result<Self, String> {
        let raw = input.trim().to_string();
        if raw.is_empty() {
            return Err("requirement is empty".to_string());
        }

        let name_end = raw
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .unwrap_or(raw.len());
        if name_end == 0 {
            return Err(format!("requirement `{}` does not start with a name", raw));
        }
        let name = normalize_name(&raw[..name_end]);

        let rest = raw[name_end..].trim_start();
        // drop extras
        let rest = match rest.strip_prefix('[') {
            Some(after) => match after.find(']') {
                Some(close) => after[close + 1..].trim_start(),
                None => return Err(format!("unclosed extras in requirement `{}`", raw)),
            },
            None => rest,
        };
        // the specifier runs to the marker separator, if any
        let spec = rest.split(';').next().unwrap_or("").trim();
        let specifier = if spec.is_empty() || spec.starts_with('@') {
            None
        } else {
            Some(spec.trim_matches(|c| c == '(' || c == ')').to_string())
        };

        Ok(Requirement {
            raw,
            name,
            specifier,
        })
    }

    /// The normalized distribution name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical requirement string, as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the specifier admits a concrete version.
    ///
    /// Used for intra-workspace requirements only. A specifier that cannot
    /// be expressed as a semver range is treated as admitting, since a
    /// mismatch cannot be proven.
    pub fn admits(&self, version: &Version) -> bool {
        let Some(spec) = &self.specifier else {
            return true;
        };
        let translated = spec.replace("==", "=").replace("~=", "~");
        match VersionReq::parse(&translated) {
            Ok(req) => req.matches(version),
            Err(_) => true,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Normalize a distribution name: lowercase, runs of `-`/`_`/`.` collapse
/// to a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}
