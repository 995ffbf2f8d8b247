use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::{FormworkError, Result};

/// Target manifest format for a dependency constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Cargo,
    Npm,
    Pip,
    Go,
}

impl Ecosystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Ecosystem::Cargo => "cargo",
            Ecosystem::Npm => "npm",
            Ecosystem::Pip => "pip",
            Ecosystem::Go => "go",
        }
    }

    /// The manifest file this ecosystem owns at the target root.
    pub fn manifest_filename(self) -> &'static str {
        match self {
            Ecosystem::Cargo => "Cargo.toml",
            Ecosystem::Npm => "package.json",
            Ecosystem::Pip => "requirements.txt",
            Ecosystem::Go => "go.mod",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One version constraint declared by a bundle, already parsed.
#[derive(Debug, Clone)]
pub struct DepConstraint {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub range: VersionReq,
    /// The range as written in bundle.toml, for error reporting.
    pub range_display: String,
    /// Known-good versions the resolver may pin. There is no registry query.
    pub candidates: Vec<Version>,
}

/// Resolved, pinned dependency list for one ecosystem. Iteration order is
/// lexicographic by package name, so emission is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResult {
    pub ecosystem: Ecosystem,
    pub pins: BTreeMap<String, Version>,
}

/// Merge constraints from a composition plan into one pinned manifest per
/// ecosystem.
///
/// Per `(ecosystem, name)` group, a candidate is eligible only if it
/// satisfies every declared range; the highest eligible candidate wins. No
/// eligible candidate is a hard failure: the resolver never picks "the
/// newest declared version" from ranges that do not overlap.
pub fn resolve_dependencies(
    constraints: &[DepConstraint],
) -> Result<BTreeMap<Ecosystem, ManifestResult>> {
    let mut groups: BTreeMap<(Ecosystem, String), Vec<&DepConstraint>> = BTreeMap::new();
    for constraint in constraints {
        groups
            .entry((constraint.ecosystem, constraint.name.clone()))
            .or_default()
            .push(constraint);
    }

    let mut manifests: BTreeMap<Ecosystem, ManifestResult> = BTreeMap::new();

    for ((ecosystem, name), group) in groups {
        let mut pool: Vec<&Version> = group.iter().flat_map(|c| &c.candidates).collect();
        pool.sort();
        pool.dedup();

        let pinned = pool
            .into_iter()
            .filter(|v| group.iter().all(|c| c.range.matches(v)))
            .max()
            .cloned();

        let Some(version) = pinned else {
            return Err(FormworkError::DependencyConflict {
                ecosystem: ecosystem.to_string(),
                name,
                ranges: group.iter().map(|c| c.range_display.clone()).collect(),
            });
        };

        manifests
            .entry(ecosystem)
            .or_insert_with(|| ManifestResult {
                ecosystem,
                pins: BTreeMap::new(),
            })
            .pins
            .insert(name, version);
    }

    Ok(manifests)
}

/// Serialize a manifest into its ecosystem's file format. Output depends only
/// on the inputs, byte for byte.
pub fn render_manifest(result: &ManifestResult, project_name: &str) -> String {
    match result.ecosystem {
        Ecosystem::Cargo => {
            let mut out = String::new();
            let _ = writeln!(out, "[package]");
            let _ = writeln!(out, "name = \"{project_name}\"");
            let _ = writeln!(out, "version = \"0.1.0\"");
            let _ = writeln!(out, "edition = \"2021\"");
            let _ = writeln!(out);
            let _ = writeln!(out, "[dependencies]");
            for (name, version) in &result.pins {
                let _ = writeln!(out, "{name} = \"={version}\"");
            }
            out
        }
        Ecosystem::Npm => {
            let deps: BTreeMap<&str, String> = result
                .pins
                .iter()
                .map(|(name, version)| (name.as_str(), version.to_string()))
                .collect();
            let manifest = serde_json::json!({
                "name": project_name,
                "version": "0.1.0",
                "private": true,
                "dependencies": deps,
            });
            // json! with BTreeMap values keeps keys sorted
            let mut out = serde_json::to_string_pretty(&manifest)
                .expect("static structure serializes");
            out.push('\n');
            out
        }
        Ecosystem::Pip => {
            let mut out = String::new();
            for (name, version) in &result.pins {
                let _ = writeln!(out, "{name}=={version}");
            }
            out
        }
        Ecosystem::Go => {
            let mut out = String::new();
            let _ = writeln!(out, "module {project_name}");
            let _ = writeln!(out);
            let _ = writeln!(out, "go 1.22");
            let _ = writeln!(out);
            let _ = writeln!(out, "require (");
            for (name, version) in &result.pins {
                let _ = writeln!(out, "\t{name} v{version}");
            }
            let _ = writeln!(out, ")");
            out
        }
    }
}
