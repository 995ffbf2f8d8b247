use std::collections::BTreeMap;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::deps::{DepConstraint, Ecosystem};
use crate::error::{FormworkError, Result};
use crate::spec::Platform;

/// Root structure deserialized from a bundle.toml file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleManifest {
    pub bundle: BundleMetadata,

    /// Variable schema in declaration order.
    #[serde(default)]
    pub variables: BTreeMap<String, VariableSpec>,

    #[serde(default)]
    pub files: FilesSection,

    #[serde(default)]
    pub dependencies: Vec<DependencyDecl>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleMetadata {
    pub id: String,
    pub kind: BundleKind,
    pub description: Option<String>,

    /// Base bundles: the one platform this bundle scaffolds.
    pub platform: Option<Platform>,

    /// Feature bundles: compatible platforms (empty means any).
    #[serde(default)]
    pub platforms: Vec<Platform>,

    /// Base bundles: frameworks provided. Feature bundles: compatible
    /// frameworks (empty means any).
    #[serde(default)]
    pub frameworks: Vec<String>,

    #[serde(default)]
    pub conflicts_with: Vec<String>,

    /// Files that must exist in the target after generation. Paths may
    /// contain `{{name}}` placeholders.
    #[serde(default)]
    pub entry_points: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    Base,
    Feature,
}

/// Schema entry for a single template variable.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VariableSpec {
    #[serde(default)]
    pub required: bool,

    /// Default value applied when the user supplies nothing.
    pub default: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilesSection {
    /// Glob patterns for files update mode may skip when user-edited.
    /// Everything not matched is engine-owned and always overwritten.
    #[serde(default)]
    pub customizable: Vec<String>,
}

/// One dependency constraint as declared in bundle.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyDecl {
    pub ecosystem: Ecosystem,
    pub name: String,

    /// A semver range, e.g. ">=4, <5".
    pub range: String,

    /// Closed list of known-good versions. Resolution only ever pins one of
    /// these; there is no registry query.
    pub candidates: Vec<String>,
}

impl DependencyDecl {
    /// Parse the declared range and candidates into a typed constraint.
    pub fn parse(&self) -> Result<DepConstraint> {
        let range =
            VersionReq::parse(&self.range).map_err(|e| FormworkError::InvalidVersionRange {
                name: self.name.clone(),
                range: self.range.clone(),
                source: e,
            })?;

        let mut candidates = Vec::with_capacity(self.candidates.len());
        for cand in &self.candidates {
            let version =
                Version::parse(cand).map_err(|e| FormworkError::InvalidVersionRange {
                    name: self.name.clone(),
                    range: cand.clone(),
                    source: e,
                })?;
            candidates.push(version);
        }

        Ok(DepConstraint {
            ecosystem: self.ecosystem,
            name: self.name.clone(),
            range,
            range_display: self.range.clone(),
            candidates,
        })
    }
}

impl BundleManifest {
    /// Validate the manifest for internal consistency.
    pub fn validate(&self) -> Result<()> {
        match self.bundle.kind {
            BundleKind::Base => {
                if self.bundle.platform.is_none() {
                    return Err(FormworkError::InvalidBundle {
                        id: self.bundle.id.clone(),
                        reason: "base bundles must declare a 'platform'".into(),
                    });
                }
                if self.bundle.frameworks.is_empty() {
                    return Err(FormworkError::InvalidBundle {
                        id: self.bundle.id.clone(),
                        reason: "base bundles must declare at least one framework".into(),
                    });
                }
            }
            BundleKind::Feature => {
                if self.bundle.platform.is_some() {
                    return Err(FormworkError::InvalidBundle {
                        id: self.bundle.id.clone(),
                        reason: "feature bundles use 'platforms', not 'platform'".into(),
                    });
                }
            }
        }

        if self.bundle.conflicts_with.iter().any(|c| *c == self.bundle.id) {
            return Err(FormworkError::InvalidBundle {
                id: self.bundle.id.clone(),
                reason: "a bundle cannot conflict with itself".into(),
            });
        }

        for (name, var) in &self.variables {
            if var.required && var.default.is_some() {
                return Err(FormworkError::InvalidBundle {
                    id: self.bundle.id.clone(),
                    reason: format!("variable '{name}' is required but also has a default"),
                });
            }
        }

        for dep in &self.dependencies {
            if dep.candidates.is_empty() {
                return Err(FormworkError::InvalidBundle {
                    id: self.bundle.id.clone(),
                    reason: format!("dependency '{}' declares no candidate versions", dep.name),
                });
            }
        }

        Ok(())
    }
}
