use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{FormworkError, Result};
use crate::writer::sidecar::SIDECAR_FILE;

/// Target platform class. Frameworks are scoped per platform by the
/// catalog's base bundles rather than by a second enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Mobile,
    Frontend,
    BackendApi,
    Infrastructure,
    Fullstack,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Mobile => "mobile",
            Platform::Frontend => "frontend",
            Platform::BackendApi => "backend-api",
            Platform::Infrastructure => "infrastructure",
            Platform::Fullstack => "fullstack",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FormworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mobile" => Ok(Platform::Mobile),
            "frontend" => Ok(Platform::Frontend),
            "backend-api" => Ok(Platform::BackendApi),
            "infrastructure" => Ok(Platform::Infrastructure),
            "fullstack" => Ok(Platform::Fullstack),
            other => Err(FormworkError::UnknownPlatform {
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// Raw key/value user input, before validation against the catalog.
#[derive(Debug, Clone)]
pub struct RawInput {
    pub platform: String,
    pub framework: String,
    pub features: Vec<String>,
    pub target_dir: PathBuf,
    pub mode: Mode,
    pub force: bool,
    /// name=value overrides, in the order given.
    pub variables: Vec<(String, String)>,
}

/// Validated, normalized user intent. Built once per invocation by
/// [`resolve_spec`] and never mutated afterward.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    pub platform: Platform,
    pub framework: String,
    /// Feature ids in the order the user listed them; this order is the
    /// composition priority order.
    pub features: Vec<String>,
    pub target_dir: PathBuf,
    pub mode: Mode,
    pub force: bool,
    pub variables: BTreeMap<String, String>,
}

/// Turn raw input into a validated `ProjectSpec`.
pub fn resolve_spec(raw: RawInput, catalog: &Catalog) -> Result<ProjectSpec> {
    let platform = Platform::from_str(&raw.platform)?;

    let base = catalog.base_for(platform, &raw.framework).ok_or_else(|| {
        FormworkError::UnknownFramework {
            platform: platform.to_string(),
            framework: raw.framework.clone(),
        }
    })?;

    // Dedupe while preserving the user's order.
    let mut features: Vec<String> = Vec::new();
    for feature in &raw.features {
        if features.contains(feature) {
            continue;
        }
        let bundle = catalog
            .feature(feature)
            .ok_or_else(|| FormworkError::UnknownFeature {
                feature: feature.clone(),
            })?;
        if !bundle.applies_to(platform, &raw.framework) {
            return Err(FormworkError::IncompatibleFeature {
                feature: feature.clone(),
                platform: platform.to_string(),
                framework: raw.framework.clone(),
            });
        }
        features.push(feature.clone());
    }

    check_target_marker(&raw.target_dir, raw.mode, raw.force)?;

    let mut variables: BTreeMap<String, String> = raw.variables.into_iter().collect();

    // The project name defaults from the target directory's basename.
    if !variables.contains_key("project_name") {
        if let Some(basename) = raw.target_dir.file_name() {
            variables.insert(
                "project_name".to_string(),
                basename.to_string_lossy().to_string(),
            );
        }
    }

    // Apply declared defaults, then aggregate every unmet requirement into
    // one error instead of failing on the first.
    let selected: Vec<&crate::catalog::Bundle> = std::iter::once(base)
        .chain(features.iter().filter_map(|f| catalog.feature(f)))
        .collect();

    for bundle in &selected {
        for (name, var) in &bundle.required_variables {
            if !variables.contains_key(name) {
                if let Some(default) = &var.default {
                    variables.insert(name.clone(), default.clone());
                }
            }
        }
    }

    let mut missing: Vec<String> = Vec::new();
    for bundle in &selected {
        for (name, var) in &bundle.required_variables {
            if var.required && !variables.contains_key(name) && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
    }
    if !missing.is_empty() {
        missing.sort();
        return Err(FormworkError::MissingVariables { names: missing });
    }

    Ok(ProjectSpec {
        platform,
        framework: raw.framework,
        features,
        target_dir: raw.target_dir,
        mode: raw.mode,
        force: raw.force,
        variables,
    })
}

/// The sidecar generation manifest doubles as the project marker: create
/// mode must not find one (unless forced), update mode must.
fn check_target_marker(target_dir: &std::path::Path, mode: Mode, force: bool) -> Result<()> {
    let marker = target_dir.join(SIDECAR_FILE);
    match mode {
        Mode::Create => {
            if marker.exists() && !force {
                return Err(FormworkError::AlreadyGenerated {
                    path: target_dir.to_path_buf(),
                });
            }
        }
        Mode::Update => {
            if !marker.exists() {
                return Err(FormworkError::NotAProject {
                    path: target_dir.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}
