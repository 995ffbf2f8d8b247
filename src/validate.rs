use std::collections::BTreeMap;
use std::path::Path;

use crate::deps::{Ecosystem, ManifestResult};
use crate::render;
use crate::render::RenderedArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One post-write finding. Surfaced on the generation result; never undoes
/// the write.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub path: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn error(path: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Structural check of the target directory after writing: manifests parse,
/// no artifact carries a leftover placeholder, entry points exist.
pub fn validate_project(
    target_dir: &Path,
    artifacts: &[RenderedArtifact],
    manifests: &BTreeMap<Ecosystem, ManifestResult>,
    entry_points: &[String],
    variables: &BTreeMap<String, String>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for ecosystem in manifests.keys() {
        check_manifest(target_dir, *ecosystem, &mut issues);
    }

    // Defense in depth against a renderer bug: rendered output must be free
    // of placeholder tokens.
    for artifact in artifacts {
        if let Ok(text) = std::str::from_utf8(&artifact.content) {
            if render::has_placeholder(text) {
                let names = render::placeholder_names(text).join(", ");
                issues.push(ValidationIssue::error(
                    Some(artifact.relative_path.clone()),
                    format!("unresolved placeholder(s) in rendered output: {names}"),
                ));
            }
        }
        if render::has_placeholder(&artifact.relative_path) {
            issues.push(ValidationIssue::error(
                Some(artifact.relative_path.clone()),
                "unresolved placeholder in rendered path",
            ));
        }
    }

    for entry in entry_points {
        match render::substitute(entry, variables, entry) {
            Ok(rendered) => {
                if !target_dir.join(&rendered).exists() {
                    issues.push(ValidationIssue::error(
                        Some(rendered),
                        "required entry point file is missing",
                    ));
                }
            }
            Err(_) => {
                issues.push(ValidationIssue::warning(
                    Some(entry.clone()),
                    "entry point path references an unknown variable",
                ));
            }
        }
    }

    issues
}

/// Parse an emitted ecosystem manifest under its own format rules.
fn check_manifest(target_dir: &Path, ecosystem: Ecosystem, issues: &mut Vec<ValidationIssue>) {
    let filename = ecosystem.manifest_filename();
    let path = target_dir.join(filename);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            issues.push(ValidationIssue::error(
                Some(filename.to_string()),
                format!("could not read {ecosystem} manifest: {e}"),
            ));
            return;
        }
    };

    let parse_problem: Option<String> = match ecosystem {
        Ecosystem::Cargo => toml::from_str::<toml::Value>(&content)
            .err()
            .map(|e| e.to_string()),
        Ecosystem::Npm => serde_json::from_str::<serde_json::Value>(&content)
            .err()
            .map(|e| e.to_string()),
        Ecosystem::Pip => content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .find(|l| !l.contains("=="))
            .map(|l| format!("line is not a pinned requirement: {l}")),
        Ecosystem::Go => {
            if content.starts_with("module ") {
                None
            } else {
                Some("go.mod must begin with a module directive".to_string())
            }
        }
    };

    if let Some(problem) = parse_problem {
        issues.push(ValidationIssue::error(
            Some(filename.to_string()),
            format!("{ecosystem} manifest does not parse: {problem}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: &str, content: &str) -> RenderedArtifact {
        RenderedArtifact {
            relative_path: path.to_string(),
            content: content.as_bytes().to_vec(),
            customizable: false,
        }
    }

    fn no_vars() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn clean_tree_has_no_issues() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("main.go"), "package main").unwrap();

        let issues = validate_project(
            tmp.path(),
            &[artifact("main.go", "package main")],
            &BTreeMap::new(),
            &["main.go".to_string()],
            &no_vars(),
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn leftover_placeholder_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let issues = validate_project(
            tmp.path(),
            &[artifact("a.txt", "still has {{thing}}")],
            &BTreeMap::new(),
            &[],
            &no_vars(),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("thing"));
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut vars = no_vars();
        vars.insert("project_name".into(), "svc".into());

        let issues = validate_project(
            tmp.path(),
            &[],
            &BTreeMap::new(),
            &["{{project_name}}/main.rs".to_string()],
            &vars,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path.as_deref(), Some("svc/main.rs"));
    }

    #[test]
    fn corrupt_cargo_manifest_flagged() {
        use crate::deps::ManifestResult;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Cargo.toml"), "[broken").unwrap();

        let mut manifests = BTreeMap::new();
        manifests.insert(
            Ecosystem::Cargo,
            ManifestResult {
                ecosystem: Ecosystem::Cargo,
                pins: BTreeMap::new(),
            },
        );

        let issues = validate_project(tmp.path(), &[], &manifests, &[], &no_vars());
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("does not parse")));
    }

    #[test]
    fn unpinned_requirements_line_flagged() {
        use crate::deps::ManifestResult;

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("requirements.txt"), "flask>=2\n").unwrap();

        let mut manifests = BTreeMap::new();
        manifests.insert(
            Ecosystem::Pip,
            ManifestResult {
                ecosystem: Ecosystem::Pip,
                pins: BTreeMap::new(),
            },
        );

        let issues = validate_project(tmp.path(), &[], &manifests, &[], &no_vars());
        assert_eq!(issues.len(), 1);
    }
}
