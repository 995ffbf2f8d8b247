pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::deps::DepConstraint;
use crate::error::{FormworkError, Result};
use crate::render;
use crate::spec::Platform;

pub use schema::{BundleKind, BundleManifest, VariableSpec};

/// One file template inside a bundle.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    /// Path relative to the target directory. May contain `{{name}}`
    /// placeholders in any component.
    pub relative_path: String,
    /// Template source bytes.
    pub content: Vec<u8>,
    /// Whether update mode may skip overwriting this file once user-edited.
    pub customizable: bool,
    /// Binary templates pass through verbatim; only their path is rendered.
    pub binary: bool,
}

/// A loaded catalog unit: file templates, variable schema, and dependency
/// constraints for one platform/framework or one optional feature.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub id: String,
    pub kind: BundleKind,
    pub platform: Option<Platform>,
    pub platforms: Vec<Platform>,
    pub frameworks: Vec<String>,
    pub conflicts_with: Vec<String>,
    pub entry_points: Vec<String>,
    pub required_variables: BTreeMap<String, VariableSpec>,
    pub file_templates: Vec<TemplateFile>,
    pub dependency_constraints: Vec<DepConstraint>,
}

impl Bundle {
    /// Whether this feature bundle applies to the given platform/framework
    /// pair. Empty compatibility lists mean "any".
    pub fn applies_to(&self, platform: Platform, framework: &str) -> bool {
        let platform_ok = self.platforms.is_empty() || self.platforms.contains(&platform);
        let framework_ok =
            self.frameworks.is_empty() || self.frameworks.iter().any(|f| f == framework);
        platform_ok && framework_ok
    }
}

/// Immutable registry of bundles, loaded once and passed by reference into
/// every component. Tests construct minimal catalogs directly.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub bundles: Vec<Bundle>,
}

impl Catalog {
    /// Load a catalog from a directory tree: one subdirectory per bundle,
    /// each with a `bundle.toml` and a `templates/` subtree.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(FormworkError::CatalogNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| FormworkError::io(format!("reading catalog {}", dir.display()), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        entries.sort();

        let mut bundles = Vec::new();
        for bundle_dir in entries {
            if !bundle_dir.join("bundle.toml").exists() {
                continue;
            }
            bundles.push(load_bundle(&bundle_dir)?);
        }

        Ok(Catalog { bundles })
    }

    /// The base bundle serving a platform/framework pair, if any.
    pub fn base_for(&self, platform: Platform, framework: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| {
            b.kind == BundleKind::Base
                && b.platform == Some(platform)
                && b.frameworks.iter().any(|f| f == framework)
        })
    }

    /// Look up a feature bundle by id.
    pub fn feature(&self, id: &str) -> Option<&Bundle> {
        self.bundles
            .iter()
            .find(|b| b.kind == BundleKind::Feature && b.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id == id)
    }
}

/// Load a single bundle directory: parse and validate bundle.toml, then walk
/// templates/ collecting file templates in sorted order.
pub fn load_bundle(bundle_dir: &Path) -> Result<Bundle> {
    let manifest_path = bundle_dir.join("bundle.toml");
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| FormworkError::io(format!("reading {}", manifest_path.display()), e))?;

    let manifest: BundleManifest =
        toml::from_str(&content).map_err(|e| FormworkError::BundleManifestParse {
            path: manifest_path,
            source: e,
        })?;
    manifest.validate()?;

    let customizable_set = build_glob_set(&manifest.files.customizable)?;

    let mut constraints = Vec::with_capacity(manifest.dependencies.len());
    for decl in &manifest.dependencies {
        constraints.push(decl.parse()?);
    }

    let templates_dir = bundle_dir.join("templates");
    let file_templates = if templates_dir.is_dir() {
        collect_templates(&templates_dir, &customizable_set)?
    } else {
        Vec::new()
    };

    Ok(Bundle {
        id: manifest.bundle.id,
        kind: manifest.bundle.kind,
        platform: manifest.bundle.platform,
        platforms: manifest.bundle.platforms,
        frameworks: manifest.bundle.frameworks,
        conflicts_with: manifest.bundle.conflicts_with,
        entry_points: manifest.bundle.entry_points,
        required_variables: manifest.variables,
        file_templates,
        dependency_constraints: constraints,
    })
}

/// Walk a templates/ directory in sorted order so repeated loads produce the
/// same template ordering.
fn collect_templates(templates_dir: &Path, customizable: &GlobSet) -> Result<Vec<TemplateFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(templates_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(templates_dir)
            .expect("entry must be under templates dir");
        let rel_str = rel_path.to_string_lossy().replace('\\', "/");

        let content = std::fs::read(entry.path())
            .map_err(|e| FormworkError::io(format!("reading {}", entry.path().display()), e))?;

        files.push(TemplateFile {
            customizable: customizable.is_match(&rel_str),
            binary: is_binary(&content),
            relative_path: rel_str,
            content,
        });
    }

    Ok(files)
}

/// Binary detection via content_inspector (BOM-aware, null-byte scanning).
/// Inspects at most the first 8KB.
pub(crate) fn is_binary(content: &[u8]) -> bool {
    let head = &content[..content.len().min(8192)];
    !content_inspector::inspect(head).is_text()
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| FormworkError::GlobPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| FormworkError::GlobPattern {
        pattern: "<combined>".into(),
        source: e,
    })
}

/// Result of linting a catalog directory.
pub struct CatalogReport {
    pub bundle_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Lint a catalog directory without failing on the first problem.
pub fn check_catalog(dir: &Path) -> Result<CatalogReport> {
    if !dir.is_dir() {
        return Err(FormworkError::CatalogNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut bundles = Vec::new();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| FormworkError::io(format!("reading catalog {}", dir.display()), e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    for bundle_dir in &entries {
        if !bundle_dir.join("bundle.toml").exists() {
            warnings.push(format!(
                "{} has no bundle.toml and was skipped",
                bundle_dir.display()
            ));
            continue;
        }
        match load_bundle(bundle_dir) {
            Ok(bundle) => bundles.push(bundle),
            Err(e) => errors.push(format!("{}: {e}", bundle_dir.display())),
        }
    }

    // Cross-bundle checks need the full set loaded first.
    for bundle in &bundles {
        for conflict in &bundle.conflicts_with {
            if !bundles.iter().any(|b| &b.id == conflict) {
                warnings.push(format!(
                    "bundle '{}' conflicts with unknown bundle '{conflict}'",
                    bundle.id
                ));
            }
        }

        if bundle.kind == BundleKind::Feature && bundle.file_templates.is_empty() {
            warnings.push(format!(
                "feature bundle '{}' declares no file templates",
                bundle.id
            ));
        }

        for constraint in &bundle.dependency_constraints {
            for candidate in &constraint.candidates {
                if !constraint.range.matches(candidate) {
                    warnings.push(format!(
                        "bundle '{}': candidate {candidate} for '{}' is outside its own range '{}'",
                        bundle.id, constraint.name, constraint.range_display
                    ));
                }
            }
        }

        // Placeholders a bundle references but does not declare. The project
        // name is always supplied by the resolver, so it is exempt.
        for template in &bundle.file_templates {
            if template.binary {
                continue;
            }
            let mut names = render::placeholder_names(&template.relative_path);
            if let Ok(text) = std::str::from_utf8(&template.content) {
                names.extend(render::placeholder_names(text));
            }
            for name in names {
                if name != "project_name" && !bundle.required_variables.contains_key(&name) {
                    errors.push(format!(
                        "bundle '{}': template '{}' references undeclared variable '{name}'",
                        bundle.id, template.relative_path
                    ));
                }
            }
        }
    }

    Ok(CatalogReport {
        bundle_count: bundles.len(),
        warnings,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_bundle(dir: &Path, manifest: &str, files: &[(&str, &[u8])]) {
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(dir.join("bundle.toml"), manifest).unwrap();
        for (path, content) in files {
            let file_path = dir.join("templates").join(path);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(file_path, content).unwrap();
        }
    }

    const BASE_MANIFEST: &str = r#"
[bundle]
id = "backend-api-actix"
kind = "base"
platform = "backend-api"
frameworks = ["actix"]
entry_points = ["src/main.rs"]

[variables.project_name]
required = true

[files]
customizable = ["src/**"]
"#;

    #[test]
    fn load_bundle_classifies_templates() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(
            tmp.path(),
            BASE_MANIFEST,
            &[
                ("src/main.rs", b"fn main() {} // {{project_name}}"),
                ("README.md", b"# {{project_name}}"),
                ("assets/logo.png", b"\x89PNG\x0d\x0a\x1a\x0a\x00\x00"),
            ],
        );

        let bundle = load_bundle(tmp.path()).unwrap();
        assert_eq!(bundle.file_templates.len(), 3);

        let by_path = |p: &str| {
            bundle
                .file_templates
                .iter()
                .find(|t| t.relative_path == p)
                .unwrap()
        };
        assert!(by_path("src/main.rs").customizable);
        assert!(!by_path("README.md").customizable);
        assert!(by_path("assets/logo.png").binary);
        assert!(!by_path("src/main.rs").binary);
    }

    #[test]
    fn load_bundle_ordering_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(
            tmp.path(),
            BASE_MANIFEST,
            &[("b.txt", b"b"), ("a.txt", b"a"), ("src/main.rs", b"x")],
        );

        let bundle = load_bundle(tmp.path()).unwrap();
        let paths: Vec<&str> = bundle
            .file_templates
            .iter()
            .map(|t| t.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "src/main.rs"]);
    }

    #[test]
    fn catalog_lookups() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(&tmp.path().join("base"), BASE_MANIFEST, &[]);
        write_bundle(
            &tmp.path().join("feat"),
            r#"
[bundle]
id = "auth"
kind = "feature"
platforms = ["backend-api"]
"#,
            &[],
        );

        let catalog = Catalog::load(tmp.path()).unwrap();
        assert_eq!(catalog.bundles.len(), 2);
        assert!(catalog.base_for(Platform::BackendApi, "actix").is_some());
        assert!(catalog.base_for(Platform::Mobile, "actix").is_none());
        assert!(catalog.feature("auth").is_some());
        assert!(catalog.feature("backend-api-actix").is_none());
    }

    #[test]
    fn feature_applies_to_empty_lists_mean_any() {
        let bundle = Bundle {
            id: "ci".into(),
            kind: BundleKind::Feature,
            platform: None,
            platforms: vec![],
            frameworks: vec![],
            conflicts_with: vec![],
            entry_points: vec![],
            required_variables: BTreeMap::new(),
            file_templates: vec![],
            dependency_constraints: vec![],
        };
        assert!(bundle.applies_to(Platform::Mobile, "flutter"));
        assert!(bundle.applies_to(Platform::Frontend, "react"));
    }

    #[test]
    fn check_catalog_flags_undeclared_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(
            &tmp.path().join("base"),
            BASE_MANIFEST,
            &[("src/main.rs", b"// {{mystery_var}}")],
        );

        let report = check_catalog(tmp.path()).unwrap();
        assert_eq!(report.bundle_count, 1);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("mystery_var")));
    }

    #[test]
    fn check_catalog_flags_dangling_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(
            &tmp.path().join("feat"),
            r#"
[bundle]
id = "auth"
kind = "feature"
conflicts_with = ["no-such-bundle"]
"#,
            &[],
        );

        let report = check_catalog(tmp.path()).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("no-such-bundle")));
    }

    #[test]
    fn check_catalog_flags_candidate_outside_range() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(
            &tmp.path().join("base"),
            r#"
[bundle]
id = "backend-api-actix"
kind = "base"
platform = "backend-api"
frameworks = ["actix"]

[[dependencies]]
ecosystem = "cargo"
name = "actix-web"
range = ">=4, <5"
candidates = ["4.9.0", "5.1.0"]
"#,
            &[],
        );

        let report = check_catalog(tmp.path()).unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("5.1.0")));
    }
}
