use std::collections::BTreeMap;

use crate::catalog::{Bundle, Catalog, TemplateFile};
use crate::deps::DepConstraint;
use crate::error::{FormworkError, Result};
use crate::spec::ProjectSpec;

/// The resolved, conflict-free merge of a base bundle and the selected
/// feature bundles for one generation run.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    /// Deduplicated templates, sorted by relative path. When two bundles
    /// declared the same path, the later bundle's file is the one here.
    pub files: Vec<TemplateFile>,
    /// All declared constraints, concatenated in priority order.
    /// Satisfiability is the dependency resolver's concern.
    pub dependencies: Vec<DepConstraint>,
    /// Required entry-point files from every selected bundle.
    pub entry_points: Vec<String>,
    /// Selected bundle ids, base first.
    pub bundle_ids: Vec<String>,
}

/// Select and merge bundles for a spec.
///
/// Priority order is fixed: the base bundle first, then feature bundles in
/// the order the user listed them. A later bundle declaring a path a
/// previous bundle already declared is an intentional override, not an
/// error. A `conflicts_with` edge between any two selected bundles is a
/// hard failure; conflicts are never resolved by priority.
pub fn compose(spec: &ProjectSpec, catalog: &Catalog) -> Result<CompositionPlan> {
    let base = catalog
        .base_for(spec.platform, &spec.framework)
        .ok_or_else(|| FormworkError::UnknownFramework {
            platform: spec.platform.to_string(),
            framework: spec.framework.clone(),
        })?;

    let mut selected: Vec<&Bundle> = vec![base];
    for feature in &spec.features {
        let bundle = catalog
            .feature(feature)
            .ok_or_else(|| FormworkError::UnknownFeature {
                feature: feature.clone(),
            })?;
        selected.push(bundle);
    }

    check_conflicts(&selected)?;

    // Later-wins merge keyed by relative path.
    let mut merged: BTreeMap<String, (TemplateFile, String)> = BTreeMap::new();
    for bundle in &selected {
        for template in &bundle.file_templates {
            merged.insert(
                template.relative_path.clone(),
                (template.clone(), bundle.id.clone()),
            );
        }
    }

    let mut dependencies = Vec::new();
    for bundle in &selected {
        dependencies.extend(bundle.dependency_constraints.iter().cloned());
    }

    // Ecosystem manifests are emitted from resolved constraints; a template
    // claiming the same path would give the file two owners.
    for constraint in &dependencies {
        let manifest_path = constraint.ecosystem.manifest_filename();
        if let Some((_, owner)) = merged.get(manifest_path) {
            return Err(FormworkError::ManifestPathCollision {
                path: manifest_path.to_string(),
                bundle: owner.clone(),
            });
        }
    }

    check_required_variables(&selected, spec)?;

    let mut entry_points: Vec<String> = Vec::new();
    for bundle in &selected {
        for entry in &bundle.entry_points {
            if !entry_points.contains(entry) {
                entry_points.push(entry.clone());
            }
        }
    }

    Ok(CompositionPlan {
        files: merged.into_values().map(|(t, _)| t).collect(),
        dependencies,
        entry_points,
        bundle_ids: selected.iter().map(|b| b.id.clone()).collect(),
    })
}

/// Pairwise `conflicts_with` check across every selected bundle.
fn check_conflicts(selected: &[&Bundle]) -> Result<()> {
    for (i, a) in selected.iter().enumerate() {
        for b in &selected[i + 1..] {
            if a.conflicts_with.contains(&b.id) || b.conflicts_with.contains(&a.id) {
                return Err(FormworkError::BundleConflict {
                    first: a.id.clone(),
                    second: b.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// The union of all selected bundles' variable schemas must be satisfied.
/// Unmet requirements aggregate into one error.
fn check_required_variables(selected: &[&Bundle], spec: &ProjectSpec) -> Result<()> {
    let mut missing: Vec<String> = Vec::new();
    for bundle in selected {
        for (name, var) in &bundle.required_variables {
            if var.required && !spec.variables.contains_key(name) && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(FormworkError::MissingVariables { names: missing })
    }
}
