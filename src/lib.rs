pub mod catalog;
pub mod compose;
pub mod deps;
pub mod error;
pub mod render;
pub mod spec;
pub mod validate;
pub mod writer;

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::compose::CompositionPlan;
use crate::deps::{Ecosystem, ManifestResult};
use crate::error::Result;
use crate::render::RenderedArtifact;
use crate::spec::ProjectSpec;
use crate::validate::{Severity, ValidationIssue};
use crate::writer::{CancelToken, FileOutcome, FileReport};

/// Overall outcome of a run that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Clean,
    /// Something needs the user's attention: skipped customized files or
    /// validation findings.
    WithWarnings,
}

/// Final report of one generation run. Returned to the caller; the engine
/// persists nothing beyond the sidecar manifest.
#[derive(Debug)]
pub struct GenerationResult {
    pub files: Vec<FileReport>,
    pub manifests: BTreeMap<Ecosystem, ManifestResult>,
    pub issues: Vec<ValidationIssue>,
}

impl GenerationResult {
    pub fn status(&self) -> RunStatus {
        let skipped = self
            .files
            .iter()
            .any(|f| f.outcome == FileOutcome::SkippedCustomized);
        if skipped || !self.issues.is_empty() {
            RunStatus::WithWarnings
        } else {
            RunStatus::Clean
        }
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| f.outcome == FileOutcome::SkippedCustomized)
    }

    pub fn has_validation_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Everything needed to execute a generation that has been planned but not
/// yet written: composition, rendered artifacts, and resolved manifests.
#[derive(Debug)]
pub struct FullGenerationPlan {
    pub spec: ProjectSpec,
    pub composition: CompositionPlan,
    pub artifacts: Vec<RenderedArtifact>,
    pub manifests: BTreeMap<Ecosystem, ManifestResult>,
}

/// Plan a generation: compose bundles, render every template in memory, and
/// resolve dependencies. Does **not** write any files to disk.
pub fn plan_generation(spec: ProjectSpec, catalog: &Catalog) -> Result<FullGenerationPlan> {
    let composition = compose::compose(&spec, catalog)?;
    let artifacts = render::render_plan(&composition, &spec.variables)?;
    let manifests = deps::resolve_dependencies(&composition.dependencies)?;

    Ok(FullGenerationPlan {
        spec,
        composition,
        artifacts,
        manifests,
    })
}

/// Execute a previously planned generation: write files and the sidecar
/// manifest, then validate the result.
pub fn execute_generation(
    plan: &FullGenerationPlan,
    cancel: &CancelToken,
) -> Result<GenerationResult> {
    let files = writer::write_project(&plan.artifacts, &plan.manifests, &plan.spec, cancel)?;

    let issues = validate::validate_project(
        &plan.spec.target_dir,
        &plan.artifacts,
        &plan.manifests,
        &plan.composition.entry_points,
        &plan.spec.variables,
    );

    Ok(GenerationResult {
        files,
        manifests: plan.manifests.clone(),
        issues,
    })
}

/// Generate a project from a resolved spec: plan, write, validate.
pub fn generate(spec: ProjectSpec, catalog: &Catalog) -> Result<GenerationResult> {
    generate_with_cancel(spec, catalog, &CancelToken::new())
}

pub fn generate_with_cancel(
    spec: ProjectSpec,
    catalog: &Catalog,
    cancel: &CancelToken,
) -> Result<GenerationResult> {
    let plan = plan_generation(spec, catalog)?;
    execute_generation(&plan, cancel)
}
