pub mod sidecar;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::deps::{render_manifest, Ecosystem, ManifestResult};
use crate::error::{FormworkError, Result};
use crate::render::RenderedArtifact;
use crate::spec::{Mode, ProjectSpec};

use sidecar::GenerationManifest;

/// Terminal state of one planned artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Created fresh (create mode, or a path new to the project in update mode).
    Written,
    /// Replaced an on-disk file the user had not edited (or one the engine owns).
    Overwritten,
    /// Left untouched because the user edited it since the last run.
    SkippedCustomized,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub relative_path: String,
    pub outcome: FileOutcome,
}

/// External cancellation signal, checked between file writes. The in-flight
/// write always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Materialize rendered artifacts and ecosystem manifests into the target
/// directory. All writes are sequential; one writer per run.
pub fn write_project(
    artifacts: &[RenderedArtifact],
    manifests: &BTreeMap<Ecosystem, ManifestResult>,
    spec: &ProjectSpec,
    cancel: &CancelToken,
) -> Result<Vec<FileReport>> {
    let outputs = assemble_outputs(artifacts, manifests, spec);
    match spec.mode {
        Mode::Create => write_create(&outputs, spec, cancel),
        Mode::Update => write_update(&outputs, spec, cancel),
    }
}

/// The complete output set for a run: rendered artifacts plus one manifest
/// file per ecosystem, all engine-owned.
fn assemble_outputs(
    artifacts: &[RenderedArtifact],
    manifests: &BTreeMap<Ecosystem, ManifestResult>,
    spec: &ProjectSpec,
) -> Vec<RenderedArtifact> {
    let fallback;
    let project_name = match spec.variables.get("project_name") {
        Some(name) => name.as_str(),
        None => {
            fallback = spec
                .target_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "project".to_string());
            fallback.as_str()
        }
    };

    let mut outputs: Vec<RenderedArtifact> = artifacts.to_vec();
    for result in manifests.values() {
        outputs.push(RenderedArtifact {
            relative_path: result.ecosystem.manifest_filename().to_string(),
            content: render_manifest(result, project_name).into_bytes(),
            customizable: false,
        });
    }
    outputs
}

/// Create mode: every artifact goes Planned -> Written. Any failure or
/// cancellation rolls back everything this run created, because a partially
/// created project is actively misleading.
fn write_create(
    outputs: &[RenderedArtifact],
    spec: &ProjectSpec,
    cancel: &CancelToken,
) -> Result<Vec<FileReport>> {
    let mut rollback = RollbackLog::default();
    match write_create_inner(outputs, spec, cancel, &mut rollback) {
        Ok(reports) => Ok(reports),
        Err(e) => {
            rollback.undo(&spec.target_dir);
            Err(e)
        }
    }
}

fn write_create_inner(
    outputs: &[RenderedArtifact],
    spec: &ProjectSpec,
    cancel: &CancelToken,
    rollback: &mut RollbackLog,
) -> Result<Vec<FileReport>> {
    create_dir_tracked(&spec.target_dir, rollback)?;

    let mut reports = Vec::with_capacity(outputs.len());
    for artifact in outputs {
        if cancel.is_cancelled() {
            return Err(FormworkError::Cancelled);
        }

        let dest = spec.target_dir.join(&artifact.relative_path);
        if dest.exists() && !spec.force {
            return Err(FormworkError::FileExists { path: dest });
        }

        if let Some(parent) = dest.parent() {
            create_dir_tracked(parent, rollback)?;
        }
        std::fs::write(&dest, &artifact.content)
            .map_err(|e| FormworkError::io(format!("writing {}", dest.display()), e))?;
        rollback.files.push(dest);

        reports.push(FileReport {
            relative_path: artifact.relative_path.clone(),
            outcome: FileOutcome::Written,
        });
    }

    let mut manifest = GenerationManifest::default();
    for artifact in outputs {
        if artifact.customizable {
            manifest.files.insert(
                artifact.relative_path.clone(),
                sidecar::hash_bytes(&artifact.content),
            );
        }
    }
    sidecar::store(&spec.target_dir, &manifest)?;

    Ok(reports)
}

/// Update mode: per-artifact Planned -> {Written | SkippedCustomized |
/// Overwritten}, hash-checked against the previous run's sidecar. No
/// rollback: applied changes are each independently correct and the target
/// is a pre-existing, user-owned tree.
fn write_update(
    outputs: &[RenderedArtifact],
    spec: &ProjectSpec,
    cancel: &CancelToken,
) -> Result<Vec<FileReport>> {
    let prior = sidecar::load(&spec.target_dir)?.unwrap_or_default();

    let mut reports = Vec::with_capacity(outputs.len());
    let mut next_manifest = GenerationManifest::default();
    let mut cancelled = false;

    for artifact in outputs {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let dest = spec.target_dir.join(&artifact.relative_path);
        let outcome = if !artifact.customizable {
            let existed = dest.exists();
            write_file(&dest, &artifact.content)?;
            if existed {
                FileOutcome::Overwritten
            } else {
                FileOutcome::Written
            }
        } else {
            match prior.files.get(&artifact.relative_path) {
                // Not tracked by any prior run: a new file.
                None => {
                    write_file(&dest, &artifact.content)?;
                    next_manifest.files.insert(
                        artifact.relative_path.clone(),
                        sidecar::hash_bytes(&artifact.content),
                    );
                    FileOutcome::Written
                }
                Some(recorded) => {
                    let on_disk = sidecar::hash_file(&dest)?;
                    if on_disk.as_deref() == Some(recorded.as_str()) {
                        write_file(&dest, &artifact.content)?;
                        next_manifest.files.insert(
                            artifact.relative_path.clone(),
                            sidecar::hash_bytes(&artifact.content),
                        );
                        FileOutcome::Overwritten
                    } else {
                        // Edited (or deleted) by the user since the last run.
                        // Carry the recorded hash forward so later runs still
                        // compare against the last content the engine wrote.
                        next_manifest
                            .files
                            .insert(artifact.relative_path.clone(), recorded.clone());
                        FileOutcome::SkippedCustomized
                    }
                }
            }
        };

        reports.push(FileReport {
            relative_path: artifact.relative_path.clone(),
            outcome,
        });
    }

    // Artifacts not reached before cancellation keep their prior entries.
    if cancelled {
        for artifact in outputs.iter().skip(reports.len()) {
            if let Some(recorded) = prior.files.get(&artifact.relative_path) {
                next_manifest
                    .files
                    .insert(artifact.relative_path.clone(), recorded.clone());
            }
        }
    }

    sidecar::store(&spec.target_dir, &next_manifest)?;

    if cancelled {
        return Err(FormworkError::Cancelled);
    }
    Ok(reports)
}

fn write_file(dest: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FormworkError::io(format!("creating directory {}", parent.display()), e))?;
    }
    std::fs::write(dest, content)
        .map_err(|e| FormworkError::io(format!("writing {}", dest.display()), e))
}

/// Everything a create run added to disk, in creation order.
#[derive(Debug, Default)]
struct RollbackLog {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl RollbackLog {
    /// Best-effort removal of everything this run created, files first,
    /// then directories deepest-first. The sidecar goes with them.
    fn undo(&self, target_dir: &Path) {
        let _ = std::fs::remove_file(target_dir.join(sidecar::SIDECAR_FILE));
        for file in self.files.iter().rev() {
            let _ = std::fs::remove_file(file);
        }
        let mut dirs: Vec<&PathBuf> = self.dirs.iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            let _ = std::fs::remove_dir(dir);
        }
    }
}

/// `create_dir_all` that records which directories did not exist before, so
/// rollback removes exactly what this run introduced.
fn create_dir_tracked(dir: &Path, rollback: &mut RollbackLog) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(dir);
    while let Some(current) = cursor {
        if current.exists() || current.as_os_str().is_empty() {
            break;
        }
        missing.push(current.to_path_buf());
        cursor = current.parent();
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| FormworkError::io(format!("creating directory {}", dir.display()), e))?;
    rollback.dirs.extend(missing);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: &str, content: &str, customizable: bool) -> RenderedArtifact {
        RenderedArtifact {
            relative_path: path.to_string(),
            content: content.as_bytes().to_vec(),
            customizable,
        }
    }

    fn spec_for(target: &Path, mode: Mode) -> ProjectSpec {
        let mut variables = BTreeMap::new();
        variables.insert("project_name".to_string(), "svc".to_string());
        ProjectSpec {
            platform: crate::spec::Platform::BackendApi,
            framework: "actix".into(),
            features: vec![],
            target_dir: target.to_path_buf(),
            mode,
            force: false,
            variables,
        }
    }

    #[test]
    fn create_writes_everything_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out");
        let artifacts = vec![
            artifact("src/main.rs", "fn main() {}", true),
            artifact(".ci/pipeline.yaml", "steps: []", false),
        ];

        let reports = write_project(
            &artifacts,
            &BTreeMap::new(),
            &spec_for(&target, Mode::Create),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome == FileOutcome::Written));
        assert!(target.join("src/main.rs").exists());
        assert!(target.join(".ci/pipeline.yaml").exists());

        let manifest = sidecar::load(&target).unwrap().unwrap();
        assert!(manifest.files.contains_key("src/main.rs"));
        assert!(
            !manifest.files.contains_key(".ci/pipeline.yaml"),
            "only customizable artifacts are tracked"
        );
    }

    #[test]
    fn create_rejects_existing_file_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("kept.txt"), "user content").unwrap();

        let artifacts = vec![
            artifact("new.txt", "new", false),
            artifact("kept.txt", "overwrite?", false),
        ];
        let err = write_project(
            &artifacts,
            &BTreeMap::new(),
            &spec_for(&target, Mode::Create),
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, FormworkError::FileExists { .. }));
        // Rollback removed the file written before the failure, but not the
        // user's pre-existing file.
        assert!(!target.join("new.txt").exists());
        assert_eq!(
            std::fs::read_to_string(target.join("kept.txt")).unwrap(),
            "user content"
        );
    }

    #[test]
    fn create_force_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("a.txt"), "old").unwrap();

        let mut spec = spec_for(&target, Mode::Create);
        spec.force = true;
        write_project(
            &[artifact("a.txt", "new", false)],
            &BTreeMap::new(),
            &spec,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(target.join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn create_cancellation_rolls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = write_project(
            &[artifact("a.txt", "a", false)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Create),
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, FormworkError::Cancelled));
        assert!(!target.exists(), "rollback removes the created target dir");
    }

    #[test]
    fn update_overwrites_unedited_customizable_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();

        // Prior run wrote v1.
        std::fs::write(target.join("app.conf"), "v1").unwrap();
        let mut prior = GenerationManifest::default();
        prior
            .files
            .insert("app.conf".into(), sidecar::hash_bytes(b"v1"));
        sidecar::store(&target, &prior).unwrap();

        let reports = write_project(
            &[artifact("app.conf", "v2", true)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports[0].outcome, FileOutcome::Overwritten);
        assert_eq!(std::fs::read_to_string(target.join("app.conf")).unwrap(), "v2");

        let next = sidecar::load(&target).unwrap().unwrap();
        assert_eq!(next.files["app.conf"], sidecar::hash_bytes(b"v2"));
    }

    #[test]
    fn update_preserves_user_edit() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();

        std::fs::write(target.join("app.conf"), "user edited").unwrap();
        let mut prior = GenerationManifest::default();
        prior
            .files
            .insert("app.conf".into(), sidecar::hash_bytes(b"v1"));
        sidecar::store(&target, &prior).unwrap();

        let reports = write_project(
            &[artifact("app.conf", "v2", true)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports[0].outcome, FileOutcome::SkippedCustomized);
        assert_eq!(
            std::fs::read_to_string(target.join("app.conf")).unwrap(),
            "user edited"
        );

        // The recorded hash is carried forward, not replaced.
        let next = sidecar::load(&target).unwrap().unwrap();
        assert_eq!(next.files["app.conf"], sidecar::hash_bytes(b"v1"));
    }

    #[test]
    fn update_respects_user_deletion() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();

        let mut prior = GenerationManifest::default();
        prior
            .files
            .insert("optional.txt".into(), sidecar::hash_bytes(b"v1"));
        sidecar::store(&target, &prior).unwrap();
        // File is gone from disk: the user deleted it.

        let reports = write_project(
            &[artifact("optional.txt", "v2", true)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports[0].outcome, FileOutcome::SkippedCustomized);
        assert!(!target.join("optional.txt").exists());
    }

    #[test]
    fn update_always_overwrites_engine_owned_files() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();

        std::fs::write(target.join("pipeline.yaml"), "user tampering").unwrap();
        sidecar::store(&target, &GenerationManifest::default()).unwrap();

        let reports = write_project(
            &[artifact("pipeline.yaml", "canonical", false)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports[0].outcome, FileOutcome::Overwritten);
        assert_eq!(
            std::fs::read_to_string(target.join("pipeline.yaml")).unwrap(),
            "canonical"
        );
    }

    #[test]
    fn update_new_customizable_file_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();
        sidecar::store(&target, &GenerationManifest::default()).unwrap();

        let reports = write_project(
            &[artifact("src/extra.rs", "pub fn extra() {}", true)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(reports[0].outcome, FileOutcome::Written);
        let next = sidecar::load(&target).unwrap().unwrap();
        assert!(next.files.contains_key("src/extra.rs"));
    }

    #[test]
    fn update_cancellation_does_not_roll_back() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().to_path_buf();
        sidecar::store(&target, &GenerationManifest::default()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = write_project(
            &[artifact("a.txt", "a", false)],
            &BTreeMap::new(),
            &spec_for(&target, Mode::Update),
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, FormworkError::Cancelled));
        // Nothing was torn down; the marker file survives.
        assert!(target.join(sidecar::SIDECAR_FILE).exists());
    }

    #[test]
    fn manifests_are_written_as_engine_owned_files() {
        use crate::deps::{Ecosystem, ManifestResult};

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out");

        let mut pins = BTreeMap::new();
        pins.insert("serde".to_string(), semver::Version::new(1, 0, 210));
        let mut manifests = BTreeMap::new();
        manifests.insert(
            Ecosystem::Cargo,
            ManifestResult {
                ecosystem: Ecosystem::Cargo,
                pins,
            },
        );

        write_project(
            &[],
            &manifests,
            &spec_for(&target, Mode::Create),
            &CancelToken::new(),
        )
        .unwrap();

        let content = std::fs::read_to_string(target.join("Cargo.toml")).unwrap();
        assert!(content.contains("serde = \"=1.0.210\""));
        assert!(content.contains("name = \"svc\""));
    }
}
