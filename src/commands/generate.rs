use std::path::{Path, PathBuf};

use console::style;
use miette::bail;

use formwork::catalog::Catalog;
use formwork::spec::{resolve_spec, Mode, RawInput};
use formwork::validate::Severity;
use formwork::writer::{CancelToken, FileOutcome};
use formwork::{execute_generation, plan_generation, GenerationResult, RunStatus};

#[allow(clippy::too_many_arguments)]
pub fn run(
    platform: String,
    framework: String,
    output: String,
    catalog_dir: String,
    features: Vec<String>,
    data: Vec<String>,
    mode: Mode,
    force: bool,
    dry_run: bool,
) -> miette::Result<()> {
    let catalog = Catalog::load(Path::new(&catalog_dir))?;

    let mut variables = Vec::with_capacity(data.len());
    for pair in &data {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid -d value '{pair}': expected key=value");
        };
        variables.push((key.to_string(), value.to_string()));
    }

    let raw = RawInput {
        platform,
        framework,
        features,
        target_dir: PathBuf::from(&output),
        mode,
        force,
        variables,
    };

    let spec = resolve_spec(raw, &catalog)?;
    let plan = plan_generation(spec, &catalog)?;

    if dry_run {
        println!(
            "{} would write {} files to {}",
            style("plan:").cyan().bold(),
            plan.artifacts.len() + plan.manifests.len(),
            style(plan.spec.target_dir.display()).cyan()
        );
        for artifact in &plan.artifacts {
            println!("  {}", artifact.relative_path);
        }
        for result in plan.manifests.values() {
            println!("  {}", result.ecosystem.manifest_filename());
        }
        return Ok(());
    }

    let result = execute_generation(&plan, &CancelToken::new())?;
    print_summary(&plan.spec.target_dir, &result);

    match result.status() {
        RunStatus::Clean => Ok(()),
        RunStatus::WithWarnings => std::process::exit(2),
    }
}

fn print_summary(target_dir: &Path, result: &GenerationResult) {
    let written = result
        .files
        .iter()
        .filter(|f| f.outcome == FileOutcome::Written)
        .count();
    let overwritten = result
        .files
        .iter()
        .filter(|f| f.outcome == FileOutcome::Overwritten)
        .count();

    println!(
        "{} Project generated at {}",
        style("ok").green().bold(),
        style(target_dir.display()).cyan()
    );
    println!("  {written} files written, {overwritten} overwritten");

    for report in result.skipped() {
        println!(
            "  {} {} (edited by you; left untouched)",
            style("skipped:").yellow().bold(),
            report.relative_path
        );
    }

    for issue in &result.issues {
        let label = match issue.severity {
            Severity::Warning => style("warning:").yellow().bold(),
            Severity::Error => style("error:").red().bold(),
        };
        match &issue.path {
            Some(path) => println!("  {label} {path}: {}", issue.message),
            None => println!("  {label} {}", issue.message),
        }
    }
}
