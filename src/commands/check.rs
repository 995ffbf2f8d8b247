use std::path::Path;

use console::style;

use formwork::catalog::check_catalog;

pub fn run(catalog_dir: String) -> miette::Result<()> {
    let report = check_catalog(Path::new(&catalog_dir))?;

    println!(
        "Checked {} bundle(s) in {catalog_dir}",
        report.bundle_count
    );

    for warning in &report.warnings {
        println!("{} {warning}", style("warning:").yellow().bold());
    }
    for error in &report.errors {
        println!("{} {error}", style("error:").red().bold());
    }

    if report.errors.is_empty() {
        println!("{} catalog is valid", style("ok").green().bold());
        Ok(())
    } else {
        std::process::exit(1);
    }
}
