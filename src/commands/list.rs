use std::path::Path;

use console::style;

use formwork::catalog::{BundleKind, Catalog};

pub fn run(catalog_dir: String) -> miette::Result<()> {
    let catalog = Catalog::load(Path::new(&catalog_dir))?;

    if catalog.bundles.is_empty() {
        println!("No bundles found in {catalog_dir}");
        return Ok(());
    }

    println!("{}", style("Base bundles:").bold());
    for bundle in catalog
        .bundles
        .iter()
        .filter(|b| b.kind == BundleKind::Base)
    {
        let platform = bundle
            .platform
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".into());
        println!(
            "  {}  {platform} / {}",
            style(&bundle.id).cyan(),
            bundle.frameworks.join(", ")
        );
    }

    println!("{}", style("Feature bundles:").bold());
    for bundle in catalog
        .bundles
        .iter()
        .filter(|b| b.kind == BundleKind::Feature)
    {
        let scope = if bundle.platforms.is_empty() {
            "any platform".to_string()
        } else {
            bundle
                .platforms
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  {}  ({scope})", style(&bundle.id).cyan());
    }

    Ok(())
}
