use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "formwork",
    about = "A catalog-driven project scaffolding engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a fresh project into a target directory
    New {
        /// Target platform (mobile, frontend, backend-api, infrastructure, fullstack)
        platform: String,

        /// Framework within the platform (e.g. actix, react, flutter)
        framework: String,

        /// Target directory
        #[arg(short, long)]
        output: String,

        /// Catalog directory
        #[arg(short, long, default_value = "catalog")]
        catalog: String,

        /// Enable a feature bundle (can be repeated)
        #[arg(short, long = "feature", value_name = "ID")]
        features: Vec<String>,

        /// Set variable values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Overwrite files already present in the target directory
        #[arg(long)]
        force: bool,

        /// Plan and render without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate an existing project, preserving user-edited files
    Update {
        /// Target platform (must match the original generation)
        platform: String,

        /// Framework within the platform
        framework: String,

        /// Target directory containing the generated project
        #[arg(short, long)]
        output: String,

        /// Catalog directory
        #[arg(short, long, default_value = "catalog")]
        catalog: String,

        /// Enable a feature bundle (can be repeated)
        #[arg(short, long = "feature", value_name = "ID")]
        features: Vec<String>,

        /// Set variable values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Plan and render without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List the bundles a catalog provides
    List {
        /// Catalog directory
        #[arg(default_value = "catalog")]
        catalog: String,
    },

    /// Lint a catalog directory
    Check {
        /// Catalog directory
        #[arg(default_value = "catalog")]
        catalog: String,
    },
}
