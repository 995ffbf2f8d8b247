mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    match Cli::parse().command {
        Commands::New {
            platform,
            framework,
            output,
            catalog,
            features,
            data,
            force,
            dry_run,
        } => commands::generate::run(
            platform,
            framework,
            output,
            catalog,
            features,
            data,
            formwork::spec::Mode::Create,
            force,
            dry_run,
        ),
        Commands::Update {
            platform,
            framework,
            output,
            catalog,
            features,
            data,
            dry_run,
        } => commands::generate::run(
            platform,
            framework,
            output,
            catalog,
            features,
            data,
            formwork::spec::Mode::Update,
            false,
            dry_run,
        ),
        Commands::List { catalog } => commands::list::run(catalog),
        Commands::Check { catalog } => commands::check::run(catalog),
    }
}
