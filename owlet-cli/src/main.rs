use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "owlet", version, about = "Owlet template CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template file to markup.
    Render {
        /// Template file: one template, or a `<templates>` set
        input: PathBuf,
        /// Template to render (required when the file holds several)
        #[arg(long)]
        name: Option<String>,
        /// JSON file used as the render context
        #[arg(long)]
        context: Option<PathBuf>,
        /// Render every template of the file
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
    /// Parse and compile every template of a file.
    Check {
        /// Template file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    owlet_cli::init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            input,
            name,
            context,
            all,
        } => {
            let markup = owlet_cli::render_cmd(&input, name.as_deref(), context.as_deref(), all)?;
            println!("{markup}");
        }
        Commands::Check { input } => {
            let names = owlet_cli::check_cmd(&input)?;
            println!("ok: {} template(s) in {}", names.len(), input.display());
            for name in names {
                println!("  {name}");
            }
        }
    }
    Ok(())
}
