use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Importers, OutputFormat};

#[derive(Parser)]
#[command(name = "reckon", version, about = "Import bank statements into a plain-text ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which importer handles each file.
    Identify(FileArgs),
    /// Extract transactions and balance assertions.
    Extract(ExtractArgs),
    /// Show the date each statement should be filed under.
    FileDate(FileArgs),
}

#[derive(Args)]
struct FileArgs {
    /// Importer configuration (TOML).
    #[arg(long, value_name = "FILE")]
    config: PathBuf,
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct ExtractArgs {
    #[command(flatten)]
    files: FileArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Beancount)]
    format: OutputFormat,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Identify(args) => {
            let importers = Importers::load(&args.config)?;
            importers.identify(&args.paths, &mut out)?;
        }
        Command::Extract(args) => {
            let importers = Importers::load(&args.files.config)?;
            let diagnostics = importers.extract(&args.files.paths, args.format, &mut out)?;
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
        }
        Command::FileDate(args) => {
            let importers = Importers::load(&args.config)?;
            importers.file_date(&args.paths, &mut out)?;
        }
    }
    out.flush()?;
    Ok(())
}
