use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use env_logger::Env;
use roster_sync::audit::audit;
use roster_sync::audit::AuditOptions;
use roster_sync::audit::DEFAULT_RECENT;
use roster_sync::audit::DEFAULT_ROOMS;
use roster_sync::distribute::layout::Layout;
use roster_sync::distribute::DistributeError;
use roster_sync::distribute::Distributor;
use roster_sync::spreadsheet;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_FILE: &str = "GRILLA_DE_PAX_2026.ods";

#[derive(Parser, Debug)]
#[command(name = "roster-sync", about = "Distribute intake reservations into the floor roster sheets of a workbook")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy intake rows into the matching roster rows, after backing the workbook up.
    Distribute(DistributeArgs),
    /// Show recent intake rows and roster contents for some rooms, without writing.
    Audit(AuditArgs),
}

#[derive(Parser, Debug)]
struct DistributeArgs {
    /// Workbook to update in place.
    #[arg(default_value = DEFAULT_FILE)]
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct AuditArgs {
    /// Workbook to inspect.
    #[arg(default_value = DEFAULT_FILE)]
    file: PathBuf,

    /// Room to check (repeatable). Defaults to a fixed sample of rooms.
    #[arg(long = "room")]
    rooms: Vec<String>,

    /// Number of intake rows, counted from the bottom, to scan.
    #[arg(long, default_value_t = DEFAULT_RECENT)]
    recent: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Distribute(args) => run_distribute(&args),
        Command::Audit(args) => run_audit(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn ensure_exists(file: &Path) -> Result<()> {
    if !file.is_file() {
        bail!("File '{}' not found", file.display());
    }
    Ok(())
}

fn run_distribute(args: &DistributeArgs) -> Result<()> {
    ensure_exists(&args.file)?;
    let distributor = Distributor::new(Layout::default())?;
    match distributor.run(&args.file) {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(error) => {
            match &error {
                DistributeError::Configuration(_) | DistributeError::Backup { .. } => {
                    eprintln!("Nothing was changed.")
                }
                DistributeError::Save { backup, .. } => {
                    eprintln!("The original file is intact; backup at {}", backup.display())
                }
                DistributeError::DocumentLoad(_) | DistributeError::SourceNotFound(_) => {
                    eprintln!("The original file is intact; a backup was taken before loading.")
                }
            }
            Err(error).with_context(|| format!("Distribution of '{}' failed", args.file.display()))
        }
    }
}

fn run_audit(args: &AuditArgs) -> Result<()> {
    ensure_exists(&args.file)?;
    let document = spreadsheet::open(&args.file)
        .with_context(|| format!("Cannot open '{}'", args.file.display()))?;
    let rooms = if args.rooms.is_empty() {
        DEFAULT_ROOMS.iter().map(|room| room.to_string()).collect()
    } else {
        args.rooms.to_owned()
    };
    let options = AuditOptions { rooms, recent: args.recent };
    print!("{}", audit(&document, &Layout::default(), &options));
    Ok(())
}
