mod form;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use clientes_core::{CARRIERS, DEFAULT_FILE_NAME, HEADERS, SubmitError, XlsxEditor, submit};
use log::debug;
use mimalloc::MiMalloc;

use crate::form::FormArgs;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "art-clientes")]
#[command(about = "Record ART clients into an xlsx ledger")]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one client record and append it to the workbook
    Add(FormArgs),
    /// List the suggested insurance carriers
    Carriers,
    /// Print every row of a workbook
    Show {
        #[arg(default_value = DEFAULT_FILE_NAME)]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Add(args) => add(&args),
        Commands::Carriers => {
            for (i, name) in CARRIERS.iter().enumerate() {
                println!("{:>2}. {name}", i + 1);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { path } => {
            show(&path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn add(args: &FormArgs) -> Result<ExitCode> {
    let raw = args.to_raw(Local::now().date_naive())?;
    debug!("submitting {raw:?} to {}", args.output.display());

    match submit(&args.output, &raw, &args.config()) {
        Ok(record) => {
            println!(
                "Saved {} {} (DNI {}) to {}",
                record.values()[0],
                record.values()[1],
                record.values()[2],
                args.output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::Validation(e)) => {
            eprintln!("validation: {e}");
            Ok(ExitCode::from(2))
        }
        Err(SubmitError::Append(e)) => {
            eprintln!("could not save the workbook {}: {e}", args.output.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn show(path: &Path) -> Result<()> {
    let editor = XlsxEditor::open(path)?;
    println!("# {} (sheet '{}')", path.display(), editor.sheet_name());
    for row in editor.rows()? {
        println!("{:>4}\t{}", row.number, row.texts(HEADERS.len()).join("\t"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_show_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("clientes_art.xlsx");
        let cli = Cli::try_parse_from([
            "art-clientes",
            "add",
            "--nombre",
            "Juan",
            "--apellido",
            "Pérez",
            "--dni",
            "30111222",
            "--alta",
            "2024-03-01",
            "--lesion",
            "Esguince de tobillo",
            "--art",
            "Galeno ART",
            "--output",
            out.to_str().unwrap(),
        ])?;
        assert_eq!(run(cli.command)?, ExitCode::SUCCESS);

        let rows = XlsxEditor::open(&out)?.rows()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].cell(2), Some("30111222"));
        show(&out)
    }

    #[test]
    fn invalid_record_exits_with_validation_code() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("clientes_art.xlsx");
        let cli = Cli::try_parse_from([
            "art-clientes",
            "add",
            "--nombre",
            "Juan",
            "--output",
            out.to_str().unwrap(),
        ])?;
        assert_eq!(run(cli.command)?, ExitCode::from(2));
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn verbosity_flags_are_global() {
        let cli = Cli::try_parse_from(["art-clientes", "carriers", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }
}
