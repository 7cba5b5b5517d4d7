use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pk_cli::commands::{bill, building, check_in, check_out, park, report, slot, status};
use pk_cli::{BillAction, BuildingAction, Cli, Commands, Config, ParkAction, SlotAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(pk_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = pk_db::Database::open_with_busy_timeout(&config.database_path, config.busy_timeout())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let mut stdout = std::io::stdout().lock();
    let out = &mut stdout;

    match command {
        Commands::Status => status::run(out, &db, &config.database_path)?,
        Commands::Park(action) => match action {
            ParkAction::Create(args) => park::create(out, &mut db, args)?,
            ParkAction::Show { park_id, json } => park::show(out, &db, *park_id, *json)?,
            ParkAction::List { only_vacant, json } => park::list(out, &db, *only_vacant, *json)?,
            ParkAction::Delete { park_id } => park::delete(out, &mut db, *park_id)?,
        },
        Commands::Building(action) => match action {
            BuildingAction::Create(args) => building::create(out, &mut db, args)?,
            BuildingAction::Delete { building_id } => {
                building::delete(out, &mut db, *building_id)?;
            }
        },
        Commands::Slot(action) => match action {
            SlotAction::Create(args) => slot::create(out, &mut db, args)?,
            SlotAction::Open { slot_id } => slot::open(out, &mut db, *slot_id)?,
            SlotAction::Close { slot_id } => slot::close(out, &mut db, *slot_id)?,
            SlotAction::Delete { slot_id } => slot::delete(out, &mut db, *slot_id)?,
        },
        Commands::CheckIn(args) => check_in::run(out, &mut db, args, config.default_slot_type)?,
        Commands::CheckOut(args) => check_out::run(out, &mut db, args)?,
        Commands::Bill(BillAction::Show { code, json }) => bill::show(out, &db, code, *json)?,
        Commands::Report(args) => report::run(out, &db, args)?,
    }

    out.flush()?;
    Ok(())
}
