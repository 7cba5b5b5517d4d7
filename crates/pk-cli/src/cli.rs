//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pk_core::{BuildingId, ParkId, SlotId};

use crate::commands::building::CreateBuildingArgs;
use crate::commands::check_in::CheckInArgs;
use crate::commands::check_out::CheckOutArgs;
use crate::commands::park::CreateParkArgs;
use crate::commands::report::ReportArgs;
use crate::commands::slot::CreateSlotsArgs;

/// Parking occupancy and billing.
///
/// Tracks which slots of a parking facility are taken, bills each stay when the
/// car leaves, and reports revenue per day, week or month.
#[derive(Debug, Parser)]
#[command(name = "pk", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show service status and occupancy counts.
    Status,

    /// Manage parks.
    #[command(subcommand)]
    Park(ParkAction),

    /// Manage buildings within a park.
    #[command(subcommand)]
    Building(BuildingAction),

    /// Manage slots within a building.
    #[command(subcommand)]
    Slot(SlotAction),

    /// Open a bill for an arriving car.
    CheckIn(CheckInArgs),

    /// Close a bill and charge it.
    CheckOut(CheckOutArgs),

    /// Inspect bills.
    #[command(subcommand)]
    Bill(BillAction),

    /// Revenue report for a park.
    Report(ReportArgs),
}

#[derive(Debug, Subcommand)]
pub enum ParkAction {
    /// Create a park, optionally with buildings and slots.
    Create(CreateParkArgs),
    /// Show a park with its buildings and slots.
    Show {
        park_id: ParkId,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List parks with capacity and vacancy.
    List {
        /// Only parks with at least one vacant slot.
        #[arg(long)]
        only_vacant: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a park together with its buildings and slots.
    Delete { park_id: ParkId },
}

#[derive(Debug, Subcommand)]
pub enum BuildingAction {
    /// Add a building to a park.
    Create(CreateBuildingArgs),
    /// Delete a building together with its slots.
    Delete { building_id: BuildingId },
}

#[derive(Debug, Subcommand)]
pub enum SlotAction {
    /// Add slots to a building.
    Create(CreateSlotsArgs),
    /// Put a slot back into service.
    Open { slot_id: SlotId },
    /// Take a slot out of service.
    Close { slot_id: SlotId },
    /// Delete a slot.
    Delete { slot_id: SlotId },
}

#[derive(Debug, Subcommand)]
pub enum BillAction {
    /// Show a bill by its code.
    Show {
        code: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
