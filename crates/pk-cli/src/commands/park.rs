//! Park management commands.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pk_core::{FeePolicy, ParkId, SlotType};
use pk_db::{Building, Database, NewBuilding, NewPark, NewSlot, ParkSummary, Slot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::util::write_json;

#[derive(Debug, Args)]
pub struct CreateParkArgs {
    /// Display name.
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub latitude: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub longitude: f64,

    /// Free-text pricing shown to drivers.
    #[arg(long)]
    pub cost_description: Option<String>,

    /// Minutes covered by the flat first-period fee.
    #[arg(long, default_value_t = 0)]
    pub fixed_first_period: i64,

    /// Flat fee for the first period.
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub fixed_first_period_cost: Decimal,

    /// Charged per started hour after the first period.
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub hourly_cost: Decimal,

    /// JSON file listing buildings and their slots to create with the park.
    #[arg(long)]
    pub layout: Option<PathBuf>,
}

/// Building entry of a layout file.
#[derive(Debug, Deserialize)]
struct BuildingLayout {
    name: String,
    description: Option<String>,
    #[serde(default)]
    slots: Vec<SlotLayout>,
}

#[derive(Debug, Deserialize)]
struct SlotLayout {
    label: String,
    #[serde(default = "default_floor")]
    floor: String,
    #[serde(default, rename = "type")]
    slot_type: SlotType,
}

fn default_floor() -> String {
    "1".to_string()
}

/// Parses a layout file: a JSON array of buildings, each with optional slots.
///
/// Slots default to floor `1` and type `car`.
fn parse_layout(json: &str) -> Result<Vec<NewBuilding>> {
    let layout: Vec<BuildingLayout> =
        serde_json::from_str(json).context("failed to parse layout")?;
    Ok(layout
        .into_iter()
        .map(|building| NewBuilding {
            name: building.name,
            description: building.description,
            slots: building
                .slots
                .into_iter()
                .map(|slot| NewSlot {
                    label: slot.label,
                    floor: slot.floor,
                    slot_type: slot.slot_type,
                })
                .collect(),
        })
        .collect())
}

pub fn create<W: Write>(writer: &mut W, db: &mut Database, args: &CreateParkArgs) -> Result<()> {
    let buildings = match &args.layout {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            parse_layout(&json)?
        }
        None => Vec::new(),
    };
    let slot_count: usize = buildings.iter().map(|building| building.slots.len()).sum();
    let building_count = buildings.len();

    let park = db.create_park(&NewPark {
        name: args.name.clone(),
        description: args.description.clone(),
        latitude: args.latitude,
        longitude: args.longitude,
        cost_description: args.cost_description.clone(),
        fee_policy: FeePolicy::new(
            args.fixed_first_period,
            args.fixed_first_period_cost,
            args.hourly_cost,
        )?,
        buildings,
    })?;

    writeln!(
        writer,
        "Created park {} ({}) with {building_count} buildings and {slot_count} slots",
        park.id, park.name
    )?;
    Ok(())
}

/// A building with its slots, for `park show`.
#[derive(Debug, Serialize)]
struct BuildingDetail {
    #[serde(flatten)]
    building: Building,
    slots: Vec<Slot>,
}

#[derive(Debug, Serialize)]
struct ParkDetail {
    #[serde(flatten)]
    summary: ParkSummary,
    buildings: Vec<BuildingDetail>,
}

pub fn show<W: Write>(writer: &mut W, db: &Database, park_id: ParkId, json: bool) -> Result<()> {
    let summary = db.get_park(park_id)?;
    let mut buildings = Vec::new();
    for building in db.list_buildings(park_id)? {
        let slots = db.list_slots(building.id)?;
        buildings.push(BuildingDetail { building, slots });
    }
    let detail = ParkDetail { summary, buildings };
    if json {
        return write_json(writer, &detail);
    }

    let park = &detail.summary.park;
    let policy = &park.fee_policy;
    writeln!(writer, "Park {}: {}", park.id, park.name)?;
    if let Some(description) = &park.description {
        writeln!(writer, "  Description: {description}")?;
    }
    writeln!(writer, "  Location:    {}, {}", park.latitude, park.longitude)?;
    writeln!(
        writer,
        "  Pricing:     {} for the first {} minutes, then {} per started hour",
        policy.fixed_first_period_cost, policy.fixed_first_period, policy.hourly_cost
    )?;
    writeln!(writer, "  Capacity:    {}", detail.summary.capacity)?;
    writeln!(writer, "  Vacancy:     {}", detail.summary.vacancy)?;

    for entry in &detail.buildings {
        writeln!(writer)?;
        writeln!(writer, "Building {}: {}", entry.building.id, entry.building.name)?;
        if entry.slots.is_empty() {
            writeln!(writer, "  (no slots)")?;
            continue;
        }
        writeln!(
            writer,
            "  {:>4}  {:<8}  {:<5}  {:<10}  Status",
            "ID", "Label", "Floor", "Type"
        )?;
        for slot in &entry.slots {
            writeln!(
                writer,
                "  {:>4}  {:<8}  {:<5}  {:<10}  {}",
                slot.id, slot.label, slot.floor, slot.slot_type, slot.status
            )?;
        }
    }
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, only_vacant: bool, json: bool) -> Result<()> {
    let parks = db.list_parks(only_vacant)?;
    if json {
        return write_json(writer, &parks);
    }
    if parks.is_empty() {
        writeln!(writer, "No parks found.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "{:<4}  {:<24}  {:>8}  {:>7}",
        "ID", "Name", "Capacity", "Vacancy"
    )?;
    for summary in &parks {
        writeln!(
            writer,
            "{:<4}  {:<24}  {:>8}  {:>7}",
            summary.park.id, summary.park.name, summary.capacity, summary.vacancy
        )?;
    }
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, db: &mut Database, park_id: ParkId) -> Result<()> {
    let park = db.delete_park(park_id)?;
    writeln!(writer, "Deleted park {} ({})", park.id, park.name)?;
    Ok(())
}
