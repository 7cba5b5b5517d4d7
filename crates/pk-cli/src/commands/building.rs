//! Building management commands.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use pk_core::{BuildingId, ParkId, SlotType};
use pk_db::{Database, NewBuilding, NewSlot};

#[derive(Debug, Args)]
pub struct CreateBuildingArgs {
    /// Park the building belongs to.
    pub park_id: ParkId,

    /// Display name.
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Label of a slot to create with the building. Repeatable.
    #[arg(long = "slot")]
    pub slots: Vec<String>,

    /// Floor of the created slots.
    #[arg(long, default_value = "1")]
    pub floor: String,

    /// Type of the created slots.
    #[arg(long = "type", default_value_t = SlotType::Car)]
    pub slot_type: SlotType,
}

pub fn create<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &CreateBuildingArgs,
) -> Result<()> {
    let building = db.create_building(
        args.park_id,
        &NewBuilding {
            name: args.name.clone(),
            description: args.description.clone(),
            slots: args
                .slots
                .iter()
                .map(|label| NewSlot {
                    label: label.clone(),
                    floor: args.floor.clone(),
                    slot_type: args.slot_type,
                })
                .collect(),
        },
    )?;
    writeln!(
        writer,
        "Created building {} ({}) in park {} with {} slots",
        building.id,
        building.name,
        building.park_id,
        args.slots.len()
    )?;
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, db: &mut Database, building_id: BuildingId) -> Result<()> {
    let building = db.delete_building(building_id)?;
    writeln!(writer, "Deleted building {} ({})", building.id, building.name)?;
    Ok(())
}
