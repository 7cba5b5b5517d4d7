//! Slot management commands.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use pk_core::{BuildingId, SlotId, SlotType};
use pk_db::{Database, NewSlot, Slot};

#[derive(Debug, Args)]
pub struct CreateSlotsArgs {
    /// Building the slots belong to.
    pub building_id: BuildingId,

    /// Label of a slot to create. Repeatable.
    #[arg(long = "label", required = true)]
    pub labels: Vec<String>,

    #[arg(long, default_value = "1")]
    pub floor: String,

    #[arg(long = "type", default_value_t = SlotType::Car)]
    pub slot_type: SlotType,
}

fn write_slot<W: Write>(writer: &mut W, verb: &str, slot: &Slot) -> Result<()> {
    writeln!(
        writer,
        "{verb} slot {} ({}, {}, floor {}): {}",
        slot.id, slot.label, slot.slot_type, slot.floor, slot.status
    )?;
    Ok(())
}

pub fn create<W: Write>(writer: &mut W, db: &mut Database, args: &CreateSlotsArgs) -> Result<()> {
    let slots: Vec<NewSlot> = args
        .labels
        .iter()
        .map(|label| NewSlot {
            label: label.clone(),
            floor: args.floor.clone(),
            slot_type: args.slot_type,
        })
        .collect();
    for slot in db.create_slots(args.building_id, &slots)? {
        write_slot(writer, "Created", &slot)?;
    }
    Ok(())
}

pub fn open<W: Write>(writer: &mut W, db: &mut Database, slot_id: SlotId) -> Result<()> {
    let slot = db.open_slot(slot_id)?;
    write_slot(writer, "Opened", &slot)
}

pub fn close<W: Write>(writer: &mut W, db: &mut Database, slot_id: SlotId) -> Result<()> {
    let slot = db.close_slot(slot_id)?;
    write_slot(writer, "Closed", &slot)
}

pub fn delete<W: Write>(writer: &mut W, db: &mut Database, slot_id: SlotId) -> Result<()> {
    let slot = db.delete_slot(slot_id)?;
    write_slot(writer, "Deleted", &slot)
}
