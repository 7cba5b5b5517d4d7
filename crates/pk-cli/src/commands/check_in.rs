//! Check-in command: opens a bill on a slot.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args};
use pk_core::{BuildingId, CarPlate, ParkId, SlotId, SlotType};
use pk_db::Database;

use super::util::{write_bill, write_json};

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["slot", "building", "park"]),
))]
pub struct CheckInArgs {
    /// Check in to this slot.
    #[arg(long)]
    pub slot: Option<SlotId>,

    /// Check in to the first vacant slot in this building.
    #[arg(long)]
    pub building: Option<BuildingId>,

    /// Check in to the first vacant slot in this park.
    #[arg(long)]
    pub park: Option<ParkId>,

    /// Slot type to look for with --building or --park [default: from config]
    #[arg(long = "type")]
    pub slot_type: Option<SlotType>,

    /// Plate number.
    #[arg(long)]
    pub plate: String,

    /// Province the plate was issued in.
    #[arg(long)]
    pub province: String,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Runs check-in. `default_type` applies when `--type` was not given.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &CheckInArgs,
    default_type: SlotType,
) -> Result<()> {
    run_at(writer, db, args, default_type, Utc::now())
}

pub(crate) fn run_at<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &CheckInArgs,
    default_type: SlotType,
    now: DateTime<Utc>,
) -> Result<()> {
    let plate = CarPlate::new(args.plate.as_str(), args.province.as_str())?;
    let slot_type = args.slot_type.unwrap_or(default_type);
    let opened = match (args.slot, args.building, args.park) {
        (Some(slot_id), _, _) => db.check_in_at(slot_id, &plate, now)?,
        (None, Some(building_id), _) => {
            db.check_in_by_building_at(building_id, slot_type, &plate, now)?
        }
        (None, None, Some(park_id)) => {
            db.check_in_by_park_at(park_id, slot_type, &plate, now)?
        }
        (None, None, None) => bail!("one of --slot, --building or --park is required"),
    };

    if args.json {
        return write_json(writer, &opened);
    }
    writeln!(
        writer,
        "Checked in to slot {} ({}, floor {})",
        opened.slot.label, opened.slot.slot_type, opened.slot.floor
    )?;
    write_bill(writer, &opened.bill)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pk_core::SlotStatus;
    use pk_db::DbError;

    use crate::commands::test_support::{local, seeded_db};

    fn args() -> CheckInArgs {
        CheckInArgs {
            slot: None,
            building: None,
            park: None,
            slot_type: None,
            plate: "1กข 1234".to_string(),
            province: "Bangkok".to_string(),
            json: false,
        }
    }

    #[test]
    fn check_in_by_slot_prints_bill() {
        let mut db = seeded_db();
        let args = CheckInArgs {
            slot: Some(SlotId::new(1)),
            ..args()
        };

        let mut output = Vec::new();
        run_at(&mut output, &mut db, &args, SlotType::Car, local(2025, 1, 5, 8, 0)).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Checked in to slot A1 (car, floor 1)
        Bill 00000001-1736038800000
          Slot:      1
          Plate:     1กข 1234 (Bangkok)
          Check-in:  2025-01-05 08:00:00
          Check-out: (open)
        ");
    }

    #[test]
    fn check_in_by_park_picks_matching_type() {
        let mut db = seeded_db();
        let args = CheckInArgs {
            park: Some(ParkId::new(1)),
            slot_type: Some(SlotType::Motorcycle),
            json: true,
            ..args()
        };

        let mut output = Vec::new();
        run_at(&mut output, &mut db, &args, SlotType::Car, local(2025, 1, 5, 8, 0)).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["code"], "00000003-1736038800000");
        assert_eq!(json["check_in_time"], "2025-01-05T01:00:00Z");
        assert_eq!(json["check_out_time"], serde_json::Value::Null);
        assert_eq!(json["discount"], "0.00");
        assert_eq!(json["slot"]["label"], "M1");
        assert_eq!(json["slot"]["type"], "motorcycle");
        assert_eq!(json["slot"]["status"], "occupied");
    }

    #[test]
    fn check_in_without_type_uses_configured_default() {
        let mut db = seeded_db();
        let args = CheckInArgs {
            building: Some(BuildingId::new(1)),
            ..args()
        };

        let mut output = Vec::new();
        run_at(
            &mut output,
            &mut db,
            &args,
            SlotType::Motorcycle,
            local(2025, 1, 5, 8, 0),
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Checked in to slot M1 (motorcycle, floor 1)
        Bill 00000003-1736038800000
          Slot:      3
          Plate:     1กข 1234 (Bangkok)
          Check-in:  2025-01-05 08:00:00
          Check-out: (open)
        ");
        assert_eq!(db.get_slot(SlotId::new(1)).unwrap().status, SlotStatus::Vacant);
    }

    #[test]
    fn check_in_by_building_without_vacancy_fails() {
        let mut db = seeded_db();
        db.close_slot(SlotId::new(4)).unwrap();
        let args = CheckInArgs {
            building: Some(BuildingId::new(2)),
            ..args()
        };

        let mut output = Vec::new();
        let err = run(&mut output, &mut db, &args, SlotType::Car).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to check-in: no vacant car slot in building 2"
        );
        assert!(output.is_empty());
        assert_eq!(db.get_slot(SlotId::new(4)).unwrap().status, SlotStatus::Closed);
    }

    #[test]
    fn check_in_twice_is_a_conflict() {
        let mut db = seeded_db();
        let args = CheckInArgs {
            slot: Some(SlotId::new(2)),
            ..args()
        };
        run(&mut Vec::new(), &mut db, &args, SlotType::Car).unwrap();

        let err = run(&mut Vec::new(), &mut db, &args, SlotType::Car).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::SlotOccupied { .. })
        ));
    }

    #[test]
    fn blank_plate_is_rejected() {
        let mut db = seeded_db();
        let args = CheckInArgs {
            slot: Some(SlotId::new(1)),
            plate: "  ".to_string(),
            ..args()
        };

        let err = run(&mut Vec::new(), &mut db, &args, SlotType::Car).unwrap_err();
        assert_eq!(err.to_string(), "car plate number cannot be empty");
        assert_eq!(db.get_slot(SlotId::new(1)).unwrap().status, SlotStatus::Vacant);
    }
}
