//! Bill lookup.

use std::io::Write;

use anyhow::Result;
use pk_db::Database;

use super::util::{write_bill, write_json};

pub fn show<W: Write>(writer: &mut W, db: &Database, code: &str, json: bool) -> Result<()> {
    let bill = db.get_bill(code.trim())?;
    if json {
        return write_json(writer, &bill);
    }
    write_bill(writer, &bill)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pk_core::{CarPlate, SlotId};

    use crate::commands::test_support::{local, seeded_db};

    #[test]
    fn show_open_bill() {
        let mut db = seeded_db();
        let plate = CarPlate::new("AB 99", "Chiang Mai").unwrap();
        let opened = db
            .check_in_at(SlotId::new(4), &plate, local(2025, 1, 5, 10, 10))
            .unwrap();

        let mut output = Vec::new();
        show(&mut output, &db, &opened.bill.code, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Bill 00000004-1736046600000
          Slot:      4
          Plate:     AB 99 (Chiang Mai)
          Check-in:  2025-01-05 10:10:00
          Check-out: (open)
        ");
    }

    #[test]
    fn show_as_json() {
        let mut db = seeded_db();
        let plate = CarPlate::new("AB 99", "Chiang Mai").unwrap();
        let opened = db
            .check_in_at(SlotId::new(4), &plate, local(2025, 1, 5, 10, 10))
            .unwrap();

        let mut output = Vec::new();
        show(&mut output, &db, &opened.bill.code, true).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["code"], "00000004-1736046600000");
        assert_eq!(json["slot_id"], 4);
        assert_eq!(json["car_plate_province"], "Chiang Mai");
        assert_eq!(json["amount"], serde_json::Value::Null);
    }

    #[test]
    fn show_unknown_bill_fails() {
        let db = seeded_db();
        let err = show(&mut Vec::new(), &db, "nope", false).unwrap_err();
        assert_eq!(err.to_string(), "bill with code 'nope' cannot be found");
    }
}
