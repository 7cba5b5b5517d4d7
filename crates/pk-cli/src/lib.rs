//! Parking CLI library.
//!
//! This crate provides the `pk` command-line interface over the parking store.

mod cli;
pub mod commands;
mod config;

pub use cli::{BillAction, BuildingAction, Cli, Commands, ParkAction, SlotAction};
pub use config::Config;
