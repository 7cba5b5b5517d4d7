//! CLI subcommand implementations.

pub mod bill;
pub mod building;
pub mod check_in;
pub mod check_out;
pub mod park;
pub mod report;
pub mod slot;
pub mod status;
mod util;
