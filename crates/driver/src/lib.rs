mod driver;
pub mod error;
mod report;

pub use driver::{BatchDriver, DriverOptions};
pub use report::{FileReport, RunSummary};
