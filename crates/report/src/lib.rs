//! `plan-choque-report`: Excel report for the Plan Choque dashboards.
//!
//! The report is assembled as plain rows first ([`ReportWorkbook`]), then
//! serialized to `.xlsx` in memory and written in one step.

mod builder;
mod error;
mod workbook;
mod writer;

pub use builder::{build_report, ReportOptions, SUMMARY_SHEET};
pub use error::ReportError;
pub use workbook::{Cell, ReportWorkbook, Sheet};
pub use writer::{file_name, FILE_STAMP_FORMAT};
