//! Commands Layer
//!
//! Handlers that bridge the shell to the services. Every handler takes the
//! shared [`AppState`](crate::AppState) and reports failures as plain
//! strings, logging them on the way out.

mod checkin_cmd;
mod data_cmd;
mod focus_cmd;
mod report_cmd;
mod task_cmd;

pub use checkin_cmd::*;
pub use data_cmd::*;
pub use focus_cmd::*;
pub use report_cmd::*;
pub use task_cmd::*;

use chrono::NaiveDate;

/// Log a failed command and turn the error into its message
pub(crate) fn report<E: std::fmt::Display>(command: &'static str) -> impl Fn(E) -> String {
    move |e| {
        log::error!("{} failed: {}", command, e);
        e.to_string()
    }
}

/// `YYYY-MM-DD`
pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}' (expected YYYY-MM-DD)", input))
}

/// `YYYY-MM`, resolved to the first of the month
pub(crate) fn parse_month(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d")
        .map_err(|_| format!("Invalid month '{}' (expected YYYY-MM)", input))
}
