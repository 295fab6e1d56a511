//! Reporting and export

mod report;

pub use report::{print_run_summary, print_store_summary, summary_line, write_json_records};
