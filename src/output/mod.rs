//! Report output
//!
//! - `text`: one `<tag> => <count>` line per entry on stdout
//! - `json`: the ranked report plus run metadata, written to a file

pub mod json;
pub mod text;

pub use json::{write_json_report, JsonReport};
pub use text::{print_report, write_report};
