//! Human-readable text output

use crate::aggregate::RankedReport;
use std::io::{self, Write};

/// Write the report, one `<tag> => <count>` line per entry
///
/// `top` limits the number of entries written.
pub fn write_report<W: Write>(out: &mut W, report: &RankedReport, top: Option<usize>) -> io::Result<()> {
    let entries = match top {
        Some(n) => report.top(n),
        None => report.entries(),
    };

    for (tag, count) in entries {
        writeln!(out, "{} => {}", tag, count)?;
    }
    Ok(())
}

/// Print the report to stdout
pub fn print_report(report: &RankedReport, top: Option<usize>) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, top)?;
    out.flush()
}
