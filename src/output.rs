//! Report rendering and serialization
//!
//! Writes one CSV table per geography level plus a summary JSON with run
//! metadata for reproducibility, and renders compact console tables. The
//! `show_moe` parameter hides or shows the margin-of-error columns in
//! rendered output; file output always carries the full intervals.

use crate::engine::{MetricEstimate, SimulationResults, SummaryTable};
use crate::survey::Estimate;
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Run metadata for reproducibility
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub num_persons: usize,
    pub num_households: usize,
    pub timestamp: String,
}

/// Full report: metadata plus the averaged summary tables
#[derive(Debug, Clone, Serialize)]
pub struct ReportBundle {
    pub metadata: RunMetadata,
    pub results: SimulationResults,
}

impl ReportBundle {
    pub fn new(results: SimulationResults, num_persons: usize, num_households: usize) -> Self {
        ReportBundle {
            metadata: RunMetadata {
                num_persons,
                num_households,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            results,
        }
    }

    /// Write one geography table as CSV
    pub fn write_table_csv<P: AsRef<Path>>(
        &self,
        table: &SummaryTable,
        path: P,
    ) -> Result<(), Box<dyn Error>> {
        let mut wtr = csv::Writer::from_path(path)?;
        write_table(table, &mut wtr)?;
        Ok(())
    }

    /// Write metadata, parameters, and all tables as pretty JSON
    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write all outputs to a directory
    ///
    /// Creates:
    /// - state.csv / county.csv / city.csv
    /// - summary.json
    pub fn write_all<P: AsRef<Path>>(&self, dir: P) -> Result<(), Box<dyn Error>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        for table in self.results.tables() {
            self.write_table_csv(table, dir.join(format!("{}.csv", table.level)))?;
        }
        self.write_summary_json(dir.join("summary.json"))?;

        Ok(())
    }
}

fn write_table<W: Write>(table: &SummaryTable, wtr: &mut csv::Writer<W>) -> Result<(), Box<dyn Error>> {
    let mut header = vec!["geography".to_string()];
    for metric in [
        "population",
        "renter_households",
        "lost_wage_households",
        "need_no_ui",
        "need_regular",
        "need_plus_600",
        "need_plus_300",
    ] {
        header.push(metric.to_string());
        header.push(format!("{}_moe", metric));
        header.push(format!("{}_share", metric));
        header.push(format!("{}_share_moe", metric));
    }
    header.push("mean_need_regular".to_string());
    header.push("mean_need_regular_moe".to_string());
    header.push("allocation".to_string());
    header.push("allocation_moe".to_string());
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.geography.clone()];
        for metric in [
            &row.population,
            &row.renter_households,
            &row.lost_wage_households,
            &row.need_no_ui,
            &row.need_regular,
            &row.need_plus_600,
            &row.need_plus_300,
        ] {
            push_metric(&mut record, metric);
        }
        record.push(row.mean_need_regular.value.to_string());
        record.push(row.mean_need_regular.moe.to_string());
        record.push(row.allocation.value.to_string());
        record.push(row.allocation.moe.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn push_metric(record: &mut Vec<String>, metric: &MetricEstimate) {
    record.push(metric.total.value.to_string());
    record.push(metric.total.moe.to_string());
    record.push(metric.state_share.value.to_string());
    record.push(metric.state_share.moe.to_string());
}

fn format_count(estimate: Estimate, show_moe: bool) -> String {
    if show_moe {
        format!("{:.0} ±{:.0}", estimate.value, estimate.moe)
    } else {
        format!("{:.0}", estimate.value)
    }
}

fn format_dollars(estimate: Estimate, show_moe: bool) -> String {
    if show_moe {
        format!("${:.0} ±{:.0}", estimate.value, estimate.moe)
    } else {
        format!("${:.0}", estimate.value)
    }
}

/// Render one summary table to the console
pub fn print_summary_table(table: &SummaryTable, show_moe: bool) {
    println!("\n--- By {} ---", table.level);
    println!(
        "{:<22} {:>18} {:>18} {:>18} {:>20} {:>18}",
        "Geography", "Population", "Renter HHs", "Lost-wage HHs", "Need (regular UI)", "Allocation"
    );

    for row in &table.rows {
        println!(
            "{:<22} {:>18} {:>18} {:>18} {:>20} {:>18}",
            row.geography,
            format_count(row.population.total, show_moe),
            format_count(row.renter_households.total, show_moe),
            format_count(row.lost_wage_households.total, show_moe),
            format_dollars(row.need_regular.total, show_moe),
            format_dollars(row.allocation, false),
        );
    }

    // Share line: population and rental-need shares of the state totals
    for row in &table.rows {
        println!(
            "{:<22} population share {:>6.1}%   need share {:>6.1}%",
            row.geography,
            row.population.state_share.value * 100.0,
            row.need_regular.state_share.value * 100.0,
        );
    }
}

/// Render every geography table
pub fn print_results(results: &SimulationResults) {
    let show_moe = results.params.show_moe;
    for table in results.tables() {
        print_summary_table(table, show_moe);
    }
}
