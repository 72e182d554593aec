//! Tabular input: cleaned microdata and the industry employment table
//!
//! The microdata file is one row per person with IPUMS-style columns;
//! household rows are derived from the first occurrence of each serial.
//! Cleaning of raw census extracts happens upstream; this layer only
//! parses, derives the baseline UI benefit, and fails fast on rows that
//! violate the input contract.

use crate::industry::{classify, IndustryGroup, LossRates};
use crate::{
    EmploymentStatus, Geography, HouseholdRecord, Microdata, PersonRecord, WEEKS_PER_MONTH,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// NY-style weekly benefit schedule
const MIN_ANNUAL_EARNINGS: f64 = 2_600.0;
const MIN_WEEKLY_BENEFIT: f64 = 104.0;
const MAX_WEEKLY_BENEFIT: f64 = 504.0;

/// One person row of the microdata file
#[derive(Debug, Deserialize)]
struct MicrodataRow {
    serial: u64,
    pernum: u32,
    hhwt: f64,
    perwt: f64,
    rentgrs: f64,
    hhincome: f64,
    incwage: f64,
    ind: u16,
    empstat: u8,
    ownershp: u8,
    city: String,
    county: String,
    statefip: String,
}

/// One row of the industry employment-change table
#[derive(Debug, Deserialize)]
struct EmploymentChangeRow {
    industry_code: u32,
    pct_employment_change: f64,
}

/// Weekly regular UI benefit from annual wage income: half the average
/// weekly wage, bounded by the schedule, zero below the earnings floor.
pub fn weekly_benefit(annual_wage: f64) -> f64 {
    if annual_wage < MIN_ANNUAL_EARNINGS {
        return 0.0;
    }
    let weekly_wage = annual_wage / 52.0;
    (weekly_wage * 0.5).clamp(MIN_WEEKLY_BENEFIT, MAX_WEEKLY_BENEFIT)
}

/// Monthly regular UI benefit from annual wage income
pub fn monthly_benefit(annual_wage: f64) -> f64 {
    weekly_benefit(annual_wage) * WEEKS_PER_MONTH
}

fn parse_empstat(code: u8, line: usize) -> Result<EmploymentStatus, Box<dyn Error>> {
    match code {
        1 => Ok(EmploymentStatus::Employed),
        2 => Ok(EmploymentStatus::Unemployed),
        3 => Ok(EmploymentStatus::NotInLaborForce),
        other => Err(format!("row {}: unknown empstat code {}", line, other).into()),
    }
}

fn optional(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read person-level microdata and derive household rows.
///
/// Fails fast on nonpositive weights, negative wages, missing state tags,
/// and unknown employment codes; unclassified industry codes are kept and
/// filtered later by the assignment universe rule.
pub fn read_microdata<R: Read>(reader: R) -> Result<Microdata, Box<dyn Error>> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut persons = Vec::new();
    let mut households = Vec::new();
    let mut seen_households = HashSet::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let line = idx + 2; // header is line 1
        let row: MicrodataRow = result?;

        if row.perwt <= 0.0 || row.hhwt <= 0.0 {
            return Err(format!("row {}: survey weights must be positive", line).into());
        }
        if row.incwage < 0.0 {
            return Err(format!("row {}: wage income must be non-negative", line).into());
        }
        let state = optional(&row.statefip)
            .ok_or_else(|| format!("row {}: missing statefip", line))?;

        persons.push(PersonRecord {
            household_id: row.serial,
            person_id: row.pernum,
            industry_code: row.ind,
            industry_group: classify(row.ind),
            wage_income: row.incwage,
            employment: parse_empstat(row.empstat, line)?,
            weight: row.perwt,
            ui_monthly_regular: monthly_benefit(row.incwage),
        });

        if seen_households.insert(row.serial) {
            let is_renter = row.ownershp == 2;
            households.push(HouseholdRecord {
                household_id: row.serial,
                is_renter,
                gross_rent: if is_renter { Some(row.rentgrs) } else { None },
                annual_income: row.hhincome,
                weight: row.hhwt,
                geo: Geography {
                    state,
                    county: optional(&row.county),
                    city: optional(&row.city),
                },
            });
        }
    }

    Ok(Microdata {
        persons,
        households,
    })
}

pub fn read_microdata_path<P: AsRef<Path>>(path: P) -> Result<Microdata, Box<dyn Error>> {
    read_microdata(File::open(path)?)
}

/// Read the per-industry employment-change table into loss probabilities.
/// Unknown supersector codes are an input contract violation.
pub fn read_loss_rates<R: Read>(reader: R) -> Result<LossRates, Box<dyn Error>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rates = LossRates::new();

    for (idx, result) in csv_reader.deserialize().enumerate() {
        let line = idx + 2;
        let row: EmploymentChangeRow = result?;
        let group = IndustryGroup::from_ces_code(row.industry_code).ok_or_else(|| {
            format!(
                "row {}: unknown industry supersector code {}",
                line, row.industry_code
            )
        })?;
        rates.insert_pct_change(group, row.pct_employment_change);
    }

    Ok(rates)
}

pub fn read_loss_rates_path<P: AsRef<Path>>(path: P) -> Result<LossRates, Box<dyn Error>> {
    read_loss_rates(File::open(path)?)
}
