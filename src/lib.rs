//! Emergency Rental Assistance Need Simulation
//!
//! Estimates rental-assistance need across New York State localities by
//! combining household survey microdata with industry-level employment
//! declines, then simulates a proportional allocation of program funds.
//!
//! Per-trial pipeline:
//! - assignment: stochastic job-loss and UI-takeup status per person
//! - need: household-level assistance need under four UI benefit scenarios
//! - survey/engine: weighted totals with 90% margins of error by geography
//!
//! Trials are independent, deterministically seeded, and averaged; see
//! `engine::run_simulation`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod assignment;
pub mod data;
pub mod engine;
pub mod industry;
pub mod need;
pub mod output;
pub mod survey;

use industry::IndustryGroup;

/// Conversion factor for weekly benefit supplements to monthly amounts
pub const WEEKS_PER_MONTH: f64 = 52.0 / 12.0;

/// Monthly value of the $600/week federal supplement
pub const SUPPLEMENT_600_MONTHLY: f64 = 600.0 * WEEKS_PER_MONTH;

/// Monthly value of the $300/week federal supplement
pub const SUPPLEMENT_300_MONTHLY: f64 = 300.0 * WEEKS_PER_MONTH;

/// Share of total program funds allocated proportionally to population
pub const POPULATION_ALLOCATION_SHARE: f64 = 0.45;

/// Employment status from the source microdata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmploymentStatus {
    Employed,
    Unemployed,
    NotInLaborForce,
}

/// One person row from the cleaned microdata
#[derive(Debug, Clone)]
pub struct PersonRecord {
    /// Groups persons into households
    pub household_id: u64,
    /// Unique within the household
    pub person_id: u32,
    /// Fine-grained census industry code
    pub industry_code: u16,
    /// Coarse industry group, `None` when the code is unclassified
    pub industry_group: Option<IndustryGroup>,
    /// Annual wage income, non-negative
    pub wage_income: f64,
    pub employment: EmploymentStatus,
    /// Person-level survey weight
    pub weight: f64,
    /// Baseline monthly regular UI benefit; zero means ineligible
    pub ui_monthly_regular: f64,
}

/// Geography tags for a household. State is always present; city and
/// county are each optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Geography {
    pub state: String,
    pub county: Option<String>,
    pub city: Option<String>,
}

impl Geography {
    pub fn state_only(state: &str) -> Self {
        Geography {
            state: state.to_string(),
            county: None,
            city: None,
        }
    }
}

/// One household derived from the microdata
#[derive(Debug, Clone)]
pub struct HouseholdRecord {
    pub household_id: u64,
    pub is_renter: bool,
    /// Monthly gross rent; `None` for non-renter households
    pub gross_rent: Option<f64>,
    /// Annual household income, may be negative
    pub annual_income: f64,
    /// Household-level survey weight
    pub weight: f64,
    pub geo: Geography,
}

/// Geography levels reported in the output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GeoLevel {
    State,
    County,
    City,
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoLevel::State => write!(f, "state"),
            GeoLevel::County => write!(f, "county"),
            GeoLevel::City => write!(f, "city"),
        }
    }
}

/// The immutable input dataset: person rows plus derived household rows
#[derive(Debug, Clone)]
pub struct Microdata {
    pub persons: Vec<PersonRecord>,
    pub households: Vec<HouseholdRecord>,
}

impl Microdata {
    /// Index households by id for join operations
    pub fn households_by_id(&self) -> HashMap<u64, &HouseholdRecord> {
        self.households
            .iter()
            .map(|h| (h.household_id, h))
            .collect()
    }
}

/// Simulation parameters, validated before any trial runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Number of independent trials R
    pub num_trials: usize,
    /// Assumed population-level UI takeup rate, in (0, 1)
    pub ui_takeup_rate: f64,
    /// Total program funds available for allocation, in dollars
    pub total_funds: f64,
    /// Target rent-to-income burden ratio, in (0, 1]
    pub target_rent_burden: f64,
    /// Seed for trial 0; trial i uses base_seed + i
    pub base_seed: u64,
    /// Show margin-of-error columns in rendered tables
    pub show_moe: bool,
}

impl SimParams {
    /// Baseline parameters: 2020 ERA analysis defaults
    pub fn baseline() -> Self {
        SimParams {
            num_trials: 10,
            ui_takeup_rate: 0.67,
            total_funds: 2_000_000_000.0,
            target_rent_burden: 0.30,
            base_seed: 42,
            show_moe: true,
        }
    }

    /// Check parameter ranges; called by the engine before any trial work
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.num_trials == 0 {
            return Err(ParamError::InvalidTrials(self.num_trials));
        }
        if !(self.ui_takeup_rate > 0.0 && self.ui_takeup_rate < 1.0) {
            return Err(ParamError::InvalidTakeupRate(self.ui_takeup_rate));
        }
        if !(self.total_funds > 0.0) {
            return Err(ParamError::InvalidFunds(self.total_funds));
        }
        if !(self.target_rent_burden > 0.0 && self.target_rent_burden <= 1.0) {
            return Err(ParamError::InvalidTargetBurden(self.target_rent_burden));
        }
        Ok(())
    }
}

/// Parameter contract violations, reported before simulation starts
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    InvalidTrials(usize),
    InvalidTakeupRate(f64),
    InvalidFunds(f64),
    InvalidTargetBurden(f64),
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::InvalidTrials(n) => {
                write!(f, "iteration count must be a positive integer, got {}", n)
            }
            ParamError::InvalidTakeupRate(r) => {
                write!(f, "UI takeup rate must lie in (0, 1), got {}", r)
            }
            ParamError::InvalidFunds(v) => {
                write!(f, "total program funds must be positive, got {}", v)
            }
            ParamError::InvalidTargetBurden(b) => {
                write!(f, "target rent burden must lie in (0, 1], got {}", b)
            }
        }
    }
}

impl std::error::Error for ParamError {}
