//! Stochastic risk and UI-takeup assignment
//!
//! One trial's random assignment pass:
//! - uniform draw per eligible person against the industry loss probability
//! - takeup rate adjusted upward for programmatic ineligibility
//! - second independent draw decides UI takeup among at-risk persons
//!
//! Seeded per trial so parallel execution order never affects results.

use crate::industry::LossRates;
use crate::{EmploymentStatus, PersonRecord, SUPPLEMENT_300_MONTHLY, SUPPLEMENT_600_MONTHLY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-person job-loss status for one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskStatus {
    AtRisk,
    NotAtRisk,
    /// Outside the risk universe: no wage income, unclassified industry,
    /// or not in the labor force
    NotApplicable,
}

/// One person's trial state after assignment
#[derive(Debug, Clone)]
pub struct PersonTrialState {
    pub household_id: u64,
    pub person_id: u32,
    pub risk: RiskStatus,
    pub ui_takeup: bool,
    /// Annual wage income carried through for household aggregation
    pub wage_income: f64,
    /// Monthly UI benefit amounts per tier; zero without risk and takeup
    pub ui_regular: f64,
    pub ui_plus_600: f64,
    pub ui_plus_300: f64,
}

/// Output of one assignment pass
#[derive(Debug, Clone)]
pub struct TrialAssignment {
    pub persons: Vec<PersonTrialState>,
    /// Share of at-risk persons with a zero baseline benefit
    pub ineligible_fraction: f64,
    /// Takeup probability applied to eligible at-risk persons. May exceed
    /// 1.0 when the ineligible fraction is large; the draw then saturates.
    pub adjusted_takeup_rate: f64,
}

fn employable(person: &PersonRecord) -> bool {
    person.wage_income > 0.0 && person.employment == EmploymentStatus::Employed
}

/// Assign job-loss and UI-takeup status for one trial.
///
/// The realized takeup rate among eligible at-risk persons converges in
/// expectation to `ui_takeup_rate / (1 - ineligible_fraction)`, so that the
/// overall takeup rate among all at-risk persons converges to the assumed
/// population rate.
pub fn assign_risk_and_takeup(
    persons: &[PersonRecord],
    loss_rates: &LossRates,
    ui_takeup_rate: f64,
    seed: u64,
) -> TrialAssignment {
    let mut rng = StdRng::seed_from_u64(seed);

    // First pass: risk draws. Unclassified persons sit outside the risk
    // universe along with the wageless and those out of the labor force.
    let mut states: Vec<PersonTrialState> = persons
        .iter()
        .map(|person| {
            let risk = match person.industry_group {
                Some(group) if employable(person) => {
                    if rng.gen::<f64>() < loss_rates.probability(group) {
                        RiskStatus::AtRisk
                    } else {
                        RiskStatus::NotAtRisk
                    }
                }
                _ => RiskStatus::NotApplicable,
            };

            PersonTrialState {
                household_id: person.household_id,
                person_id: person.person_id,
                risk,
                ui_takeup: false,
                wage_income: person.wage_income,
                ui_regular: 0.0,
                ui_plus_600: 0.0,
                ui_plus_300: 0.0,
            }
        })
        .collect();

    // Ineligibility among the at-risk: zero baseline benefit means the
    // person cannot draw UI regardless of takeup
    let at_risk = states
        .iter()
        .filter(|s| s.risk == RiskStatus::AtRisk)
        .count();
    let ineligible = states
        .iter()
        .zip(persons)
        .filter(|(s, p)| s.risk == RiskStatus::AtRisk && p.ui_monthly_regular == 0.0)
        .count();

    let ineligible_fraction = if at_risk > 0 {
        ineligible as f64 / at_risk as f64
    } else {
        0.0
    };

    // The adjustment divides by (1 - ineligible_fraction) with no upper
    // clamp; a saturated rate makes every eligible draw succeed. When every
    // at-risk person is ineligible the denominator is zero; takeup is then
    // forced off below, so the rate value is moot.
    let denominator = 1.0 - ineligible_fraction;
    let adjusted_takeup_rate = if denominator > 0.0 {
        ui_takeup_rate / denominator
    } else {
        1.0
    };

    // Second pass: takeup draws among the at-risk
    for (state, person) in states.iter_mut().zip(persons) {
        if state.risk != RiskStatus::AtRisk {
            continue;
        }
        let takeup = rng.gen::<f64>() < adjusted_takeup_rate && person.ui_monthly_regular > 0.0;
        state.ui_takeup = takeup;
        if takeup {
            state.ui_regular = person.ui_monthly_regular;
            state.ui_plus_600 = person.ui_monthly_regular + SUPPLEMENT_600_MONTHLY;
            state.ui_plus_300 = person.ui_monthly_regular + SUPPLEMENT_300_MONTHLY;
        }
    }

    TrialAssignment {
        persons: states,
        ineligible_fraction,
        adjusted_takeup_rate,
    }
}
