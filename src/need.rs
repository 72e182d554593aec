//! Household aggregation and rental need calculation
//!
//! Groups person trial states by household, builds one aggregate struct per
//! household, and joins it against the household record to compute the
//! assistance need under four counterfactual UI benefit scenarios.
//!
//! Need restores the household to its target rent-to-income burden and is
//! always clamped to [0, gross_rent].

use crate::assignment::{RiskStatus, TrialAssignment};
use crate::HouseholdRecord;
use std::collections::HashMap;

/// UI benefit scenario for the counterfactual need calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    NoUi,
    Regular,
    RegularPlus600,
    RegularPlus300,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::NoUi,
        Scenario::Regular,
        Scenario::RegularPlus600,
        Scenario::RegularPlus300,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::NoUi => "no_ui",
            Scenario::Regular => "regular",
            Scenario::RegularPlus600 => "regular_plus_600",
            Scenario::RegularPlus300 => "regular_plus_300",
        }
    }
}

/// One value per UI benefit scenario
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScenarioValues {
    pub no_ui: f64,
    pub regular: f64,
    pub plus_600: f64,
    pub plus_300: f64,
}

impl ScenarioValues {
    pub fn get(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::NoUi => self.no_ui,
            Scenario::Regular => self.regular,
            Scenario::RegularPlus600 => self.plus_600,
            Scenario::RegularPlus300 => self.plus_300,
        }
    }
}

/// Tri-state lost-wage flag for a household.
///
/// `NoWageEarners` is a distinct third category, not a missing-data false:
/// downstream counts of lost-wage households include `AnyAtRisk` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HouseholdRisk {
    AnyAtRisk,
    NoneAtRisk,
    NoWageEarners,
}

/// Per-household aggregate of one trial's person states
#[derive(Debug, Clone)]
pub struct HouseholdTrialAggregate {
    pub household_id: u64,
    /// Annual wages attributable to at-risk members
    pub at_risk_wages: f64,
    pub at_risk_members: usize,
    pub wage_earners: usize,
    pub risk: HouseholdRisk,
    /// Monthly UI benefit sums per tier
    pub ui_regular: f64,
    pub ui_plus_600: f64,
    pub ui_plus_300: f64,
}

/// Household need under each scenario, clamped to [0, gross_rent]
#[derive(Debug, Clone)]
pub struct HouseholdNeed {
    pub household_id: u64,
    pub risk: HouseholdRisk,
    pub need: ScenarioValues,
}

/// Group one trial's person states into household aggregates
pub fn aggregate_households(
    assignment: &TrialAssignment,
) -> HashMap<u64, HouseholdTrialAggregate> {
    let mut aggregates: HashMap<u64, HouseholdTrialAggregate> = HashMap::new();

    for state in &assignment.persons {
        let agg = aggregates
            .entry(state.household_id)
            .or_insert_with(|| HouseholdTrialAggregate {
                household_id: state.household_id,
                at_risk_wages: 0.0,
                at_risk_members: 0,
                wage_earners: 0,
                risk: HouseholdRisk::NoWageEarners,
                ui_regular: 0.0,
                ui_plus_600: 0.0,
                ui_plus_300: 0.0,
            });

        if state.wage_income > 0.0 {
            agg.wage_earners += 1;
        }
        if state.risk == RiskStatus::AtRisk {
            agg.at_risk_members += 1;
            agg.at_risk_wages += state.wage_income;
            agg.ui_regular += state.ui_regular;
            agg.ui_plus_600 += state.ui_plus_600;
            agg.ui_plus_300 += state.ui_plus_300;
        }
    }

    for agg in aggregates.values_mut() {
        agg.risk = if agg.at_risk_members > 0 {
            HouseholdRisk::AnyAtRisk
        } else if agg.wage_earners == 0 {
            HouseholdRisk::NoWageEarners
        } else {
            HouseholdRisk::NoneAtRisk
        };
    }

    aggregates
}

/// Need to restore the target burden at one adjusted income level.
///
/// Computes raw = rent/actual_burden - rent/target_burden, where
/// actual_burden = rent / adjusted monthly income. Clamp policy:
/// non-finite -> 0, raw >= 0 (already at or below target) -> 0,
/// |raw| capped at gross rent, otherwise the negated raw value.
fn clamped_need(gross_rent: f64, adjusted_monthly_income: f64, target_burden: f64) -> f64 {
    let actual_burden = gross_rent / adjusted_monthly_income;
    let raw = gross_rent / actual_burden - gross_rent / target_burden;
    if !raw.is_finite() || raw >= 0.0 {
        return 0.0;
    }
    (-raw).min(gross_rent)
}

/// Compute one household's need values for one trial.
///
/// `aggregate` is `None` when the household has no person rows; it is then
/// treated as having no wage earners. Non-renter households need nothing.
pub fn household_need(
    household: &HouseholdRecord,
    aggregate: Option<&HouseholdTrialAggregate>,
    target_burden: f64,
) -> HouseholdNeed {
    let risk = aggregate
        .map(|a| a.risk)
        .unwrap_or(HouseholdRisk::NoWageEarners);

    let gross_rent = match (household.is_renter, household.gross_rent) {
        (true, Some(rent)) => rent,
        _ => {
            return HouseholdNeed {
                household_id: household.household_id,
                risk,
                need: ScenarioValues::default(),
            }
        }
    };

    let (at_risk_wages, ui_regular, ui_plus_600, ui_plus_300) = aggregate
        .map(|a| (a.at_risk_wages, a.ui_regular, a.ui_plus_600, a.ui_plus_300))
        .unwrap_or((0.0, 0.0, 0.0, 0.0));

    // Income net of lost wages, expressed monthly, plus replacement UI
    let base_monthly = (household.annual_income - at_risk_wages) / 12.0;

    let need = ScenarioValues {
        no_ui: clamped_need(gross_rent, base_monthly, target_burden),
        regular: clamped_need(gross_rent, base_monthly + ui_regular, target_burden),
        plus_600: clamped_need(gross_rent, base_monthly + ui_plus_600, target_burden),
        plus_300: clamped_need(gross_rent, base_monthly + ui_plus_300, target_burden),
    };

    HouseholdNeed {
        household_id: household.household_id,
        risk,
        need,
    }
}

/// Compute need rows for every household in one trial
pub fn compute_needs(
    households: &[HouseholdRecord],
    assignment: &TrialAssignment,
    target_burden: f64,
) -> Vec<HouseholdNeed> {
    let aggregates = aggregate_households(assignment);
    households
        .iter()
        .map(|h| household_need(h, aggregates.get(&h.household_id), target_burden))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::PersonTrialState;
    use crate::Geography;
    use approx::assert_relative_eq;

    fn state(
        household_id: u64,
        person_id: u32,
        risk: RiskStatus,
        wage_income: f64,
        ui_regular: f64,
    ) -> PersonTrialState {
        let takeup = ui_regular > 0.0;
        PersonTrialState {
            household_id,
            person_id,
            risk,
            ui_takeup: takeup,
            wage_income,
            ui_regular,
            ui_plus_600: if takeup {
                ui_regular + crate::SUPPLEMENT_600_MONTHLY
            } else {
                0.0
            },
            ui_plus_300: if takeup {
                ui_regular + crate::SUPPLEMENT_300_MONTHLY
            } else {
                0.0
            },
        }
    }

    fn assignment_of(persons: Vec<PersonTrialState>) -> TrialAssignment {
        TrialAssignment {
            persons,
            ineligible_fraction: 0.0,
            adjusted_takeup_rate: 0.67,
        }
    }

    fn renter(household_id: u64, gross_rent: f64, annual_income: f64) -> HouseholdRecord {
        HouseholdRecord {
            household_id,
            is_renter: true,
            gross_rent: Some(gross_rent),
            annual_income,
            weight: 100.0,
            geo: Geography::state_only("New York"),
        }
    }

    #[test]
    fn test_aggregate_sums_over_household_members() {
        let assignment = assignment_of(vec![
            state(1, 1, RiskStatus::AtRisk, 24_000.0, 450.0),
            state(1, 2, RiskStatus::NotAtRisk, 18_000.0, 0.0),
            state(1, 3, RiskStatus::NotApplicable, 0.0, 0.0),
            state(2, 1, RiskStatus::AtRisk, 30_000.0, 0.0),
        ]);

        let aggregates = aggregate_households(&assignment);
        assert_eq!(aggregates.len(), 2);

        let h1 = &aggregates[&1];
        assert_eq!(h1.wage_earners, 2);
        assert_eq!(h1.at_risk_members, 1);
        assert_relative_eq!(h1.at_risk_wages, 24_000.0);
        assert_relative_eq!(h1.ui_regular, 450.0);
        assert_eq!(h1.risk, HouseholdRisk::AnyAtRisk);

        let h2 = &aggregates[&2];
        assert_eq!(h2.at_risk_members, 1);
        assert_eq!(h2.ui_regular, 0.0);
    }

    #[test]
    fn test_tri_state_household_risk() {
        let assignment = assignment_of(vec![
            // Household 1: wage earner, nobody at risk
            state(1, 1, RiskStatus::NotAtRisk, 20_000.0, 0.0),
            // Household 2: no wage earners at all
            state(2, 1, RiskStatus::NotApplicable, 0.0, 0.0),
            // Household 3: at risk
            state(3, 1, RiskStatus::AtRisk, 20_000.0, 0.0),
        ]);

        let aggregates = aggregate_households(&assignment);
        assert_eq!(aggregates[&1].risk, HouseholdRisk::NoneAtRisk);
        assert_eq!(aggregates[&2].risk, HouseholdRisk::NoWageEarners);
        assert_eq!(aggregates[&3].risk, HouseholdRisk::AnyAtRisk);
    }

    #[test]
    fn test_clamped_need_formula() {
        // Required monthly income at target 0.3 and rent 1200 is 4000
        assert_relative_eq!(clamped_need(1200.0, 3500.0, 0.3), 500.0);
        // Already at or below target burden
        assert_eq!(clamped_need(1200.0, 4000.0, 0.3), 0.0);
        assert_eq!(clamped_need(1200.0, 5200.0, 0.3), 0.0);
        // Shortfall beyond the rent caps at the rent
        assert_eq!(clamped_need(1200.0, 1000.0, 0.3), 1200.0);
    }

    #[test]
    fn test_clamped_need_degenerate_incomes() {
        // Zero or negative adjusted income: need caps at gross rent
        assert_eq!(clamped_need(1200.0, 0.0, 0.3), 1200.0);
        assert_eq!(clamped_need(1200.0, -500.0, 0.3), 1200.0);
        // Zero rent: 0/0 burden is NaN and normalizes to zero need
        assert_eq!(clamped_need(0.0, 2000.0, 0.3), 0.0);
        assert_eq!(clamped_need(0.0, 0.0, 0.3), 0.0);
    }

    #[test]
    fn test_worked_household_example() {
        // Gross rent $1,200, income $2,400/month-equivalent, one at-risk
        // earner losing $1,000/month, $400/month regular UI
        let household = renter(1, 1200.0, 28_800.0);
        let assignment = assignment_of(vec![
            state(1, 1, RiskStatus::AtRisk, 12_000.0, 400.0),
            state(1, 2, RiskStatus::NotAtRisk, 16_800.0, 0.0),
        ]);
        let aggregates = aggregate_households(&assignment);

        // Target 0.3: required income $4,000/month. Post-loss income is
        // $1,400 without UI and $1,800 with regular UI; both shortfalls
        // exceed the rent, so need caps at $1,200.
        let need = household_need(&household, aggregates.get(&1), 0.3);
        assert_relative_eq!(need.need.no_ui, 1200.0);
        assert_relative_eq!(need.need.regular, 1200.0);

        // Target 0.5: required income $2,400/month, shortfalls fit under
        // the cap and match the formula exactly.
        let need = household_need(&household, aggregates.get(&1), 0.5);
        assert_relative_eq!(need.need.no_ui, 1000.0);
        assert_relative_eq!(need.need.regular, 600.0);
        // Supplements push income past the target
        assert_relative_eq!(need.need.plus_600, 0.0);
        assert_relative_eq!(need.need.plus_300, 0.0);
    }

    #[test]
    fn test_non_renter_needs_nothing() {
        let household = HouseholdRecord {
            household_id: 1,
            is_renter: false,
            gross_rent: None,
            annual_income: 10_000.0,
            weight: 100.0,
            geo: Geography::state_only("New York"),
        };
        let assignment = assignment_of(vec![state(1, 1, RiskStatus::AtRisk, 10_000.0, 0.0)]);
        let aggregates = aggregate_households(&assignment);

        let need = household_need(&household, aggregates.get(&1), 0.3);
        assert_eq!(need.need, ScenarioValues::default());
        assert_eq!(need.risk, HouseholdRisk::AnyAtRisk);
    }

    #[test]
    fn test_need_bounded_by_gross_rent() {
        // Sweep of income levels: every scenario's need stays in [0, rent]
        let assignment = assignment_of(vec![state(1, 1, RiskStatus::AtRisk, 36_000.0, 800.0)]);
        let aggregates = aggregate_households(&assignment);

        for annual_income in [-20_000.0, 0.0, 12_000.0, 36_000.0, 60_000.0, 240_000.0] {
            let household = renter(1, 1450.0, annual_income);
            let need = household_need(&household, aggregates.get(&1), 0.3);
            for scenario in Scenario::ALL {
                let value = need.need.get(scenario);
                assert!(
                    (0.0..=1450.0).contains(&value),
                    "income {} scenario {:?}: {}",
                    annual_income,
                    scenario,
                    value
                );
            }
        }
    }

    #[test]
    fn test_ui_scenarios_weakly_decrease_need() {
        let household = renter(1, 1300.0, 40_000.0);
        let assignment = assignment_of(vec![state(1, 1, RiskStatus::AtRisk, 28_000.0, 900.0)]);
        let aggregates = aggregate_households(&assignment);

        let need = household_need(&household, aggregates.get(&1), 0.3).need;
        assert!(need.regular <= need.no_ui);
        assert!(need.plus_300 <= need.regular);
        assert!(need.plus_600 <= need.plus_300);
    }

    #[test]
    fn test_missing_household_rows_treated_as_no_wage_earners() {
        let household = renter(99, 900.0, 24_000.0);
        let need = household_need(&household, None, 0.3);
        assert_eq!(need.risk, HouseholdRisk::NoWageEarners);
        // No lost wages: need reflects the baseline burden only
        assert_relative_eq!(need.need.no_ui, 900.0);
    }

    #[test]
    fn test_compute_needs_covers_every_household() {
        let households = vec![renter(1, 1000.0, 30_000.0), renter(2, 800.0, 20_000.0)];
        let assignment = assignment_of(vec![state(1, 1, RiskStatus::AtRisk, 15_000.0, 0.0)]);

        let needs = compute_needs(&households, &assignment, 0.3);
        assert_eq!(needs.len(), 2);
        assert_eq!(needs[0].household_id, 1);
        assert_eq!(needs[1].household_id, 2);
        assert_eq!(needs[1].risk, HouseholdRisk::NoWageEarners);
    }
}
