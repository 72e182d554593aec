//! Trial driver, cross-trial averaging, and summary table construction
//!
//! Each trial runs the assignment → need → weighted-aggregation pipeline
//! against the immutable dataset with its own deterministic seed. Trials
//! execute in parallel; averaging waits on the full set, then derives
//! statewide shares and the proportional fund allocation.

use crate::assignment::assign_risk_and_takeup;
use crate::industry::LossRates;
use crate::need::{compute_needs, HouseholdRisk, Scenario};
use crate::survey::{
    propagate_product_moe, propagate_ratio_moe, weighted_mean, weighted_total, Estimate,
};
use crate::{
    GeoLevel, Geography, Microdata, ParamError, SimParams, POPULATION_ALLOCATION_SHARE,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Weighted estimates for one geography in one trial
#[derive(Debug, Clone, Default)]
pub struct GeoMetrics {
    pub population: Estimate,
    pub renter_households: Estimate,
    pub lost_wage_households: Estimate,
    pub need_no_ui: Estimate,
    pub need_regular: Estimate,
    pub need_plus_600: Estimate,
    pub need_plus_300: Estimate,
    /// Mean monthly need per renter household, regular-UI scenario
    pub mean_need_regular: Estimate,
}

/// One trial's result tables, keyed by geography level and name
pub type TrialTable = HashMap<(GeoLevel, String), GeoMetrics>;

/// A metric reported as an absolute estimate and its statewide share
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricEstimate {
    pub total: Estimate,
    pub state_share: Estimate,
}

/// One geography row of the final report
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub geography: String,
    pub population: MetricEstimate,
    pub renter_households: MetricEstimate,
    pub lost_wage_households: MetricEstimate,
    pub need_no_ui: MetricEstimate,
    pub need_regular: MetricEstimate,
    pub need_plus_600: MetricEstimate,
    pub need_plus_300: MetricEstimate,
    /// Mean monthly need per renter household, regular-UI scenario
    pub mean_need_regular: Estimate,
    /// Population-proportional share of the 45% program fund pool
    pub allocation: Estimate,
}

/// Final report table for one geography level
#[derive(Debug, Clone, Serialize)]
pub struct SummaryTable {
    pub level: GeoLevel,
    pub rows: Vec<SummaryRow>,
}

/// Averaged results across all trials, one table per geography level
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResults {
    pub params: SimParams,
    pub state: SummaryTable,
    pub county: SummaryTable,
    pub city: SummaryTable,
}

impl SimulationResults {
    pub fn tables(&self) -> [&SummaryTable; 3] {
        [&self.state, &self.county, &self.city]
    }
}

fn geo_keys(geo: &Geography) -> Vec<(GeoLevel, &str)> {
    let mut keys = vec![(GeoLevel::State, geo.state.as_str())];
    if let Some(county) = &geo.county {
        keys.push((GeoLevel::County, county.as_str()));
    }
    if let Some(city) = &geo.city {
        keys.push((GeoLevel::City, city.as_str()));
    }
    keys
}

/// Run one trial: stochastic assignment, household need, survey-weighted
/// totals per geography.
pub fn run_trial(
    data: &Microdata,
    loss_rates: &LossRates,
    params: &SimParams,
    seed: u64,
) -> TrialTable {
    let assignment =
        assign_risk_and_takeup(&data.persons, loss_rates, params.ui_takeup_rate, seed);
    let needs = compute_needs(&data.households, &assignment, params.target_rent_burden);

    // Group household and person row indices per geography key
    let mut household_groups: HashMap<(GeoLevel, String), Vec<usize>> = HashMap::new();
    for (idx, household) in data.households.iter().enumerate() {
        for (level, name) in geo_keys(&household.geo) {
            household_groups
                .entry((level, name.to_string()))
                .or_default()
                .push(idx);
        }
    }

    let households_by_id = data.households_by_id();
    let mut person_groups: HashMap<(GeoLevel, String), Vec<usize>> = HashMap::new();
    for (idx, person) in data.persons.iter().enumerate() {
        if let Some(household) = households_by_id.get(&person.household_id) {
            for (level, name) in geo_keys(&household.geo) {
                person_groups
                    .entry((level, name.to_string()))
                    .or_default()
                    .push(idx);
            }
        }
    }

    let mut table = TrialTable::new();
    for (key, household_idx) in household_groups {
        let person_idx = person_groups.remove(&key).unwrap_or_default();

        let population = weighted_total(
            person_idx
                .iter()
                .map(|&i| (1.0, data.persons[i].weight)),
        );

        let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };
        let renter_households = weighted_total(
            household_idx
                .iter()
                .map(|&i| (indicator(data.households[i].is_renter), data.households[i].weight)),
        );
        let lost_wage_households = weighted_total(household_idx.iter().map(|&i| {
            (
                indicator(needs[i].risk == HouseholdRisk::AnyAtRisk),
                data.households[i].weight,
            )
        }));

        let need = Scenario::ALL.map(|scenario| {
            weighted_total(
                household_idx
                    .iter()
                    .map(|&i| (needs[i].need.get(scenario), data.households[i].weight)),
            )
        });

        let mean_need_regular = weighted_mean(
            household_idx
                .iter()
                .filter(|&&i| data.households[i].is_renter)
                .map(|&i| (needs[i].need.regular, data.households[i].weight)),
        );

        let metrics = GeoMetrics {
            population,
            renter_households,
            lost_wage_households,
            need_no_ui: need[0],
            need_regular: need[1],
            need_plus_600: need[2],
            need_plus_300: need[3],
            mean_need_regular,
        };
        table.insert(key, metrics);
    }

    table
}

fn mean_estimate<I>(estimates: I) -> Estimate
where
    I: IntoIterator<Item = Estimate>,
{
    let items: Vec<Estimate> = estimates.into_iter().collect();
    if items.is_empty() {
        return Estimate::default();
    }
    let n = items.len() as f64;
    Estimate::new(
        items.iter().map(|e| e.value).sum::<f64>() / n,
        items.iter().map(|e| e.moe).sum::<f64>() / n,
    )
}

/// Average estimates and interval widths arithmetically across trials.
/// Keys are identical in every table since geography is static input data.
pub fn average_trial_tables(tables: &[TrialTable]) -> TrialTable {
    let mut averaged = TrialTable::new();
    if tables.is_empty() {
        return averaged;
    }

    for key in tables[0].keys() {
        let collect = |field: &dyn Fn(&GeoMetrics) -> Estimate| -> Estimate {
            mean_estimate(tables.iter().map(|t| field(&t[key])))
        };

        averaged.insert(
            key.clone(),
            GeoMetrics {
                population: collect(&|m| m.population),
                renter_households: collect(&|m| m.renter_households),
                lost_wage_households: collect(&|m| m.lost_wage_households),
                need_no_ui: collect(&|m| m.need_no_ui),
                need_regular: collect(&|m| m.need_regular),
                need_plus_600: collect(&|m| m.need_plus_600),
                need_plus_300: collect(&|m| m.need_plus_300),
                mean_need_regular: collect(&|m| m.mean_need_regular),
            },
        );
    }

    averaged
}

/// Sum of independent estimates: values add, MOEs combine in quadrature.
/// A single estimate passes through unchanged so a geography's share of
/// itself cancels exactly.
fn sum_estimates<I>(estimates: I) -> Estimate
where
    I: IntoIterator<Item = Estimate>,
{
    let items: Vec<Estimate> = estimates.into_iter().collect();
    if let [single] = items[..] {
        return single;
    }
    let value: f64 = items.iter().map(|e| e.value).sum();
    let moe_sq: f64 = items.iter().map(|e| e.moe.powi(2)).sum();
    Estimate::new(value, moe_sq.sqrt())
}

fn share_of(local: Estimate, statewide: Estimate) -> Estimate {
    if statewide.value == 0.0 {
        return Estimate::default();
    }
    Estimate::new(
        local.value / statewide.value,
        propagate_ratio_moe(local.value, statewide.value, local.moe, statewide.moe),
    )
}

fn metric(local: Estimate, statewide: Estimate) -> MetricEstimate {
    MetricEstimate {
        total: local,
        state_share: share_of(local, statewide),
    }
}

fn build_table(
    level: GeoLevel,
    averaged: &TrialTable,
    statewide: &GeoMetrics,
    params: &SimParams,
) -> SummaryTable {
    let mut rows: Vec<SummaryRow> = averaged
        .iter()
        .filter(|((l, _), _)| *l == level)
        .map(|((_, name), m)| {
            let population = metric(m.population, statewide.population);

            // Allocation: fixed 45% of funds, proportional to population
            // share; the fund pool is an exact constant.
            let pool = POPULATION_ALLOCATION_SHARE * params.total_funds;
            let allocation = Estimate::new(
                pool * population.state_share.value,
                propagate_product_moe(pool, population.state_share.value, 0.0, population.state_share.moe),
            );

            SummaryRow {
                geography: name.clone(),
                population,
                renter_households: metric(m.renter_households, statewide.renter_households),
                lost_wage_households: metric(
                    m.lost_wage_households,
                    statewide.lost_wage_households,
                ),
                need_no_ui: metric(m.need_no_ui, statewide.need_no_ui),
                need_regular: metric(m.need_regular, statewide.need_regular),
                need_plus_600: metric(m.need_plus_600, statewide.need_plus_600),
                need_plus_300: metric(m.need_plus_300, statewide.need_plus_300),
                mean_need_regular: m.mean_need_regular,
                allocation,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.geography.cmp(&b.geography));
    SummaryTable { level, rows }
}

/// Run the full simulation: R parallel trials, full join, averaging, and
/// summary table construction. Validates parameters before any trial work.
pub fn run_simulation(
    data: &Microdata,
    loss_rates: &LossRates,
    params: &SimParams,
) -> Result<SimulationResults, ParamError> {
    params.validate()?;

    let tables: Vec<TrialTable> = (0..params.num_trials)
        .into_par_iter()
        .map(|trial| run_trial(data, loss_rates, params, params.base_seed + trial as u64))
        .collect();

    let averaged = average_trial_tables(&tables);

    // Statewide totals are the denominator for every share column
    let statewide = {
        let state_rows: Vec<&GeoMetrics> = averaged
            .iter()
            .filter(|((level, _), _)| *level == GeoLevel::State)
            .map(|(_, m)| m)
            .collect();
        GeoMetrics {
            population: sum_estimates(state_rows.iter().map(|m| m.population)),
            renter_households: sum_estimates(state_rows.iter().map(|m| m.renter_households)),
            lost_wage_households: sum_estimates(
                state_rows.iter().map(|m| m.lost_wage_households),
            ),
            need_no_ui: sum_estimates(state_rows.iter().map(|m| m.need_no_ui)),
            need_regular: sum_estimates(state_rows.iter().map(|m| m.need_regular)),
            need_plus_600: sum_estimates(state_rows.iter().map(|m| m.need_plus_600)),
            need_plus_300: sum_estimates(state_rows.iter().map(|m| m.need_plus_300)),
            // Share denominators never use the mean; carried for completeness
            mean_need_regular: mean_estimate(state_rows.iter().map(|m| m.mean_need_regular)),
        }
    };

    Ok(SimulationResults {
        params: params.clone(),
        state: build_table(GeoLevel::State, &averaged, &statewide, params),
        county: build_table(GeoLevel::County, &averaged, &statewide, params),
        city: build_table(GeoLevel::City, &averaged, &statewide, params),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::industry::{classify, IndustryGroup};
    use crate::{EmploymentStatus, HouseholdRecord, PersonRecord};
    use approx::assert_relative_eq;

    fn test_person(
        household_id: u64,
        person_id: u32,
        industry_code: u16,
        wage: f64,
        weight: f64,
    ) -> PersonRecord {
        PersonRecord {
            household_id,
            person_id,
            industry_code,
            industry_group: classify(industry_code),
            wage_income: wage,
            employment: if wage > 0.0 {
                EmploymentStatus::Employed
            } else {
                EmploymentStatus::NotInLaborForce
            },
            weight,
            ui_monthly_regular: if wage > 0.0 { 1200.0 } else { 0.0 },
        }
    }

    fn test_household(
        household_id: u64,
        county: &str,
        rent: Option<f64>,
        income: f64,
        weight: f64,
    ) -> HouseholdRecord {
        HouseholdRecord {
            household_id,
            is_renter: rent.is_some(),
            gross_rent: rent,
            annual_income: income,
            weight,
            geo: Geography {
                state: "New York".to_string(),
                county: Some(county.to_string()),
                city: if county == "Bronx" {
                    Some("New York City".to_string())
                } else {
                    None
                },
            },
        }
    }

    fn test_data() -> Microdata {
        let households = vec![
            test_household(1, "Bronx", Some(1200.0), 30_000.0, 100.0),
            test_household(2, "Bronx", Some(1500.0), 48_000.0, 80.0),
            test_household(3, "Erie", Some(900.0), 24_000.0, 120.0),
            test_household(4, "Erie", None, 70_000.0, 90.0),
        ];
        let persons = vec![
            test_person(1, 1, 2070, 30_000.0, 100.0),
            test_person(1, 2, 0, 0.0, 100.0),
            test_person(2, 1, 8590, 28_000.0, 80.0),
            test_person(2, 2, 2070, 20_000.0, 80.0),
            test_person(3, 1, 8590, 24_000.0, 120.0),
            test_person(4, 1, 6070, 70_000.0, 90.0),
        ];
        Microdata {
            persons,
            households,
        }
    }

    fn test_rates() -> LossRates {
        LossRates::from_pct_changes([
            (IndustryGroup::Manufacturing, -20.0),
            (IndustryGroup::LeisureHospitality, -48.0),
            (IndustryGroup::TransportWarehousing, -15.0),
        ])
    }

    fn test_params(num_trials: usize, base_seed: u64) -> SimParams {
        let mut params = SimParams::baseline();
        params.num_trials = num_trials;
        params.base_seed = base_seed;
        params
    }

    #[test]
    fn test_population_matches_person_weights() {
        let data = test_data();
        let table = run_trial(&data, &test_rates(), &test_params(1, 42), 42);

        let state = &table[&(GeoLevel::State, "New York".to_string())];
        assert_relative_eq!(state.population.value, 570.0);

        let bronx = &table[&(GeoLevel::County, "Bronx".to_string())];
        assert_relative_eq!(bronx.population.value, 360.0);
    }

    #[test]
    fn test_renter_households_exclude_owners() {
        let data = test_data();
        let table = run_trial(&data, &test_rates(), &test_params(1, 42), 42);

        let erie = &table[&(GeoLevel::County, "Erie".to_string())];
        // Household 4 owns; only household 3 (weight 120) rents in Erie
        assert_relative_eq!(erie.renter_households.value, 120.0);
    }

    #[test]
    fn test_city_table_present_when_tagged() {
        let data = test_data();
        let table = run_trial(&data, &test_rates(), &test_params(1, 42), 42);
        assert!(table.contains_key(&(GeoLevel::City, "New York City".to_string())));
        // Erie households carry no city tag
        assert_eq!(
            table
                .keys()
                .filter(|(level, _)| *level == GeoLevel::City)
                .count(),
            1
        );
    }

    #[test]
    fn test_trial_determinism() {
        let data = test_data();
        let params = test_params(1, 7);
        let a = run_trial(&data, &test_rates(), &params, 7);
        let b = run_trial(&data, &test_rates(), &params, 7);

        for (key, metrics) in &a {
            assert_eq!(metrics.need_regular, b[key].need_regular);
            assert_eq!(metrics.lost_wage_households, b[key].lost_wage_households);
        }
    }

    #[test]
    fn test_invalid_params_fail_before_simulation() {
        let data = test_data();
        let mut params = test_params(1, 42);
        params.ui_takeup_rate = 1.5;
        assert!(run_simulation(&data, &test_rates(), &params).is_err());

        params = test_params(0, 42);
        assert!(matches!(
            run_simulation(&data, &test_rates(), &params),
            Err(ParamError::InvalidTrials(0))
        ));
    }

    #[test]
    fn test_external_averaging_matches_internal_trials() {
        // R=N internally must equal N single-trial runs averaged outside,
        // since trial i always derives its seed as base_seed + i
        let data = test_data();
        let rates = test_rates();
        let n = 8;

        let internal = run_simulation(&data, &rates, &test_params(n, 100)).unwrap();

        let mut external_sum = 0.0;
        for i in 0..n {
            let single =
                run_simulation(&data, &rates, &test_params(1, 100 + i as u64)).unwrap();
            external_sum += single.state.rows[0].need_regular.total.value;
        }
        let external = external_sum / n as f64;

        assert_relative_eq!(
            internal.state.rows[0].need_regular.total.value,
            external,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_state_share_of_state_is_one() {
        let data = test_data();
        let results = run_simulation(&data, &test_rates(), &test_params(4, 42)).unwrap();

        let row = &results.state.rows[0];
        assert_relative_eq!(row.population.state_share.value, 1.0);
        assert_relative_eq!(row.population.state_share.moe, 0.0);
    }

    #[test]
    fn test_county_population_shares_sum_to_one() {
        let data = test_data();
        let results = run_simulation(&data, &test_rates(), &test_params(4, 42)).unwrap();

        let total: f64 = results
            .county
            .rows
            .iter()
            .map(|r| r.population.state_share.value)
            .sum();
        assert_relative_eq!(total, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_allocation_proportional_to_population_share() {
        let data = test_data();
        let params = test_params(4, 42);
        let results = run_simulation(&data, &test_rates(), &params).unwrap();

        let pool = POPULATION_ALLOCATION_SHARE * params.total_funds;
        for row in &results.county.rows {
            assert_relative_eq!(
                row.allocation.value,
                pool * row.population.state_share.value,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn test_rows_sorted_by_geography() {
        let data = test_data();
        let results = run_simulation(&data, &test_rates(), &test_params(2, 42)).unwrap();
        let names: Vec<&str> = results
            .county
            .rows
            .iter()
            .map(|r| r.geography.as_str())
            .collect();
        assert_eq!(names, vec!["Bronx", "Erie"]);
    }

    #[test]
    fn test_need_totals_nonnegative() {
        let data = test_data();
        let results = run_simulation(&data, &test_rates(), &test_params(6, 42)).unwrap();
        for table in results.tables() {
            for row in &table.rows {
                assert!(row.need_no_ui.total.value >= 0.0);
                assert!(row.need_regular.total.value >= 0.0);
                assert!(row.need_plus_600.total.value >= 0.0);
                assert!(row.need_plus_300.total.value >= 0.0);
            }
        }
    }
}
