//! Emergency Rental Assistance Need - Demo Simulation
//!
//! Runs the full pipeline against a seeded synthetic New York State
//! population: stochastic job-loss assignment from industry employment
//! declines, household need under four UI scenarios, survey-weighted
//! county/city/state tables, and the proportional fund allocation.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Gamma;
use rental_assistance::data::monthly_benefit;
use rental_assistance::engine::run_simulation;
use rental_assistance::industry::{classify, IndustryGroup, LossRates};
use rental_assistance::output::print_results;
use rental_assistance::{
    EmploymentStatus, Geography, HouseholdRecord, Microdata, PersonRecord, SimParams,
};

/// Counties with their city tag and a relative population weight
const COUNTIES: [(&str, Option<&str>, f64); 10] = [
    ("Bronx", Some("New York City"), 1.4),
    ("Kings", Some("New York City"), 2.6),
    ("New York", Some("New York City"), 1.6),
    ("Queens", Some("New York City"), 2.3),
    ("Richmond", Some("New York City"), 0.5),
    ("Erie", Some("Buffalo"), 0.9),
    ("Monroe", Some("Rochester"), 0.7),
    ("Nassau", None, 1.4),
    ("Suffolk", None, 1.5),
    ("Westchester", None, 1.0),
];

/// Representative census industry code per coarse group
fn representative_code(group: IndustryGroup) -> u16 {
    match group {
        IndustryGroup::MiningLogging => 380,
        IndustryGroup::Construction => 770,
        IndustryGroup::Manufacturing => 2070,
        IndustryGroup::WholesaleTrade => 4170,
        IndustryGroup::RetailTrade => 4970,
        IndustryGroup::TransportWarehousing => 6070,
        IndustryGroup::Utilities => 570,
        IndustryGroup::Information => 6570,
        IndustryGroup::FinancialActivities => 6870,
        IndustryGroup::ProfessionalBusiness => 7370,
        IndustryGroup::EducationHealth => 7860,
        IndustryGroup::LeisureHospitality => 8590,
        IndustryGroup::OtherServices => 8770,
    }
}

/// Spring-2020-style percent employment changes by supersector
fn demo_loss_rates() -> LossRates {
    LossRates::from_pct_changes([
        (IndustryGroup::MiningLogging, -8.7),
        (IndustryGroup::Construction, -41.2),
        (IndustryGroup::Manufacturing, -17.3),
        (IndustryGroup::WholesaleTrade, -10.6),
        (IndustryGroup::RetailTrade, -21.2),
        (IndustryGroup::TransportWarehousing, -14.1),
        (IndustryGroup::Utilities, -1.5),
        (IndustryGroup::Information, -12.0),
        (IndustryGroup::FinancialActivities, -5.2),
        (IndustryGroup::ProfessionalBusiness, -13.8),
        (IndustryGroup::EducationHealth, -14.9),
        (IndustryGroup::LeisureHospitality, -48.2),
        (IndustryGroup::OtherServices, -31.5),
    ])
}

fn gamma(mean: f64, std: f64) -> Gamma<f64> {
    // k = (mu/sigma)^2, theta = sigma^2/mu
    Gamma::new((mean / std).powi(2), std.powi(2) / mean).expect("valid gamma parameters")
}

/// Generate a seeded synthetic population grouped into households
fn generate_population(num_households: u64, seed: u64) -> Microdata {
    let mut rng = StdRng::seed_from_u64(seed);

    let county_weights = WeightedIndex::new(COUNTIES.iter().map(|(_, _, w)| *w))
        .expect("county weights are positive");
    // Employment mix loosely follows statewide shares
    let industry_weights = WeightedIndex::new([
        0.2, 4.0, 5.5, 3.0, 10.0, 5.0, 0.6, 3.0, 7.0, 13.0, 22.0, 10.0, 4.0,
    ])
    .expect("industry weights are positive");

    let rent_dist = gamma(1400.0, 450.0);
    let wage_dist = gamma(42_000.0, 26_000.0);

    let mut persons = Vec::new();
    let mut households = Vec::new();

    for household_id in 0..num_households {
        let (county, city, _) = COUNTIES[county_weights.sample(&mut rng)];
        let in_city = city.is_some();

        let weight = rng.gen_range(60.0..140.0);
        let is_renter = rng.gen::<f64>() < if in_city { 0.55 } else { 0.35 };
        let gross_rent = is_renter.then(|| rent_dist.sample(&mut rng).max(300.0));

        let mut wage_sum = 0.0;
        let num_adults: u32 = rng.gen_range(1..=3);
        for person_id in 1..=num_adults {
            let has_wage = rng.gen::<f64>() < 0.7;
            let (wage, industry_code, employment) = if has_wage {
                let wage = wage_dist.sample(&mut rng);
                // A sliver of the workforce falls outside the 13 groups
                let code = if rng.gen::<f64>() < 0.04 {
                    170
                } else {
                    representative_code(IndustryGroup::ALL[industry_weights.sample(&mut rng)])
                };
                (wage, code, EmploymentStatus::Employed)
            } else {
                (0.0, 0, EmploymentStatus::NotInLaborForce)
            };
            wage_sum += wage;

            persons.push(PersonRecord {
                household_id,
                person_id,
                industry_code,
                industry_group: classify(industry_code),
                wage_income: wage,
                employment,
                weight: weight * rng.gen_range(0.9..1.1),
                ui_monthly_regular: monthly_benefit(wage),
            });
        }

        households.push(HouseholdRecord {
            household_id,
            is_renter,
            gross_rent,
            annual_income: wage_sum + rng.gen_range(0.0..18_000.0),
            weight,
            geo: Geography {
                state: "New York".to_string(),
                county: Some(county.to_string()),
                city: city.map(str::to_string),
            },
        });
    }

    Microdata {
        persons,
        households,
    }
}

fn main() {
    println!("=== Emergency Rental Assistance Need Simulation ===");
    println!("Synthetic New York State demo population\n");

    let params = SimParams::baseline();
    let num_households = 3000;
    let population_seed = 2020;

    println!("Configuration:");
    println!("  Trials: {}", params.num_trials);
    println!("  UI takeup rate: {}", params.ui_takeup_rate);
    println!("  Target rent burden: {}", params.target_rent_burden);
    println!("  Program funds: ${:.0}", params.total_funds);
    println!("  Base seed: {}\n", params.base_seed);

    let data = generate_population(num_households, population_seed);
    println!(
        "Generated {} persons in {} households",
        data.persons.len(),
        data.households.len()
    );

    let loss_rates = demo_loss_rates();
    println!("Loss probabilities for {} industry groups\n", loss_rates.len());

    println!("Running {} trials...", params.num_trials);
    let results = match run_simulation(&data, &loss_rates, &params) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            std::process::exit(1);
        }
    };

    print_results(&results);

    println!("\n=== Simulation Complete ===");
}
