//! Batch Experiment Runner
//!
//! Runs the rental-assistance simulation from a TOML experiment
//! configuration: input data paths, simulation parameters, and output
//! settings.
//!
//! Usage:
//!   cargo run --release --bin run_experiment -- experiments/baseline.toml

use rental_assistance::data::{read_loss_rates_path, read_microdata_path};
use rental_assistance::engine::run_simulation;
use rental_assistance::output::{print_results, ReportBundle};
use rental_assistance::SimParams;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Top-level experiment configuration
#[derive(Debug, Clone, Deserialize)]
struct ExperimentConfig {
    experiment: ExperimentMetadata,
    data: DataPaths,
    params: ParamSettings,
    output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct ExperimentMetadata {
    name: String,
    description: String,
    num_trials: usize,
    base_seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DataPaths {
    microdata: PathBuf,
    unemployment: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ParamSettings {
    ui_takeup_rate: f64,
    total_funds: f64,
    target_rent_burden: Option<f64>,
    show_moe: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSettings {
    dir: PathBuf,
    save_tables: bool,
    save_summary: bool,
}

impl ExperimentConfig {
    fn to_sim_params(&self) -> SimParams {
        SimParams {
            num_trials: self.experiment.num_trials,
            ui_takeup_rate: self.params.ui_takeup_rate,
            total_funds: self.params.total_funds,
            target_rent_burden: self.params.target_rent_burden.unwrap_or(0.30),
            base_seed: self.experiment.base_seed,
            show_moe: self.params.show_moe.unwrap_or(true),
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <experiment_config.toml>", args[0]);
        eprintln!("Example: {} experiments/baseline.toml", args[0]);
        std::process::exit(1);
    }

    let config_path = &args[1];
    println!("=== Rental Assistance Experiment Runner ===\n");
    println!("Loading experiment config: {}\n", config_path);

    let config_str = fs::read_to_string(config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: ExperimentConfig = toml::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing TOML config: {}", e);
        std::process::exit(1);
    });

    println!("Experiment: {}", config.experiment.name);
    println!("Description: {}", config.experiment.description);
    println!(
        "Configuration: {} trials (base seed {})\n",
        config.experiment.num_trials, config.experiment.base_seed
    );

    // Parameters are checked before the expensive load/run work
    let params = config.to_sim_params();
    if let Err(e) = params.validate() {
        eprintln!("Invalid parameter: {}", e);
        std::process::exit(1);
    }

    let data = read_microdata_path(&config.data.microdata).unwrap_or_else(|e| {
        eprintln!(
            "Error reading microdata {}: {}",
            config.data.microdata.display(),
            e
        );
        std::process::exit(1);
    });
    println!(
        "Loaded {} persons in {} households",
        data.persons.len(),
        data.households.len()
    );

    let loss_rates = read_loss_rates_path(&config.data.unemployment).unwrap_or_else(|e| {
        eprintln!(
            "Error reading unemployment table {}: {}",
            config.data.unemployment.display(),
            e
        );
        std::process::exit(1);
    });
    println!("Loss probabilities for {} industry groups\n", loss_rates.len());

    println!("Running {} trials...", params.num_trials);
    let start = Instant::now();
    let results = run_simulation(&data, &loss_rates, &params).unwrap_or_else(|e| {
        eprintln!("Simulation failed: {}", e);
        std::process::exit(1);
    });
    println!(
        "✓ Completed {} trials in {:.1}s\n",
        params.num_trials,
        start.elapsed().as_secs_f64()
    );

    print_results(&results);

    let bundle = ReportBundle::new(results, data.persons.len(), data.households.len());
    let output_dir = config.output.dir.join(&config.experiment.name);

    if config.output.save_tables || config.output.save_summary {
        fs::create_dir_all(&output_dir).unwrap_or_else(|e| {
            eprintln!("Error creating output directory: {}", e);
            std::process::exit(1);
        });
    }

    if config.output.save_tables {
        for table in bundle.results.tables() {
            let path = output_dir.join(format!("{}.csv", table.level));
            bundle.write_table_csv(table, &path).unwrap_or_else(|e| {
                eprintln!("Error writing {}: {}", path.display(), e);
                std::process::exit(1);
            });
        }
    }

    if config.output.save_summary {
        let path = output_dir.join("summary.json");
        bundle.write_summary_json(&path).unwrap_or_else(|e| {
            eprintln!("Error writing {}: {}", path.display(), e);
            std::process::exit(1);
        });
    }

    if config.output.save_tables || config.output.save_summary {
        println!("\nResults saved to: {}", output_dir.display());
    }
}
