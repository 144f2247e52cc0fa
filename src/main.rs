use action_evolution::config::Config;
use action_evolution::driver::simulation::SimulatedCourse;
use action_evolution::driver::TrialDriver;
use action_evolution::evolution::{EvolutionRunner, GenerationSummary};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::process;

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!("Seeding random source with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    }
}

/// Report line for a run that ended without a winner. `first_generation` is
/// where this run started, which is past 1 after a resume.
fn no_winner_report(first_generation: u32, last_summary: Option<&GenerationSummary>) -> String {
    match last_summary {
        Some(summary) => format!(
            "No winner in generations {}..={} (best fitness of generation {}: {})",
            first_generation,
            summary.finished_generation,
            summary.finished_generation,
            summary.best_fitness
        ),
        None => format!(
            "No winner, no generation completed after starting at generation {}",
            first_generation
        ),
    }
}

fn main() {
    env_logger::init();
    info!("Booting action evolution...");

    // 1. Load and Validate Configuration
    let config = match Config::load(Path::new("config.toml")) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }
    info!("Configuration loaded and validated.");

    // 2. Build the population, resuming from the last export when asked to
    let rng = build_rng(config.run.seed);
    let mut runner = match EvolutionRunner::with_config(config.runner.clone(), rng) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create runner: {}", e);
            process::exit(1);
        }
    };
    let snapshot_path = config.run.snapshot_path.as_path();
    if config.run.resume {
        match runner.import_tests(snapshot_path) {
            Ok(()) => info!(
                "Resumed generation {} from '{}'",
                runner.current_generation(),
                snapshot_path.display()
            ),
            Err(e) => warn!("Starting fresh, could not resume: {}", e),
        }
    }

    // 3. Play trials until a script reaches the destination
    let course = SimulatedCourse::new(config.course.clone());
    let mut driver = TrialDriver::new(course, config.trial);
    let first_generation = runner.current_generation();
    let mut last_summary = None;
    let trials = driver.run(&mut runner, config.run.max_generations, |runner, summary| {
        last_summary = Some(*summary);
        if let Err(e) = runner.export_tests(snapshot_path) {
            warn!(
                "Failed to export generation {} to '{}': {}",
                runner.current_generation(),
                snapshot_path.display(),
                e
            );
        }
    });

    // 4. Report
    info!("--- Simulation finished after {} trials ---", trials);
    match runner.winner() {
        Some(winner) => {
            println!(
                "WINNER at generation {}: fitness {}, time {}, life {}",
                runner.current_generation(),
                winner.fitness,
                winner.elapsed_time,
                winner.life
            );
            for (pos, action) in winner.actions() {
                println!("  {:>6} {:?}", pos, action);
            }
            if let Err(e) = runner.export_tests(snapshot_path) {
                error!("Failed to export the winning generation: {}", e);
                process::exit(1);
            }
        }
        None => println!(
            "{}",
            no_winner_report(first_generation, last_summary.as_ref())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_winner_report_covers_resumed_range() {
        let summary = GenerationSummary {
            finished_generation: 7,
            best_fitness: 412.0,
            survivors: 2,
            population_size: 10,
        };
        assert_eq!(
            no_winner_report(5, Some(&summary)),
            "No winner in generations 5..=7 (best fitness of generation 7: 412)"
        );
    }

    #[test]
    fn test_no_winner_report_without_finished_generation() {
        assert_eq!(
            no_winner_report(3, None),
            "No winner, no generation completed after starting at generation 3"
        );
    }
}
