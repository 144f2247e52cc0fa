use crate::evolution::operators::{self, MutationPolicy, MutationSettings};
use crate::evolution::{ActionSequence, TrialOutcome};
use crate::export::{self, GenerationSnapshot, PersistenceError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunnerError {
    #[error("Invalid runner configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Trial {got} is not pending, the runner is waiting on trial {expected}")]
    StaleTrial { expected: usize, got: usize },
    #[error("Population is frozen on a winner, no further trials are accepted")]
    Frozen,
    #[error("Trial outcome must be finite, got {0:?}")]
    NonFiniteOutcome(TrialOutcome),
}

/// Parameters of the genetic algorithm, read from the `[runner]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub population_size: usize,
    /// Progress value a trial must reach to count as a winner; also the size of
    /// the position domain crossover and mutation work over
    pub destination_position: u32,
    /// Share of each generation kept as elites
    pub elite_fraction: f64,
    pub mutation_rate: f64,
    pub mutation_policy: MutationPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            population_size: 25,
            destination_position: 7600,
            elite_fraction: 0.2,
            mutation_rate: 0.01,
            mutation_policy: MutationPolicy::FirstReplacement,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.population_size < 1 {
            return Err(RunnerError::InvalidConfiguration(
                "population_size must be at least 1".to_string(),
            ));
        }
        if self.destination_position < 1 {
            return Err(RunnerError::InvalidConfiguration(
                "destination_position must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return Err(RunnerError::InvalidConfiguration(format!(
                "elite_fraction must lie in [0, 1], got {}",
                self.elite_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(RunnerError::InvalidConfiguration(format!(
                "mutation_rate must lie in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        Ok(())
    }

    fn mutation_settings(&self) -> MutationSettings {
        MutationSettings {
            rate: self.mutation_rate,
            policy: self.mutation_policy,
        }
    }
}

/// What a generation boundary produced, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSummary {
    /// Generation that was just evaluated
    pub finished_generation: u32,
    pub best_fitness: f64,
    pub survivors: usize,
    /// Size of the new population entering the next generation
    pub population_size: usize,
}

/// This is the beating heart of the crate: it owns the population and walks it
/// through trials and generations.
///
/// A single driver reads `current_test()`, plays it out, and reports back with
/// `finish_current_test`. When the last test of a generation finishes, the
/// runner ranks, truncates, breeds and mutates the population on its own. Once
/// any chromosome reaches `destination_position` the population is frozen.
///
/// Both `finish_current_test` and `advance_generation` mutate the population
/// size, generation counter and trial index together; a multi-threaded caller
/// must hold one lock across them.
#[derive(Debug, Clone)]
pub struct EvolutionRunner<R: Rng = StdRng> {
    config: RunnerConfig,
    tests: Vec<ActionSequence>,
    current_generation: u32,
    current_test: usize,
    rng: R,
}

impl<R: Rng> EvolutionRunner<R> {
    /// Creates a runner with default GA parameters.
    ///
    /// # Arguments
    /// * `population_size` - Number of chromosomes in the first generation (must be >= 1)
    /// * `destination_position` - Winning progress value (must be >= 1)
    /// * `rng` - Random source threaded through every genetic operator
    ///
    /// # Errors
    /// * `RunnerError::InvalidConfiguration` - if either bound is violated
    pub fn new(
        population_size: usize,
        destination_position: u32,
        rng: R,
    ) -> Result<Self, RunnerError> {
        Self::with_config(
            RunnerConfig {
                population_size,
                destination_position,
                ..RunnerConfig::default()
            },
            rng,
        )
    }

    /// Creates a runner from a full `RunnerConfig`. The configuration is
    /// validated before any chromosome is created.
    pub fn with_config(config: RunnerConfig, mut rng: R) -> Result<Self, RunnerError> {
        config.validate()?;
        info!(
            "Initializing population of size {} (destination {})...",
            config.population_size, config.destination_position
        );
        let tests = (0..config.population_size)
            .map(|_| ActionSequence::create(&mut rng))
            .collect();
        Ok(Self {
            config,
            tests,
            current_generation: 1,
            current_test: 0,
            rng,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn destination_position(&self) -> u32 {
        self.config.destination_position
    }

    pub fn current_generation(&self) -> u32 {
        self.current_generation
    }

    /// Zero-based index of the pending trial.
    pub fn current_test_index(&self) -> usize {
        self.current_test
    }

    pub fn tests(&self) -> &[ActionSequence] {
        &self.tests
    }

    pub fn population_len(&self) -> usize {
        self.tests.len()
    }

    /// The chromosome whose trial is pending.
    pub fn current_test(&self) -> &ActionSequence {
        assert!(
            self.current_test < self.tests.len(),
            "trial index {} out of range for population of {}",
            self.current_test,
            self.tests.len()
        );
        &self.tests[self.current_test]
    }

    pub fn is_last_test(&self) -> bool {
        self.current_test + 1 >= self.tests.len()
    }

    /// First chromosome, in storage order, whose fitness reached the
    /// destination.
    pub fn winner(&self) -> Option<&ActionSequence> {
        let destination = f64::from(self.config.destination_position);
        self.tests.iter().find(|test| test.fitness >= destination)
    }

    pub fn has_winner(&self) -> bool {
        self.winner().is_some()
    }

    /// Records the pending trial's outcome and moves on to the next one,
    /// rolling into a new generation after the last test.
    ///
    /// Must be called exactly once per completed trial. Use `finish_test` when
    /// the caller wants double reports rejected instead of silently applied to
    /// the next chromosome.
    ///
    /// Once a winner exists the report is dropped: neither outcome fields nor
    /// the trial index change, so the winning state cannot be overwritten.
    ///
    /// # Returns
    /// * `Option<GenerationSummary>` - Set when this call closed a generation and a new one was bred
    pub fn finish_current_test(&mut self, outcome: TrialOutcome) -> Option<GenerationSummary> {
        let index = self.current_test;
        assert!(
            index < self.tests.len(),
            "finish_current_test called with no pending trial (index {}, population {})",
            index,
            self.tests.len()
        );
        if self.has_winner() {
            warn!(
                "Trial {} finished after a winner was already found; report ignored",
                index + 1
            );
            return None;
        }
        self.tests[index].record(outcome);
        debug!(
            "Generation {}, Test {} | Score was {}",
            self.current_generation,
            index + 1,
            outcome.score
        );

        self.current_test += 1;
        if self.current_test < self.tests.len() {
            return None;
        }
        let summary = self.advance_generation();
        self.current_test = 0;
        summary
    }

    /// Checked form of `finish_current_test`: `index` must name the pending
    /// trial.
    ///
    /// # Errors
    /// * `RunnerError::Frozen` - if a winner already exists
    /// * `RunnerError::NonFiniteOutcome` - if any outcome field is NaN or infinite
    /// * `RunnerError::StaleTrial` - if `index` was already finished or is not yet due
    pub fn finish_test(
        &mut self,
        index: usize,
        outcome: TrialOutcome,
    ) -> Result<Option<GenerationSummary>, RunnerError> {
        if self.has_winner() {
            return Err(RunnerError::Frozen);
        }
        if !outcome.is_finite() {
            return Err(RunnerError::NonFiniteOutcome(outcome));
        }
        if index != self.current_test {
            return Err(RunnerError::StaleTrial {
                expected: self.current_test,
                got: index,
            });
        }
        Ok(self.finish_current_test(outcome))
    }

    /// Breeds the next generation from the current one.
    ///
    /// Does nothing while a winner exists. Otherwise ranks the population,
    /// keeps the elites, appends their offspring, mutates the whole set and
    /// bumps the generation counter. The trial index is left to the caller.
    ///
    /// # Returns
    /// * `Option<GenerationSummary>` - `None` when the population is frozen on a winner
    pub fn advance_generation(&mut self) -> Option<GenerationSummary> {
        if let Some(winner) = self.winner() {
            info!(
                "Generation {}: winner found with fitness {}, population frozen",
                self.current_generation, winner.fitness
            );
            return None;
        }

        operators::rank(&mut self.tests);
        let best_fitness = self.tests.first().map(|t| t.fitness).unwrap_or_default();
        let keep = operators::survivor_count(self.tests.len(), self.config.elite_fraction);
        self.tests.truncate(keep);

        let offspring =
            operators::crossover(&self.tests, self.config.destination_position, &mut self.rng);
        self.tests.extend(offspring);

        operators::mutate(
            &mut self.tests,
            self.config.destination_position,
            self.config.mutation_settings(),
            &mut self.rng,
        );

        let summary = GenerationSummary {
            finished_generation: self.current_generation,
            best_fitness,
            survivors: keep,
            population_size: self.tests.len(),
        };
        info!(
            "Gen {}: Best Fitness={} | Survivors={} | Next Population={}",
            summary.finished_generation, best_fitness, keep, summary.population_size
        );
        self.current_generation += 1;
        Some(summary)
    }

    /// Captures the generation number and every chromosome's script.
    pub fn snapshot(&self) -> GenerationSnapshot {
        GenerationSnapshot::new(self.current_generation, &self.tests)
    }

    /// Replaces the population with a previously captured generation.
    ///
    /// The snapshot is validated first; on error the runner is left exactly as
    /// it was. On success outcome fields start at 0 and the trial index resets.
    pub fn restore(&mut self, snapshot: GenerationSnapshot) -> Result<(), PersistenceError> {
        snapshot.validate()?;
        let (generation, tests) = snapshot.into_tests();
        self.current_generation = generation;
        self.tests = tests;
        self.current_test = 0;
        info!(
            "Restored generation {} with {} tests",
            self.current_generation,
            self.tests.len()
        );
        Ok(())
    }

    /// Writes the current generation to `path`, overwriting it.
    pub fn export_tests(&self, path: &Path) -> Result<(), PersistenceError> {
        export::write_snapshot_to_json(&self.snapshot(), path)
    }

    /// Loads a generation from `path`. Nothing changes unless the whole file
    /// parses and validates.
    pub fn import_tests(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let snapshot = export::read_snapshot_from_json(path).inspect_err(|e| {
            warn!("Unable to load tests from {}: {}", path.display(), e);
        })?;
        self.restore(snapshot)
    }
}
