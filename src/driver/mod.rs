//! The loop that plays chromosomes out against a game.
//!
//! The runner only knows about scripts and scores. A `TrialDriver` feeds the
//! pending script to an `ActionExecutor` as the `ProgressSource` reports
//! forward movement, watches for the conditions that end a trial, and reports
//! the outcome back to the runner.

pub mod simulation;

use crate::action::Action;
use crate::evolution::{ActionSequence, EvolutionRunner, GenerationSummary, TrialOutcome};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One observation of the game state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub position: u32,
    pub health: u32,
}

/// Supplies progress measurements. Each call to `sample` observes one tick of
/// the game.
pub trait ProgressSource {
    fn sample(&mut self) -> Status;
}

/// Performs actions in the game.
pub trait ActionExecutor {
    fn perform(&mut self, action: Action);

    /// Puts the game back at the start of the course before the next trial.
    fn reset(&mut self);
}

/// Executor-side copy of a script: entries leave the queue as soon as they
/// are dispatched, so each fires exactly once per trial.
#[derive(Debug, Clone, Default)]
pub struct PendingActions {
    queue: VecDeque<(u32, Action)>,
}

impl PendingActions {
    pub fn new(test: &ActionSequence) -> Self {
        Self {
            queue: test.actions().collect(),
        }
    }

    /// Pops every action whose trigger position has been reached, in ascending
    /// position order.
    pub fn due(&mut self, position: u32) -> Vec<Action> {
        let mut due = Vec::new();
        while let Some(&(trigger, action)) = self.queue.front() {
            if trigger > position {
                break;
            }
            due.push(action);
            self.queue.pop_front();
        }
        due
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Conditions that end a trial early, read from the `[trial]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialLimits {
    /// Retreating below this position ends the trial
    pub min_position: u32,
    /// Ticks without movement or a dispatched action before the trial counts as stalled
    pub stall_limit_ticks: u32,
}

impl Default for TrialLimits {
    fn default() -> Self {
        // 10 seconds at 30 ticks per second
        Self {
            min_position: 10,
            stall_limit_ticks: 300,
        }
    }
}

/// Why a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialEnd {
    Died,
    Stalled,
    Retreated,
    ReachedDestination,
}

/// Watches successive observations of one trial.
#[derive(Debug, Clone)]
pub struct TrialMonitor {
    limits: TrialLimits,
    destination_position: u32,
    last_position: Option<u32>,
    idle_ticks: u32,
}

impl TrialMonitor {
    pub fn new(limits: TrialLimits, destination_position: u32) -> Self {
        Self {
            limits,
            destination_position,
            last_position: None,
            idle_ticks: 0,
        }
    }

    /// Feeds one observation.
    ///
    /// # Arguments
    /// * `status` - The latest sample
    /// * `acted` - Whether an action was dispatched this tick; acting counts as activity
    ///
    /// # Returns
    /// * `Option<TrialEnd>` - The reason the trial must stop, if any
    pub fn observe(&mut self, status: Status, acted: bool) -> Option<TrialEnd> {
        if status.position >= self.destination_position {
            return Some(TrialEnd::ReachedDestination);
        }
        if status.health == 0 {
            return Some(TrialEnd::Died);
        }
        if status.position < self.limits.min_position {
            return Some(TrialEnd::Retreated);
        }

        let moved = self.last_position != Some(status.position);
        self.last_position = Some(status.position);
        if moved || acted {
            self.idle_ticks = 0;
            return None;
        }
        self.idle_ticks += 1;
        (self.idle_ticks > self.limits.stall_limit_ticks).then_some(TrialEnd::Stalled)
    }
}

/// Outcome of one played trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialReport {
    pub generation: u32,
    /// Zero-based index of the trial within its generation
    pub test_index: usize,
    pub end: TrialEnd,
    pub outcome: TrialOutcome,
}

/// Plays chromosomes against a game and reports back to the runner.
pub struct TrialDriver<G> {
    game: G,
    limits: TrialLimits,
}

impl<G: ProgressSource + ActionExecutor> TrialDriver<G> {
    pub fn new(game: G, limits: TrialLimits) -> Self {
        Self { game, limits }
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    /// Plays the runner's pending chromosome until the monitor ends it, then
    /// finishes the trial on the runner.
    ///
    /// The score is the final position, elapsed time is the number of ticks
    /// played and life is the health left.
    ///
    /// # Returns
    /// * `(TrialReport, Option<GenerationSummary>)` - The trial report, plus a summary when it closed a generation
    pub fn run_trial<R: Rng>(
        &mut self,
        runner: &mut EvolutionRunner<R>,
    ) -> (TrialReport, Option<GenerationSummary>) {
        let generation = runner.current_generation();
        let test_index = runner.current_test_index();
        let mut pending = PendingActions::new(runner.current_test());
        let mut monitor = TrialMonitor::new(self.limits, runner.destination_position());

        self.game.reset();
        let mut ticks: u32 = 0;
        let (end, last) = loop {
            let status = self.game.sample();
            ticks += 1;
            let due = pending.due(status.position);
            let acted = !due.is_empty();
            for action in due {
                self.game.perform(action);
            }
            if let Some(end) = monitor.observe(status, acted) {
                break (end, status);
            }
        };

        let outcome = TrialOutcome::new(
            f64::from(last.position),
            f64::from(ticks),
            f64::from(last.health),
        );
        debug!(
            "Generation {}, Test {} ended ({:?}) | Score was {}",
            generation,
            test_index + 1,
            end,
            last.position
        );
        let summary = runner.finish_current_test(outcome);
        let report = TrialReport {
            generation,
            test_index,
            end,
            outcome,
        };
        (report, summary)
    }

    /// Keeps playing trials until a winner exists or `max_generations`
    /// generations have been evaluated.
    ///
    /// # Arguments
    /// * `runner` - The runner to drive
    /// * `max_generations` - Last generation allowed to start
    /// * `on_generation` - Called after every generation boundary, e.g. to export a snapshot
    ///
    /// # Returns
    /// * `usize` - Number of trials played
    pub fn run<R, F>(
        &mut self,
        runner: &mut EvolutionRunner<R>,
        max_generations: u32,
        mut on_generation: F,
    ) -> usize
    where
        R: Rng,
        F: FnMut(&EvolutionRunner<R>, &GenerationSummary),
    {
        let mut trials = 0;
        info!(
            "Starting AI simulation at generation {}",
            runner.current_generation()
        );
        while !runner.has_winner() && runner.current_generation() <= max_generations {
            let (_, summary) = self.run_trial(runner);
            trials += 1;
            if let Some(summary) = summary {
                on_generation(runner, &summary);
            }
        }
        trials
    }
}
