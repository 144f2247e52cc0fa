pub mod operators;
pub mod runner;

use crate::action::Action;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub use runner::{EvolutionRunner, GenerationSummary, RunnerError};

/// The result a trial driver reports for one finished test.
///
/// `elapsed_time` and `life` only matter as tie-breaks between chromosomes that
/// reached the same fitness.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrialOutcome {
    pub score: f64,
    pub elapsed_time: f64,
    pub life: f64,
}

impl TrialOutcome {
    /// An outcome that only carries a score, with time and life left at 0.
    pub fn score(score: f64) -> Self {
        Self {
            score,
            ..Self::default()
        }
    }

    pub fn new(score: f64, elapsed_time: f64, life: f64) -> Self {
        Self {
            score,
            elapsed_time,
            life,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.score.is_finite() && self.elapsed_time.is_finite() && self.life.is_finite()
    }
}

/// NaN compares as `worst` so a broken report can never outrank a real one.
fn or_worst(value: f64, worst: f64) -> f64 {
    if value.is_nan() {
        worst
    } else {
        value
    }
}

/// One candidate solution born during evolution: a script of actions keyed by
/// the position at which each should fire, plus the outcome of its last trial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    /// Trigger position -> action. Keyed storage keeps the script ascending and
    /// free of duplicate positions no matter how entries are inserted.
    actions: BTreeMap<u32, Action>,
    /// Furthest progress reached during the trial, or whatever score proxy the
    /// driver supplied
    pub fitness: f64,
    /// Time the trial took, lower wins among equal fitness
    pub elapsed_time: f64,
    /// Health left when the trial ended, higher wins among equal fitness and time
    pub life: f64,
}

impl ActionSequence {
    /// Creates a fresh chromosome holding a single random movement action at
    /// position 0.
    ///
    /// # Arguments
    /// * `rng` - Random source used to draw the opening action
    ///
    /// # Returns
    /// * `Self` - A chromosome with exactly one entry and zeroed outcome fields
    pub fn create(rng: &mut impl Rng) -> Self {
        let mut actions = BTreeMap::new();
        actions.insert(0, Action::random_movement(rng));
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Rebuilds a chromosome from `(position, action)` pairs. A later pair for an
    /// already present position replaces the earlier one.
    pub fn from_actions<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = (u32, Action)>,
    {
        Self {
            actions: actions.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Iterates the script in ascending position order.
    pub fn actions(&self) -> impl DoubleEndedIterator<Item = (u32, Action)> + '_ {
        self.actions.iter().map(|(&pos, &action)| (pos, action))
    }

    /// Entries whose position lies in `range`, ascending.
    pub(crate) fn actions_in<B>(&self, range: B) -> impl Iterator<Item = (u32, Action)> + '_
    where
        B: std::ops::RangeBounds<u32>,
    {
        self.actions.range(range).map(|(&pos, &action)| (pos, action))
    }

    pub fn action_at(&self, position: u32) -> Option<Action> {
        self.actions.get(&position).copied()
    }

    pub(crate) fn actions_mut(&mut self) -> &mut BTreeMap<u32, Action> {
        &mut self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Records the outcome of a finished trial on this chromosome.
    pub fn record(&mut self, outcome: TrialOutcome) {
        self.fitness = outcome.score;
        self.elapsed_time = outcome.elapsed_time;
        self.life = outcome.life;
    }

    /// Orders two chromosomes best first: higher fitness, then lower elapsed
    /// time, then higher life. NaN in any field ranks as the worst value.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        let fitness = |t: &Self| or_worst(t.fitness, f64::NEG_INFINITY);
        let time = |t: &Self| or_worst(t.elapsed_time, f64::INFINITY);
        let life = |t: &Self| or_worst(t.life, f64::NEG_INFINITY);
        fitness(other)
            .total_cmp(&fitness(self))
            .then_with(|| time(self).total_cmp(&time(other)))
            .then_with(|| life(other).total_cmp(&life(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(fitness: f64, elapsed_time: f64, life: f64) -> ActionSequence {
        let mut test = ActionSequence::default();
        test.record(TrialOutcome::new(fitness, elapsed_time, life));
        test
    }

    #[test]
    fn test_create_has_single_opening_action() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let test = ActionSequence::create(&mut rng);
            let actions: Vec<_> = test.actions().collect();
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].0, 0);
            assert!(actions[0].1.is_movement());
            assert_eq!(test.fitness, 0.0);
            assert_eq!(test.elapsed_time, 0.0);
            assert_eq!(test.life, 0.0);
        }
    }

    #[test]
    fn test_from_actions_sorts_by_position() {
        let test = ActionSequence::from_actions(vec![
            (300, Action::Jump),
            (0, Action::MoveRight),
            (120, Action::Shoot),
        ]);
        let positions: Vec<u32> = test.actions().map(|(pos, _)| pos).collect();
        assert_eq!(positions, vec![0, 120, 300]);
        assert_eq!(test.action_at(120), Some(Action::Shoot));
        assert_eq!(test.action_at(121), None);
    }

    #[test]
    fn test_rank_cmp_tie_breaks() {
        // Higher fitness wins outright
        assert_eq!(
            scored(80.0, 99.0, 0.0).rank_cmp(&scored(40.0, 1.0, 16.0)),
            Ordering::Less
        );
        // Equal fitness: faster wins
        assert_eq!(
            scored(80.0, 10.0, 0.0).rank_cmp(&scored(80.0, 20.0, 16.0)),
            Ordering::Less
        );
        // Equal fitness and time: more life wins
        assert_eq!(
            scored(80.0, 10.0, 4.0).rank_cmp(&scored(80.0, 10.0, 8.0)),
            Ordering::Greater
        );
        assert_eq!(
            scored(80.0, 10.0, 4.0).rank_cmp(&scored(80.0, 10.0, 4.0)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_rank_cmp_puts_nan_last() {
        assert_eq!(
            scored(f64::NAN, 0.0, 0.0).rank_cmp(&scored(5.0, 0.0, 0.0)),
            Ordering::Greater
        );
        assert_eq!(
            scored(-f64::NAN, 0.0, 0.0).rank_cmp(&scored(-1.0e9, 0.0, 0.0)),
            Ordering::Greater
        );
        assert_eq!(
            scored(80.0, f64::NAN, 0.0).rank_cmp(&scored(80.0, 500.0, 0.0)),
            Ordering::Greater
        );
        assert_eq!(
            scored(80.0, 10.0, f64::NAN).rank_cmp(&scored(80.0, 10.0, 0.0)),
            Ordering::Greater
        );
    }
}
