//! Selection, crossover and mutation over collections of `ActionSequence`.
//!
//! Every operator that needs randomness takes it as a parameter so a run can be
//! replayed from a seed.

use crate::action::Action;
use crate::evolution::ActionSequence;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fewest survivors a generation boundary keeps, so there is always at least
/// one crossover pair.
pub const MIN_SURVIVORS: usize = 2;

/// What mutation does after it replaces an action that already existed at the
/// sampled position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPolicy {
    /// Stop scanning the chromosome after the first hit on an existing entry.
    /// Insertions at empty positions never stop the scan.
    #[default]
    FirstReplacement,
    /// Apply every sampled mutation.
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationSettings {
    /// Independent probability of mutating each position
    pub rate: f64,
    pub policy: MutationPolicy,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            rate: 0.01,
            policy: MutationPolicy::FirstReplacement,
        }
    }
}

/// Sorts the population best first by (fitness, -elapsed time, life).
///
/// The sort is stable, so chromosomes with identical keys keep their storage
/// order.
pub fn rank(population: &mut [ActionSequence]) {
    population.sort_by(|a, b| a.rank_cmp(b));
}

/// Number of elites kept out of a population of `population_len`.
///
/// `max(floor(elite_fraction * len), MIN_SURVIVORS)`, never more than the
/// population actually holds.
pub fn survivor_count(population_len: usize, elite_fraction: f64) -> usize {
    let elites = (elite_fraction * population_len as f64).floor() as usize;
    elites.max(MIN_SURVIVORS).min(population_len)
}

/// Splices two parents at `split`: every entry of `a` at or before the split,
/// followed by every entry of `b` strictly after it.
///
/// # Arguments
/// * `a` - Parent contributing the head of the script
/// * `b` - Parent contributing the tail of the script
/// * `split` - Last position taken from `a`
///
/// # Returns
/// * `ActionSequence` - The child, with outcome fields at their defaults
pub fn crossover_at(a: &ActionSequence, b: &ActionSequence, split: u32) -> ActionSequence {
    let head = a.actions_in(..=split);
    let tail = b.actions_in((std::ops::Bound::Excluded(split), std::ops::Bound::Unbounded));
    ActionSequence::from_actions(head.chain(tail))
}

/// This is the crossover operator
///
/// Breeds one child for every ordered pair of distinct survivors, so `S`
/// survivors yield `S * (S - 1)` offspring. Each child gets its own split point
/// drawn uniformly from `[1, destination_position]`.
///
/// Offspring are returned separately; the caller decides how to merge them
/// with the survivors.
///
/// # Arguments
/// * `survivors` - The elite set, already ranked
/// * `destination_position` - Upper bound of the split range
/// * `rng` - Random source for the split points
///
/// # Returns
/// * `Vec<ActionSequence>` - Offspring in `(i, j)` iteration order
pub fn crossover(
    survivors: &[ActionSequence],
    destination_position: u32,
    rng: &mut impl Rng,
) -> Vec<ActionSequence> {
    let count = survivors.len();
    let mut offspring = Vec::with_capacity(count * count.saturating_sub(1));
    for (i, parent_a) in survivors.iter().enumerate() {
        for (j, parent_b) in survivors.iter().enumerate() {
            if i == j {
                continue;
            }
            let split = rng.random_range(1..=destination_position);
            offspring.push(crossover_at(parent_a, parent_b, split));
        }
    }
    offspring
}

/// Mutates every chromosome in place
///
/// It uses a Per-Position-Probabilistic Mutation approach: each position in
/// `[0, destination_position)` independently rolls against `settings.rate`. A
/// hit draws a fresh movement action; an entry already at that position is
/// overwritten when the draw differs, otherwise the draw is inserted as a new
/// entry. Under `MutationPolicy::FirstReplacement` the scan of a chromosome
/// ends at its first hit on an existing entry, whether or not the action
/// changed.
///
/// # Arguments
/// * `population` - Chromosomes to mutate; the slice length never changes
/// * `destination_position` - Exclusive upper bound of mutable positions
/// * `settings` - Rate and replacement policy
/// * `rng` - Random source
///
/// # Returns
/// * `usize` - Total number of entries inserted or changed
pub fn mutate(
    population: &mut [ActionSequence],
    destination_position: u32,
    settings: MutationSettings,
    rng: &mut impl Rng,
) -> usize {
    let mut changed = 0;
    for test in population.iter_mut() {
        changed += mutate_one(test, destination_position, settings, rng);
    }
    debug!(
        "Mutation touched {} entries across {} chromosomes",
        changed,
        population.len()
    );
    changed
}

fn mutate_one(
    test: &mut ActionSequence,
    destination_position: u32,
    settings: MutationSettings,
    rng: &mut impl Rng,
) -> usize {
    let mut changed = 0;
    let actions = test.actions_mut();
    for pos in 0..destination_position {
        if rng.random::<f64>() >= settings.rate {
            continue;
        }
        let new_action = Action::random_movement(rng);
        match actions.get_mut(&pos) {
            Some(existing) => {
                if *existing != new_action {
                    *existing = new_action;
                    changed += 1;
                }
                if settings.policy == MutationPolicy::FirstReplacement {
                    break;
                }
            }
            None => {
                actions.insert(pos, new_action);
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::TrialOutcome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn get_test_parent(entries: &[(u32, Action)]) -> ActionSequence {
        ActionSequence::from_actions(entries.iter().copied())
    }

    fn scored(fitness: f64) -> ActionSequence {
        let mut test = get_test_parent(&[(0, Action::MoveRight)]);
        test.record(TrialOutcome::score(fitness));
        test
    }

    #[test]
    fn test_survivor_count_floor() {
        assert_eq!(survivor_count(4, 0.2), 2);
        assert_eq!(survivor_count(2, 0.2), 2);
        assert_eq!(survivor_count(9, 0.2), 2);
        assert_eq!(survivor_count(10, 0.2), 2);
        assert_eq!(survivor_count(15, 0.2), 3);
        assert_eq!(survivor_count(25, 0.2), 5);
        assert_eq!(survivor_count(1, 0.2), 1);
    }

    #[test]
    fn test_rank_orders_by_composite_key() {
        let mut population = vec![scored(10.0), scored(80.0), scored(40.0), scored(5.0)];
        population[0].elapsed_time = 3.0;
        rank(&mut population);
        let fitness: Vec<f64> = population.iter().map(|t| t.fitness).collect();
        assert_eq!(fitness, vec![80.0, 40.0, 10.0, 5.0]);
    }

    #[test]
    fn test_rank_is_stable_for_full_ties() {
        let mut first = scored(50.0);
        first.actions_mut().insert(10, Action::Jump);
        let second = scored(50.0);
        let mut population = vec![first.clone(), second.clone()];
        rank(&mut population);
        assert_eq!(population[0], first);
        assert_eq!(population[1], second);
    }

    #[test]
    fn test_crossover_at_respects_split() {
        let a = get_test_parent(&[
            (0, Action::MoveRight),
            (50, Action::Jump),
            (100, Action::Shoot),
        ]);
        let b = get_test_parent(&[
            (0, Action::MoveLeft),
            (50, Action::Charge),
            (75, Action::StopMovement),
            (150, Action::Jump),
        ]);

        let child = crossover_at(&a, &b, 50);
        let actions: Vec<_> = child.actions().collect();
        assert_eq!(
            actions,
            vec![
                (0, Action::MoveRight),
                (50, Action::Jump),
                (75, Action::StopMovement),
                (150, Action::Jump),
            ]
        );
        assert_eq!(child.fitness, 0.0);
    }

    #[test]
    fn test_crossover_at_split_beyond_all_entries_clones_head() {
        let a = get_test_parent(&[(0, Action::MoveRight), (90, Action::Dash)]);
        let b = get_test_parent(&[(0, Action::MoveLeft), (10, Action::Jump)]);
        let child = crossover_at(&a, &b, 100);
        assert_eq!(child.actions().collect::<Vec<_>>(), a.actions().collect::<Vec<_>>());
    }

    #[test]
    fn test_crossover_produces_ordered_pairs() {
        let mut rng = StdRng::seed_from_u64(3);
        let survivors: Vec<ActionSequence> = (0..4)
            .map(|i| get_test_parent(&[(0, Action::MoveRight), (i * 10 + 5, Action::Jump)]))
            .collect();

        let offspring = crossover(&survivors, 100, &mut rng);
        assert_eq!(offspring.len(), 4 * 3);
        for child in &offspring {
            assert_eq!(child.fitness, 0.0);
            let positions: Vec<u32> = child.actions().map(|(p, _)| p).collect();
            let mut sorted = positions.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(positions, sorted);
        }
    }

    #[test]
    fn test_crossover_split_containment() {
        // Parents whose entries are tagged by action so inheritance is visible
        let a = get_test_parent(&(0..100).map(|p| (p, Action::MoveRight)).collect::<Vec<_>>());
        let b = get_test_parent(&(0..100).map(|p| (p, Action::MoveLeft)).collect::<Vec<_>>());
        for split in [1, 17, 50, 99, 100] {
            let child = crossover_at(&a, &b, split);
            for (pos, action) in child.actions() {
                match action {
                    Action::MoveRight => assert!(pos <= split),
                    Action::MoveLeft => assert!(pos > split),
                    other => panic!("unexpected action {:?}", other),
                }
            }
            assert_eq!(child.len(), 100);
        }
    }

    #[test]
    fn test_mutation_never_changes_population_size() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut population: Vec<ActionSequence> =
            (0..6).map(|_| ActionSequence::create(&mut rng)).collect();
        let settings = MutationSettings {
            rate: 0.5,
            policy: MutationPolicy::Exhaustive,
        };
        mutate(&mut population, 200, settings, &mut rng);
        assert_eq!(population.len(), 6);
        for test in &population {
            assert!(test.actions().all(|(pos, action)| pos < 200 && action.is_movement()));
        }
    }

    #[test]
    fn test_mutation_with_zero_rate_is_noop() {
        let mut rng = StdRng::seed_from_u64(5);
        let original = vec![get_test_parent(&[(0, Action::Dash), (40, Action::Start)])];
        let mut population = original.clone();
        let settings = MutationSettings {
            rate: 0.0,
            ..MutationSettings::default()
        };
        assert_eq!(mutate(&mut population, 100, settings, &mut rng), 0);
        assert_eq!(population, original);
    }

    #[test]
    fn test_exhaustive_mutation_fills_every_position() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut population = vec![get_test_parent(&[(0, Action::Dash)])];
        let settings = MutationSettings {
            rate: 1.0,
            policy: MutationPolicy::Exhaustive,
        };
        mutate(&mut population, 50, settings, &mut rng);
        assert_eq!(population[0].len(), 50);
        // Dash is outside the movement subset, so position 0 must have been replaced
        assert!(population[0].action_at(0).unwrap().is_movement());
    }

    #[test]
    fn test_first_replacement_stops_at_existing_entry() {
        let mut rng = StdRng::seed_from_u64(9);
        // Position 0 is occupied, so the very first hit ends the scan
        let mut population = vec![get_test_parent(&[(0, Action::Dash)])];
        let settings = MutationSettings {
            rate: 1.0,
            policy: MutationPolicy::FirstReplacement,
        };
        mutate(&mut population, 50, settings, &mut rng);
        assert_eq!(population[0].len(), 1);
        assert!(population[0].action_at(0).unwrap().is_movement());
    }

    #[test]
    fn test_first_replacement_keeps_inserting_until_hit() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut population = vec![get_test_parent(&[(10, Action::Dash)])];
        let settings = MutationSettings {
            rate: 1.0,
            policy: MutationPolicy::FirstReplacement,
        };
        mutate(&mut population, 50, settings, &mut rng);
        let positions: Vec<u32> = population[0].actions().map(|(p, _)| p).collect();
        assert_eq!(positions, (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_default_rate_inserts_about_one_percent_of_positions() {
        let mut rng = StdRng::seed_from_u64(2024);
        let destination = 10_000;
        let mut population = vec![ActionSequence::default(); 20];
        let changed = mutate(
            &mut population,
            destination,
            MutationSettings::default(),
            &mut rng,
        );
        // Roughly 0.01 * destination = 100 insertions per empty chromosome
        for test in &population {
            assert!(
                (60..=140).contains(&test.len()),
                "{} insertions is far from the expected 100",
                test.len()
            );
        }
        let mean = changed as f64 / population.len() as f64;
        assert!((85.0..=115.0).contains(&mean), "mean insertions {}", mean);
    }
}
