//! Challenge selection
//!
//! Draws the next action uniformly from the pool, excluding actions the
//! subject has already completed, until the required count is reached.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::types::{ActionKind, CHALLENGE_POOL};

/// What the selector wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Next(ActionKind),
    Complete,
}

/// Randomized, non-repeating challenge picker
#[derive(Debug, Clone)]
pub struct ChallengeSelector {
    rng: StdRng,
    required: usize,
}

impl ChallengeSelector {
    /// Selector seeded from OS entropy
    pub fn new(required: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            required,
        }
    }

    /// Selector with a fixed seed, for reproducible sequences
    pub fn with_seed(required: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            required,
        }
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Pick an action not in `completed`, or signal completion once
    /// `completed` holds the required number of actions.
    pub fn pick_next(&mut self, completed: &[ActionKind]) -> Selection {
        if completed.len() >= self.required {
            return Selection::Complete;
        }

        let remaining: Vec<ActionKind> = CHALLENGE_POOL
            .iter()
            .copied()
            .filter(|action| !completed.contains(action))
            .collect();

        match remaining.choose(&mut self.rng) {
            Some(action) => Selection::Next(*action),
            // pool exhausted before the required count; nothing left to ask
            None => Selection::Complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_never_repeats_completed_actions() {
        for seed in 0..200 {
            let mut selector = ChallengeSelector::with_seed(4, seed);
            let completed = [ActionKind::Blink, ActionKind::Smile];

            match selector.pick_next(&completed) {
                Selection::Next(action) => assert!(!completed.contains(&action)),
                Selection::Complete => panic!("selector completed early"),
            }
        }
    }

    #[test]
    fn test_required_count_distinct_actions() {
        for seed in 0..200 {
            let mut selector = ChallengeSelector::with_seed(2, seed);
            let mut completed = Vec::new();

            while let Selection::Next(action) = selector.pick_next(&completed) {
                completed.push(action);
            }

            let distinct: HashSet<ActionKind> = completed.iter().copied().collect();
            assert_eq!(completed.len(), 2);
            assert_eq!(distinct.len(), 2);
            assert!(distinct.iter().all(|a| CHALLENGE_POOL.contains(a)));
        }
    }

    #[test]
    fn test_completes_once_required_reached() {
        let mut selector = ChallengeSelector::new(2);
        let completed = [ActionKind::TurnLeft, ActionKind::TurnRight];
        assert_eq!(selector.pick_next(&completed), Selection::Complete);
    }

    #[test]
    fn test_last_remaining_action_is_forced() {
        let mut selector = ChallengeSelector::new(4);
        let completed = [ActionKind::Blink, ActionKind::TurnLeft, ActionKind::Smile];
        assert_eq!(
            selector.pick_next(&completed),
            Selection::Next(ActionKind::TurnRight)
        );
    }

    #[test]
    fn test_every_action_reachable() {
        let mut seen = HashSet::new();
        let mut selector = ChallengeSelector::with_seed(2, 7);
        for _ in 0..200 {
            if let Selection::Next(action) = selector.pick_next(&[]) {
                seen.insert(action);
            }
        }
        assert_eq!(seen.len(), CHALLENGE_POOL.len());
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ChallengeSelector::with_seed(2, 42);
        let mut b = ChallengeSelector::with_seed(2, 42);
        for _ in 0..20 {
            assert_eq!(a.pick_next(&[]), b.pick_next(&[]));
        }
    }
}
