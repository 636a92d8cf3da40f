//! Epsilon-greedy Q-learning agent

use std::fmt::Write as _;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    q_learning::q_table::QTable,
    types::{Action, StateKey},
};

const DEFAULT_GAMMA: f64 = 0.9;
const DEFAULT_ALPHA: f64 = 0.1;
const DEFAULT_EPSILON: f64 = 0.1;

fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// Current hyperparameters plus table occupancy, as reported to callers and
/// attached to every step/episode event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub gamma: f64,
    pub alpha: f64,
    pub epsilon: f64,
    pub q_table_size: usize,
}

/// Tabular Q-learning agent for the taxi MDP
///
/// Action selection is epsilon-greedy: with probability epsilon a uniformly
/// random action, otherwise a uniformly random choice among the arg-max
/// actions. Since unseen entries read as 0.0, a never-visited state yields a
/// uniform choice over all six actions.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q_table: QTable,
    gamma: f64,
    alpha: f64,
    epsilon: f64,
    rng: StdRng,
}

impl QLearningAgent {
    /// Create an agent with the given hyperparameters.
    ///
    /// # Errors
    ///
    /// Rejects any hyperparameter outside `[0.0, 1.0]`.
    pub fn new(gamma: f64, alpha: f64, epsilon: f64) -> Result<Self> {
        let mut agent = Self::default();
        agent.set_gamma(gamma)?;
        agent.set_alpha(alpha)?;
        agent.set_epsilon(epsilon)?;
        Ok(agent)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Epsilon-greedy action selection
    pub fn select_action(&mut self, state: &StateKey) -> Action {
        if self.rng.random::<f64>() < self.epsilon {
            // Explore: uniform over the full vocabulary
            *Action::ALL.choose(&mut self.rng).unwrap()
        } else {
            self.greedy_action(state)
        }
    }

    /// Greedy action with uniform tie-breaking
    pub fn greedy_action(&mut self, state: &StateKey) -> Action {
        let ties = self.q_table.greedy_actions(state);
        // greedy_actions never returns an empty set
        *ties.choose(&mut self.rng).unwrap()
    }

    /// Bellman update for one experience tuple
    pub fn update(&mut self, state: &StateKey, action: Action, reward: f64, next_state: &StateKey) {
        self.q_table
            .update(*state, action, reward, next_state, self.gamma, self.alpha);
    }

    /// Forget everything learned; hyperparameters survive.
    pub fn reset(&mut self) {
        self.q_table.reset();
    }

    pub fn set_gamma(&mut self, gamma: f64) -> Result<()> {
        Self::validate("gamma", gamma)?;
        self.gamma = gamma;
        Ok(())
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        Self::validate("alpha", alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        Self::validate("epsilon", epsilon)?;
        self.epsilon = epsilon;
        Ok(())
    }

    /// Out-of-range values are rejected, not coerced: a caller that sends a
    /// bad hyperparameter gets an error and the stored value is untouched.
    fn validate(name: &'static str, value: f64) -> Result<()> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Error::InvalidHyperparameter { name, value })
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of learned (state, action) entries
    pub fn table_size(&self) -> usize {
        self.q_table.size()
    }

    /// All six action values for a state, in canonical order
    pub fn values_for_state(&self, state: &StateKey) -> Vec<(Action, f64)> {
        self.q_table.values_for(state)
    }

    pub fn parameters(&self) -> AgentStats {
        AgentStats {
            gamma: self.gamma,
            alpha: self.alpha,
            epsilon: self.epsilon,
            q_table_size: self.q_table.size(),
        }
    }

    pub(crate) fn q_table(&self) -> &QTable {
        &self.q_table
    }

    #[cfg(test)]
    pub(crate) fn q_table_mut(&mut self) -> &mut QTable {
        &mut self.q_table
    }

    /// Human-readable explanation of what the agent would do in `state`.
    ///
    /// Demonstration/debugging output only; not part of the learning
    /// contract.
    pub fn explain_decision(&mut self, state: &StateKey) -> String {
        let values = self.q_table.values_for(state);
        let greedy = self.greedy_action(state);

        let mut out = String::new();
        let _ = writeln!(out, "Agent decision for state:");
        let _ = writeln!(out, "  taxi at {}", state.taxi);
        match (state.passenger, state.passenger_aboard) {
            (_, true) => {
                let _ = writeln!(out, "  passenger: aboard");
            }
            (Some(p), false) => {
                let _ = writeln!(out, "  passenger waiting at {p}");
            }
            (None, false) => {
                let _ = writeln!(out, "  passenger: none spawned");
            }
        }
        if let Some(dest) = state.destination {
            let _ = writeln!(out, "  destination: {dest}");
        }
        let _ = writeln!(out, "Q-values:");
        for (action, value) in values {
            let marker = if action == greedy { "  <- best" } else { "" };
            let _ = writeln!(out, "  {:<5} {value:>8.3}{marker}", action.token());
        }
        let _ = writeln!(
            out,
            "Decision: {greedy} ({:.0}% chance of exploring instead)",
            self.epsilon * 100.0
        );
        out
    }
}

impl Default for QLearningAgent {
    fn default() -> Self {
        Self {
            q_table: QTable::new(),
            gamma: DEFAULT_GAMMA,
            alpha: DEFAULT_ALPHA,
            epsilon: DEFAULT_EPSILON,
            rng: build_rng(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::Position;

    fn fresh_state() -> StateKey {
        StateKey {
            taxi: Position::new(0, 0),
            passenger: Some(Position::new(2, 2)),
            destination: Some(Position::new(0, 2)),
            passenger_aboard: false,
        }
    }

    #[test]
    fn constructor_rejects_out_of_range_hyperparameters() {
        assert!(matches!(
            QLearningAgent::new(1.5, 0.1, 0.1),
            Err(Error::InvalidHyperparameter { name: "gamma", .. })
        ));
        assert!(matches!(
            QLearningAgent::new(0.9, -0.1, 0.1),
            Err(Error::InvalidHyperparameter { name: "alpha", .. })
        ));
        assert!(matches!(
            QLearningAgent::new(0.9, 0.1, f64::NAN),
            Err(Error::InvalidHyperparameter { name: "epsilon", .. })
        ));
    }

    #[test]
    fn rejected_setter_leaves_value_untouched() {
        let mut agent = QLearningAgent::new(0.9, 0.1, 0.1).unwrap();
        assert!(agent.set_gamma(2.0).is_err());
        assert_eq!(agent.gamma(), 0.9);
    }

    #[test]
    fn update_writes_through_to_the_table() {
        let mut agent = QLearningAgent::new(0.9, 0.1, 0.0).unwrap().with_seed(1);
        let state = fresh_state();
        let next = StateKey {
            taxi: Position::new(1, 0),
            ..state
        };
        agent.update(&state, Action::East, -1.0, &next);
        assert_eq!(agent.table_size(), 1);
        let values: HashMap<Action, f64> = agent.values_for_state(&state).into_iter().collect();
        assert!((values[&Action::East] - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn unseen_state_selection_is_roughly_uniform() {
        // Greedy on an empty table is a six-way tie, so even with epsilon = 0
        // every action should appear at roughly 1/6 frequency.
        let mut agent = QLearningAgent::new(0.9, 0.1, 0.0).unwrap().with_seed(7);
        let state = fresh_state();

        let trials = 6000;
        let mut counts: HashMap<Action, u32> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(agent.select_action(&state)).or_default() += 1;
        }

        for action in Action::ALL {
            let count = counts.get(&action).copied().unwrap_or(0);
            // Expected 1000, sd ~28.9; +/-200 is about 7 sd.
            assert!(
                (800..=1200).contains(&count),
                "action {action} drawn {count} times"
            );
        }
    }

    #[test]
    fn exploration_frequency_tracks_epsilon() {
        let epsilon = 0.2;
        let mut agent = QLearningAgent::new(0.9, 0.1, epsilon).unwrap().with_seed(21);
        let state = fresh_state();

        // Make NORTH strictly dominant so the greedy path is deterministic.
        agent.q_table_mut().set(state, Action::North, 5.0);

        let trials = 10_000;
        let mut non_dominant = 0u32;
        for _ in 0..trials {
            if agent.select_action(&state) != Action::North {
                non_dominant += 1;
            }
        }

        // Exploration picks uniformly over all six actions, so non-dominant
        // draws occur at rate epsilon * 5/6 ~= 0.1667 (sd ~0.0037).
        let observed = f64::from(non_dominant) / trials as f64;
        let expected = epsilon * 5.0 / 6.0;
        assert!(
            (observed - expected).abs() < 0.03,
            "non-dominant rate {observed:.4}, expected ~{expected:.4}"
        );
    }

    #[test]
    fn reset_clears_the_table_but_keeps_hyperparameters() {
        let mut agent = QLearningAgent::new(0.8, 0.2, 0.3).unwrap().with_seed(3);
        let state = fresh_state();
        agent.update(&state, Action::Pick, -5.0, &state);
        assert_eq!(agent.table_size(), 1);

        agent.reset();
        assert_eq!(agent.table_size(), 0);
        assert_eq!(agent.gamma(), 0.8);
        assert_eq!(agent.alpha(), 0.2);
        assert_eq!(agent.epsilon(), 0.3);
    }

    #[test]
    fn explanation_marks_the_dominant_action() {
        let mut agent = QLearningAgent::new(0.9, 0.1, 0.1).unwrap().with_seed(5);
        let state = fresh_state();
        agent.q_table_mut().set(state, Action::Pick, 3.0);

        let report = agent.explain_decision(&state);
        assert!(report.contains("PICK"));
        assert!(report.contains("<- best"));
        assert!(report.contains("Decision: PICK"));
    }
}
