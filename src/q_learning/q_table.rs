//! Q-table implementation for tabular Q-learning

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Action, StateKey};

/// Q-table mapping (state, action) pairs to Q-values
///
/// Entries that were never written read as 0.0, so an unseen action floors
/// a state's maximum at zero even when every learned value is negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QTable {
    q_values: HashMap<(StateKey, Action), f64>,
}

impl QTable {
    /// Create an empty Q-table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the Q-value for a state-action pair (0.0 if unseen)
    pub fn get(&self, state: &StateKey, action: Action) -> f64 {
        *self.q_values.get(&(*state, action)).unwrap_or(&0.0)
    }

    /// Set the Q-value for a state-action pair
    pub fn set(&mut self, state: StateKey, action: Action, value: f64) {
        self.q_values.insert((state, action), value);
    }

    /// Maximum Q-value over all actions in a state
    ///
    /// An unseen state reads as all zeros, so the result is 0.0 there rather
    /// than negative infinity.
    pub fn max_q(&self, state: &StateKey) -> f64 {
        Action::ALL
            .iter()
            .map(|&action| self.get(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// All actions tied for the maximum Q-value in a state, in canonical
    /// order. Never empty: with no entries, all six actions tie at 0.0.
    pub fn greedy_actions(&self, state: &StateKey) -> Vec<Action> {
        let mut best = f64::NEG_INFINITY;
        let mut ties = Vec::new();
        for &action in &Action::ALL {
            let q = self.get(state, action);
            if q > best {
                best = q;
                ties.clear();
                ties.push(action);
            } else if q == best {
                ties.push(action);
            }
        }
        ties
    }

    /// Q-learning update toward `reward + gamma * max_a' Q(s',a')`
    pub fn update(
        &mut self,
        state: StateKey,
        action: Action,
        reward: f64,
        next_state: &StateKey,
        gamma: f64,
        alpha: f64,
    ) {
        let current_q = self.get(&state, action);
        let td_target = reward + gamma * self.max_q(next_state);
        let new_q = current_q + alpha * (td_target - current_q);
        self.set(state, action, new_q);
    }

    /// All six action values for a state, in canonical order
    pub fn values_for(&self, state: &StateKey) -> Vec<(Action, f64)> {
        Action::ALL
            .iter()
            .map(|&action| (action, self.get(state, action)))
            .collect()
    }

    /// Iterate over all learned entries
    pub fn entries(&self) -> impl Iterator<Item = (&(StateKey, Action), &f64)> {
        self.q_values.iter()
    }

    /// Clear all learned values
    pub fn reset(&mut self) {
        self.q_values.clear();
    }

    /// Number of learned entries
    pub fn size(&self) -> usize {
        self.q_values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn state_at(x: u8, y: u8) -> StateKey {
        StateKey {
            taxi: Position::new(x, y),
            passenger: None,
            destination: None,
            passenger_aboard: false,
        }
    }

    #[test]
    fn unseen_entries_read_as_zero() {
        let table = QTable::new();
        assert_eq!(table.get(&state_at(0, 0), Action::North), 0.0);
        assert_eq!(table.max_q(&state_at(0, 0)), 0.0);
        assert_eq!(table.size(), 0);
    }

    #[test]
    fn set_then_get() {
        let mut table = QTable::new();
        let state = state_at(1, 2);
        table.set(state, Action::Pick, 1.5);
        assert_eq!(table.get(&state, Action::Pick), 1.5);
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn max_q_uses_the_zero_default_for_unseen_actions() {
        let mut table = QTable::new();
        let state = state_at(0, 0);
        table.set(state, Action::North, -3.0);
        // The five unseen actions still read as 0.0, so the max is 0.0.
        assert_eq!(table.max_q(&state), 0.0);

        for action in Action::ALL {
            table.set(state, action, -3.0);
        }
        // With every action learned, the true (negative) max wins.
        assert_eq!(table.max_q(&state), -3.0);
    }

    #[test]
    fn greedy_actions_returns_all_ties() {
        let mut table = QTable::new();
        let state = state_at(2, 0);
        assert_eq!(table.greedy_actions(&state).len(), 6);

        table.set(state, Action::East, 2.0);
        assert_eq!(table.greedy_actions(&state), vec![Action::East]);

        table.set(state, Action::Drop, 2.0);
        assert_eq!(table.greedy_actions(&state), vec![Action::East, Action::Drop]);
    }

    #[test]
    fn bellman_update_matches_hand_computation() {
        let mut table = QTable::new();
        let state = state_at(0, 0);
        let next = state_at(1, 0);

        table.set(state, Action::East, 2.0);
        table.set(next, Action::North, 5.0);

        // 2.0 + 0.1 * ((-1 + 0.9 * 5.0) - 2.0) = 2.25
        table.update(state, Action::East, -1.0, &next, 0.9, 0.1);
        assert!((table.get(&state, Action::East) - 2.25).abs() < 1e-12);
    }

    #[test]
    fn update_on_unseen_next_state_uses_zero_floor() {
        let mut table = QTable::new();
        let state = state_at(0, 0);
        let next = state_at(0, 1);

        table.update(state, Action::North, -1.0, &next, 0.9, 0.5);
        assert!((table.get(&state, Action::North) - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_everything() {
        let mut table = QTable::new();
        table.set(state_at(0, 0), Action::North, 1.0);
        table.set(state_at(1, 1), Action::South, 2.0);
        table.reset();
        assert_eq!(table.size(), 0);
        assert_eq!(table.get(&state_at(0, 0), Action::North), 0.0);
    }
}
