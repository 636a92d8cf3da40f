//! Grid-world taxi environment
//!
//! A deterministic-transition, stochastic-event MDP: the taxi moves on a
//! small grid with obstacles, picks up a waiting passenger, and delivers it
//! to a destination cell. Passengers appear through a per-call Bernoulli
//! spawn, not on a schedule.
//!
//! ## Reward model
//!
//! | Event | Reward |
//! |-------|--------|
//! | valid move | -1 |
//! | blocked move | -5 |
//! | invalid PICK | -5 |
//! | valid PICK | 0 |
//! | invalid DROP | -5 |
//! | valid DROP | +10 |

use std::collections::{HashSet, VecDeque};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    error::{Error, Result},
    types::{Action, Position, StateKey, StateSnapshot},
};

/// Probability of a passenger appearing on any spawn attempt.
const SPAWN_PROBABILITY: f64 = 0.2;

const REWARD_MOVE: f64 = -1.0;
const REWARD_INVALID: f64 = -5.0;
const REWARD_DELIVERY: f64 = 10.0;

fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// The taxi grid world.
///
/// Owns grid geometry, the obstacle set, taxi/passenger/destination
/// positions, and the episode's reward and step accounting.
#[derive(Debug, Clone)]
pub struct GridWorld {
    grid_size: u8,
    obstacles: HashSet<Position>,
    taxi: Position,
    passenger: Option<Position>,
    destination: Option<Position>,
    passenger_aboard: bool,
    total_reward: f64,
    steps: u32,
    rng: StdRng,
}

impl GridWorld {
    /// Create a grid world with the requested obstacle layout.
    ///
    /// Requested obstacles are filtered to in-bounds cells and truncated to
    /// at most `grid_size - 1` entries. Each surviving candidate is then
    /// admitted only if adding it keeps every free cell reachable from
    /// (0, 0); candidates that would split the grid are silently dropped.
    /// Admission is greedy and first-come-first-served, so the accepted set
    /// depends on input order.
    pub fn new(grid_size: u8, requested_obstacles: &[Position]) -> Result<Self> {
        if !(3..=4).contains(&grid_size) {
            return Err(Error::InvalidGridSize { size: grid_size });
        }

        let max_obstacles = usize::from(grid_size) - 1;
        let in_bounds: Vec<Position> = requested_obstacles
            .iter()
            .copied()
            .filter(|p| p.x < grid_size && p.y < grid_size)
            .take(max_obstacles)
            .collect();

        let mut obstacles = HashSet::new();
        for candidate in in_bounds {
            obstacles.insert(candidate);
            if !all_cells_reachable(grid_size, &obstacles) {
                obstacles.remove(&candidate);
            }
        }

        let mut world = Self {
            grid_size,
            obstacles,
            taxi: Position::new(0, 0),
            passenger: None,
            destination: None,
            passenger_aboard: false,
            total_reward: 0.0,
            steps: 0,
            rng: build_rng(None),
        };
        world.spawn_passenger();
        Ok(world)
    }

    /// Replace the RNG with a seeded one and re-roll the initial spawn, for
    /// deterministic tests and reproducible demo runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.reset();
        self
    }

    /// Start a fresh episode: taxi to (0, 0), passenger cleared, one spawn
    /// attempt, reward and step counters zeroed.
    pub fn reset(&mut self) -> StateSnapshot {
        self.taxi = Position::new(0, 0);
        self.passenger = None;
        self.destination = None;
        self.passenger_aboard = false;
        self.total_reward = 0.0;
        self.steps = 0;
        self.spawn_passenger();
        self.snapshot()
    }

    /// Execute one action and return the post-step snapshot.
    ///
    /// The step counter increments on every call, including bumped moves and
    /// rejected PICK/DROP attempts.
    pub fn step(&mut self, action: Action) -> StateSnapshot {
        match action {
            Action::Pick => self.handle_pick(),
            Action::Drop => self.handle_drop(),
            movement => self.handle_movement(movement),
        }

        if self.passenger.is_none() {
            self.spawn_passenger();
        }

        self.steps += 1;
        self.snapshot()
    }

    /// The observation the agent keys its Q-table on.
    pub fn state_key(&self) -> StateKey {
        StateKey {
            taxi: self.taxi,
            passenger: self.passenger,
            destination: self.destination,
            passenger_aboard: self.passenger_aboard,
        }
    }

    /// Full serializable snapshot of the world.
    pub fn snapshot(&self) -> StateSnapshot {
        let mut obstacles: Vec<Position> = self.obstacles.iter().copied().collect();
        obstacles.sort();
        StateSnapshot {
            taxi: self.taxi,
            passenger: self.passenger,
            destination: self.destination,
            passenger_aboard: self.passenger_aboard,
            total_reward: self.total_reward,
            steps: self.steps,
            grid_size: self.grid_size,
            obstacles,
        }
    }

    pub fn grid_size(&self) -> u8 {
        self.grid_size
    }

    pub fn obstacles(&self) -> &HashSet<Position> {
        &self.obstacles
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Attempt a stochastic passenger spawn.
    ///
    /// With probability 0.2, place a passenger on a uniformly random free
    /// cell and a destination on a distinct free cell. Otherwise do nothing.
    /// A per-call coin flip: there is no guarantee of a spawn within any
    /// bounded number of calls.
    fn spawn_passenger(&mut self) {
        if self.passenger.is_some() {
            return;
        }
        if self.rng.random::<f64>() < SPAWN_PROBABILITY {
            let passenger = self.random_free_cell();
            let destination = loop {
                let cell = self.random_free_cell();
                if cell != passenger {
                    break cell;
                }
            };
            self.passenger = Some(passenger);
            self.destination = Some(destination);
        }
    }

    fn random_free_cell(&mut self) -> Position {
        loop {
            let cell = Position::new(
                self.rng.random_range(0..self.grid_size),
                self.rng.random_range(0..self.grid_size),
            );
            if !self.obstacles.contains(&cell) {
                return cell;
            }
        }
    }

    fn is_free(&self, x: i16, y: i16) -> bool {
        x >= 0
            && y >= 0
            && x < i16::from(self.grid_size)
            && y < i16::from(self.grid_size)
            && !self.obstacles.contains(&Position::new(x as u8, y as u8))
    }

    fn handle_movement(&mut self, action: Action) {
        let (dx, dy) = match action {
            Action::North => (0, 1),
            Action::South => (0, -1),
            Action::East => (1, 0),
            Action::West => (-1, 0),
            Action::Pick | Action::Drop => unreachable!("dispatched in step"),
        };
        let x = i16::from(self.taxi.x) + dx;
        let y = i16::from(self.taxi.y) + dy;

        if self.is_free(x, y) {
            self.taxi = Position::new(x as u8, y as u8);
            if self.passenger_aboard {
                // The passenger rides along.
                self.passenger = Some(self.taxi);
            }
            self.total_reward += REWARD_MOVE;
        } else {
            self.total_reward += REWARD_INVALID;
        }
    }

    fn handle_pick(&mut self) {
        if self.passenger_aboard || self.passenger != Some(self.taxi) {
            self.total_reward += REWARD_INVALID;
            return;
        }
        self.passenger_aboard = true;
    }

    fn handle_drop(&mut self) {
        if !self.passenger_aboard || self.destination != Some(self.taxi) {
            self.total_reward += REWARD_INVALID;
            return;
        }
        self.passenger_aboard = false;
        self.passenger = None;
        self.destination = None;
        self.total_reward += REWARD_DELIVERY;
    }

    #[cfg(test)]
    pub(crate) fn place_passenger(&mut self, passenger: Position, destination: Position) {
        self.passenger = Some(passenger);
        self.destination = Some(destination);
        self.passenger_aboard = false;
    }

    #[cfg(test)]
    pub(crate) fn clear_passenger(&mut self) {
        self.passenger = None;
        self.destination = None;
        self.passenger_aboard = false;
    }
}

/// Breadth-first reachability check over the 4-neighborhood.
///
/// Returns true when every non-obstacle cell is reachable from (0, 0).
fn all_cells_reachable(grid_size: u8, obstacles: &HashSet<Position>) -> bool {
    let origin = Position::new(0, 0);
    if obstacles.contains(&origin) {
        return false;
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([origin]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        for (dx, dy) in [(0, 1), (0, -1), (1, 0), (-1, 0)] {
            let x = i16::from(current.x) + dx;
            let y = i16::from(current.y) + dy;
            if x >= 0 && y >= 0 && x < i16::from(grid_size) && y < i16::from(grid_size) {
                let next = Position::new(x as u8, y as u8);
                if !obstacles.contains(&next) && !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
    }

    let total_cells = usize::from(grid_size) * usize::from(grid_size);
    visited.len() == total_cells - obstacles.len()
}
