//! Core domain vocabulary: positions, actions, and state views
//!
//! Two views of the world state exist side by side:
//!
//! - [`StateKey`] is the agent-facing observation used to index the Q-table.
//! - [`StateSnapshot`] is the serializable schema shared by every synchronous
//!   response and every training event, so observers render identically
//!   regardless of what triggered the payload.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A cell on the grid. Coordinates grow east (x) and north (y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parse `"x,y"` as used by CLI obstacle arguments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || Error::ParsePosition {
            input: s.to_string(),
        };
        let (x, y) = s.split_once(',').ok_or_else(err)?;
        Ok(Position {
            x: x.trim().parse().map_err(|_| err())?,
            y: y.trim().parse().map_err(|_| err())?,
        })
    }
}

/// The fixed action vocabulary of the taxi MDP.
///
/// The declaration order is the canonical enumeration order for tie-break
/// scans and introspection output; it carries no semantic weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    North,
    South,
    East,
    West,
    Pick,
    Drop,
}

impl Action {
    /// All six actions in canonical order.
    pub const ALL: [Action; 6] = [
        Action::North,
        Action::South,
        Action::East,
        Action::West,
        Action::Pick,
        Action::Drop,
    ];

    /// Wire token for this action.
    pub fn token(&self) -> &'static str {
        match self {
            Action::North => "NORTH",
            Action::South => "SOUTH",
            Action::East => "EAST",
            Action::West => "WEST",
            Action::Pick => "PICK",
            Action::Drop => "DROP",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORTH" => Ok(Action::North),
            "SOUTH" => Ok(Action::South),
            "EAST" => Ok(Action::East),
            "WEST" => Ok(Action::West),
            "PICK" => Ok(Action::Pick),
            "DROP" => Ok(Action::Drop),
            _ => Err(Error::InvalidAction {
                input: s.to_string(),
            }),
        }
    }
}

/// Agent-facing observation of the environment, used as the Q-table key.
///
/// Invariant (maintained by the environment): `passenger_aboard` implies
/// `passenger == Some(taxi)` and `destination.is_some()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub taxi: Position,
    pub passenger: Option<Position>,
    pub destination: Option<Position>,
    pub passenger_aboard: bool,
}

/// Serializable state snapshot, stable across all responses and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub taxi: Position,
    pub passenger: Option<Position>,
    pub destination: Option<Position>,
    pub passenger_aboard: bool,
    pub total_reward: f64,
    pub steps: u32,
    pub grid_size: u8,
    pub obstacles: Vec<Position>,
}
