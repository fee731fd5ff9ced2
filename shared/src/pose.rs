//! Orientation and pose value types
//!
//! A pose is the complete state of a drone on its matrix. Poses are plain
//! `Copy` values: every successful step produces a new one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compass heading of a drone. Cycles N -> E -> S -> W -> N when turning right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "S")]
    South,
    /// Part of the fleet's client code labels west "O" (Ouest); accepted on input only.
    #[serde(rename = "W", alias = "O")]
    West,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::North,
        Orientation::East,
        Orientation::South,
        Orientation::West,
    ];

    /// Rotate 90 degrees clockwise
    pub fn turn_right(self) -> Self {
        match self {
            Orientation::North => Orientation::East,
            Orientation::East => Orientation::South,
            Orientation::South => Orientation::West,
            Orientation::West => Orientation::North,
        }
    }

    /// Rotate 90 degrees counter-clockwise
    pub fn turn_left(self) -> Self {
        match self {
            Orientation::North => Orientation::West,
            Orientation::West => Orientation::South,
            Orientation::South => Orientation::East,
            Orientation::East => Orientation::North,
        }
    }

    /// Unit offset of one advance in this heading, as (dx, dy)
    pub fn delta(self) -> (i8, i8) {
        match self {
            Orientation::North => (0, 1),
            Orientation::East => (1, 0),
            Orientation::South => (0, -1),
            Orientation::West => (-1, 0),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Orientation::North => 'N',
            Orientation::East => 'E',
            Orientation::South => 'S',
            Orientation::West => 'W',
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error for an orientation label outside N/E/S/W (and the west alias O)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown orientation label: {0:?}")]
pub struct UnknownOrientation(pub String);

impl FromStr for Orientation {
    type Err = UnknownOrientation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Orientation::North),
            "E" => Ok(Orientation::East),
            "S" => Ok(Orientation::South),
            "W" | "O" => Ok(Orientation::West),
            other => Err(UnknownOrientation(other.to_string())),
        }
    }
}

/// Position and heading of a drone at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pose {
    pub x: u32,
    pub y: u32,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(x: u32, y: u32, orientation: Orientation) -> Self {
        Self { x, y, orientation }
    }

    pub fn turned_left(self) -> Self {
        Self {
            orientation: self.orientation.turn_left(),
            ..self
        }
    }

    pub fn turned_right(self) -> Self {
        Self {
            orientation: self.orientation.turn_right(),
            ..self
        }
    }

    /// Cell one step ahead, or `None` when that step would go below zero
    /// or past `u32::MAX`. Upper bounds are the matrix's business.
    pub fn cell_ahead(&self) -> Option<(u32, u32)> {
        let (dx, dy) = self.orientation.delta();
        let x = self.x.checked_add_signed(dx as i32)?;
        let y = self.y.checked_add_signed(dy as i32)?;
        Some((x, y))
    }

    pub fn same_cell(&self, other: &Pose) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.orientation)
    }
}
