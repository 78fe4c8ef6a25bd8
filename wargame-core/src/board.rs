//! Grid geometry and move notation

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Board dimension (the board is `BOARD_DIM` x `BOARD_DIM`)
pub const BOARD_DIM: i8 = 5;

/// Column labels, left to right
const COLUMN_LABELS: &[u8; 5] = b"ABCDE";

/// Characters ignored when parsing notation
const SEPARATORS: &[char] = &[' ', ',', '.', ':', ';', '-', '_'];

/// Grid coordinate. Row 0 (`1`) is the top of the board.
///
/// Serialized as notation (`"C3"`) so ruleset files stay readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coord {
    pub col: i8,
    pub row: i8,
}

impl Coord {
    pub const fn new(col: i8, row: i8) -> Self {
        Self { col, row }
    }

    /// Check if this coordinate is on the board
    pub fn is_valid(&self) -> bool {
        (0..BOARD_DIM).contains(&self.col) && (0..BOARD_DIM).contains(&self.row)
    }

    /// All board cells in row-major order (top row first)
    pub fn all() -> impl Iterator<Item = Coord> {
        (0..BOARD_DIM).flat_map(|row| (0..BOARD_DIM).map(move |col| Coord::new(col, row)))
    }

    /// Neighbor in a direction (may be off the board)
    pub fn step(&self, direction: Direction) -> Coord {
        let (dc, dr) = direction.delta();
        Coord::new(self.col + dc, self.row + dr)
    }

    /// On-board neighbors for the given adjacency
    pub fn neighbors(&self, adjacency: Adjacency) -> impl Iterator<Item = Coord> {
        let origin = *self;
        adjacency
            .directions()
            .iter()
            .map(move |&d| origin.step(d))
            .filter(Coord::is_valid)
    }

    /// Direction from `self` to an orthogonally or diagonally adjacent cell
    pub fn direction_to(&self, other: Coord) -> Option<Direction> {
        let delta = (other.col - self.col, other.row - self.row);
        Direction::ALL.iter().copied().find(|d| d.delta() == delta)
    }

    /// Whether `other` is adjacent under the given adjacency
    pub fn is_adjacent(&self, other: Coord, adjacency: Adjacency) -> bool {
        self.direction_to(other)
            .map_or(false, |d| adjacency.directions().contains(&d))
    }

    /// Manhattan distance between two cells
    pub fn distance_to(&self, other: Coord) -> i8 {
        (self.col - other.col).abs() + (self.row - other.row).abs()
    }

    fn parse_chars(column: char, row: char) -> Result<Coord, ParseError> {
        let col = COLUMN_LABELS
            .iter()
            .position(|&c| c as char == column.to_ascii_uppercase())
            .ok_or(ParseError::InvalidColumn(column))?;
        let row_index = row
            .to_digit(10)
            .filter(|d| (1..=BOARD_DIM as u32).contains(d))
            .ok_or(ParseError::InvalidRow(row))?;
        Ok(Coord::new(col as i8, row_index as i8 - 1))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col = COLUMN_LABELS
            .get(self.col as usize)
            .map_or('?', |&c| c as char);
        if (0..9).contains(&self.row) {
            write!(f, "{}{}", col, self.row + 1)
        } else {
            write!(f, "{}?", col)
        }
    }
}

impl FromStr for Coord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().filter(|c| !SEPARATORS.contains(c)).collect();
        match chars.as_slice() {
            [c, r] => Coord::parse_chars(*c, *r),
            _ => Err(ParseError::WrongLength {
                input: s.to_string(),
                expected: 2,
            }),
        }
    }
}

impl TryFrom<String> for Coord {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coord> for String {
    fn from(coord: Coord) -> Self {
        coord.to_string()
    }
}

/// Source and target cells as typed at the boundary, e.g. `E2 D2`.
///
/// A pair whose source equals its target denotes self-destruct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoordPair {
    pub src: Coord,
    pub dst: Coord,
}

impl CoordPair {
    pub const fn new(src: Coord, dst: Coord) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for CoordPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.src, self.dst)
    }
}

impl FromStr for CoordPair {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().filter(|c| !SEPARATORS.contains(c)).collect();
        match chars.as_slice() {
            [c0, r0, c1, r1] => Ok(CoordPair::new(
                Coord::parse_chars(*c0, *r0)?,
                Coord::parse_chars(*c1, *r1)?,
            )),
            _ => Err(ParseError::WrongLength {
                input: s.trim().to_string(),
                expected: 4,
            }),
        }
    }
}

/// Step directions. The first four are orthogonal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub const ORTHOGONAL: [Direction; 4] =
        [Direction::Up, Direction::Left, Direction::Down, Direction::Right];

    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];

    /// (column delta, row delta)
    pub const fn delta(self) -> (i8, i8) {
        match self {
            Direction::Up => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Right => (1, 0),
            Direction::UpLeft => (-1, -1),
            Direction::UpRight => (1, -1),
            Direction::DownLeft => (-1, 1),
            Direction::DownRight => (1, 1),
        }
    }

    pub fn is_orthogonal(self) -> bool {
        Direction::ORTHOGONAL.contains(&self)
    }
}

/// Which cells count as "adjacent" for engagement, attack and repair.
///
/// Movement is always orthogonal and self-destruct always hits all eight
/// surrounding cells; only combat reach is configurable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adjacency {
    /// Up, down, left, right
    #[default]
    Orthogonal,
    /// All eight surrounding cells
    Surrounding,
}

impl Adjacency {
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Adjacency::Orthogonal => &Direction::ORTHOGONAL,
            Adjacency::Surrounding => &Direction::ALL,
        }
    }
}
