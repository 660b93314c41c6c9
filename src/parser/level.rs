use std::fmt;

use serde::{Deserialize, Serialize};

/// JLPT difficulty bucket. Derived from the page number alone; pages outside
/// the known id ranges map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    N1,
    N2,
    N3,
    N4,
    N5,
    Unknown,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::N1,
        Level::N2,
        Level::N3,
        Level::N4,
        Level::N5,
        Level::Unknown,
    ];

    /// Classify by the disjoint inclusive id ranges the lesson series uses.
    pub fn from_page_number(number: u64) -> Self {
        match number {
            1..=207 => Level::N1,
            208..=362 => Level::N2,
            363..=521 => Level::N3,
            522..=640 => Level::N4,
            641..=793 => Level::N5,
            _ => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::N1 => "N1",
            Level::N2 => "N2",
            Level::N3 => "N3",
            Level::N4 => "N4",
            Level::N5 => "N5",
            Level::Unknown => "Unknown",
        })
    }
}
