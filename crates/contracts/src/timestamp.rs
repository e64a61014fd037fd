//! LogicalTimestamp - correlation label shared by all channels
//!
//! A tuple of integer coordinates compared lexicographically. Producers derive
//! it from simulation time in milliseconds (`[game_time_ms]`), but the engine
//! never interprets the coordinates, it only orders them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered logical timestamp.
///
/// Ordering is lexicographic over the coordinates, so `[5] < [7]` and
/// `[5, 1] < [5, 2]`.
///
/// # Examples
/// ```
/// use contracts::LogicalTimestamp;
///
/// let t5 = LogicalTimestamp::from(5);
/// let t7 = LogicalTimestamp::new(vec![7]);
/// assert!(t5 < t7);
/// assert_eq!(t5.to_string(), "[5]");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalTimestamp(Vec<u64>);

impl LogicalTimestamp {
    pub fn new(coordinates: Vec<u64>) -> Self {
        Self(coordinates)
    }

    pub fn coordinates(&self) -> &[u64] {
        &self.0
    }
}

impl From<u64> for LogicalTimestamp {
    fn from(value: u64) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<u64>> for LogicalTimestamp {
    fn from(value: Vec<u64>) -> Self {
        Self(value)
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, coordinate) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{coordinate}")?;
        }
        f.write_str("]")
    }
}
