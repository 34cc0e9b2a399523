//! Dispatch priority levels.
//!
//! Priorities are a small closed set of totally ordered levels. Every queue in the
//! crate keeps one bucket per level and indexes it with [`Priority::index`].

use crate::error::DispatchError;

use std::fmt;
use std::str::FromStr;

/// Priority at which an operation is queued.
///
/// Higher variants run first. Minimum-priority filters are inclusive, so a threshold
/// of `Medium` matches both `Medium` and `High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
}

impl Priority {
    /// Number of priority levels.
    pub const COUNT: usize = 3;

    pub const LOWEST: Priority = Priority::Low;
    pub const HIGHEST: Priority = Priority::High;

    /// All levels, lowest first.
    pub const ALL: [Priority; Priority::COUNT] = [Priority::Low, Priority::Medium, Priority::High];

    /// Bucket index of this level.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Levels at or above `min`, highest first.
    pub(crate) fn descending_to(min: Priority) -> impl Iterator<Item = Priority> {
        Self::ALL.into_iter().rev().take_while(move |level| *level >= min)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(DispatchError::InvalidPriority(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = DispatchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| DispatchError::InvalidPriority(value.to_string()))
    }
}
