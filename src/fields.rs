//! Field types shared across the task engine.
//!
//! The Eisenhower quadrant is the only structured enum the engine interprets.
//! Tasks store the quadrant as a raw string (legacy data contains arbitrary
//! values); `Quadrant::parse` is the single decode path, and everything that
//! needs quadrant semantics goes through it with a safe default.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Eisenhower matrix quadrant: Q1 urgent+important through Q4 neither.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    /// Decode a stored quadrant string. Unrecognized values yield `None`;
    /// callers fall back to Q2-equivalent behaviour rather than rejecting.
    pub fn parse(s: &str) -> Option<Quadrant> {
        match s {
            "Q1" => Some(Quadrant::Q1),
            "Q2" => Some(Quadrant::Q2),
            "Q3" => Some(Quadrant::Q3),
            "Q4" => Some(Quadrant::Q4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quadrant::Q1 => "Q1",
            Quadrant::Q2 => "Q2",
            Quadrant::Q3 => "Q3",
            Quadrant::Q4 => "Q4",
        }
    }

    /// Q1 and Q3 are the urgent quadrants.
    pub fn urgent(self) -> bool {
        matches!(self, Quadrant::Q1 | Quadrant::Q3)
    }

    /// Q1 and Q2 are the important quadrants.
    pub fn important(self) -> bool {
        matches!(self, Quadrant::Q1 | Quadrant::Q2)
    }
}

/// Default quadrant for tasks that don't specify one.
pub const DEFAULT_QUADRANT: &str = "Q2";
