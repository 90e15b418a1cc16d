//! Core type definitions

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::ConcordError;

/// Unique identifier for conflict cases (UUIDv7 for time ordering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ConcordError::InvalidCaseId(s.to_string()))
    }
}

/// Identifier of a strategy agent ("bot")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Trade direction proposed by an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// All directions in tie-break order
    pub const ALL: [Direction; 3] = [Direction::Long, Direction::Short, Direction::Neutral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Neutral => "neutral",
        }
    }

    /// Position of this direction in [`Direction::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Self::Long => 0,
            Self::Short => 1,
            Self::Neutral => 2,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ConcordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            "neutral" => Ok(Self::Neutral),
            other => Err(ConcordError::InvalidDirection(other.to_string())),
        }
    }
}

/// Arbitrated decision: a direction, or abstaining from acting at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Long,
    Short,
    Neutral,
    Abstain,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Neutral => "neutral",
            Self::Abstain => "abstain",
        }
    }

    /// The direction this decision commits to, if any
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Long => Some(Direction::Long),
            Self::Short => Some(Direction::Short),
            Self::Neutral => Some(Direction::Neutral),
            Self::Abstain => None,
        }
    }

    pub fn is_abstain(&self) -> bool {
        matches!(self, Self::Abstain)
    }

    /// Whether a proposed direction agrees with this decision
    pub fn agrees_with(&self, direction: Direction) -> bool {
        self.direction() == Some(direction)
    }
}

impl From<Direction> for Decision {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Long,
            Direction::Short => Self::Short,
            Direction::Neutral => Self::Neutral,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
