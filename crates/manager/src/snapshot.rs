//! Serializable view of the engine's learned state
//!
//! The engine never persists anything itself. A snapshot lets the caller
//! store and later restore the case history, trust profiles, pattern memory
//! and statistics in whatever medium it likes.

use crate::events::Case;
use crate::Result;
use concord_resolver::{BotTrustProfile, PatternMemory, ResolutionStats};
use serde::{Deserialize, Serialize};

/// Engine state at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Resolved cases, oldest first
    pub history: Vec<Case>,

    /// Cases detected but not yet resolved
    #[serde(default)]
    pub active: Vec<Case>,

    pub trust_profiles: Vec<BotTrustProfile>,

    pub pattern_memory: PatternMemory,

    pub stats: ResolutionStats,

    pub taken_at: chrono::DateTime<chrono::Utc>,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
