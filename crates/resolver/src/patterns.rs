//! Pattern memory and the meta-pattern matcher
//!
//! Every resolution issued for a conflict is remembered under a canonical
//! signature of the conflict's composition. When the same composition comes
//! back often enough, and earlier answers proved right, the matcher replays
//! the decision that worked.

use crate::types::{ConflictResolution, ResolutionMethod};
use concord_core::{CaseId, ConflictingSignal, Decision};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const SIGNATURE_SEPARATOR: &str = "|";

/// Canonical signature: `agent:direction:round(strength×10)` per signal, sorted by agent
pub fn signature(signals: &[ConflictingSignal]) -> String {
    let mut parts: Vec<(&str, String)> = signals
        .iter()
        .map(|s| {
            let bucket = (s.bounded_strength() * 10.0).round() as i64;
            (
                s.agent_id.as_str(),
                format!("{}:{}:{}", s.agent_id, s.direction, bucket),
            )
        })
        .collect();

    parts.sort();
    parts
        .into_iter()
        .map(|(_, part)| part)
        .collect::<Vec<_>>()
        .join(SIGNATURE_SEPARATOR)
}

/// A past resolution and, once known, whether it proved right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub case_id: CaseId,
    pub resolution: ConflictResolution,
    pub correct: Option<bool>,
}

/// Thresholds for replaying a remembered decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternMatchConfig {
    /// Prior resolutions required before a match is attempted
    pub min_occurrences: usize,

    /// Prior resolutions that must have proved right
    pub min_successes: usize,

    /// Minimum success rate of the replayed decision
    pub min_success_rate: f64,
}

impl Default for PatternMatchConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            min_successes: 2,
            min_success_rate: 0.6,
        }
    }
}

/// Signature → past resolutions, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternMemory {
    entries: HashMap<String, Vec<PatternEntry>>,

    /// Which signature each case was filed under
    #[serde(default)]
    case_index: HashMap<CaseId, String>,

    /// Per-signature cap; `None` keeps everything
    #[serde(default)]
    limit: Option<usize>,
}

impl PatternMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` most-recent entries per signature
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit: limit.map(|l| l.max(1)),
            ..Self::default()
        }
    }

    /// Change the per-signature cap, trimming histories already over it
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit.map(|l| l.max(1));
        let Some(limit) = self.limit else {
            return;
        };

        let mut dropped = 0;
        for history in self.entries.values_mut() {
            dropped += trim_oldest(history, limit, &mut self.case_index);
        }
        if dropped > 0 {
            debug!(dropped, limit, "Trimmed pattern memory to new limit");
        }
    }

    /// File a resolution under its signature
    pub fn record(&mut self, signature: String, case_id: CaseId, resolution: ConflictResolution) {
        let history = self.entries.entry(signature.clone()).or_default();
        history.push(PatternEntry {
            case_id,
            resolution,
            correct: None,
        });

        if let Some(limit) = self.limit {
            trim_oldest(history, limit, &mut self.case_index);
        }

        self.case_index.insert(case_id, signature);
    }

    /// Mark whether a case's resolution proved right. Returns false for unknown cases.
    pub fn mark_outcome(&mut self, case_id: &CaseId, correct: bool) -> bool {
        let Some(signature) = self.case_index.get(case_id) else {
            return false;
        };

        self.entries
            .get_mut(signature)
            .and_then(|history| history.iter_mut().find(|e| e.case_id == *case_id))
            .map(|entry| entry.correct = Some(correct))
            .is_some()
    }

    pub fn history(&self, signature: &str) -> &[PatternEntry] {
        self.entries
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct signatures remembered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay a decision that worked for this exact composition before.
    ///
    /// The success rate divides by every prior resolution under the
    /// signature, not just the successful ones.
    pub fn match_pattern(
        &self,
        signals: &[ConflictingSignal],
        config: &PatternMatchConfig,
    ) -> Option<ConflictResolution> {
        let signature = signature(signals);
        let history = self.history(&signature);
        if history.len() < config.min_occurrences {
            return None;
        }

        let successes: Vec<&PatternEntry> = history
            .iter()
            .filter(|e| e.correct == Some(true))
            .collect();
        if successes.len() < config.min_successes {
            return None;
        }

        // First-seen decision wins ties
        let mut tally: Vec<(Decision, usize)> = Vec::new();
        for entry in &successes {
            match tally.iter_mut().find(|(d, _)| *d == entry.resolution.decision) {
                Some((_, count)) => *count += 1,
                None => tally.push((entry.resolution.decision, 1)),
            }
        }

        let (decision, count) = tally
            .into_iter()
            .fold(None, |best: Option<(Decision, usize)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })?;

        let success_rate = count as f64 / history.len() as f64;
        if success_rate < config.min_success_rate {
            debug!(
                signature = %signature,
                success_rate,
                "Pattern seen before but not reliable enough"
            );
            return None;
        }

        debug!(signature = %signature, %decision, success_rate, "Matched meta pattern");

        let reasoning = format!(
            "Seen {} times; {} worked in {} of them ({:.0}%)",
            history.len(),
            decision,
            count,
            success_rate * 100.0
        );

        Some(
            ConflictResolution::new(
                decision,
                success_rate,
                ResolutionMethod::MetaPattern,
                signals,
                reasoning,
            )
            .with_sizing(replay_size(decision, success_rate), 1.0),
        )
    }
}

/// Drop the oldest entries beyond `limit`, unindexing their cases
fn trim_oldest(
    history: &mut Vec<PatternEntry>,
    limit: usize,
    case_index: &mut HashMap<CaseId, String>,
) -> usize {
    if history.len() <= limit {
        return 0;
    }
    let excess = history.len() - limit;
    for dropped in history.drain(..excess) {
        case_index.remove(&dropped.case_id);
    }
    excess
}

/// A replayed abstain opens no position
fn replay_size(decision: Decision, success_rate: f64) -> f64 {
    if decision.is_abstain() {
        0.0
    } else {
        0.9 + success_rate * 0.3
    }
}
