//! Conflict engine - case lifecycle and outcome learning
//!
//! Owns every piece of mutable state (active cases, history, trust profiles,
//! pattern memory, statistics) behind one lock. `submit` and
//! `record_outcome` are the only mutating entry points; both run to
//! completion without I/O.

pub mod config;
pub mod events;
pub mod history;
pub mod snapshot;

use chrono::Utc;
use concord_core::{
    distinct_directions, AgentId, CaseId, CaseOutcome, ConflictCase, ConflictingSignal, Decision,
    Direction,
};
use concord_resolver::{
    signature, BotTrustProfile, ConflictResolution, MethodSelector, PatternEntry, PatternMemory,
    ResolutionContext, ResolutionMethod, ResolutionStats, TrustStore,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

pub use config::EngineConfig;
pub use events::{Case, EngineEvent, EventBus};
pub use history::CaseHistory;
pub use snapshot::EngineSnapshot;

/// Conflict engine errors
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Snapshot encoding error: {0}")]
    SnapshotEncoding(#[from] bincode::Error),

    #[error("Snapshot JSON error: {0}")]
    SnapshotJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Result of a submission: the resolution, and the case id when a conflict was detected
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub case_id: Option<CaseId>,
    pub resolution: ConflictResolution,
}

struct EngineState {
    active: HashMap<CaseId, Case>,
    history: CaseHistory,
    trust: TrustStore,
    patterns: PatternMemory,
    stats: ResolutionStats,
}

/// Arbitrates between agents that disagree on direction
pub struct ConflictEngine {
    config: EngineConfig,
    selector: MethodSelector,
    state: RwLock<EngineState>,
    events: EventBus,
}

impl ConflictEngine {
    /// Create an engine with empty state
    pub fn new(config: EngineConfig) -> Self {
        let state = EngineState {
            active: HashMap::new(),
            history: CaseHistory::new(config.history_limit),
            trust: TrustStore::new(),
            patterns: PatternMemory::with_limit(config.pattern_history_limit),
            stats: ResolutionStats::new(),
        };
        Self::with_state(config, state)
    }

    /// Rebuild an engine from a snapshot
    pub fn restore(config: EngineConfig, snapshot: EngineSnapshot) -> Self {
        let mut patterns = snapshot.pattern_memory;
        patterns.set_limit(config.pattern_history_limit);

        let state = EngineState {
            active: snapshot.active.into_iter().map(|c| (c.id, c)).collect(),
            history: CaseHistory::from_cases(snapshot.history, config.history_limit),
            trust: TrustStore::from_profiles(snapshot.trust_profiles),
            patterns,
            stats: snapshot.stats,
        };
        info!(
            cases = state.history.len(),
            agents = state.trust.len(),
            "Restored conflict engine from snapshot"
        );
        Self::with_state(config, state)
    }

    fn with_state(config: EngineConfig, state: EngineState) -> Self {
        let selector = MethodSelector::new(config.method_library(), config.pattern_match());
        Self {
            config,
            selector,
            state: RwLock::new(state),
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Arbitrate a set of signals for one instrument
    pub fn submit(
        &self,
        symbol: &str,
        regime: &str,
        signals: Vec<ConflictingSignal>,
    ) -> ConflictResolution {
        self.submit_case(symbol, regime, signals).resolution
    }

    /// Like [`submit`](Self::submit), also returning the id of the case created
    pub fn submit_case(
        &self,
        symbol: &str,
        regime: &str,
        mut signals: Vec<ConflictingSignal>,
    ) -> Submission {
        for signal in signals.iter_mut() {
            let (strength, confidence) = (signal.strength, signal.confidence);
            if signal.sanitize() {
                warn!(
                    agent = %signal.agent_id,
                    symbol,
                    strength,
                    confidence,
                    "Degenerate signal input clamped to [0, 1]"
                );
            }
        }

        if distinct_directions(&signals).len() <= 1 {
            let resolution = consensus(&signals);
            let mut state = self.state.write();
            state.trust.touch(&signals);
            state.stats.record_consensus();
            debug!(
                symbol,
                decision = %resolution.decision,
                agents = signals.len(),
                "Agents agree; skipping arbitration"
            );
            return Submission {
                case_id: None,
                resolution,
            };
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        state.trust.touch(&signals);
        let mut case: Case = ConflictCase::new(symbol, regime, signals);
        let case_id = case.id;
        state.stats.total_conflicts += 1;
        state.active.insert(case_id, case.clone());

        info!(
            case_id = %case_id,
            symbol,
            regime,
            agents = case.signals.len(),
            "Conflict detected"
        );
        self.publish(|| EngineEvent::ConflictDetected {
            case: Box::new(case.clone()),
        });

        let resolution = {
            let ctx = ResolutionContext {
                signals: &case.signals,
                trust: &state.trust,
                regime: &case.regime,
            };
            self.selector.resolve(&ctx, &state.patterns, &state.stats)
        };

        state.active.remove(&case_id);
        case.resolve(resolution.clone());
        state.stats.record_resolution(&resolution);
        state
            .patterns
            .record(signature(&case.signals), case_id, resolution.clone());
        state.history.push(case.clone());

        info!(
            case_id = %case_id,
            decision = %resolution.decision,
            method = %resolution.method,
            confidence = resolution.confidence,
            "Conflict resolved"
        );
        self.publish(|| EngineEvent::ConflictResolved {
            case: Box::new(case),
            resolution: resolution.clone(),
        });

        Submission {
            case_id: Some(case_id),
            resolution,
        }
    }

    /// Feed back the realized outcome of a resolved case.
    ///
    /// Unknown cases, unresolved cases and cases that already have an outcome
    /// are ignored; returns whether the outcome was applied.
    pub fn record_outcome(
        &self,
        case_id: &CaseId,
        actual_direction: Direction,
        realized_pnl: f64,
    ) -> bool {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let case = match state.history.get_mut(case_id) {
            Some(case) => case,
            None => match state.active.get_mut(case_id) {
                Some(case) => case,
                None => {
                    warn!(case_id = %case_id, "Outcome for unknown case ignored");
                    return false;
                }
            },
        };

        let Some(resolution) = case.resolution.clone() else {
            debug!(case_id = %case_id, "Outcome for unresolved case ignored");
            return false;
        };
        if case.has_outcome() {
            debug!(case_id = %case_id, "Duplicate outcome ignored");
            return false;
        }

        let realized_pnl = if realized_pnl.is_finite() {
            realized_pnl
        } else {
            warn!(case_id = %case_id, realized_pnl, "Non-finite realized pnl recorded as 0");
            0.0
        };

        let now = Utc::now();
        let resolution_correct = resolution.decision.agrees_with(actual_direction)
            || (resolution.decision == Decision::Abstain && realized_pnl <= 0.0);
        let overridden_bots_correct = case.signals.iter().any(|s| {
            s.direction == actual_direction && resolution.overridden_bots.contains(&s.agent_id)
        });

        let outcome = CaseOutcome {
            actual_direction,
            realized_pnl,
            resolution_correct,
            overridden_bots_correct,
            recorded_at: now,
        };
        case.record_outcome(outcome.clone());

        state.stats.record_outcome(&resolution, resolution_correct);
        state.patterns.mark_outcome(case_id, resolution_correct);
        for signal in &case.signals {
            let was_trusted = resolution.is_trusted(&signal.agent_id);
            state
                .trust
                .record_outcome(signal, &case.regime, actual_direction, was_trusted, now);
        }

        info!(
            case_id = %case_id,
            actual = %actual_direction,
            realized_pnl,
            resolution_correct,
            overridden_bots_correct,
            "Outcome recorded"
        );

        let case = case.clone();
        self.publish(|| EngineEvent::OutcomeRecorded {
            case: Box::new(case),
            outcome,
        });
        true
    }

    /// Current monitoring counters
    pub fn stats(&self) -> ResolutionStats {
        self.state.read().stats.clone()
    }

    pub fn trust_profile(&self, agent: &AgentId) -> Option<BotTrustProfile> {
        self.state.read().trust.profile(agent).cloned()
    }

    /// All trust profiles, ordered by agent id
    pub fn trust_profiles(&self) -> Vec<BotTrustProfile> {
        self.state.read().trust.profiles()
    }

    /// Agents by overall accuracy, best first
    pub fn ranked_agents(&self) -> Vec<(AgentId, f64)> {
        self.state.read().trust.ranked()
    }

    /// Forget everything learned about an agent
    pub fn reset_agent(&self, agent: &AgentId) -> bool {
        let removed = self.state.write().trust.reset(agent);
        if removed {
            info!(agent = %agent, "Trust profile reset");
        }
        removed
    }

    /// Up to `n` resolved cases, newest first
    pub fn recent_cases(&self, n: usize) -> Vec<Case> {
        self.state.read().history.recent(n)
    }

    /// Cases detected but not yet resolved
    pub fn active_cases(&self) -> Vec<Case> {
        let mut active: Vec<Case> = self.state.read().active.values().cloned().collect();
        active.sort_by_key(|c| c.created_at);
        active
    }

    pub fn case(&self, case_id: &CaseId) -> Option<Case> {
        let state = self.state.read();
        state
            .history
            .get(case_id)
            .or_else(|| state.active.get(case_id))
            .cloned()
    }

    /// Pattern signature a signal set would be filed under
    pub fn signature_for(&self, signals: &[ConflictingSignal]) -> String {
        signature(signals)
    }

    /// Past resolutions remembered for a signature, oldest first
    pub fn pattern_history(&self, signature: &str) -> Vec<PatternEntry> {
        self.state.read().patterns.history(signature).to_vec()
    }

    /// Copy of the engine's state for the caller to persist
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.read();
        let mut active: Vec<Case> = state.active.values().cloned().collect();
        active.sort_by_key(|c| c.created_at);

        EngineSnapshot {
            history: state.history.ordered(),
            active,
            trust_profiles: state.trust.profiles(),
            pattern_memory: state.patterns.clone(),
            stats: state.stats.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Receive every notification published from now on
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: impl FnOnce() -> EngineEvent) {
        if self.config.emit_notifications && self.events.subscriber_count() > 0 {
            self.events.publish(event());
        }
    }
}

impl Default for ConflictEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Resolution for a signal set with at most one direction
fn consensus(signals: &[ConflictingSignal]) -> ConflictResolution {
    let Some(direction) = signals.first().map(|s| s.direction) else {
        return ConflictResolution::abstain(ResolutionMethod::Consensus, signals, "No signals submitted");
    };

    let confidence = signals
        .iter()
        .map(ConflictingSignal::bounded_confidence)
        .sum::<f64>()
        / signals.len() as f64;

    ConflictResolution::new(
        Decision::from(direction),
        confidence,
        ResolutionMethod::Consensus,
        signals,
        format!("All {} agent(s) agree on {}", signals.len(), direction),
    )
    .with_sizing(1.0 + (confidence - 0.5) * 0.5, 1.0)
}
