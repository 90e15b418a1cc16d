//! Per-agent learned trust

use chrono::{DateTime, Utc};
use concord_core::{ema_hit, AgentId, ConflictingSignal, Direction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Value every accuracy and rate starts from
pub const DEFAULT_TRUST: f64 = 0.5;

/// EMA weight of a new sample for overall accuracy and conflict rates
const OVERALL_ALPHA: f64 = 0.05;

/// Regimes shift faster than general skill, so regime accuracy learns faster
const REGIME_ALPHA: f64 = 0.1;

/// Learned reliability of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotTrustProfile {
    pub agent_id: AgentId,

    /// Accuracy across all outcomes (0.0 to 1.0)
    pub overall_accuracy: f64,

    /// Accuracy per market regime (0.0 to 1.0)
    pub regime_accuracy: BTreeMap<String, f64>,

    /// How often the agent was right when the engine sided with it
    pub conflict_win_rate: f64,

    /// How often the agent was right when the engine overrode it
    pub conflict_loss_rate: f64,

    /// Number of outcomes folded into this profile
    pub outcomes_recorded: u64,

    pub last_updated: DateTime<Utc>,
}

impl BotTrustProfile {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            overall_accuracy: DEFAULT_TRUST,
            regime_accuracy: BTreeMap::new(),
            conflict_win_rate: DEFAULT_TRUST,
            conflict_loss_rate: DEFAULT_TRUST,
            outcomes_recorded: 0,
            last_updated: Utc::now(),
        }
    }

    /// Accuracy in a regime, defaulting for regimes never seen
    pub fn regime_accuracy(&self, regime: &str) -> f64 {
        self.regime_accuracy
            .get(regime)
            .copied()
            .unwrap_or(DEFAULT_TRUST)
    }

    /// Fold one realized outcome into the profile
    pub fn learn(&mut self, regime: &str, was_correct: bool, was_trusted: bool, now: DateTime<Utc>) {
        self.overall_accuracy = ema_hit(self.overall_accuracy, was_correct, OVERALL_ALPHA);

        let regime_value = self
            .regime_accuracy
            .entry(regime.to_string())
            .or_insert(DEFAULT_TRUST);
        *regime_value = ema_hit(*regime_value, was_correct, REGIME_ALPHA);

        if was_trusted {
            self.conflict_win_rate = ema_hit(self.conflict_win_rate, was_correct, OVERALL_ALPHA);
        } else {
            self.conflict_loss_rate = ema_hit(self.conflict_loss_rate, was_correct, OVERALL_ALPHA);
        }

        self.outcomes_recorded += 1;
        self.last_updated = now;
    }
}

/// Trust profiles keyed by agent, created lazily on first reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustStore {
    profiles: HashMap<AgentId, BotTrustProfile>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported profiles
    pub fn from_profiles(profiles: impl IntoIterator<Item = BotTrustProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.agent_id.clone(), p))
                .collect(),
        }
    }

    /// Get or create the profile for an agent
    pub fn profile_mut(&mut self, agent: &AgentId) -> &mut BotTrustProfile {
        self.profiles
            .entry(agent.clone())
            .or_insert_with(|| BotTrustProfile::new(agent.clone()))
    }

    /// Make sure every agent in a signal set has a profile
    pub fn touch(&mut self, signals: &[ConflictingSignal]) {
        for signal in signals {
            self.profile_mut(&signal.agent_id);
        }
    }

    pub fn profile(&self, agent: &AgentId) -> Option<&BotTrustProfile> {
        self.profiles.get(agent)
    }

    pub fn overall_accuracy(&self, agent: &AgentId) -> f64 {
        self.profiles
            .get(agent)
            .map(|p| p.overall_accuracy)
            .unwrap_or(DEFAULT_TRUST)
    }

    pub fn regime_accuracy(&self, agent: &AgentId, regime: &str) -> f64 {
        self.profiles
            .get(agent)
            .map(|p| p.regime_accuracy(regime))
            .unwrap_or(DEFAULT_TRUST)
    }

    pub fn conflict_win_rate(&self, agent: &AgentId) -> f64 {
        self.profiles
            .get(agent)
            .map(|p| p.conflict_win_rate)
            .unwrap_or(DEFAULT_TRUST)
    }

    /// Update an agent's profile from a realized outcome
    pub fn record_outcome(
        &mut self,
        signal: &ConflictingSignal,
        regime: &str,
        actual_direction: Direction,
        was_trusted: bool,
        now: DateTime<Utc>,
    ) {
        let was_correct = signal.direction == actual_direction;
        let profile = self.profile_mut(&signal.agent_id);
        profile.learn(regime, was_correct, was_trusted, now);

        debug!(
            agent = %signal.agent_id,
            was_correct,
            was_trusted,
            overall_accuracy = profile.overall_accuracy,
            "Updated trust profile"
        );
    }

    /// All profiles, ordered by agent id
    pub fn profiles(&self) -> Vec<BotTrustProfile> {
        let mut all: Vec<BotTrustProfile> = self.profiles.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    /// Agents ranked by overall accuracy, best first
    pub fn ranked(&self) -> Vec<(AgentId, f64)> {
        let mut ranked: Vec<(AgentId, f64)> = self
            .profiles
            .values()
            .map(|p| (p.agent_id.clone(), p.overall_accuracy))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }

    /// Forget an agent; returns whether a profile existed
    pub fn reset(&mut self, agent: &AgentId) -> bool {
        self.profiles.remove(agent).is_some()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
