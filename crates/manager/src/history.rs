//! Bounded store of resolved cases

use crate::events::Case;
use concord_core::CaseId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Resolved cases in arrival order. Exceeding the cap halves the store by
/// dropping the oldest cases; the newest case is always kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseHistory {
    order: VecDeque<CaseId>,
    cases: HashMap<CaseId, Case>,
    limit: usize,
}

impl CaseHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            order: VecDeque::new(),
            cases: HashMap::new(),
            limit: limit.max(1),
        }
    }

    /// Rebuild from cases listed oldest first
    pub fn from_cases(cases: impl IntoIterator<Item = Case>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for case in cases {
            history.push(case);
        }
        history
    }

    /// Append a case, trimming if over the cap. Returns the number of cases dropped.
    pub fn push(&mut self, case: Case) -> usize {
        let id = case.id;
        if self.cases.insert(id, case).is_none() {
            self.order.push_back(id);
        }

        if self.order.len() <= self.limit {
            return 0;
        }

        let keep = (self.limit / 2).max(1);
        let mut dropped = 0;
        while self.order.len() > keep {
            if let Some(oldest) = self.order.pop_front() {
                self.cases.remove(&oldest);
                dropped += 1;
            }
        }

        debug!(dropped, kept = self.order.len(), "Trimmed case history");
        dropped
    }

    pub fn get(&self, id: &CaseId) -> Option<&Case> {
        self.cases.get(id)
    }

    pub fn get_mut(&mut self, id: &CaseId) -> Option<&mut Case> {
        self.cases.get_mut(id)
    }

    /// Up to `n` cases, newest first
    pub fn recent(&self, n: usize) -> Vec<Case> {
        self.order
            .iter()
            .rev()
            .take(n)
            .filter_map(|id| self.cases.get(id).cloned())
            .collect()
    }

    /// Every case, oldest first
    pub fn ordered(&self) -> Vec<Case> {
        self.order
            .iter()
            .filter_map(|id| self.cases.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
