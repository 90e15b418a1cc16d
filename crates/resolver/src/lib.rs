//! Conflict resolution for disagreeing strategy agents
//!
//! Leaves first: the [`trust`] store and [`patterns`] memory hold learned
//! state, [`methods`] turns signals into candidate decisions, and
//! [`selector`] picks one.

pub mod methods;
pub mod patterns;
pub mod selector;
pub mod trust;
pub mod types;

pub use methods::{MethodLibrary, ResolutionContext, DEFAULT_MIN_CONFIDENCE_TO_ACT};
pub use patterns::{signature, PatternEntry, PatternMatchConfig, PatternMemory};
pub use selector::{MethodSelector, ScoredCandidate};
pub use trust::{BotTrustProfile, TrustStore};
pub use types::{ConflictResolution, ResolutionMethod, ResolutionStats};
