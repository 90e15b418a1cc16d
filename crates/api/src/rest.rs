//! REST API for the Concord conflict engine
//!
//! Thin HTTP surface over one shared [`ConflictEngine`]: submit signal sets,
//! report outcomes, and read back statistics, trust profiles and cases.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use concord_core::{AgentId, CaseId, ConflictingSignal, Direction};
use concord_manager::{Case, ConflictEngine, EngineConfig, EngineSnapshot};
use concord_resolver::{BotTrustProfile, ConflictResolution, ResolutionStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default number of cases returned by `/conflicts/recent`
const DEFAULT_RECENT_LIMIT: usize = 50;

/// API state holding the conflict engine
#[derive(Clone)]
pub struct ApiState {
    engine: Arc<ConflictEngine>,
}

impl ApiState {
    /// Create an API state with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an API state with custom configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_engine(Arc::new(ConflictEngine::new(config)))
    }

    /// Serve an engine the caller also holds
    pub fn with_engine(engine: Arc<ConflictEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ConflictEngine> {
        &self.engine
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the main API router with a fresh engine
pub fn create_router() -> Router {
    router_with_state(ApiState::new())
}

/// Create the API router over an existing state
pub fn router_with_state(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Conflict lifecycle
        .route("/conflicts", post(submit_conflict))
        .route("/conflicts/recent", get(get_recent_cases))
        .route("/conflicts/active", get(get_active_cases))
        .route("/conflicts/{id}", get(get_case))
        .route("/conflicts/{id}/outcome", post(record_outcome))
        // Learned trust
        .route("/trust", get(get_trust_profiles))
        .route("/trust/ranked", get(get_ranked_agents))
        .route(
            "/trust/{agent}",
            get(get_trust_profile).delete(reset_trust_profile),
        )
        // System operations
        .route("/stats", get(get_stats))
        .route("/snapshot", get(get_snapshot))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalDto {
    pub agent_id: String,
    pub agent_name: Option<String>,
    pub direction: Direction,
    pub strength: f64,
    pub confidence: f64,
    #[serde(default)]
    pub indicators: BTreeSet<String>,
    #[serde(default)]
    pub reasoning: String,
    pub timestamp: Option<String>, // ISO 8601 datetime
}

impl SignalDto {
    fn into_signal(self) -> Result<ConflictingSignal, ApiError> {
        let timestamp = self
            .timestamp
            .map(|ts| parse_datetime(&ts))
            .transpose()?
            .unwrap_or_else(Utc::now);

        Ok(ConflictingSignal {
            agent_name: self.agent_name.unwrap_or_else(|| self.agent_id.clone()),
            agent_id: AgentId(self.agent_id),
            direction: self.direction,
            strength: self.strength,
            confidence: self.confidence,
            indicators: self.indicators,
            reasoning: self.reasoning,
            timestamp,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitConflictRequest {
    pub symbol: String,
    pub regime: String,
    pub signals: Vec<SignalDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordOutcomeRequest {
    pub actual_direction: Direction,
    pub realized_pnl: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

// Response types
#[derive(Debug, Serialize)]
pub struct SubmitConflictResponse {
    /// Present only when the agents disagreed and a case was opened
    pub case_id: Option<String>,
    pub resolution: ConflictResolution,
}

#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub id: String,
    pub symbol: String,
    pub regime: String,
    pub agents: Vec<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub resolution: Option<ConflictResolution>,
    pub actual_direction: Option<Direction>,
    pub realized_pnl: Option<f64>,
    pub resolution_correct: Option<bool>,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id.to_string(),
            symbol: case.symbol,
            regime: case.regime,
            agents: case
                .signals
                .iter()
                .map(|s| s.agent_id.to_string())
                .collect(),
            created_at: case.created_at.to_rfc3339(),
            resolved_at: case.resolved_at.map(|t| t.to_rfc3339()),
            resolution: case.resolution,
            actual_direction: case.outcome.as_ref().map(|o| o.actual_direction),
            realized_pnl: case.outcome.as_ref().map(|o| o.realized_pnl),
            resolution_correct: case.outcome.as_ref().map(|o| o.resolution_correct),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RankedAgentResponse {
    pub agent_id: String,
    pub overall_accuracy: f64,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<concord_core::ConcordError> for ApiError {
    fn from(err: concord_core::ConcordError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("Invalid datetime: {}", value)))
}

fn parse_case_id(id: &str) -> Result<CaseId, ApiError> {
    Ok(id.parse::<CaseId>()?)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "Concord Conflict Engine"
    }))
}

/// Arbitrate a signal set
async fn submit_conflict(
    State(state): State<ApiState>,
    Json(req): Json<SubmitConflictRequest>,
) -> Result<(StatusCode, Json<SubmitConflictResponse>), ApiError> {
    if req.symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("Symbol must not be empty".to_string()));
    }

    let signals = req
        .signals
        .into_iter()
        .map(SignalDto::into_signal)
        .collect::<Result<Vec<_>, _>>()?;

    let submission = state.engine.submit_case(&req.symbol, &req.regime, signals);

    let status = if submission.case_id.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(SubmitConflictResponse {
            case_id: submission.case_id.map(|id| id.to_string()),
            resolution: submission.resolution,
        }),
    ))
}

/// Report the realized outcome of a case
async fn record_outcome(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RecordOutcomeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let case_id = parse_case_id(&id)?;

    // Late or duplicated outcomes are accepted and ignored
    let applied = state
        .engine
        .record_outcome(&case_id, req.actual_direction, req.realized_pnl);

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "case_id": case_id.to_string(),
            "applied": applied
        })),
    ))
}

/// Get a case by ID
async fn get_case(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CaseResponse>, ApiError> {
    let case_id = parse_case_id(&id)?;

    let case = state
        .engine
        .case(&case_id)
        .ok_or_else(|| ApiError::NotFound(format!("Case not found: {}", case_id)))?;

    Ok(Json(CaseResponse::from(case)))
}

/// Most recently resolved cases
async fn get_recent_cases(
    State(state): State<ApiState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<CaseResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let cases = state.engine.recent_cases(limit);

    Json(cases.into_iter().map(CaseResponse::from).collect())
}

/// Cases detected but not yet resolved
async fn get_active_cases(State(state): State<ApiState>) -> Json<Vec<CaseResponse>> {
    let cases = state.engine.active_cases();

    Json(cases.into_iter().map(CaseResponse::from).collect())
}

/// All trust profiles
async fn get_trust_profiles(State(state): State<ApiState>) -> Json<Vec<BotTrustProfile>> {
    Json(state.engine.trust_profiles())
}

/// Agents ranked by overall accuracy
async fn get_ranked_agents(State(state): State<ApiState>) -> Json<Vec<RankedAgentResponse>> {
    let ranked = state
        .engine
        .ranked_agents()
        .into_iter()
        .map(|(agent, accuracy)| RankedAgentResponse {
            agent_id: agent.to_string(),
            overall_accuracy: accuracy,
        })
        .collect();

    Json(ranked)
}

/// One agent's trust profile
async fn get_trust_profile(
    State(state): State<ApiState>,
    Path(agent): Path<String>,
) -> Result<Json<BotTrustProfile>, ApiError> {
    let agent = AgentId(agent);

    state
        .engine
        .trust_profile(&agent)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No trust profile for agent: {}", agent)))
}

/// Forget an agent's trust profile
async fn reset_trust_profile(
    State(state): State<ApiState>,
    Path(agent): Path<String>,
) -> Result<StatusCode, ApiError> {
    let agent = AgentId(agent);

    if state.engine.reset_agent(&agent) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No trust profile for agent: {}", agent)))
    }
}

/// Get resolution statistics
async fn get_stats(State(state): State<ApiState>) -> Json<ResolutionStats> {
    Json(state.engine.stats())
}

/// Export the engine's state
async fn get_snapshot(State(state): State<ApiState>) -> Json<EngineSnapshot> {
    Json(state.engine.snapshot())
}
