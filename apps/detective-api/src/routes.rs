use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use detective_service::{
	Error, Insight, Investigation, InvestigationEvent, InvestigationReport, PerformanceAnalysis,
	SearchResult, WindowPerformance,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/investigations", post(create_investigation).get(list_investigations))
		.route("/v1/investigations/{id}/performance", get(investigation_performance))
		.route("/v1/investigations/{id}/events", get(investigation_events))
		.route("/v1/performance", get(window_performance))
		.route("/v1/search/hybrid", post(hybrid_search))
		.route("/v1/search/semantic", post(semantic_search))
		.route("/v1/search/fulltext", post(fulltext_search))
		.route("/v1/insights/search", post(search_insights))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CreateInvestigationRequest {
	pub question: String,
	pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvestigationsQuery {
	pub agent_name: Option<String>,
	#[serde(default)]
	pub q: String,
	pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct InvestigationsResponse {
	pub investigations: Vec<Investigation>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
	pub question_id: Uuid,
	pub events: Vec<InvestigationEvent>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
	pub window_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HybridSearchRequest {
	#[serde(default)]
	pub query: String,
	#[serde(default)]
	pub keywords: String,
	pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SemanticSearchRequest {
	pub query: String,
	pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct FulltextSearchRequest {
	pub keywords: String,
	pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct InsightSearchRequest {
	pub agent_name: Option<String>,
	pub query: String,
	pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
	pub insights: Vec<Insight>,
}

async fn health(State(state): State<AppState>) -> StatusCode {
	match state.service.db.ping().await {
		Ok(()) => StatusCode::OK,
		Err(err) => {
			tracing::warn!(error = %err, "Health check failed.");

			StatusCode::SERVICE_UNAVAILABLE
		},
	}
}

async fn create_investigation(
	State(state): State<AppState>,
	Json(payload): Json<CreateInvestigationRequest>,
) -> Result<Json<InvestigationReport>, ApiError> {
	let report = state.service.investigate(&payload.question, payload.agent_name.as_deref()).await?;

	Ok(Json(report))
}

async fn list_investigations(
	State(state): State<AppState>,
	Query(query): Query<ListInvestigationsQuery>,
) -> Result<Json<InvestigationsResponse>, ApiError> {
	let service = &state.service;
	let agent_name = query.agent_name.as_deref().unwrap_or(service.cfg.agent.name.as_str());
	let limit = query.limit.unwrap_or(service.cfg.ledger.recent_limit);
	let investigations = service.find_recent_by_keyword(agent_name, &query.q, limit).await?;

	Ok(Json(InvestigationsResponse { investigations }))
}

async fn investigation_performance(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<PerformanceAnalysis>, ApiError> {
	Ok(Json(state.service.analyze_performance(id).await?))
}

async fn investigation_events(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<EventsResponse>, ApiError> {
	// An unknown id has no events, so check existence first to return 404.
	state.service.investigation(id).await?;

	let events = state.service.investigation_events(id).await?;

	Ok(Json(EventsResponse { question_id: id, events }))
}

async fn window_performance(
	State(state): State<AppState>,
	Query(query): Query<WindowQuery>,
) -> Result<Json<WindowPerformance>, ApiError> {
	let window_hours =
		query.window_hours.unwrap_or(state.service.cfg.ledger.performance_window_hours);

	Ok(Json(state.service.analyze_window(window_hours).await?))
}

async fn hybrid_search(
	State(state): State<AppState>,
	Json(payload): Json<HybridSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let limit = payload.limit.unwrap_or(state.service.cfg.search.hybrid_limit);
	let results = state.service.hybrid_search(&payload.query, &payload.keywords, limit).await?;

	Ok(Json(SearchResponse { results }))
}

async fn semantic_search(
	State(state): State<AppState>,
	Json(payload): Json<SemanticSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let limit = payload.limit.unwrap_or(state.service.cfg.search.semantic_limit);
	let results = state.service.semantic_search(&payload.query, limit).await?;

	Ok(Json(SearchResponse { results }))
}

async fn fulltext_search(
	State(state): State<AppState>,
	Json(payload): Json<FulltextSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let limit = payload.limit.unwrap_or(state.service.cfg.search.fulltext_limit);
	let results = state.service.fulltext_search(&payload.keywords, limit).await?;

	Ok(Json(SearchResponse { results }))
}

async fn search_insights(
	State(state): State<AppState>,
	Json(payload): Json<InsightSearchRequest>,
) -> Result<Json<InsightsResponse>, ApiError> {
	let service = &state.service;
	let agent_name = payload.agent_name.as_deref().unwrap_or(service.cfg.agent.name.as_str());
	let limit = payload.limit.unwrap_or(service.cfg.search.insight_limit);
	let insights = service.search_insights(agent_name, &payload.query, limit).await?;

	Ok(Json(InsightsResponse { insights }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			Error::NotFound { message } => ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::Conflict { message } => ApiError::new(StatusCode::CONFLICT, "CONFLICT", message),
			Error::Embedding { message } =>
				ApiError::new(StatusCode::BAD_GATEWAY, "EMBEDDING_ERROR", message),
			Error::Provider { message } =>
				ApiError::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message),
			Error::Store { message } => {
				tracing::error!(error = %message, "Store request failed.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORE_ERROR",
					"Internal error while reading or writing the database.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
