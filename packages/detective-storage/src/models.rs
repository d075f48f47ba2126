use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
	pub id: i64,
	pub customer_id: i64,
	pub feedback_text: String,
	pub product_referenced: Option<String>,
	pub sentiment: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoredFeedbackRow {
	#[sqlx(flatten)]
	pub feedback: FeedbackRow,
	pub score: f64,
}

/// One position in the semantic ordering.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct SemanticHit {
	pub id: i64,
	pub similarity: f64,
}

/// One position in the lexical ordering.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct LexicalHit {
	pub id: i64,
	pub rank: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionRow {
	pub id: Uuid,
	pub agent_name: String,
	pub question: String,
	pub status: String,
	pub started_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
	pub final_answer: Option<String>,
	pub total_steps: i32,
	pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
	pub question_id: Uuid,
	pub agent_name: &'a str,
	pub step_order: i32,
	pub event_type: &'a str,
	pub content: &'a Value,
	pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
	pub timestamp: OffsetDateTime,
	pub question_id: Uuid,
	pub agent_name: String,
	pub step_order: i32,
	pub event_type: String,
	pub content: Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionSummaryRow {
	pub question: String,
	pub status: String,
	pub total_steps: i32,
	pub duration_ms: Option<i64>,
	pub total_events: i64,
	pub actions_executed: i64,
	pub reasoning_steps: i64,
	pub errors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ToolUsageRow {
	pub tool_name: String,
	pub usage_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WindowSummaryRow {
	pub total_questions: i64,
	pub avg_duration_ms: Option<i64>,
	pub avg_steps: Option<i64>,
	pub completed: i64,
	pub failed: i64,
	pub in_progress: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InsightRow {
	pub content: String,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub relevance: f64,
}
