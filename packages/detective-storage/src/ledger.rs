use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{
		EventRow, NewEvent, QuestionRow, QuestionSummaryRow, ToolUsageRow, WindowSummaryRow,
	},
};

const QUESTION_COLUMNS: &str = "\
	id,
	agent_name,
	question,
	status,
	started_at::timestamptz AS started_at,
	completed_at::timestamptz AS completed_at,
	final_answer,
	coalesce(total_steps, 0)::int4 AS total_steps,
	duration_ms::bigint AS duration_ms";

pub async fn insert_question(
	db: &Db,
	question_id: Uuid,
	agent_name: &str,
	question: &str,
	started_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO agent_questions (id, question, agent_name, status, started_at, total_steps)
VALUES ($1, $2, $3, 'in_progress', $4, 0)",
	)
	.bind(question_id)
	.bind(question)
	.bind(agent_name)
	.bind(started_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Applies the terminal transition. Returns the number of rows changed, which is zero when the
/// question is unknown or already terminal.
pub async fn complete_question(
	db: &Db,
	question_id: Uuid,
	status: &str,
	final_answer: &str,
	total_steps: i32,
	duration_ms: i64,
	completed_at: OffsetDateTime,
) -> Result<u64> {
	let result = sqlx::query(
		"\
UPDATE agent_questions
SET
	status = $2,
	final_answer = $3,
	total_steps = $4,
	duration_ms = $5,
	completed_at = $6
WHERE id = $1 AND status = 'in_progress'",
	)
	.bind(question_id)
	.bind(status)
	.bind(final_answer)
	.bind(total_steps)
	.bind(duration_ms)
	.bind(completed_at)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}

pub async fn fetch_question(db: &Db, question_id: Uuid) -> Result<Option<QuestionRow>> {
	let sql = format!("SELECT {QUESTION_COLUMNS} FROM agent_questions WHERE id = $1");
	let row = sqlx::query_as::<_, QuestionRow>(&sql)
		.bind(question_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn insert_event(db: &Db, event: &NewEvent<'_>) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO agent_events (timestamp, question_id, agent_name, step_order, event_type, content)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(event.timestamp)
	.bind(event.question_id)
	.bind(event.agent_name)
	.bind(event.step_order)
	.bind(event.event_type)
	.bind(sqlx::types::Json(event.content))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn list_events(db: &Db, question_id: Uuid) -> Result<Vec<EventRow>> {
	let rows = sqlx::query_as::<_, EventRow>(
		"\
SELECT
	timestamp::timestamptz AS timestamp,
	question_id,
	agent_name,
	step_order::int4 AS step_order,
	event_type,
	content
FROM agent_events
WHERE question_id = $1
ORDER BY step_order ASC, timestamp ASC",
	)
	.bind(question_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Question columns plus event counts by kind. Zero events yield zero counts.
pub async fn question_summary(db: &Db, question_id: Uuid) -> Result<Option<QuestionSummaryRow>> {
	let row = sqlx::query_as::<_, QuestionSummaryRow>(
		"\
SELECT
	q.question,
	q.status,
	coalesce(q.total_steps, 0)::int4 AS total_steps,
	q.duration_ms::bigint AS duration_ms,
	count(e.question_id)::bigint AS total_events,
	count(e.question_id) FILTER (WHERE e.event_type = 'action')::bigint AS actions_executed,
	count(e.question_id) FILTER (WHERE e.event_type = 'thought')::bigint AS reasoning_steps,
	count(e.question_id) FILTER (WHERE e.event_type = 'error')::bigint AS errors
FROM agent_questions q
LEFT JOIN agent_events e ON e.question_id = q.id
WHERE q.id = $1
GROUP BY q.id, q.question, q.status, q.total_steps, q.duration_ms",
	)
	.bind(question_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// Events naming a tool, counted per tool, most used first.
pub async fn tool_usage(db: &Db, question_id: Uuid) -> Result<Vec<ToolUsageRow>> {
	let rows = sqlx::query_as::<_, ToolUsageRow>(
		"\
SELECT
	content->>'tool' AS tool_name,
	count(*)::bigint AS usage_count
FROM agent_events
WHERE question_id = $1 AND content->>'tool' IS NOT NULL
GROUP BY content->>'tool'
ORDER BY usage_count DESC, tool_name ASC",
	)
	.bind(question_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn window_summary(db: &Db, window_hours: i32) -> Result<WindowSummaryRow> {
	let row = sqlx::query_as::<_, WindowSummaryRow>(
		"\
SELECT
	count(DISTINCT q.id)::bigint AS total_questions,
	round(avg(q.duration_ms))::bigint AS avg_duration_ms,
	round(avg(q.total_steps))::bigint AS avg_steps,
	count(*) FILTER (WHERE q.status = 'completed')::bigint AS completed,
	count(*) FILTER (WHERE q.status = 'failed')::bigint AS failed,
	count(*) FILTER (WHERE q.status = 'in_progress')::bigint AS in_progress
FROM agent_questions q
WHERE q.started_at > now() - make_interval(hours => $1)",
	)
	.bind(window_hours)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

pub async fn window_error_count(db: &Db, window_hours: i32) -> Result<i64> {
	let count: i64 = sqlx::query_scalar(
		"\
SELECT count(*)::bigint
FROM agent_events e
JOIN agent_questions q ON e.question_id = q.id
WHERE e.event_type = 'error' AND q.started_at > now() - make_interval(hours => $1)",
	)
	.bind(window_hours)
	.fetch_one(&db.pool)
	.await?;

	Ok(count)
}

/// Completed questions of `agent_name` whose text contains `search_text`, newest first.
pub async fn recent_by_keyword(
	db: &Db,
	agent_name: &str,
	search_text: &str,
	limit: i64,
) -> Result<Vec<QuestionRow>> {
	let sql = format!(
		"\
SELECT {QUESTION_COLUMNS}
FROM agent_questions
WHERE agent_name = $1 AND status = 'completed' AND question ILIKE $2 ESCAPE '\\'
ORDER BY started_at DESC, id ASC
LIMIT $3"
	);
	let pattern = format!("%{}%", escape_like(search_text));
	let rows = sqlx::query_as::<_, QuestionRow>(&sql)
		.bind(agent_name)
		.bind(pattern)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

/// Makes `%`, `_` and `\` match literally inside an ILIKE pattern.
fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '\\' | '%' | '_') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
