use serde_json::Value;
use time::OffsetDateTime;

use crate::{Result, db::Db, models::InsightRow};

pub async fn insert(
	db: &Db,
	agent_name: &str,
	content: &str,
	vec_text: &str,
	metadata: &Value,
	created_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO agent_memory (agent_name, content, embedding, metadata, created_at)
VALUES ($1, $2, $3::text::vector, $4, $5)",
	)
	.bind(agent_name)
	.bind(content)
	.bind(vec_text)
	.bind(sqlx::types::Json(metadata))
	.bind(created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Insights owned by `agent_name`, most relevant first; equal relevance prefers the newer one.
pub async fn search(
	db: &Db,
	agent_name: &str,
	vec_text: &str,
	limit: i64,
) -> Result<Vec<InsightRow>> {
	let rows = sqlx::query_as::<_, InsightRow>(
		"\
SELECT
	content,
	coalesce(metadata, '{}'::jsonb) AS metadata,
	created_at::timestamptz AS created_at,
	(1 - (embedding <=> $2::text::vector))::float8 AS relevance
FROM agent_memory
WHERE agent_name = $1 AND embedding IS NOT NULL
ORDER BY relevance DESC, created_at DESC
LIMIT $3",
	)
	.bind(agent_name)
	.bind(vec_text)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
