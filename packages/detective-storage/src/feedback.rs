use crate::{
	Result,
	db::Db,
	models::{FeedbackRow, LexicalHit, ScoredFeedbackRow, SemanticHit},
};

const FEEDBACK_COLUMNS: &str = "\
	id::bigint AS id,
	customer_id::bigint AS customer_id,
	feedback_text,
	product_referenced,
	sentiment::text AS sentiment,
	created_at::timestamptz AS created_at";

/// Which store-side parser interprets a keyword expression. The expression itself is never
/// rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSyntax {
	/// `|`, `&` and `!` operators, parsed by `to_tsquery`.
	Operator,
	/// Free text with quoted phrases, `or` and `-`, parsed by `websearch_to_tsquery`.
	Web,
}
impl KeywordSyntax {
	pub fn detect(expression: &str) -> Self {
		if expression.contains(['|', '&', '!']) { Self::Operator } else { Self::Web }
	}

	fn parser(self) -> &'static str {
		match self {
			Self::Operator => "to_tsquery",
			Self::Web => "websearch_to_tsquery",
		}
	}
}

/// Feedback ids with an embedding, nearest first. `limit = None` ranks the whole corpus.
pub async fn semantic_ranking(
	db: &Db,
	vec_text: &str,
	limit: Option<i64>,
) -> Result<Vec<SemanticHit>> {
	let hits = sqlx::query_as::<_, SemanticHit>(
		"\
SELECT
	id::bigint AS id,
	(1 - (embedding <=> $1::text::vector))::float8 AS similarity
FROM user_feedback
WHERE embedding IS NOT NULL
ORDER BY embedding <=> $1::text::vector ASC, id ASC
LIMIT $2",
	)
	.bind(vec_text)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(hits)
}

/// Feedback ids matching the keyword expression, best lexical rank first.
pub async fn lexical_ranking(
	db: &Db,
	expression: &str,
	syntax: KeywordSyntax,
	limit: Option<i64>,
) -> Result<Vec<LexicalHit>> {
	let parser = syntax.parser();
	let sql = format!(
		"\
SELECT
	id::bigint AS id,
	ts_rank(to_tsvector('english', feedback_text), {parser}('english', $1))::float8 AS rank
FROM user_feedback
WHERE to_tsvector('english', feedback_text) @@ {parser}('english', $1)
ORDER BY rank DESC, id ASC
LIMIT $2"
	);
	let hits = sqlx::query_as::<_, LexicalHit>(&sql)
		.bind(expression)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(hits)
}

pub async fn semantic_search(
	db: &Db,
	vec_text: &str,
	limit: i64,
) -> Result<Vec<ScoredFeedbackRow>> {
	let sql = format!(
		"\
SELECT
	{FEEDBACK_COLUMNS},
	(1 - (embedding <=> $1::text::vector))::float8 AS score
FROM user_feedback
WHERE embedding IS NOT NULL
ORDER BY embedding <=> $1::text::vector ASC, id ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, ScoredFeedbackRow>(&sql)
		.bind(vec_text)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn fulltext_search(
	db: &Db,
	expression: &str,
	syntax: KeywordSyntax,
	limit: i64,
) -> Result<Vec<ScoredFeedbackRow>> {
	let parser = syntax.parser();
	let sql = format!(
		"\
SELECT
	{FEEDBACK_COLUMNS},
	ts_rank(to_tsvector('english', feedback_text), {parser}('english', $1))::float8 AS score
FROM user_feedback
WHERE to_tsvector('english', feedback_text) @@ {parser}('english', $1)
ORDER BY score DESC, id ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, ScoredFeedbackRow>(&sql)
		.bind(expression)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

/// Rows for the given ids in no particular order.
pub async fn fetch_by_ids(db: &Db, ids: &[i64]) -> Result<Vec<FeedbackRow>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!(
		"\
SELECT
	{FEEDBACK_COLUMNS}
FROM user_feedback
WHERE id::bigint = ANY($1)"
	);
	let rows = sqlx::query_as::<_, FeedbackRow>(&sql).bind(ids).fetch_all(&db.pool).await?;

	Ok(rows)
}
