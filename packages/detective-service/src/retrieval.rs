use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
	DetectiveService, Error, Result,
	fusion::{self, MatchType},
};
use detective_storage::{
	feedback::{self, KeywordSyntax},
	insights,
	models::{FeedbackRow, InsightRow, ScoredFeedbackRow},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
	Positive,
	Neutral,
	Negative,
}
impl Sentiment {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"positive" => Some(Self::Positive),
			"neutral" => Some(Self::Neutral),
			"negative" => Some(Self::Negative),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Positive => "positive",
			Self::Neutral => "neutral",
			Self::Negative => "negative",
		}
	}
}

/// A ranked view of one feedback item.
///
/// `match_type` is `both` exactly when `similarity` and `fulltext_rank` are both present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	pub id: i64,
	pub customer_id: i64,
	pub text: String,
	pub product_reference: Option<String>,
	pub sentiment: Sentiment,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub match_type: MatchType,
	pub similarity: Option<f64>,
	/// Lexical relevance of the item, not its position.
	pub fulltext_rank: Option<f64>,
	pub relevance_score: Option<f64>,
}
impl SearchResult {
	fn from_row(row: FeedbackRow, match_type: MatchType) -> Result<Self> {
		let sentiment = Sentiment::parse(&row.sentiment).ok_or_else(|| Error::Store {
			message: format!("Feedback {} has unknown sentiment {:?}.", row.id, row.sentiment),
		})?;

		Ok(Self {
			id: row.id,
			customer_id: row.customer_id,
			text: row.feedback_text,
			product_reference: row.product_referenced,
			sentiment,
			created_at: row.created_at,
			match_type,
			similarity: None,
			fulltext_rank: None,
			relevance_score: None,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
	pub content: String,
	pub metadata: Value,
	pub relevance: f64,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<InsightRow> for Insight {
	fn from(row: InsightRow) -> Self {
		Self {
			content: row.content,
			metadata: row.metadata,
			relevance: row.relevance,
			created_at: row.created_at,
		}
	}
}

impl DetectiveService {
	/// Nearest feedback by cosine similarity, every result labelled `semantic_only`.
	pub async fn semantic_search(&self, query_text: &str, limit: u32) -> Result<Vec<SearchResult>> {
		require_text("query_text", query_text)?;
		require_limit(limit)?;

		let vec = self.embed_query(query_text).await?;
		let vec_text = detective_storage::vector_to_pg(&vec);
		let rows = feedback::semantic_search(&self.db, &vec_text, i64::from(limit)).await?;

		tracing::debug!(results = rows.len(), "Semantic search finished.");

		rows.into_iter()
			.map(|row| {
				let ScoredFeedbackRow { feedback, score } = row;
				let mut result = SearchResult::from_row(feedback, MatchType::SemanticOnly)?;

				result.similarity = Some(score);

				Ok(result)
			})
			.collect()
	}

	/// Feedback matching the keyword expression, best lexical rank first.
	pub async fn fulltext_search(
		&self,
		keyword_expression: &str,
		limit: u32,
	) -> Result<Vec<SearchResult>> {
		require_text("keyword_expression", keyword_expression)?;
		require_limit(limit)?;

		let syntax = KeywordSyntax::detect(keyword_expression);
		let rows =
			feedback::fulltext_search(&self.db, keyword_expression, syntax, i64::from(limit))
				.await?;

		tracing::debug!(results = rows.len(), ?syntax, "Full-text search finished.");

		rows.into_iter()
			.map(|row| {
				let ScoredFeedbackRow { feedback, score } = row;
				let mut result = SearchResult::from_row(feedback, MatchType::FulltextOnly)?;

				result.fulltext_rank = Some(score);

				Ok(result)
			})
			.collect()
	}

	/// Reciprocal-rank fusion of the full semantic and lexical orderings.
	///
	/// A blank `query_text` leaves the semantic side empty and a blank `keyword_expression` leaves
	/// the lexical side empty. Neither is an error; an embedding failure still is.
	pub async fn hybrid_search(
		&self,
		query_text: &str,
		keyword_expression: &str,
		limit: u32,
	) -> Result<Vec<SearchResult>> {
		require_limit(limit)?;

		let semantic = if query_text.trim().is_empty() {
			Vec::new()
		} else {
			let vec = self.embed_query(query_text).await?;

			feedback::semantic_ranking(&self.db, &detective_storage::vector_to_pg(&vec), None)
				.await?
		};
		let lexical = if keyword_expression.trim().is_empty() {
			Vec::new()
		} else {
			let syntax = KeywordSyntax::detect(keyword_expression);

			feedback::lexical_ranking(&self.db, keyword_expression, syntax, None).await?
		};
		let fused = fusion::fuse(&semantic, &lexical, limit as usize);
		let ids = fused.iter().map(|hit| hit.id).collect::<Vec<_>>();
		let mut rows = feedback::fetch_by_ids(&self.db, &ids)
			.await?
			.into_iter()
			.map(|row| (row.id, row))
			.collect::<HashMap<_, _>>();
		let mut results = Vec::with_capacity(fused.len());

		for hit in fused {
			let Some(row) = rows.remove(&hit.id) else {
				tracing::warn!(id = hit.id, "Fused feedback row disappeared before fetch.");

				continue;
			};
			let mut result = SearchResult::from_row(row, hit.match_type)?;

			result.similarity = hit.similarity.map(|value| fusion::round_to(value, 3));
			result.fulltext_rank = hit.lexical_score.map(|value| fusion::round_to(value, 3));
			result.relevance_score = Some(fusion::round_to(hit.score, 4));

			results.push(result);
		}

		tracing::debug!(
			semantic = semantic.len(),
			lexical = lexical.len(),
			results = results.len(),
			"Hybrid search finished."
		);

		Ok(results)
	}

	/// Insights of `agent_name` nearest to `query_text`; equal relevance prefers the newest.
	pub async fn search_insights(
		&self,
		agent_name: &str,
		query_text: &str,
		limit: u32,
	) -> Result<Vec<Insight>> {
		require_text("agent_name", agent_name)?;
		require_text("query_text", query_text)?;
		require_limit(limit)?;

		let vec = self.embed_query(query_text).await?;
		let rows = insights::search(
			&self.db,
			agent_name,
			&detective_storage::vector_to_pg(&vec),
			i64::from(limit),
		)
		.await?;

		Ok(rows.into_iter().map(Insight::from).collect())
	}

	pub async fn store_insight(
		&self,
		agent_name: &str,
		content: &str,
		metadata: &Value,
	) -> Result<()> {
		require_text("agent_name", agent_name)?;
		require_text("content", content)?;

		let vec = self.embed_query(content).await?;

		insights::insert(
			&self.db,
			agent_name,
			content,
			&detective_storage::vector_to_pg(&vec),
			metadata,
			OffsetDateTime::now_utc(),
		)
		.await?;

		tracing::info!(agent_name, "Insight stored.");

		Ok(())
	}

	pub(crate) async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.embedding;
		let embeddings = self
			.providers
			.embedding
			.embed(cfg, &[text.to_string()])
			.await
			.map_err(|err| Error::Embedding { message: err.to_string() })?;
		let Some(vec) = embeddings.into_iter().next() else {
			return Err(Error::Embedding {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vec.len() != cfg.dimensions as usize {
			return Err(Error::Embedding {
				message: format!(
					"Embedding vector has {} dimensions; expected {}.",
					vec.len(),
					cfg.dimensions
				),
			});
		}

		Ok(vec)
	}
}

fn require_text(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::InvalidRequest { message: format!("{field} must be non-empty.") });
	}

	Ok(())
}

fn require_limit(limit: u32) -> Result<()> {
	if limit == 0 {
		return Err(Error::InvalidRequest { message: "limit must be greater than zero.".to_string() });
	}

	Ok(())
}
