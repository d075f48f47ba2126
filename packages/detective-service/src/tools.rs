//! The closed set of tools exposed to the model and the per-investigation session that runs them.
//!
//! Every executed call yields a `{ "success": ... }` object and exactly one ledger event. Failures
//! never escape as errors; the model sees them as unsuccessful tool results.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{DetectiveService, Error, Result, SearchResult, ledger::EventType, truncate_chars};
use detective_storage::query::{self, SqlOutcome};

const SQL_EVENT_CHARS: usize = 500;
const THOUGHT_EVENT_CHARS: usize = 500;
const INSIGHT_EVENT_CHARS: usize = 200;

/// Operator expressions go to `to_tsquery`, which rejects bare multi-word operands.
pub(crate) const KEYWORD_SYNTAX_HINT: &str = "| is OR, & is AND, ! is NOT; each operand must be a \
single word, so join the words of a phrase with <-> (for example broken|stopped<->working)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
	QueryDatabase {
		sql: String,
		#[serde(default)]
		reasoning: String,
	},
	HybridSearch {
		query: String,
		keywords: String,
		#[serde(default)]
		reasoning: String,
	},
	SemanticSearchFeedback {
		query: String,
		#[serde(default)]
		reasoning: String,
	},
	FulltextSearch {
		keywords: String,
		#[serde(default)]
		reasoning: String,
	},
	StoreInsight {
		insight: String,
		#[serde(default)]
		reasoning: String,
	},
	SearchInsights {
		query: String,
		#[serde(default)]
		reasoning: String,
	},
	AnalyzeAgentPerformance {
		#[serde(default)]
		search_query: Option<String>,
		#[serde(default)]
		reasoning: Option<String>,
	},
}
impl ToolCall {
	pub const NAMES: [&'static str; 7] = [
		"query_database",
		"hybrid_search",
		"semantic_search_feedback",
		"fulltext_search",
		"store_insight",
		"search_insights",
		"analyze_agent_performance",
	];

	/// Builds a call from a tool name and the raw JSON arguments produced by the model.
	pub fn parse(name: &str, arguments: &str) -> Result<Self> {
		if !Self::NAMES.contains(&name) {
			return Err(Error::InvalidRequest { message: format!("Unknown tool {name:?}.") });
		}

		let arguments = if arguments.trim().is_empty() {
			json!({})
		} else {
			serde_json::from_str::<Value>(arguments).map_err(|err| Error::InvalidRequest {
				message: format!("Arguments for {name} are not valid JSON: {err}."),
			})?
		};

		serde_json::from_value(json!({ "name": name, "arguments": arguments })).map_err(|err| {
			Error::InvalidRequest { message: format!("Invalid arguments for {name}: {err}.") }
		})
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::QueryDatabase { .. } => "query_database",
			Self::HybridSearch { .. } => "hybrid_search",
			Self::SemanticSearchFeedback { .. } => "semantic_search_feedback",
			Self::FulltextSearch { .. } => "fulltext_search",
			Self::StoreInsight { .. } => "store_insight",
			Self::SearchInsights { .. } => "search_insights",
			Self::AnalyzeAgentPerformance { .. } => "analyze_agent_performance",
		}
	}

	/// Function definitions in the chat-completions `tools` format.
	pub fn definitions() -> Vec<Value> {
		vec![
			function(
				"query_database",
				"Execute SQL queries on the database to fetch and analyze data.",
				json!({
					"sql": string_param("The SQL query to execute."),
					"reasoning": string_param("Why you are running this query."),
				}),
				&["sql", "reasoning"],
			),
			function(
				"hybrid_search",
				"Search user feedback using both keyword matching and semantic similarity.",
				json!({
					"query": string_param("Natural language query for semantic search."),
					"keywords": string_param(&format!(
						"Keywords for full-text search ({KEYWORD_SYNTAX_HINT})."
					)),
					"reasoning": string_param("Why you are using hybrid search."),
				}),
				&["query", "keywords", "reasoning"],
			),
			function(
				"semantic_search_feedback",
				"Search user feedback by semantic similarity to find related concepts.",
				json!({
					"query": string_param("Natural language query describing what to find."),
					"reasoning": string_param("Why you are using semantic search."),
				}),
				&["query", "reasoning"],
			),
			function(
				"fulltext_search",
				"Search user feedback for exact keyword matches.",
				json!({
					"keywords": string_param(&format!(
						"Keywords to search for ({KEYWORD_SYNTAX_HINT})."
					)),
					"reasoning": string_param("Why you are using full-text search."),
				}),
				&["keywords", "reasoning"],
			),
			function(
				"store_insight",
				"Store an important finding for future investigations.",
				json!({
					"insight": string_param("The key finding or insight to remember."),
					"reasoning": string_param("Why this insight is important."),
				}),
				&["insight", "reasoning"],
			),
			function(
				"search_insights",
				"Search findings stored during previous investigations.",
				json!({
					"query": string_param("What past learnings to search for."),
					"reasoning": string_param("Why you need past insights."),
				}),
				&["query", "reasoning"],
			),
			function(
				"analyze_agent_performance",
				"Analyze this or a past investigation: tools used, queries run, time spent.",
				json!({
					"search_query": string_param(
						"Optional text of a past question to analyze instead of the current one."
					),
					"reasoning": string_param("Why you want to analyze performance."),
				}),
				&[],
			),
		]
	}

	/// Event payload describing the call's inputs, with long text truncated.
	fn event_content(&self) -> Value {
		let tool = self.name();

		match self {
			Self::QueryDatabase { sql, reasoning } => json!({
				"tool": tool,
				"sql": truncate_chars(sql, SQL_EVENT_CHARS),
				"reasoning": reasoning,
			}),
			Self::HybridSearch { query, keywords, reasoning } => json!({
				"tool": tool,
				"query": query,
				"keywords": keywords,
				"reasoning": reasoning,
			}),
			Self::SemanticSearchFeedback { query, reasoning }
			| Self::SearchInsights { query, reasoning } => json!({
				"tool": tool,
				"query": query,
				"reasoning": reasoning,
			}),
			Self::FulltextSearch { keywords, reasoning } => json!({
				"tool": tool,
				"keywords": keywords,
				"reasoning": reasoning,
			}),
			Self::StoreInsight { insight, reasoning } => json!({
				"tool": tool,
				"insight": truncate_chars(insight, INSIGHT_EVENT_CHARS),
				"reasoning": reasoning,
			}),
			Self::AnalyzeAgentPerformance { search_query, reasoning } => json!({
				"tool": tool,
				"search_query": search_query,
				"reasoning": reasoning,
			}),
		}
	}
}

/// Runs tools on behalf of one investigation and assigns step order.
pub struct InvestigationSession<'a> {
	service: &'a DetectiveService,
	question_id: Uuid,
	agent_name: String,
	next_step: i32,
}
impl<'a> InvestigationSession<'a> {
	pub fn new(service: &'a DetectiveService, question_id: Uuid, agent_name: &str) -> Self {
		Self { service, question_id, agent_name: agent_name.to_string(), next_step: 1 }
	}

	pub fn question_id(&self) -> Uuid {
		self.question_id
	}

	pub fn agent_name(&self) -> &str {
		&self.agent_name
	}

	/// Steps assigned so far, whether or not their events were stored.
	pub fn steps_taken(&self) -> u32 {
		u32::try_from(self.next_step - 1).unwrap_or_default()
	}

	/// Records one reasoning emission. Blank text takes no step.
	pub async fn record_thought(&mut self, text: &str) {
		let text = text.trim();

		if text.is_empty() {
			return;
		}

		let step_order = self.take_step();
		let content = json!({ "text": truncate_chars(text, THOUGHT_EVENT_CHARS) });

		self.service
			.record_event(
				self.question_id,
				&self.agent_name,
				step_order,
				EventType::Thought,
				&content,
			)
			.await;
	}

	/// Parses and runs a call named by the model. Unknown tools and bad arguments are reported
	/// like any other tool failure.
	pub async fn execute_raw(&mut self, name: &str, arguments: &str) -> Value {
		match ToolCall::parse(name, arguments) {
			Ok(call) => self.execute(&call).await,
			Err(err) => {
				let step_order = self.take_step();
				let content = json!({
					"tool": name,
					"arguments": truncate_chars(arguments, SQL_EVENT_CHARS),
					"error": err.to_string(),
				});

				tracing::warn!(tool = name, step_order, error = %err, "Rejected tool call.");

				self.service
					.record_event(
						self.question_id,
						&self.agent_name,
						step_order,
						EventType::Error,
						&content,
					)
					.await;

				failure(&err)
			},
		}
	}

	pub async fn execute(&mut self, call: &ToolCall) -> Value {
		let step_order = self.take_step();
		let tool = call.name();
		let mut content = call.event_content();

		match self.run(call).await {
			Ok((result, outcome)) => {
				if let (Value::Object(content), Value::Object(outcome)) = (&mut content, outcome) {
					content.extend(outcome);
				}

				tracing::info!(question_id = %self.question_id, tool, step_order, "Tool executed.");

				self.service
					.record_event(
						self.question_id,
						&self.agent_name,
						step_order,
						EventType::Action,
						&content,
					)
					.await;

				result
			},
			Err(err) => {
				content["error"] = Value::String(err.to_string());

				tracing::warn!(
					question_id = %self.question_id,
					tool,
					step_order,
					error = %err,
					"Tool failed."
				);

				self.service
					.record_event(
						self.question_id,
						&self.agent_name,
						step_order,
						EventType::Error,
						&content,
					)
					.await;

				failure(&err)
			},
		}
	}

	fn take_step(&mut self) -> i32 {
		let step = self.next_step;

		self.next_step += 1;

		step
	}

	/// Returns the tool result and the extra event fields describing its outcome.
	async fn run(&self, call: &ToolCall) -> Result<(Value, Value)> {
		let service = self.service;
		let search = &service.cfg.search;

		match call {
			ToolCall::QueryDatabase { sql, .. } => {
				let row_limit = service.cfg.agent.query_row_limit as usize;

				match query::run_sql(&service.db, sql, row_limit).await? {
					SqlOutcome::Rows { rows, row_count } => {
						let truncated = rows.len() < row_count;

						Ok((
							json!({
								"success": true,
								"rows": rows,
								"rowCount": row_count,
								"truncated": truncated,
							}),
							json!({ "rowCount": row_count }),
						))
					},
					SqlOutcome::Affected { rows_affected } => Ok((
						json!({
							"success": true,
							"rows": [],
							"rowCount": 0,
							"rowsAffected": rows_affected,
						}),
						json!({ "rowCount": 0, "rowsAffected": rows_affected }),
					)),
				}
			},
			ToolCall::HybridSearch { query, keywords, .. } => {
				let results = service.hybrid_search(query, keywords, search.hybrid_limit).await?;
				let items = results
					.iter()
					.map(|result| {
						json!({
							"id": result.id,
							"feedback": result.text,
							"product": result.product_reference,
							"sentiment": result.sentiment.as_str(),
							"match_type": result.match_type.as_str(),
							"relevance": result.relevance_score,
							"similarity": result.similarity,
							"fts_rank": result.fulltext_rank,
						})
					})
					.collect::<Vec<_>>();

				Ok(search_outcome(items))
			},
			ToolCall::SemanticSearchFeedback { query, .. } => {
				let results = service.semantic_search(query, search.semantic_limit).await?;
				let items = results
					.iter()
					.map(|result| {
						let mut item = feedback_item(result);

						item["similarity"] = json!(result.similarity);

						item
					})
					.collect::<Vec<_>>();

				Ok(search_outcome(items))
			},
			ToolCall::FulltextSearch { keywords, .. } => {
				let results = service.fulltext_search(keywords, search.fulltext_limit).await?;
				let items = results
					.iter()
					.map(|result| {
						let mut item = feedback_item(result);

						item["rank"] = json!(result.fulltext_rank);

						item
					})
					.collect::<Vec<_>>();

				Ok(search_outcome(items))
			},
			ToolCall::StoreInsight { insight, reasoning } => {
				let metadata = json!({
					"question_id": self.question_id,
					"reasoning": reasoning,
				});

				service.store_insight(&self.agent_name, insight, &metadata).await?;

				Ok((
					json!({ "success": true, "message": "Insight stored successfully" }),
					json!({}),
				))
			},
			ToolCall::SearchInsights { query, .. } => {
				let insights =
					service.search_insights(&self.agent_name, query, search.insight_limit).await?;
				let items = insights
					.iter()
					.map(|insight| {
						json!({
							"content": insight.content,
							"relevance": insight.relevance,
							"created_at": rfc3339(insight.created_at),
						})
					})
					.collect::<Vec<_>>();
				let count = items.len();

				Ok((
					json!({ "success": true, "insights": items, "totalInsights": count }),
					json!({ "resultCount": count }),
				))
			},
			ToolCall::AnalyzeAgentPerformance { search_query, .. } => {
				let target = match search_query.as_deref().map(str::trim) {
					Some(text) if !text.is_empty() => service
						.find_recent_by_keyword(&self.agent_name, text, 1)
						.await?
						.into_iter()
						.next()
						.map(|investigation| investigation.id),
					_ => Some(self.question_id),
				};
				let Some(target) = target else {
					return Ok((
						json!({
							"success": true,
							"message": "No completed investigation matches the search query.",
						}),
						json!({ "analyzed": null }),
					));
				};
				let stats = service.analyze_performance(target).await?;
				let breakdown = stats
					.tool_usage
					.iter()
					.map(|usage| {
						json!({ "tool_name": usage.tool_name, "usage_count": usage.usage_count })
					})
					.collect::<Vec<_>>();

				Ok((
					json!({
						"success": true,
						"performance": {
							"question": stats.question,
							"status": stats.status.as_str(),
							"total_steps": stats.total_steps,
							"duration_ms": stats.duration_ms,
							"total_tool_calls": stats.total_tool_calls(),
							"queries_executed": stats.usage_of("query_database"),
							"reasoning_steps": stats.reasoning_steps,
							"errors": stats.errors,
							"tools_used": stats.tools_used,
							"tool_usage_breakdown": breakdown,
						},
					}),
					json!({ "analyzed": target }),
				))
			},
		}
	}
}

fn function(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
	json!({
		"type": "function",
		"function": {
			"name": name,
			"description": description,
			"parameters": {
				"type": "object",
				"properties": properties,
				"required": required,
			},
		},
	})
}

fn string_param(description: &str) -> Value {
	json!({ "type": "string", "description": description })
}

fn feedback_item(result: &SearchResult) -> Value {
	json!({
		"id": result.id,
		"feedback": result.text,
		"product": result.product_reference,
		"sentiment": result.sentiment.as_str(),
	})
}

fn search_outcome(items: Vec<Value>) -> (Value, Value) {
	let count = items.len();

	(
		json!({ "success": true, "results": items, "totalResults": count }),
		json!({ "resultCount": count }),
	)
}

fn failure(err: &Error) -> Value {
	json!({ "success": false, "error": err.to_string() })
}

fn rfc3339(ts: OffsetDateTime) -> String {
	ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}
