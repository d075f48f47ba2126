use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
	DetectiveService, Error, InvestigationSession, Result, ToolCall, ledger::InvestigationStatus,
	tools::KEYWORD_SYNTAX_HINT,
};
use detective_providers::chat;
use detective_storage::introspect;

/// Text the model emits when it has reached its conclusion.
pub const COMPLETION_MARKER: &str = "INVESTIGATION COMPLETE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvestigationReport {
	pub question_id: Uuid,
	pub success: bool,
	pub answer: String,
	pub steps: u32,
	pub duration_ms: u64,
}

impl DetectiveService {
	/// Runs one investigation end to end.
	///
	/// The investigation is created first and completed exactly once, as `completed` when the loop
	/// produces an answer or as `failed` with `Agent failed: <message>` otherwise. Only a failure
	/// to create the investigation is returned as an error.
	pub async fn investigate(
		&self,
		question: &str,
		agent_name: Option<&str>,
	) -> Result<InvestigationReport> {
		let agent_name = agent_name
			.map(str::trim)
			.filter(|name| !name.is_empty())
			.unwrap_or(self.cfg.agent.name.as_str())
			.to_string();
		let started = Instant::now();
		let question_id = self.create_investigation(&agent_name, question).await?;
		let mut session = InvestigationSession::new(self, question_id, &agent_name);
		let outcome = self.run_tool_loop(&mut session, question).await;
		let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
		let steps = session.steps_taken();
		let (status, answer) = match outcome {
			Ok(answer) => (InvestigationStatus::Completed, answer),
			Err(err) => {
				tracing::warn!(%question_id, error = %err, "Investigation failed.");

				(InvestigationStatus::Failed, format!("Agent failed: {err}"))
			},
		};

		if let Err(err) =
			self.complete_investigation(question_id, &answer, steps, duration_ms, status).await
		{
			tracing::warn!(%question_id, error = %err, "Failed to complete investigation record.");
		}

		Ok(InvestigationReport {
			question_id,
			success: status == InvestigationStatus::Completed,
			answer,
			steps,
			duration_ms,
		})
	}

	/// Live schema description for prompts, or a fixed description when the catalog is
	/// unreadable.
	pub async fn schema_description(&self) -> String {
		match introspect::describe_schema(&self.db).await {
			Ok(tables) if !tables.is_empty() => introspect::render_schema_description(&tables),
			Ok(_) => {
				tracing::warn!("Schema introspection found no tables. Using fallback description.");

				introspect::FALLBACK_SCHEMA.to_string()
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Schema introspection failed. Using fallback description."
				);

				introspect::FALLBACK_SCHEMA.to_string()
			},
		}
	}

	async fn run_tool_loop(
		&self,
		session: &mut InvestigationSession<'_>,
		question: &str,
	) -> Result<String> {
		let schema = self.schema_description().await;
		let definitions = ToolCall::definitions();
		let max_rounds = self.cfg.agent.max_tool_rounds;
		let mut messages = vec![
			json!({ "role": "system", "content": system_prompt(&schema) }),
			json!({ "role": "user", "content": question }),
		];
		let mut last_text = None;

		for round in 0..=max_rounds {
			// The turn after the last tool round gets no tools so the model has to answer.
			let tools: &[Value] = if round < max_rounds { &definitions } else { &[] };
			let turn = self
				.providers
				.chat
				.complete(&self.cfg.providers.llm, &messages, tools)
				.await
				.map_err(|err| Error::Provider { message: err.to_string() })?;

			if let Some(text) = turn.text() {
				session.record_thought(text).await;

				last_text = Some(text.to_string());
			}

			let concluded = turn.text().is_some_and(|text| text.contains(COMPLETION_MARKER));

			if concluded || turn.tool_calls.is_empty() || round == max_rounds {
				tracing::info!(
					question_id = %session.question_id(),
					round,
					concluded,
					"Tool loop finished."
				);

				break;
			}

			messages.push(chat::assistant_message(&turn));

			for call in &turn.tool_calls {
				let result = session.execute_raw(&call.name, &call.arguments).await;

				messages.push(chat::tool_message(&call.id, &result));
			}
		}

		Ok(last_text.unwrap_or_else(|| {
			format!("No final answer was produced within {max_rounds} tool rounds.")
		}))
	}
}

fn system_prompt(schema: &str) -> String {
	format!(
		"\
You are a database detective investigating business problems in a single Postgres database.

{schema}
Tools:
- query_database: SQL for structured analysis such as trends, revenue and customer counts.
- hybrid_search: feedback search fusing keyword and semantic rankings. Prefer it for feedback.
- semantic_search_feedback: feedback that is conceptually similar to a description.
- fulltext_search: exact keyword matches; {KEYWORD_SYNTAX_HINT}.
- store_insight: save a finding worth remembering in later investigations.
- search_insights: recall findings from earlier investigations.
- analyze_agent_performance: inspect how this or a past investigation was carried out.

SQL notes: use CURRENT_DATE and INTERVAL arithmetic for dates, and never select embedding columns.

Work step by step, run as many queries as you need, store important insights, and finish with
\"{COMPLETION_MARKER}: <answer>\"."
	)
}
