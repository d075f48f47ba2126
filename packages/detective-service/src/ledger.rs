use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{DetectiveService, Error, Result};
use detective_storage::{
	ledger,
	models::{EventRow, NewEvent, QuestionRow},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
	InProgress,
	Completed,
	Failed,
}
impl InvestigationStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::InProgress => "in_progress",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"in_progress" => Some(Self::InProgress),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::InProgress)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
	Action,
	Thought,
	Error,
}
impl EventType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Action => "action",
			Self::Thought => "thought",
			Self::Error => "error",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"action" => Some(Self::Action),
			"thought" => Some(Self::Thought),
			"error" => Some(Self::Error),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Investigation {
	pub id: Uuid,
	pub agent_name: String,
	pub question: String,
	pub status: InvestigationStatus,
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	pub final_answer: Option<String>,
	pub total_steps: i32,
	pub duration_ms: Option<i64>,
}
impl TryFrom<QuestionRow> for Investigation {
	type Error = Error;

	fn try_from(row: QuestionRow) -> Result<Self> {
		let status = InvestigationStatus::parse(&row.status).ok_or_else(|| Error::Store {
			message: format!("Investigation {} has unknown status {:?}.", row.id, row.status),
		})?;

		Ok(Self {
			id: row.id,
			agent_name: row.agent_name,
			question: row.question,
			status,
			started_at: row.started_at,
			completed_at: row.completed_at,
			final_answer: row.final_answer,
			total_steps: row.total_steps,
			duration_ms: row.duration_ms,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestigationEvent {
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	pub question_id: Uuid,
	pub agent_name: String,
	pub step_order: i32,
	pub event_type: EventType,
	pub content: Value,
}
impl TryFrom<EventRow> for InvestigationEvent {
	type Error = Error;

	fn try_from(row: EventRow) -> Result<Self> {
		let event_type = EventType::parse(&row.event_type).ok_or_else(|| Error::Store {
			message: format!("Event has unknown type {:?}.", row.event_type),
		})?;

		Ok(Self {
			timestamp: row.timestamp,
			question_id: row.question_id,
			agent_name: row.agent_name,
			step_order: row.step_order,
			event_type,
			content: row.content,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
	pub tool_name: String,
	pub usage_count: i64,
}

/// Process summary of one investigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceAnalysis {
	pub question_id: Uuid,
	pub question: String,
	pub status: InvestigationStatus,
	pub total_steps: i32,
	pub duration_ms: Option<i64>,
	pub total_events: i64,
	pub actions_executed: i64,
	pub reasoning_steps: i64,
	pub errors: i64,
	/// Distinct tool names in ascending order.
	pub tools_used: Vec<String>,
	/// Most used first; equal counts ordered by name.
	pub tool_usage: Vec<ToolUsage>,
}
impl PerformanceAnalysis {
	/// Number of events that named a tool.
	pub fn total_tool_calls(&self) -> i64 {
		self.tool_usage.iter().map(|usage| usage.usage_count).sum()
	}

	pub fn usage_of(&self, tool_name: &str) -> i64 {
		self.tool_usage
			.iter()
			.find(|usage| usage.tool_name == tool_name)
			.map_or(0, |usage| usage.usage_count)
	}
}

/// Aggregate over every investigation started inside a trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowPerformance {
	pub window_hours: u32,
	pub total_questions: i64,
	pub avg_duration_ms: Option<i64>,
	pub avg_steps: Option<i64>,
	pub completed: i64,
	pub failed: i64,
	pub in_progress: i64,
	pub total_errors: i64,
}

impl DetectiveService {
	pub async fn create_investigation(&self, agent_name: &str, question: &str) -> Result<Uuid> {
		if agent_name.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "agent_name must be non-empty.".to_string(),
			});
		}
		if question.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "question must be non-empty.".to_string(),
			});
		}

		let question_id = Uuid::new_v4();

		ledger::insert_question(
			&self.db,
			question_id,
			agent_name,
			question,
			OffsetDateTime::now_utc(),
		)
		.await?;

		tracing::info!(%question_id, agent_name, "Investigation created.");

		Ok(question_id)
	}

	/// Appends one event and reports failure to the caller.
	pub async fn append_event(
		&self,
		question_id: Uuid,
		agent_name: &str,
		step_order: i32,
		event_type: EventType,
		content: &Value,
	) -> Result<()> {
		let event = NewEvent {
			question_id,
			agent_name,
			step_order,
			event_type: event_type.as_str(),
			content,
			timestamp: OffsetDateTime::now_utc(),
		};

		ledger::insert_event(&self.db, &event).await?;

		Ok(())
	}

	/// Best-effort variant of [`Self::append_event`]: a failed insert is logged and leaves no
	/// event for that step.
	pub async fn record_event(
		&self,
		question_id: Uuid,
		agent_name: &str,
		step_order: i32,
		event_type: EventType,
		content: &Value,
	) {
		if let Err(err) =
			self.append_event(question_id, agent_name, step_order, event_type, content).await
		{
			tracing::warn!(
				%question_id,
				step_order,
				event_type = event_type.as_str(),
				error = %err,
				"Failed to record investigation event."
			);
		}
	}

	/// The single terminal transition of an investigation.
	pub async fn complete_investigation(
		&self,
		question_id: Uuid,
		final_answer: &str,
		total_steps: u32,
		duration_ms: u64,
		status: InvestigationStatus,
	) -> Result<()> {
		if !status.is_terminal() {
			return Err(Error::InvalidRequest {
				message: "Terminal status must be completed or failed.".to_string(),
			});
		}

		let total_steps = i32::try_from(total_steps).map_err(|_| Error::InvalidRequest {
			message: "total_steps is out of range.".to_string(),
		})?;
		let duration_ms = i64::try_from(duration_ms).map_err(|_| Error::InvalidRequest {
			message: "duration_ms is out of range.".to_string(),
		})?;
		let changed = ledger::complete_question(
			&self.db,
			question_id,
			status.as_str(),
			final_answer,
			total_steps,
			duration_ms,
			OffsetDateTime::now_utc(),
		)
		.await?;

		if changed == 0 {
			return match ledger::fetch_question(&self.db, question_id).await? {
				Some(row) => Err(Error::Conflict {
					message: format!("Investigation {question_id} is already {}.", row.status),
				}),
				None => Err(Error::NotFound {
					message: format!("Investigation {question_id} does not exist."),
				}),
			};
		}

		tracing::info!(
			%question_id,
			status = status.as_str(),
			total_steps,
			duration_ms,
			"Investigation completed."
		);

		Ok(())
	}

	pub async fn investigation(&self, question_id: Uuid) -> Result<Investigation> {
		let row = ledger::fetch_question(&self.db, question_id).await?.ok_or_else(|| {
			Error::NotFound { message: format!("Investigation {question_id} does not exist.") }
		})?;

		Investigation::try_from(row)
	}

	/// Events of one investigation in step order.
	pub async fn investigation_events(&self, question_id: Uuid) -> Result<Vec<InvestigationEvent>> {
		ledger::list_events(&self.db, question_id)
			.await?
			.into_iter()
			.map(InvestigationEvent::try_from)
			.collect()
	}

	pub async fn analyze_performance(&self, question_id: Uuid) -> Result<PerformanceAnalysis> {
		let summary = ledger::question_summary(&self.db, question_id).await?.ok_or_else(|| {
			Error::NotFound { message: format!("Investigation {question_id} does not exist.") }
		})?;
		let status = InvestigationStatus::parse(&summary.status).ok_or_else(|| Error::Store {
			message: format!("Investigation {question_id} has unknown status {:?}.", summary.status),
		})?;
		let tool_usage = ledger::tool_usage(&self.db, question_id)
			.await?
			.into_iter()
			.map(|row| ToolUsage { tool_name: row.tool_name, usage_count: row.usage_count })
			.collect::<Vec<_>>();
		let mut tools_used =
			tool_usage.iter().map(|usage| usage.tool_name.clone()).collect::<Vec<_>>();

		tools_used.sort();

		Ok(PerformanceAnalysis {
			question_id,
			question: summary.question,
			status,
			total_steps: summary.total_steps,
			duration_ms: summary.duration_ms,
			total_events: summary.total_events,
			actions_executed: summary.actions_executed,
			reasoning_steps: summary.reasoning_steps,
			errors: summary.errors,
			tools_used,
			tool_usage,
		})
	}

	pub async fn analyze_window(&self, window_hours: u32) -> Result<WindowPerformance> {
		if window_hours == 0 {
			return Err(Error::InvalidRequest {
				message: "window_hours must be greater than zero.".to_string(),
			});
		}

		let hours = i32::try_from(window_hours).map_err(|_| Error::InvalidRequest {
			message: "window_hours is out of range.".to_string(),
		})?;
		let summary = ledger::window_summary(&self.db, hours).await?;
		let total_errors = ledger::window_error_count(&self.db, hours).await?;

		Ok(WindowPerformance {
			window_hours,
			total_questions: summary.total_questions,
			avg_duration_ms: summary.avg_duration_ms,
			avg_steps: summary.avg_steps,
			completed: summary.completed,
			failed: summary.failed,
			in_progress: summary.in_progress,
			total_errors,
		})
	}

	/// Completed investigations of `agent_name` whose question contains `search_text`, ignoring
	/// case, newest first. No match is an empty list.
	pub async fn find_recent_by_keyword(
		&self,
		agent_name: &str,
		search_text: &str,
		limit: u32,
	) -> Result<Vec<Investigation>> {
		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		ledger::recent_by_keyword(&self.db, agent_name, search_text, i64::from(limit))
			.await?
			.into_iter()
			.map(Investigation::try_from)
			.collect()
	}
}
