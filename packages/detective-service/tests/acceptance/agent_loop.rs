use std::sync::Arc;

use detective_providers::chat::{ChatToolCall, ChatTurn};
use detective_service::{EventType, InvestigationStatus};

use super::{PhraseEmbedding, ScriptedChat};

fn text_turn(text: &str) -> detective_providers::Result<ChatTurn> {
	Ok(ChatTurn { content: Some(text.to_string()), tool_calls: Vec::new() })
}

fn tool_turn(text: Option<&str>, name: &str, arguments: &str) -> detective_providers::Result<ChatTurn> {
	Ok(ChatTurn {
		content: text.map(str::to_string),
		tool_calls: vec![ChatToolCall {
			id: format!("call_{name}"),
			name: name.to_string(),
			arguments: arguments.to_string(),
		}],
	})
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn investigation_runs_tools_and_records_every_step() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping investigation_runs_tools_and_records_every_step; set DETECTIVE_PG_DSN to run."
		);

		return;
	};
	let chat = Arc::new(ScriptedChat::new(vec![
		tool_turn(
			Some("Counting feedback first."),
			"query_database",
			r#"{"sql":"SELECT count(*) AS n FROM user_feedback","reasoning":"size of the data"}"#,
		),
		text_turn("INVESTIGATION COMPLETE: There are 2 feedback rows."),
	]));
	let service =
		super::build_service(&test_db, Arc::new(PhraseEmbedding::new(&[])), chat.clone()).await;

	for customer_id in [1, 2] {
		detective_testkit::insert_feedback(
			&service.db.pool,
			customer_id,
			"Arrived late.",
			None,
			"negative",
			None,
		)
		.await
		.expect("Failed to insert feedback.");
	}

	let report = service
		.investigate("How much feedback do we have?", None)
		.await
		.expect("Investigation could not start.");

	assert!(report.success);
	assert_eq!(report.answer, "INVESTIGATION COMPLETE: There are 2 feedback rows.");
	assert_eq!(report.steps, 3);
	assert_eq!(chat.request_count(), 2);

	let stored = service.investigation(report.question_id).await.expect("Investigation missing.");

	assert_eq!(stored.agent_name, "detective");
	assert_eq!(stored.status, InvestigationStatus::Completed);
	assert_eq!(stored.total_steps, 3);
	assert_eq!(stored.final_answer.as_deref(), Some(report.answer.as_str()));

	let events = service.investigation_events(report.question_id).await.expect("Events missing.");

	assert_eq!(events.iter().map(|event| event.event_type).collect::<Vec<_>>(), vec![
		EventType::Thought,
		EventType::Action,
		EventType::Thought
	]);
	assert_eq!(events[1].content["tool"], "query_database");
	assert_eq!(events[1].content["rowCount"], 1);

	let requests = chat.requests.lock().expect("Request log poisoned.");
	let tool_reply = requests[1]
		.0
		.iter()
		.find(|message| message["role"] == "tool")
		.expect("Tool result was not sent back to the model.");

	assert_eq!(tool_reply["tool_call_id"], "call_query_database");
	assert!(tool_reply["content"].as_str().is_some_and(|content| content.contains("\"n\":2")));

	drop(requests);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn final_round_is_sent_without_tools() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping final_round_is_sent_without_tools; set DETECTIVE_PG_DSN to run.");

		return;
	};
	// Three tool rounds of unknown tools, then the scripted fallback answer.
	let chat = Arc::new(ScriptedChat::new(vec![
		tool_turn(None, "consult_oracle", "{}"),
		tool_turn(None, "consult_oracle", "{}"),
		tool_turn(None, "consult_oracle", "{}"),
	]));
	let service =
		super::build_service(&test_db, Arc::new(PhraseEmbedding::new(&[])), chat.clone()).await;
	let report = service
		.investigate("Why did sales drop?", Some("auditor"))
		.await
		.expect("Investigation could not start.");

	assert!(report.success);
	assert_eq!(report.steps, 4);

	{
		let requests = chat.requests.lock().expect("Request log poisoned.");

		assert_eq!(requests.len(), 4);
		assert!(requests[..3].iter().all(|(_, tools)| *tools > 0));
		assert_eq!(requests[3].1, 0);
	}

	let analysis =
		service.analyze_performance(report.question_id).await.expect("Analysis failed.");

	assert_eq!(analysis.errors, 3);
	assert_eq!(analysis.reasoning_steps, 1);
	assert_eq!(analysis.actions_executed, 0);
	assert_eq!(analysis.usage_of("consult_oracle"), 3);

	let events = service.investigation_events(report.question_id).await.expect("Events missing.");

	assert!(events.iter().all(|event| event.agent_name == "auditor"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn provider_failure_marks_the_investigation_failed() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping provider_failure_marks_the_investigation_failed; set DETECTIVE_PG_DSN to run."
		);

		return;
	};
	let chat = Arc::new(ScriptedChat::new(vec![
		tool_turn(Some("Looking at orders."), "fulltext_search", r#"{"keywords":"late"}"#),
		Err(detective_providers::Error::InvalidResponse { message: "upstream 503".to_string() }),
	]));
	let service =
		super::build_service(&test_db, Arc::new(PhraseEmbedding::new(&[])), chat.clone()).await;
	let report = service
		.investigate("Why are orders late?", None)
		.await
		.expect("Investigation could not start.");

	assert!(!report.success);
	assert!(report.answer.starts_with("Agent failed:"), "Unexpected answer: {}", report.answer);
	assert!(report.answer.contains("upstream 503"));
	assert_eq!(report.steps, 2);

	let stored = service.investigation(report.question_id).await.expect("Investigation missing.");

	assert_eq!(stored.status, InvestigationStatus::Failed);
	assert_eq!(stored.total_steps, 2);
	assert!(stored.duration_ms.is_some());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
