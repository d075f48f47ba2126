use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use detective_service::{Error, EventType, InvestigationStatus};

use super::{PhraseEmbedding, ScriptedChat};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn failed_investigation_reports_actions_and_errors() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping failed_investigation_reports_actions_and_errors; set DETECTIVE_PG_DSN to run."
		);

		return;
	};
	let service = super::build_service(
		&test_db,
		Arc::new(PhraseEmbedding::new(&[])),
		Arc::new(ScriptedChat::new(vec![])),
	)
	.await;
	let question_id = service
		.create_investigation("detective", "Why did sales drop last week?")
		.await
		.expect("Failed to create investigation.");
	let created = service.investigation(question_id).await.expect("Investigation missing.");

	assert_eq!(created.status, InvestigationStatus::InProgress);
	assert_eq!(created.total_steps, 0);
	assert!(created.completed_at.is_none());

	for (step, tool) in [(1, "query_database"), (2, "hybrid_search"), (3, "query_database")] {
		service
			.append_event(
				question_id,
				"detective",
				step,
				EventType::Action,
				&json!({ "tool": tool, "reasoning": "probe" }),
			)
			.await
			.expect("Failed to append action.");
	}

	service
		.append_event(
			question_id,
			"detective",
			4,
			EventType::Error,
			&json!({ "tool": "fulltext_search", "error": "syntax error in tsquery" }),
		)
		.await
		.expect("Failed to append error.");
	service
		.complete_investigation(
			question_id,
			"Agent failed: model unavailable",
			4,
			1_250,
			InvestigationStatus::Failed,
		)
		.await
		.expect("Failed to complete investigation.");

	let analysis = service.analyze_performance(question_id).await.expect("Analysis failed.");

	assert_eq!(analysis.status, InvestigationStatus::Failed);
	assert_eq!(analysis.total_steps, 4);
	assert_eq!(analysis.duration_ms, Some(1_250));
	assert_eq!(analysis.total_events, 4);
	assert_eq!(analysis.actions_executed, 3);
	assert_eq!(analysis.reasoning_steps, 0);
	assert_eq!(analysis.errors, 1);
	assert_eq!(analysis.tools_used, vec!["fulltext_search", "hybrid_search", "query_database"]);
	assert_eq!(analysis.tool_usage[0].tool_name, "query_database");
	assert_eq!(analysis.usage_of("query_database"), 2);
	assert_eq!(analysis.total_tool_calls(), 4);

	let events = service.investigation_events(question_id).await.expect("Events missing.");

	assert_eq!(events.iter().map(|event| event.step_order).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
	assert_eq!(events[3].event_type, EventType::Error);

	let again = service
		.complete_investigation(question_id, "late answer", 5, 10, InvestigationStatus::Completed)
		.await
		.expect_err("A second terminal update must be rejected.");

	assert!(matches!(again, Error::Conflict { .. }), "Unexpected error: {again}");

	let stored = service.investigation(question_id).await.expect("Investigation missing.");

	assert_eq!(stored.status, InvestigationStatus::Failed);
	assert_eq!(stored.final_answer.as_deref(), Some("Agent failed: model unavailable"));
	assert!(stored.completed_at.is_some());

	let missing = service
		.complete_investigation(Uuid::new_v4(), "answer", 1, 1, InvestigationStatus::Completed)
		.await
		.expect_err("Unknown investigations cannot be completed.");

	assert!(matches!(missing, Error::NotFound { .. }), "Unexpected error: {missing}");
	assert!(matches!(
		service.analyze_performance(Uuid::new_v4()).await,
		Err(Error::NotFound { .. })
	));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn window_and_keyword_lookups_cover_recent_investigations() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping window_and_keyword_lookups_cover_recent_investigations; set DETECTIVE_PG_DSN to run."
		);

		return;
	};
	let service = super::build_service(
		&test_db,
		Arc::new(PhraseEmbedding::new(&[])),
		Arc::new(ScriptedChat::new(vec![])),
	)
	.await;
	let completed = service
		.create_investigation("detective", "Why did SALES drop in March?")
		.await
		.expect("Failed to create investigation.");
	let failed = service
		.create_investigation("detective", "Why did sales drop in April?")
		.await
		.expect("Failed to create investigation.");
	let open = service
		.create_investigation("detective", "Which product has 100% returns?")
		.await
		.expect("Failed to create investigation.");

	service
		.complete_investigation(completed, "Stock ran out.", 2, 100, InvestigationStatus::Completed)
		.await
		.expect("Failed to complete investigation.");
	service
		.complete_investigation(failed, "Agent failed: timeout", 4, 300, InvestigationStatus::Failed)
		.await
		.expect("Failed to complete investigation.");
	service
		.append_event(failed, "detective", 1, EventType::Error, &json!({ "error": "timeout" }))
		.await
		.expect("Failed to append error.");

	let window = service.analyze_window(24).await.expect("Window analysis failed.");

	assert_eq!(window.window_hours, 24);
	assert_eq!(window.total_questions, 3);
	assert_eq!(window.completed, 1);
	assert_eq!(window.failed, 1);
	assert_eq!(window.in_progress, 1);
	assert_eq!(window.total_errors, 1);
	assert_eq!(window.avg_duration_ms, Some(200));
	assert_eq!(window.avg_steps, Some(2));

	let matches = service
		.find_recent_by_keyword("detective", "sales drop", 10)
		.await
		.expect("Keyword lookup failed.");

	assert_eq!(matches.iter().map(|found| found.id).collect::<Vec<_>>(), vec![completed]);

	let literal = service
		.find_recent_by_keyword("detective", "100%", 10)
		.await
		.expect("Keyword lookup failed.");

	assert!(literal.is_empty(), "In-progress investigations are not returned: {open}");
	assert!(
		service
			.find_recent_by_keyword("someone-else", "sales", 10)
			.await
			.expect("Keyword lookup failed.")
			.is_empty()
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
