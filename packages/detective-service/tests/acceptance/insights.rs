use std::sync::Arc;

use serde_json::json;
use time::{Duration, OffsetDateTime};

use super::{PhraseEmbedding, ScriptedChat};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn insights_are_recalled_per_agent_by_relevance() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping insights_are_recalled_per_agent_by_relevance; set DETECTIVE_PG_DSN to run.");

		return;
	};
	let embedding = PhraseEmbedding::new(&[
		("Sales dropped because the lamp was out of stock.", [1.0, 0.0, 0.0]),
		("Shipping delays spike on Mondays.", [0.0, 1.0, 0.0]),
		("Other agents also saw sales drop.", [1.0, 0.0, 0.0]),
		("why did sales drop", [0.9, 0.1, 0.0]),
	]);
	let service = super::build_service(
		&test_db,
		Arc::new(embedding),
		Arc::new(ScriptedChat::new(vec![])),
	)
	.await;

	service
		.store_insight(
			"detective",
			"Sales dropped because the lamp was out of stock.",
			&json!({ "source": "orders" }),
		)
		.await
		.expect("Failed to store insight.");
	service
		.store_insight("detective", "Shipping delays spike on Mondays.", &json!({}))
		.await
		.expect("Failed to store insight.");
	service
		.store_insight("auditor", "Other agents also saw sales drop.", &json!({}))
		.await
		.expect("Failed to store insight.");

	let insights = service
		.search_insights("detective", "why did sales drop", 5)
		.await
		.expect("Insight search failed.");

	assert_eq!(
		insights.iter().map(|insight| insight.content.as_str()).collect::<Vec<_>>(),
		vec!["Sales dropped because the lamp was out of stock.", "Shipping delays spike on Mondays."]
	);
	assert!(insights[0].relevance > insights[1].relevance);
	assert_eq!(insights[0].metadata["source"], "orders");

	let limited = service
		.search_insights("detective", "why did sales drop", 1)
		.await
		.expect("Insight search failed.");

	assert_eq!(limited.len(), 1);
	assert!(
		service
			.search_insights("nobody", "why did sales drop", 5)
			.await
			.expect("Insight search failed.")
			.is_empty()
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn equally_relevant_insights_prefer_the_newest() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping equally_relevant_insights_prefer_the_newest; set DETECTIVE_PG_DSN to run.");

		return;
	};
	let embedding = PhraseEmbedding::new(&[
		("Refunds spiked after the price change.", [1.0, 0.0, 0.0]),
		("refund trends", [1.0, 0.0, 0.0]),
	]);
	let service = super::build_service(
		&test_db,
		Arc::new(embedding),
		Arc::new(ScriptedChat::new(vec![])),
	)
	.await;

	detective_storage::insights::insert(
		&service.db,
		"detective",
		"Refunds spiked in the spring sale.",
		"[1,0,0]",
		&json!({ "source": "older" }),
		OffsetDateTime::now_utc() - Duration::days(3),
	)
	.await
	.expect("Failed to insert older insight.");
	service
		.store_insight(
			"detective",
			"Refunds spiked after the price change.",
			&json!({ "source": "newer" }),
		)
		.await
		.expect("Failed to store insight.");

	let insights = service
		.search_insights("detective", "refund trends", 5)
		.await
		.expect("Insight search failed.");

	assert_eq!(insights.len(), 2);
	assert_eq!(insights[0].relevance, insights[1].relevance);
	assert_eq!(insights[0].metadata["source"], "newer");
	assert_eq!(insights[1].metadata["source"], "older");
	assert!(insights[0].created_at > insights[1].created_at);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
