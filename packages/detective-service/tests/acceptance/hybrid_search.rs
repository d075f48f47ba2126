use std::sync::Arc;

use detective_service::MatchType;

use super::{PhraseEmbedding, ScriptedChat};

fn defective_embedding() -> Arc<PhraseEmbedding> {
	Arc::new(PhraseEmbedding::new(&[("defective product", [1.0, 0.0, 0.0])]))
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn singleton_rankings_fuse_to_equal_scores() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping singleton_rankings_fuse_to_equal_scores; set DETECTIVE_PG_DSN to run.");

		return;
	};
	let service =
		super::build_service(&test_db, defective_embedding(), Arc::new(ScriptedChat::new(vec![])))
			.await;
	let keyword_item = detective_testkit::insert_feedback(
		&service.db.pool,
		1,
		"Lamp was broken on arrival.",
		Some("Lamp"),
		"negative",
		None,
	)
	.await
	.expect("Failed to insert feedback.");
	let semantic_item = detective_testkit::insert_feedback(
		&service.db.pool,
		2,
		"The colour matches my sofa.",
		Some("Cushion"),
		"positive",
		Some(&[0.9, 0.1, 0.0]),
	)
	.await
	.expect("Failed to insert feedback.");
	let results = service
		.hybrid_search("defective product", "broken", 10)
		.await
		.expect("Hybrid search failed.");

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].id, keyword_item);
	assert_eq!(results[0].match_type, MatchType::FulltextOnly);
	assert!(results[0].similarity.is_none());
	assert!(results[0].fulltext_rank.is_some());
	assert_eq!(results[1].id, semantic_item);
	assert_eq!(results[1].match_type, MatchType::SemanticOnly);
	assert!(results[1].fulltext_rank.is_none());

	for result in &results {
		assert_eq!(result.relevance_score, Some(0.0164));
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn items_on_both_sides_outrank_single_side_items() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping items_on_both_sides_outrank_single_side_items; set DETECTIVE_PG_DSN to run."
		);

		return;
	};
	let service =
		super::build_service(&test_db, defective_embedding(), Arc::new(ScriptedChat::new(vec![])))
			.await;
	let far_but_matching = detective_testkit::insert_feedback(
		&service.db.pool,
		1,
		"Lamp was broken on arrival.",
		Some("Lamp"),
		"negative",
		Some(&[-1.0, 0.0, 0.0]),
	)
	.await
	.expect("Failed to insert feedback.");
	let close = detective_testkit::insert_feedback(
		&service.db.pool,
		2,
		"Stopped working after two days.",
		Some("Kettle"),
		"negative",
		Some(&[1.0, 0.0, 0.0]),
	)
	.await
	.expect("Failed to insert feedback.");
	let results = service
		.hybrid_search("defective product", "broken", 10)
		.await
		.expect("Hybrid search failed.");

	assert_eq!(results.iter().map(|result| result.id).collect::<Vec<_>>(), vec![
		far_but_matching,
		close
	]);
	assert_eq!(results[0].match_type, MatchType::Both);
	assert_eq!(results[0].similarity, Some(-1.0));
	assert_eq!(results[0].relevance_score, Some(0.0325));
	assert_eq!(results[1].match_type, MatchType::SemanticOnly);
	assert_eq!(results[1].similarity, Some(1.0));

	let again = service
		.hybrid_search("defective product", "broken", 10)
		.await
		.expect("Hybrid search failed.");

	assert_eq!(
		again.iter().map(|result| result.match_type).collect::<Vec<_>>(),
		results.iter().map(|result| result.match_type).collect::<Vec<_>>()
	);

	let limited = service
		.hybrid_search("defective product", "broken", 1)
		.await
		.expect("Hybrid search failed.");

	assert_eq!(limited.len(), 1);
	assert_eq!(limited[0].id, far_but_matching);

	let no_keyword_hits = service
		.hybrid_search("defective product", "warranty", 10)
		.await
		.expect("A keyword miss is not an error.");

	assert!(no_keyword_hits.iter().all(|result| result.match_type == MatchType::SemanticOnly));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DETECTIVE_PG_DSN to run."]
async fn fulltext_operators_select_matching_items() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping fulltext_operators_select_matching_items; set DETECTIVE_PG_DSN to run.");

		return;
	};
	let service =
		super::build_service(&test_db, defective_embedding(), Arc::new(ScriptedChat::new(vec![])))
			.await;
	let both = detective_testkit::insert_feedback(
		&service.db.pool,
		1,
		"Late delivery and a damaged box.",
		None,
		"negative",
		None,
	)
	.await
	.expect("Failed to insert feedback.");
	let late = detective_testkit::insert_feedback(
		&service.db.pool,
		2,
		"Delivery was late again.",
		None,
		"negative",
		None,
	)
	.await
	.expect("Failed to insert feedback.");
	let and_results = service.fulltext_search("late&damaged", 10).await.expect("AND failed.");

	assert_eq!(and_results.iter().map(|result| result.id).collect::<Vec<_>>(), vec![both]);
	assert!(and_results.iter().all(|result| result.match_type == MatchType::FulltextOnly));

	let mut or_ids = service
		.fulltext_search("late|damaged", 10)
		.await
		.expect("OR failed.")
		.into_iter()
		.map(|result| result.id)
		.collect::<Vec<_>>();

	or_ids.sort_unstable();

	assert_eq!(or_ids, vec![both, late]);

	let stopped = detective_testkit::insert_feedback(
		&service.db.pool,
		3,
		"Kettle stopped working after a week.",
		Some("Kettle"),
		"negative",
		None,
	)
	.await
	.expect("Failed to insert feedback.");
	let phrase_ids = service
		.fulltext_search("broken|stopped<->working", 10)
		.await
		.expect("Phrase operands joined with <-> are valid.")
		.into_iter()
		.map(|result| result.id)
		.collect::<Vec<_>>();

	assert_eq!(phrase_ids, vec![stopped]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
