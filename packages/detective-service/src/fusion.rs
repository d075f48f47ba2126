//! Reciprocal Rank Fusion of the semantic and lexical feedback rankings.
//!
//! Each input ranking is an ordered list; an item's rank is its 1-based position in that list.
//! The fused score of an item is the sum of `1 / (rank + RRF_K)` over the rankings it appears in,
//! so an item missing from one side contributes nothing for that side.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use detective_storage::models::{LexicalHit, SemanticHit};

/// Fixed damping constant.
pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	SemanticOnly,
	FulltextOnly,
	Both,
}
impl MatchType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::SemanticOnly => "semantic_only",
			Self::FulltextOnly => "fulltext_only",
			Self::Both => "both",
		}
	}

	fn from_presence(semantic: bool, lexical: bool) -> Option<Self> {
		match (semantic, lexical) {
			(true, true) => Some(Self::Both),
			(true, false) => Some(Self::SemanticOnly),
			(false, true) => Some(Self::FulltextOnly),
			(false, false) => None,
		}
	}
}

/// One fused item with unrounded scores.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
	pub id: i64,
	pub match_type: MatchType,
	pub semantic_rank: Option<usize>,
	pub fulltext_rank: Option<usize>,
	pub similarity: Option<f64>,
	pub lexical_score: Option<f64>,
	pub score: f64,
}

#[derive(Default)]
struct Sides {
	semantic: Option<(usize, f64)>,
	lexical: Option<(usize, f64)>,
}

pub fn rrf_term(rank: usize) -> f64 {
	1.0 / (rank as f64 + RRF_K)
}

/// Fuses both rankings over the union of their ids and keeps the best `limit` items.
///
/// Order is by fused score descending; equal scores are broken by ascending id so the output is
/// stable for an unchanged corpus. A repeated id within one ranking keeps its first position.
pub fn fuse(semantic: &[SemanticHit], lexical: &[LexicalHit], limit: usize) -> Vec<FusedHit> {
	let mut sides: HashMap<i64, Sides> = HashMap::new();

	for (idx, hit) in semantic.iter().enumerate() {
		let entry = sides.entry(hit.id).or_default();

		if entry.semantic.is_none() {
			entry.semantic = Some((idx + 1, hit.similarity));
		}
	}
	for (idx, hit) in lexical.iter().enumerate() {
		let entry = sides.entry(hit.id).or_default();

		if entry.lexical.is_none() {
			entry.lexical = Some((idx + 1, hit.rank));
		}
	}

	let mut fused = sides
		.into_iter()
		.filter_map(|(id, sides)| {
			let match_type =
				MatchType::from_presence(sides.semantic.is_some(), sides.lexical.is_some())?;
			let score = sides.semantic.map_or(0.0, |(rank, _)| rrf_term(rank))
				+ sides.lexical.map_or(0.0, |(rank, _)| rrf_term(rank));

			Some(FusedHit {
				id,
				match_type,
				semantic_rank: sides.semantic.map(|(rank, _)| rank),
				fulltext_rank: sides.lexical.map(|(rank, _)| rank),
				similarity: sides.semantic.map(|(_, similarity)| similarity),
				lexical_score: sides.lexical.map(|(_, score)| score),
				score,
			})
		})
		.collect::<Vec<_>>();

	fused.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
	fused.truncate(limit);

	fused
}

/// Presentation rounding; never used for ordering.
pub fn round_to(value: f64, places: i32) -> f64 {
	let factor = 10_f64.powi(places);

	(value * factor).round() / factor
}
