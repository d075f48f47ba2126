pub mod agent;
pub mod fusion;
pub mod ledger;
pub mod retrieval;
pub mod time_serde;
pub mod tools;

mod error;

pub use agent::{COMPLETION_MARKER, InvestigationReport};
pub use error::{Error, Result};
pub use fusion::MatchType;
pub use ledger::{
	EventType, Investigation, InvestigationEvent, InvestigationStatus, PerformanceAnalysis,
	ToolUsage, WindowPerformance,
};
pub use retrieval::{Insight, SearchResult, Sentiment};
pub use tools::{InvestigationSession, ToolCall};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use detective_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use detective_providers::{
	chat::{self, ChatTurn},
	embedding,
};
use detective_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, detective_providers::Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		tools: &'a [Value],
	) -> BoxFuture<'a, detective_providers::Result<ChatTurn>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(HttpProviders);

		Self { embedding: provider.clone(), chat: provider }
	}
}

pub struct DetectiveService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl DetectiveService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}
}

struct HttpProviders;
impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, detective_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl ChatProvider for HttpProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		tools: &'a [Value],
	) -> BoxFuture<'a, detective_providers::Result<ChatTurn>> {
		Box::pin(chat::complete(cfg, messages, tools))
	}
}

/// Keeps at most `max_chars` characters, cutting on a character boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => text[..idx].to_string(),
		None => text.to_string(),
	}
}
