use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub agent: Agent,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub ledger: Ledger,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Fixed dimensionality of every stored and query vector.
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Agent {
	pub name: String,
	pub max_tool_rounds: u32,
	#[serde(default = "default_query_row_limit")]
	pub query_row_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub semantic_limit: u32,
	pub fulltext_limit: u32,
	pub hybrid_limit: u32,
	pub insight_limit: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { semantic_limit: 10, fulltext_limit: 10, hybrid_limit: 15, insight_limit: 5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
	/// Trailing window used by fleet-level performance analysis.
	pub performance_window_hours: u32,
	pub recent_limit: u32,
}
impl Default for Ledger {
	fn default() -> Self {
		Self { performance_window_hours: 24, recent_limit: 5 }
	}
}

fn default_query_row_limit() -> u32 {
	200
}
