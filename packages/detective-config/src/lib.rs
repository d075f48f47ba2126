mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, EmbeddingProviderConfig, Ledger, LlmProviderConfig, Postgres, Providers, Search,
	Service, Storage,
};

use std::{env, fs, path::Path};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	apply_env_overrides(&mut cfg, |key| env::var(key).ok());

	validate(&cfg)?;

	Ok(cfg)
}

/// `DATABASE_URL` always wins over the configured DSN; `OPENAI_API_KEY` only fills provider keys
/// that were left empty.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(dsn) = lookup(ENV_DATABASE_URL).filter(|value| !value.trim().is_empty()) {
		cfg.storage.postgres.dsn = dsn;
	}

	if let Some(key) = lookup(ENV_OPENAI_API_KEY).filter(|value| !value.trim().is_empty()) {
		if cfg.providers.embedding.api_key.trim().is_empty() {
			cfg.providers.embedding.api_key = key.clone();
		}
		if cfg.providers.llm.api_key.trim().is_empty() {
			cfg.providers.llm.api_key = key;
		}
	}
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("llm", &cfg.providers.llm.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}
	if cfg.agent.name.trim().is_empty() {
		return Err(Error::Validation { message: "agent.name must be non-empty.".to_string() });
	}
	if cfg.agent.max_tool_rounds == 0 {
		return Err(Error::Validation {
			message: "agent.max_tool_rounds must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.query_row_limit == 0 {
		return Err(Error::Validation {
			message: "agent.query_row_limit must be greater than zero.".to_string(),
		});
	}

	for (label, limit) in [
		("search.semantic_limit", cfg.search.semantic_limit),
		("search.fulltext_limit", cfg.search.fulltext_limit),
		("search.hybrid_limit", cfg.search.hybrid_limit),
		("search.insight_limit", cfg.search.insight_limit),
		("ledger.recent_limit", cfg.ledger.recent_limit),
	] {
		if limit == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.ledger.performance_window_hours == 0 {
		return Err(Error::Validation {
			message: "ledger.performance_window_hours must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.agent.name = cfg.agent.name.trim().to_string();
	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
	cfg.providers.llm.api_base = cfg.providers.llm.api_base.trim_end_matches('/').to_string();
}
