use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::Result;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &detective_config::Postgres) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.acquire_timeout(ACQUIRE_TIMEOUT)
			.connect(&cfg.dsn)
			.await?;

		Ok(Self { pool })
	}

	/// Builds the pool without opening a connection; failures surface on first use.
	pub fn connect_lazy(cfg: &detective_config::Postgres, acquire_timeout: Duration) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.acquire_timeout(acquire_timeout)
			.connect_lazy(&cfg.dsn)?;

		Ok(Self { pool })
	}

	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;

		Ok(())
	}
}
