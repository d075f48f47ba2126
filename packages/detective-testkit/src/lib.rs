mod error;

pub use error::{Error, Result};

use std::{env, future::Future, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor, PgPool,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const ENV_PG_DSN: &str = "DETECTIVE_PG_DSN";

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];
const FIXTURE_SCHEMA_TEMPLATE: &str = include_str!("fixture_schema.sql");

pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options: PgConnectOptions = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse {ENV_PG_DSN}: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("detective_test_{}", Uuid::new_v4().simple());
		let create_sql = format!(r#"CREATE DATABASE "{}""#, name);

		admin_conn
			.execute(create_sql.as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.clone().database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, cleaned: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Creates the feedback, ledger and memory tables with `vector_dim`-wide embeddings.
	pub async fn apply_fixture_schema(&self, vector_dim: u32) -> Result<()> {
		let mut conn = PgConnection::connect(&self.dsn).await?;

		sqlx::raw_sql(&fixture_schema_sql(vector_dim)).execute(&mut conn).await.map_err(
			|err| Error::Message(format!("Failed to apply fixture schema: {err}.")),
		)?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner().await
	}

	async fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		cleanup_database(&self.name, &self.admin_options).await?;

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(cleanup_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(ENV_PG_DSN).ok().filter(|dsn| !dsn.trim().is_empty())
}

pub fn fixture_schema_sql(vector_dim: u32) -> String {
	FIXTURE_SCHEMA_TEMPLATE.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

/// Runs `f` against a fresh database carrying the fixture schema, then drops the database.
pub async fn with_test_db<F, Fut, T>(base_dsn: &str, vector_dim: u32, f: F) -> Result<T>
where
	F: FnOnce(&TestDatabase) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let db = TestDatabase::new(base_dsn).await?;

	db.apply_fixture_schema(vector_dim).await?;

	let result = f(&db).await;
	let mut db = db;

	if let Err(err) = db.cleanup_inner().await {
		eprintln!("Test database cleanup warning: {err}.");

		if result.is_ok() {
			return Err(err);
		}
	}

	result
}

/// Inserts one feedback row and returns its id. `embedding = None` leaves the vector unset.
pub async fn insert_feedback(
	pool: &PgPool,
	customer_id: i32,
	text: &str,
	product: Option<&str>,
	sentiment: &str,
	embedding: Option<&[f32]>,
) -> Result<i64> {
	let vec_text = embedding.map(|values| {
		let parts = values.iter().map(f32::to_string).collect::<Vec<_>>();

		format!("[{}]", parts.join(","))
	});
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO user_feedback (customer_id, feedback_text, product_referenced, sentiment, embedding)
VALUES ($1, $2, $3, $4, $5::text::vector)
RETURNING id::bigint",
	)
	.bind(customer_id)
	.bind(text)
	.bind(product)
	.bind(sentiment)
	.bind(vec_text)
	.fetch_one(pool)
	.await?;

	Ok(id)
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => {
				last_err = Some(err);
			},
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn cleanup_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await.map_err(|err| {
		Error::Message(format!("Failed to connect to admin database for cleanup: {err}."))
	})?;
	let drop_sql = format!(r#"DROP DATABASE IF EXISTS "{}""#, name);
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	sqlx::query(drop_sql.as_str())
		.execute(&mut conn)
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}
