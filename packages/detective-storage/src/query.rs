use serde_json::Value;

use crate::{Error, Result, db::Db};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutcome {
	/// `rows` holds at most the requested row limit; `row_count` counts every row produced.
	Rows { rows: Vec<Value>, row_count: usize },
	Affected { rows_affected: u64 },
}

/// Runs one statement written by the agent. Row-returning statements come back as JSON objects
/// keyed by column name.
pub async fn run_sql(db: &Db, sql: &str, row_limit: usize) -> Result<SqlOutcome> {
	let statement = trim_statement(sql);

	if statement.is_empty() {
		return Err(Error::InvalidArgument("SQL statement must be non-empty.".to_string()));
	}

	if !returns_rows(statement) {
		let result = sqlx::query(statement).execute(&db.pool).await?;

		return Ok(SqlOutcome::Affected { rows_affected: result.rows_affected() });
	}

	let wrapped = format!("SELECT coalesce(json_agg(t), '[]'::json) FROM (\n{statement}\n) AS t");
	let value: Value = sqlx::query_scalar(&wrapped).fetch_one(&db.pool).await?;
	let mut rows = match value {
		Value::Array(rows) => rows,
		Value::Null => Vec::new(),
		other => vec![other],
	};
	let row_count = rows.len();

	rows.truncate(row_limit);

	Ok(SqlOutcome::Rows { rows, row_count })
}

fn trim_statement(sql: &str) -> &str {
	sql.trim().trim_end_matches(';').trim_end()
}

fn returns_rows(statement: &str) -> bool {
	let keyword = statement
		.trim_start_matches('(')
		.split(|ch: char| ch.is_whitespace() || ch == '(')
		.find(|word| !word.is_empty())
		.unwrap_or_default();

	["select", "with", "values", "table"].iter().any(|kw| keyword.eq_ignore_ascii_case(kw))
}
