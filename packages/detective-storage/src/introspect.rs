use std::{collections::BTreeMap, fmt::Write as _};

use serde::Serialize;

use crate::{Result, db::Db};

/// Used when the live catalog cannot be read.
pub const FALLBACK_SCHEMA: &str = "\
Database Schema (fallback):

Table: orders
Columns:
  - order_date (date) NOT NULL
  - product_id (integer) NOT NULL
  - product_name (text) NOT NULL
  - amount (numeric) NOT NULL
  - customer_id (integer) NOT NULL

Table: products
Columns:
  - id (integer) NOT NULL
  - name (text) NOT NULL
  - stock_level (integer)
  - price (numeric)

Table: user_feedback
Columns:
  - id (integer) NOT NULL
  - customer_id (integer) NOT NULL
  - feedback_text (text) NOT NULL
  - product_referenced (text)
  - sentiment (text) NOT NULL
  - created_at (timestamp with time zone) NOT NULL
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
	pub name: String,
	pub comment: Option<String>,
	pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
	pub name: String,
	pub data_type: String,
	pub nullable: bool,
}

#[derive(sqlx::FromRow)]
struct TableRow {
	table_name: String,
	table_comment: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ColumnRow {
	table_name: String,
	column_name: String,
	data_type: String,
	is_nullable: String,
}

/// Base tables of the `public` schema with their columns in ordinal order. Extension types such
/// as `vector` are left out.
pub async fn describe_schema(db: &Db) -> Result<Vec<TableSchema>> {
	let tables = sqlx::query_as::<_, TableRow>(
		"\
SELECT
	table_name::text AS table_name,
	obj_description(format('%I.%I', table_schema, table_name)::regclass, 'pg_class') AS table_comment
FROM information_schema.tables
WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
ORDER BY table_name",
	)
	.fetch_all(&db.pool)
	.await?;
	let columns = sqlx::query_as::<_, ColumnRow>(
		"\
SELECT
	table_name::text AS table_name,
	column_name::text AS column_name,
	data_type::text AS data_type,
	is_nullable::text AS is_nullable
FROM information_schema.columns
WHERE table_schema = 'public' AND data_type <> 'USER-DEFINED'
ORDER BY table_name, ordinal_position",
	)
	.fetch_all(&db.pool)
	.await?;
	let mut by_table: BTreeMap<String, Vec<ColumnSchema>> = BTreeMap::new();

	for column in columns {
		by_table.entry(column.table_name).or_default().push(ColumnSchema {
			name: column.column_name,
			data_type: column.data_type,
			nullable: column.is_nullable != "NO",
		});
	}

	Ok(tables
		.into_iter()
		.map(|table| TableSchema {
			columns: by_table.remove(&table.table_name).unwrap_or_default(),
			name: table.table_name,
			comment: table.table_comment.filter(|comment| !comment.trim().is_empty()),
		})
		.collect())
}

pub fn render_schema_description(tables: &[TableSchema]) -> String {
	let mut out = String::from("Database Schema:\n\n");

	for table in tables {
		let _ = writeln!(out, "Table: {}", table.name);

		if let Some(comment) = &table.comment {
			let _ = writeln!(out, "Description: {comment}");
		}

		out.push_str("Columns:\n");

		for column in &table.columns {
			let not_null = if column.nullable { "" } else { " NOT NULL" };
			let _ = writeln!(out, "  - {} ({}){not_null}", column.name, column.data_type);
		}

		out.push('\n');
	}

	out
}
