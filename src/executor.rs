//! Executes SQL text and shapes rows for display.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::types::BigDecimal;
use sqlx::{Column, Connection, Executor, PgConnection, Row, Statement, TypeInfo};

use crate::db::{PgConnectionProvider, with_timeout};
use crate::error::ChatbotError;
use crate::schema::ColumnKind;

static ROW_SOURCE: OnceLock<Regex> = OnceLock::new();

// Statements that may be wrapped as a subquery.
fn row_source_pattern() -> &'static Regex {
    ROW_SOURCE.get_or_init(|| Regex::new(r"(?i)^\s*(SELECT|WITH|VALUES|TABLE)\b").unwrap())
}

/// Column names plus row tuples of one statement. Lives for one request only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct QueryResult {
    pub columns: Vec<String>,
    #[cfg_attr(feature = "server", schema(value_type = Vec<Vec<Object>>))]
    pub rows: Vec<Vec<JsonValue>>,
}

impl QueryResult {
    #[must_use]
    pub const fn new(
        columns: Vec<String>,
        rows: Vec<Vec<JsonValue>>,
    ) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs `sql` as given, in a single statement.
    async fn execute(
        &self,
        sql: &str,
    ) -> Result<QueryResult, ChatbotError>;
}

pub struct PgQueryExecutor {
    provider: Arc<PgConnectionProvider>,
    read_only: bool,
}

impl PgQueryExecutor {
    /// With `read_only` set, every statement runs inside a `READ ONLY`
    /// transaction that is rolled back afterwards.
    #[must_use]
    pub const fn new(
        provider: Arc<PgConnectionProvider>,
        read_only: bool,
    ) -> Self {
        Self { provider, read_only }
    }

    async fn run_read_only(
        conn: &mut PgConnection,
        plan: &QueryPlan,
    ) -> Result<QueryResult, ChatbotError> {
        let mut tx = conn.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        let result = fetch(&mut tx, plan).await;
        tx.rollback().await?;
        result
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(
        &self,
        sql: &str,
    ) -> Result<QueryResult, ChatbotError> {
        // Released back to the pool on every exit path when `conn` drops.
        let mut conn = self.provider.acquire().await?;

        tracing::info!("Executing SQL: {}", sql);
        let result = with_timeout(self.provider.timeout(), async {
            // Preparing runs nothing, so it happens outside any transaction.
            let plan = QueryPlan::prepare(&mut conn, sql).await?;
            if self.read_only {
                Self::run_read_only(&mut conn, &plan).await
            } else {
                fetch(&mut conn, &plan).await
            }
        })
        .await;

        match &result {
            Ok(r) => tracing::info!("Query returned {} rows", r.rows.len()),
            Err(e) => tracing::error!("Error executing query: {}", e),
        }
        result
    }
}

/// The statement actually sent, plus the column names to report.
///
/// Column names come from the prepared description, so an empty result still
/// carries them.
#[derive(Debug)]
struct QueryPlan {
    columns: Vec<String>,
    sql: String,
}

impl QueryPlan {
    async fn prepare(
        conn: &mut PgConnection,
        sql: &str,
    ) -> Result<Self, ChatbotError> {
        let (columns, kinds): (Vec<String>, Vec<ColumnKind>) = {
            let statement = (&mut *conn).prepare(sql).await?;
            statement
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), ColumnKind::from_type_name(c.type_info().name())))
                .unzip()
        };

        let Some(projected) = text_projection(sql, &kinds) else {
            return Ok(Self {
                columns,
                sql: sql.to_string(),
            });
        };

        match (&mut *conn).prepare(&projected).await {
            Ok(_) => Ok(Self { columns, sql: projected }),
            Err(e) => {
                tracing::debug!("Text projection rejected, running statement as is: {}", e);
                Ok(Self {
                    columns,
                    sql: sql.to_string(),
                })
            }
        }
    }
}

/// Wraps a row-returning statement so every column without a native decoder
/// comes back as its Postgres text form. Columns are renamed positionally
/// inside the wrapper, which keeps duplicate names apart.
///
/// Returns `None` when every column decodes natively or the statement cannot
/// be used as a subquery.
fn text_projection(
    sql: &str,
    kinds: &[ColumnKind],
) -> Option<String> {
    if !kinds.contains(&ColumnKind::Other) {
        return None;
    }

    let body = sql.trim().trim_end_matches(';').trim_end();
    if !row_source_pattern().is_match(body) {
        return None;
    }

    let aliases: Vec<String> = (1..=kinds.len()).map(|i| format!("col_{i}")).collect();
    let projection: Vec<String> = aliases
        .iter()
        .zip(kinds)
        .map(|(alias, kind)| {
            if *kind == ColumnKind::Other {
                format!("{alias}::text")
            } else {
                alias.clone()
            }
        })
        .collect();

    // The body sits on its own lines so a trailing line comment cannot swallow
    // the closing parenthesis.
    Some(format!(
        "SELECT {} FROM (\n{body}\n) AS q({})",
        projection.join(", "),
        aliases.join(", ")
    ))
}

async fn fetch(
    conn: &mut PgConnection,
    plan: &QueryPlan,
) -> Result<QueryResult, ChatbotError> {
    let rows = sqlx::query(&plan.sql).fetch_all(&mut *conn).await?;
    let rows = rows.iter().map(decode_row).collect();

    Ok(QueryResult::new(plan.columns.clone(), rows))
}

fn decode_row(row: &PgRow) -> Vec<JsonValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| decode_value(row, i, ColumnKind::from_type_name(col.type_info().name())))
        .collect()
}

/// Exact decimals become JSON numbers when they fit, otherwise their text.
fn numeric_json(value: &BigDecimal) -> JsonValue {
    let text = value.to_string();
    text.parse::<serde_json::Number>()
        .map_or(JsonValue::String(text), JsonValue::Number)
}

fn decode_value(
    row: &PgRow,
    index: usize,
    kind: ColumnKind,
) -> JsonValue {
    fn get<'r, T>(
        row: &'r PgRow,
        index: usize,
    ) -> Option<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(index).ok().flatten()
    }

    let value = match kind {
        ColumnKind::Text | ColumnKind::Other => get::<String>(row, index).map(JsonValue::String),
        ColumnKind::SmallInt => get::<i16>(row, index).map(JsonValue::from),
        ColumnKind::Integer => get::<i32>(row, index).map(JsonValue::from),
        ColumnKind::BigInt => get::<i64>(row, index).map(JsonValue::from),
        ColumnKind::Real => get::<f32>(row, index).map(|v| JsonValue::from(f64::from(v))),
        ColumnKind::Double => get::<f64>(row, index).map(JsonValue::from),
        ColumnKind::Numeric => get::<BigDecimal>(row, index).map(|v| numeric_json(&v)),
        ColumnKind::Boolean => get::<bool>(row, index).map(JsonValue::Bool),
        ColumnKind::Timestamp => get::<chrono::NaiveDateTime>(row, index).map(|v| JsonValue::String(v.to_string())),
        ColumnKind::TimestampTz => {
            get::<chrono::DateTime<chrono::Utc>>(row, index).map(|v| JsonValue::String(v.to_rfc3339()))
        }
        ColumnKind::Date => get::<chrono::NaiveDate>(row, index).map(|v| JsonValue::String(v.to_string())),
        ColumnKind::Time => get::<chrono::NaiveTime>(row, index).map(|v| JsonValue::String(v.to_string())),
        ColumnKind::Json => get::<JsonValue>(row, index),
        ColumnKind::Uuid => get::<sqlx::types::Uuid>(row, index).map(|v| JsonValue::String(v.to_string())),
    };

    value.unwrap_or(JsonValue::Null)
}
