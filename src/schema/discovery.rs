use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{PgConnectionProvider, with_timeout};
use crate::error::ChatbotError;
use crate::schema::{column::Column, table::Table};

const CATALOG_QUERY: &str = r"
    SELECT table_name::text, column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
";

/// Tables and their columns, in catalog order.
///
/// `Display` renders the text block that is embedded in the generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl std::fmt::Display for Schema {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "Database Schema:")?;
        for table in &self.tables {
            writeln!(f)?;
            write!(f, "{table}")?;
        }
        Ok(())
    }
}

impl Schema {
    pub fn add_table(
        &mut self,
        table: Table,
    ) {
        self.tables.push(table);
    }

    /// Groups `(table, column, type)` triples under their table.
    ///
    /// Input is expected sorted by table; a table name that reappears after
    /// another table starts a new group, as the catalog order dictates.
    #[must_use]
    pub fn from_catalog_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut schema = Self::default();

        for (table_name, column_name, data_type) in rows {
            let column = Column::new(column_name, data_type);
            match schema.tables.last_mut() {
                Some(current) if current.name == table_name => current.add_column(column),
                _ => schema.add_table(Table::new(table_name, vec![column])),
            }
        }

        schema
    }
}

#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Reads the live catalog. Never cached; every call hits the database.
    async fn describe_schema(&self) -> Result<Schema, ChatbotError>;
}

pub struct PgSchemaIntrospector {
    provider: Arc<PgConnectionProvider>,
}

impl PgSchemaIntrospector {
    #[must_use]
    pub const fn new(provider: Arc<PgConnectionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SchemaIntrospector for PgSchemaIntrospector {
    async fn describe_schema(&self) -> Result<Schema, ChatbotError> {
        let mut conn = self.provider.acquire().await?;

        let rows = with_timeout(self.provider.timeout(), async {
            sqlx::query_as::<_, (String, String, String)>(CATALOG_QUERY)
                .fetch_all(&mut *conn)
                .await
                .map_err(ChatbotError::from)
        })
        .await?;

        let schema = Schema::from_catalog_rows(rows);
        tracing::info!("Discovered schema with {} tables", schema.tables.len());
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_database;

    fn row(
        table: &str,
        column: &str,
        data_type: &str,
    ) -> (String, String, String) {
        (table.to_string(), column.to_string(), data_type.to_string())
    }

    fn store_schema() -> Schema {
        Schema::from_catalog_rows(vec![
            row("products", "name", "text"),
            row("products", "vegan", "boolean"),
            row("products", "gluten_free", "boolean"),
            row("products", "quantity", "integer"),
            row("requests", "request_id", "integer"),
            row("requests", "item_name", "character varying"),
            row("requests", "request_date", "timestamp with time zone"),
        ])
    }

    #[test]
    fn test_groups_columns_under_tables_in_order() {
        let schema = store_schema();

        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[0].name, "products");
        assert_eq!(schema.tables[1].name, "requests");

        let names: Vec<&str> = schema.tables[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "vegan", "gluten_free", "quantity"]);
        assert_eq!(schema.tables[1].columns.len(), 3);
    }

    #[test]
    fn test_render_matches_prompt_format() {
        let schema = Schema::from_catalog_rows(vec![
            row("products", "name", "text"),
            row("products", "quantity", "integer"),
            row("requests", "item_name", "text"),
        ]);

        let expected = "Database Schema:\n\
                        \n\
                        Table: products\n\
                        - name (text)\n\
                        - quantity (integer)\n\
                        \n\
                        Table: requests\n\
                        - item_name (text)\n";
        assert_eq!(schema.to_string(), expected);
    }

    #[test]
    fn test_empty_catalog() {
        let schema = Schema::from_catalog_rows(Vec::new());
        assert!(schema.tables.is_empty());
        assert_eq!(schema.to_string(), "Database Schema:\n");
    }

    #[test]
    fn test_schema_serializes_column_type_field() {
        let json = serde_json::to_value(store_schema()).unwrap();
        assert_eq!(json["tables"][0]["columns"][1]["type"], "boolean");
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_discovers_public_table_columns() {
        let Some(provider) = test_database() else { return };
        let table = format!("chatbot_itest_{}", std::process::id());
        {
            let mut conn = provider.acquire().await.unwrap();
            sqlx::query(&format!(
                "CREATE TABLE {table} (name text, quantity integer, price numeric(8,2), added timestamptz)"
            ))
            .execute(&mut *conn)
            .await
            .unwrap();
        }

        let discovered = PgSchemaIntrospector::new(Arc::clone(&provider)).describe_schema().await;

        {
            let mut conn = provider.acquire().await.unwrap();
            sqlx::query(&format!("DROP TABLE {table}")).execute(&mut *conn).await.unwrap();
        }

        let schema = discovered.unwrap();
        let found = schema.tables.iter().find(|t| t.name == table).unwrap();
        let columns: Vec<(&str, &str)> =
            found.columns.iter().map(|c| (c.name.as_str(), c.data_type.as_str())).collect();
        assert_eq!(
            columns,
            vec![
                ("name", "text"),
                ("quantity", "integer"),
                ("price", "numeric"),
                ("added", "timestamp with time zone"),
            ]
        );
        assert!(schema.to_string().contains(&format!("Table: {table}\n- name (text)")));
    }
}
