use serde::{Deserialize, Serialize};

pub use super::column::Column;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct Table {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
}

impl Table {
    #[must_use]
    pub const fn new(
        name: String,
        columns: Vec<Column>,
    ) -> Self {
        Self { name, columns }
    }

    pub fn add_column(
        &mut self,
        column: Column,
    ) {
        self.columns.push(column);
    }
}

impl std::fmt::Display for Table {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "Table: {}", self.name)?;
        for column in &self.columns {
            writeln!(f, "{column}")?;
        }
        Ok(())
    }
}
