use serde::{Deserialize, Serialize};

/// Coarse value family of a Postgres type, used to pick a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[strum(ascii_case_insensitive)]
pub enum ColumnKind {
    Text,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Boolean,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Json,
    Uuid,
    Other,
}

impl ColumnKind {
    /// Classifies either a catalog `data_type` ("character varying") or a
    /// wire type name ("VARCHAR").
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar" | "name" | "citext" => {
                ColumnKind::Text
            }
            "int2" | "smallint" | "smallserial" => ColumnKind::SmallInt,
            "int4" | "integer" | "int" | "serial" => ColumnKind::Integer,
            "int8" | "bigint" | "bigserial" => ColumnKind::BigInt,
            "float4" | "real" => ColumnKind::Real,
            "float8" | "double precision" => ColumnKind::Double,
            "numeric" | "decimal" => ColumnKind::Numeric,
            "bool" | "boolean" => ColumnKind::Boolean,
            "timestamp" | "timestamp without time zone" => ColumnKind::Timestamp,
            "timestamptz" | "timestamp with time zone" => ColumnKind::TimestampTz,
            "date" => ColumnKind::Date,
            "time" | "time without time zone" => ColumnKind::Time,
            "json" | "jsonb" => ColumnKind::Json,
            "uuid" => ColumnKind::Uuid,
            _ => ColumnKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct Column {
    pub name: String,
    /// Declared type exactly as the catalog reports it.
    #[serde(rename = "type")]
    pub data_type: String,
}

impl Column {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_type_name(&self.data_type)
    }
}

impl std::fmt::Display for Column {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "- {} ({})", self.name, self.data_type)
    }
}
