pub mod column;
pub mod discovery;
pub mod table;

pub use column::{Column, ColumnKind};
pub use discovery::{PgSchemaIntrospector, Schema, SchemaIntrospector};
pub use table::Table;
