//! Database dialect implementations.
//!
//! A dialect knows how to quote identifiers, map logical column types,
//! phrase catalog queries and turn [`DdlOperation`]s into SQL for one
//! database family. Dialects are looked up by name in a caller-owned
//! [`DialectRegistry`].

mod mysql;
pub mod types;

pub use mysql::MySqlDialect;
pub use types::{TypeTable, MYSQL_TYPES};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReconcileError, Result, UnsupportedType};
use crate::model::Column;
use crate::operations::DdlOperation;

/// Catalog queries used by the introspector.
///
/// Every query takes the schema name and the table name as its two bound
/// parameters, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogQueries {
    /// Returns one row if the table exists.
    pub table_exists: &'static str,
    /// Returns one row per column: the column name.
    pub columns: &'static str,
    /// Returns one row per constraint: name, kind.
    pub constraints: &'static str,
    /// Returns one row per index: the index name.
    pub indexes: &'static str,
}

/// Trait for database-specific SQL generation.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the opening and closing identifier quote.
    fn quote_pair(&self) -> (&'static str, &'static str);

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        let (open, close) = self.quote_pair();
        format!("{open}{name}{close}")
    }

    /// Returns a LIMIT/OFFSET clause with placeholders and its arguments.
    fn limit_sql(&self, limit: u64, offset: u64) -> (String, Vec<u64>);

    /// Whether the driver reports the last inserted id.
    fn supports_last_insert_id(&self) -> bool;

    /// Extracts the database name from a connection string: the path after
    /// the last `/`, without the query string. A URL with a scheme but no
    /// path names no database.
    fn database_name<'a>(&self, data_source: &'a str) -> &'a str {
        let (has_scheme, rest) = match data_source.find("://") {
            Some(i) => (true, &data_source[i + 3..]),
            None => (false, data_source),
        };
        let rest = rest.split('?').next().unwrap_or_default();
        match rest.rfind('/') {
            Some(i) => &rest[i + 1..],
            None if has_scheme => "",
            None => rest,
        }
    }

    /// Maps a column's logical type to this dialect's SQL type.
    fn map_type(&self, column: &Column) -> std::result::Result<String, UnsupportedType>;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Whether plain indexes can be declared inside CREATE TABLE.
    fn supports_inline_index(&self) -> bool;

    /// Catalog queries for introspection.
    fn catalog(&self) -> CatalogQueries;

    /// Generates column definition SQL.
    fn column_definition(&self, table: &str, column: &Column) -> Result<String> {
        let sql_type = self
            .map_type(column)
            .map_err(|source| ReconcileError::UnsupportedType {
                table: table.to_string(),
                column: column.name.clone(),
                source,
            })?;

        let mut parts = vec![self.quote_identifier(&column.name), sql_type];
        let null = if column.nullable { "NULL" } else { "NOT NULL" };
        parts.push(null.to_string());
        if column.auto_increment {
            parts.push(self.auto_increment_keyword().to_string());
        }
        Ok(parts.join(" "))
    }

    /// Quotes and joins a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates the single SQL statement for an operation.
    fn generate_sql(&self, operation: &DdlOperation) -> Result<String>;
}

/// Name → dialect lookup table, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    dialects: BTreeMap<&'static str, Arc<dyn Dialect>>,
}

impl DialectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in dialects.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlDialect::new()));
        registry
    }

    /// Registers a dialect under its name, returning the one it replaces.
    pub fn register(&mut self, dialect: Arc<dyn Dialect>) -> Option<Arc<dyn Dialect>> {
        self.dialects.insert(dialect.name(), dialect)
    }

    /// Looks up a dialect by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Dialect>> {
        self.dialects
            .get(name)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownDialect(name.to_string()))
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dialects.keys().copied()
    }
}
