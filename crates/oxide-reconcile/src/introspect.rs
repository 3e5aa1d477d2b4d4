//! Live schema introspection.
//!
//! Every read is a single bound-parameter catalog query. Reads run one
//! after another on the caller's executor; each returns fully drained rows,
//! so no two result cursors are ever open on the connection at once.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{ReconcileError, Result};
use crate::executor::{CatalogRow, Executor};

/// Kind of a live table constraint the reconciler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConstraintKind {
    /// Referential constraint.
    ForeignKey,
    /// Unique constraint.
    Unique,
    /// Primary key.
    PrimaryKey,
}

impl ConstraintKind {
    /// Parses the catalog's `CONSTRAINT_TYPE` value.
    #[must_use]
    pub fn from_catalog(kind: &str) -> Option<Self> {
        match kind {
            "PRIMARY KEY" => Some(Self::PrimaryKey),
            "FOREIGN KEY" => Some(Self::ForeignKey),
            "UNIQUE" => Some(Self::Unique),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Unique => "UNIQUE",
        })
    }
}

/// A constraint found on the live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveConstraint {
    /// Constraint name as reported by the catalog.
    pub name: String,
    /// Constraint kind.
    pub kind: ConstraintKind,
}

/// Structure of a live table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
    /// Existing column names.
    pub columns: BTreeSet<String>,
    /// Primary key, foreign key and unique constraints.
    pub constraints: Vec<LiveConstraint>,
    /// CHECK constraint names.
    pub checks: BTreeSet<String>,
    /// Secondary indexes not backing any constraint.
    pub indexes: Vec<String>,
}

/// Reads table structure from the database catalog.
#[derive(Debug, Clone, Copy)]
pub struct Introspector<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> Introspector<'d> {
    /// Creates an introspector using the dialect's catalog queries.
    #[must_use]
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    async fn rows<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        sql: &str,
        schema: &str,
        table: &str,
    ) -> Result<Vec<CatalogRow>> {
        debug!(table = %table, sql = %sql, "Querying catalog");
        executor
            .query(sql, &[schema, table])
            .await
            .map_err(|source| ReconcileError::CatalogQuery {
                table: table.to_string(),
                sql: sql.to_string(),
                source,
            })
    }

    /// Returns whether the table exists.
    pub async fn table_exists<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<bool> {
        let rows = self
            .rows(executor, self.dialect.catalog().table_exists, schema, table)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Returns the names of the table's columns.
    pub async fn existing_columns<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<BTreeSet<String>> {
        let rows = self
            .rows(executor, self.dialect.catalog().columns, schema, table)
            .await?;
        Ok(rows.into_iter().filter_map(first_column).collect())
    }

    /// Returns the table's primary key, foreign key and unique constraints,
    /// plus the names of its CHECK constraints, from a single catalog query.
    pub async fn constraints_and_checks<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<(Vec<LiveConstraint>, BTreeSet<String>)> {
        let rows = self
            .rows(executor, self.dialect.catalog().constraints, schema, table)
            .await?;

        let mut constraints = Vec::new();
        let mut checks = BTreeSet::new();
        for row in rows {
            let mut fields = row.into_iter();
            let (Some(name), Some(kind)) = (fields.next(), fields.next()) else {
                continue;
            };
            if kind == "CHECK" {
                checks.insert(name);
            } else if let Some(kind) = ConstraintKind::from_catalog(&kind) {
                constraints.push(LiveConstraint { name, kind });
            }
        }
        Ok((constraints, checks))
    }

    /// Returns the table's primary key, foreign key and unique constraints.
    /// Other constraint kinds are ignored.
    pub async fn existing_constraints<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<Vec<LiveConstraint>> {
        let (constraints, _) = self
            .constraints_and_checks(executor, schema, table)
            .await?;
        Ok(constraints)
    }

    /// Returns the names of the table's CHECK constraints.
    pub async fn existing_checks<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<BTreeSet<String>> {
        let (_, checks) = self
            .constraints_and_checks(executor, schema, table)
            .await?;
        Ok(checks)
    }

    /// Returns the table's secondary indexes whose names are not among
    /// `constraints`.
    pub async fn existing_secondary_indexes<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
        constraints: &[LiveConstraint],
    ) -> Result<Vec<String>> {
        let rows = self
            .rows(executor, self.dialect.catalog().indexes, schema, table)
            .await?;

        let mut seen = BTreeSet::new();
        Ok(rows
            .into_iter()
            .filter_map(first_column)
            .filter(|name| name != "PRIMARY")
            .filter(|name| !constraints.iter().any(|c| &c.name == name))
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    /// Reads the full live structure of a table.
    pub async fn introspect<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        schema: &str,
        table: &str,
    ) -> Result<LiveSchema> {
        let columns = self.existing_columns(executor, schema, table).await?;
        let (constraints, checks) = self
            .constraints_and_checks(executor, schema, table)
            .await?;
        let indexes = self
            .existing_secondary_indexes(executor, schema, table, &constraints)
            .await?;
        Ok(LiveSchema {
            columns,
            constraints,
            checks,
            indexes,
        })
    }
}

fn first_column(row: CatalogRow) -> Option<String> {
    row.into_iter().next()
}
