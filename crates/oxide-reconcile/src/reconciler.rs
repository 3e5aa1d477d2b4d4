//! Table reconciler.
//!
//! [`SchemaReconciler::ensure_table`] brings one live table in line with a
//! [`Model`]: an absent table is created in a single statement, a present
//! one is upgraded in phases (columns, teardown, constraint restore, key
//! indexes, auto-increment).
//!
//! Statements run one at a time on the caller's executor and the first
//! failure aborts. There is no surrounding transaction, so a failed upgrade
//! can leave the table partially migrated.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::diff;
use crate::dialect::Dialect;
use crate::error::{ReconcileError, Result};
use crate::executor::Executor;
use crate::introspect::{ConstraintKind, Introspector};
use crate::model::Model;
use crate::operations::DdlOperation;

/// Path taken by a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The table did not exist and was created.
    Created,
    /// The table existed and was upgraded.
    Upgraded,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Upgraded => "upgraded",
        })
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Table name after prefix rewriting.
    pub table: String,
    /// Path taken.
    pub outcome: Outcome,
    /// Statements issued, in order.
    pub statements: Vec<String>,
}

/// Reconciles tables against their models using one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SchemaReconciler<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SchemaReconciler<'d> {
    /// Creates a reconciler for `dialect`.
    #[must_use]
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    /// Ensures the table described by `model` exists with the declared
    /// structure.
    ///
    /// The model's table names are passed through the executor's prefix
    /// policy and the result is validated before any database access.
    pub async fn ensure_table<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        model: &Model,
    ) -> Result<ReconcileReport> {
        let model = model.with_table_prefix(|name| executor.apply_table_prefix(name));
        model.validate(self.dialect)?;

        let schema = executor.schema_name().to_string();
        let introspector = Introspector::new(self.dialect);
        let mut report = ReconcileReport {
            table: model.name.clone(),
            outcome: Outcome::Created,
            statements: Vec::new(),
        };

        if introspector
            .table_exists(executor, &schema, &model.name)
            .await?
        {
            report.outcome = Outcome::Upgraded;
            info!(table = %model.name, "Upgrading table");
            self.upgrade(executor, &introspector, &schema, &model, &mut report)
                .await?;
        } else {
            info!(table = %model.name, "Creating table");
            let create = DdlOperation::CreateTable {
                model: model.clone(),
            };
            self.execute(executor, &[create], &mut report).await?;
        }

        info!(
            table = %report.table,
            outcome = %report.outcome,
            statements = report.statements.len(),
            "Table reconciled"
        );
        Ok(report)
    }

    async fn upgrade<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        introspector: &Introspector<'_>,
        schema: &str,
        model: &Model,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let table = model.name.as_str();

        let live_columns = introspector
            .existing_columns(executor, schema, table)
            .await?;
        let operations = diff::column_operations(model, &live_columns);
        self.phase(executor, table, "columns", &operations, report)
            .await?;

        let (constraints, live_checks) = introspector
            .constraints_and_checks(executor, schema, table)
            .await?;
        let mut operations = diff::constraint_teardown(table, &constraints);
        operations.extend(diff::check_teardown(model, &live_checks));
        self.phase(executor, table, "teardown constraints", &operations, report)
            .await?;

        // Plain indexes only, foreign key backing indexes included. On a dry
        // run the unique constraints dropped above are still in the catalog.
        let dropped_uniques: Vec<_> = constraints
            .into_iter()
            .filter(|c| c.kind == ConstraintKind::Unique)
            .collect();
        let indexes = introspector
            .existing_secondary_indexes(executor, schema, table, &dropped_uniques)
            .await?;
        let operations = diff::index_teardown(table, &indexes);
        self.phase(executor, table, "teardown indexes", &operations, report)
            .await?;

        let operations = diff::constraint_restore(model, &live_checks);
        self.phase(executor, table, "restore constraints", &operations, report)
            .await?;

        let operations = diff::key_index_operations(model);
        self.phase(executor, table, "key indexes", &operations, report)
            .await?;

        let operations: Vec<_> = diff::auto_increment_operation(model).into_iter().collect();
        self.phase(executor, table, "auto increment", &operations, report)
            .await
    }

    async fn phase<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        table: &str,
        phase: &str,
        operations: &[DdlOperation],
        report: &mut ReconcileReport,
    ) -> Result<()> {
        if operations.is_empty() {
            debug!(table = %table, phase = %phase, "Nothing to do");
            return Ok(());
        }
        info!(
            table = %table,
            phase = %phase,
            statements = operations.len(),
            "Running upgrade phase"
        );
        self.execute(executor, operations, report).await
    }

    async fn execute<E: Executor + ?Sized>(
        &self,
        executor: &mut E,
        operations: &[DdlOperation],
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for operation in operations {
            let sql = self.dialect.generate_sql(operation)?;
            debug!(sql = %sql, drop = operation.is_drop(), "Executing SQL");
            executor
                .exec(&sql)
                .await
                .map_err(|source| ReconcileError::Execution {
                    table: operation.table().to_string(),
                    statement: sql.clone(),
                    source,
                })?;
            report.statements.push(sql);
        }
        Ok(())
    }
}
