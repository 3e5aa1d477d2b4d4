//! Declarative table reconciliation for MySQL-family databases.
//!
//! `oxide-reconcile` brings a live table in line with a declarative
//! [`Model`](model::Model):
//! - An absent table is created with one `CREATE TABLE` statement
//! - A present table is upgraded in phases: columns are added, modified or
//!   dropped, keys are torn down and rebuilt, and auto-increment is
//!   re-applied last
//! - SQL generation is dialect-aware and dialects are looked up by name in
//!   a caller-owned [`DialectRegistry`](dialect::DialectRegistry)
//!
//! # Architecture
//!
//! - **Model** - What a table should look like, built in code or loaded
//!   from JSON
//! - **Dialect** - Type mapping, catalog queries and SQL generation
//! - **Introspector** - Reads the live table from the catalog
//! - **Diff** - Plans the [`DdlOperation`](operations::DdlOperation)s of
//!   each upgrade phase
//! - **Reconciler** - Runs the plan through an
//!   [`Executor`](executor::Executor)
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_reconcile::prelude::*;
//!
//! let model = Model::new("#users")
//!     .column(Column::new("id", LogicalType::uint(IntWidth::W64)))
//!     .column(Column::new("email", LogicalType::String).length(255).not_null())
//!     .unique("uq_users_email", ["email"])
//!     .auto_increment("id", 1);
//!
//! let dialect = MySqlDialect::new();
//! let mut executor = MySqlExecutor::connect(&url, &dialect)
//!     .await?
//!     .with_prefix(TablePrefix::new("app_"));
//! let report = SchemaReconciler::new(&dialect)
//!     .ensure_table(&mut executor, &model)
//!     .await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create or upgrade the tables described in a model file
//! oxide-reconcile --database mysql://root@localhost/shop ensure models.json
//!
//! # Show the statements without running them
//! oxide-reconcile ensure models.json --dry-run
//!
//! # Dump the live structure of a table
//! oxide-reconcile inspect users
//!
//! # Print CREATE TABLE statements offline
//! oxide-reconcile sql-create models.json
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod memory;
pub mod model;
pub mod operations;
pub mod reconciler;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{Dialect, DialectRegistry, MySqlDialect, TypeTable, MYSQL_TYPES};
    pub use crate::error::{ReconcileError, Result};
    pub use crate::executor::{Executor, MySqlExecutor, TablePrefix};
    pub use crate::introspect::{ConstraintKind, Introspector, LiveConstraint, LiveSchema};
    pub use crate::memory::MemoryExecutor;
    pub use crate::model::{
        load_models, AutoIncrement, CheckConstraint, Column, FloatWidth, ForeignKey,
        ForeignKeyAction, IntWidth, KeyIndex, LogicalType, Model, UniqueIndex,
    };
    pub use crate::operations::DdlOperation;
    pub use crate::reconciler::{Outcome, ReconcileReport, SchemaReconciler};
}
