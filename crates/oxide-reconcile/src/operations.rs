//! DDL operations.
//!
//! The planner describes every structural change as a [`DdlOperation`];
//! dialects turn each one into exactly one SQL statement.

use serde::{Deserialize, Serialize};

use crate::model::{CheckConstraint, Column, ForeignKey, KeyIndex, Model, UniqueIndex};

/// A single structural change to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DdlOperation {
    /// Create the table with all columns, constraints and indexes.
    CreateTable {
        /// The (prefix-rewritten) model.
        model: Model,
    },

    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
    },

    /// Rewrite an existing column to the given definition.
    ModifyColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
    },

    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Drop the primary key.
    DropPrimaryKey {
        /// Table name.
        table: String,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Drop a unique constraint or plain index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },

    /// Drop a CHECK constraint.
    DropCheck {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Add a primary key.
    AddPrimaryKey {
        /// Table name.
        table: String,
        /// Key columns.
        columns: Vec<String>,
    },

    /// Add a unique constraint.
    AddUnique {
        /// Table name.
        table: String,
        /// Constraint definition.
        index: UniqueIndex,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Constraint definition.
        foreign_key: ForeignKey,
    },

    /// Add a CHECK constraint.
    AddCheck {
        /// Table name.
        table: String,
        /// Constraint definition.
        check: CheckConstraint,
    },

    /// Add a plain secondary index.
    AddKeyIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: KeyIndex,
    },

    /// Promote a column to primary key and make it auto-increment.
    SetAutoIncrement {
        /// Table name.
        table: String,
        /// The auto-increment column.
        column: Column,
    },
}

impl DdlOperation {
    /// Returns the table this operation changes.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { model } => &model.name,
            Self::AddColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::DropPrimaryKey { table }
            | Self::DropForeignKey { table, .. }
            | Self::DropIndex { table, .. }
            | Self::DropCheck { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::AddUnique { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::AddCheck { table, .. }
            | Self::AddKeyIndex { table, .. }
            | Self::SetAutoIncrement { table, .. } => table,
        }
    }

    /// Whether the operation removes something from the table.
    #[must_use]
    pub const fn is_drop(&self) -> bool {
        matches!(
            self,
            Self::DropColumn { .. }
                | Self::DropPrimaryKey { .. }
                | Self::DropForeignKey { .. }
                | Self::DropIndex { .. }
                | Self::DropCheck { .. }
        )
    }
}
