//! Upgrade planning.
//!
//! Pure functions comparing a [`Model`] with what introspection found and
//! producing the [`DdlOperation`]s of each upgrade phase. Nothing here
//! touches the database.

use std::collections::BTreeSet;

use crate::introspect::{ConstraintKind, LiveConstraint};
use crate::model::{Column, Model};
use crate::operations::DdlOperation;

/// Column phase: ADD or MODIFY every declared column in declaration order,
/// then DROP every live column the model no longer declares.
///
/// Auto-increment is left off here; it is re-applied by
/// [`auto_increment_operation`] once the keys have been rebuilt.
#[must_use]
pub fn column_operations(model: &Model, live_columns: &BTreeSet<String>) -> Vec<DdlOperation> {
    let table = &model.name;
    let declared: BTreeSet<&str> = model.columns.iter().map(|c| c.name.as_str()).collect();

    let mut operations: Vec<DdlOperation> = model
        .columns
        .iter()
        .map(|column| {
            let column = without_auto_increment(column);
            if live_columns.contains(&column.name) {
                DdlOperation::ModifyColumn {
                    table: table.clone(),
                    column,
                }
            } else {
                DdlOperation::AddColumn {
                    table: table.clone(),
                    column,
                }
            }
        })
        .collect();

    operations.extend(
        live_columns
            .iter()
            .filter(|name| !declared.contains(name.as_str()))
            .map(|name| DdlOperation::DropColumn {
                table: table.clone(),
                column_name: name.clone(),
            }),
    );
    operations
}

fn without_auto_increment(column: &Column) -> Column {
    Column {
        auto_increment: false,
        ..column.clone()
    }
}

/// Teardown of live constraints: foreign keys first, then unique
/// constraints, then the primary key. Within a kind, by name.
#[must_use]
pub fn constraint_teardown(table: &str, constraints: &[LiveConstraint]) -> Vec<DdlOperation> {
    let mut constraints = constraints.to_vec();
    constraints.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));

    constraints
        .into_iter()
        .map(|constraint| match constraint.kind {
            ConstraintKind::ForeignKey => DdlOperation::DropForeignKey {
                table: table.to_string(),
                name: constraint.name,
            },
            ConstraintKind::Unique => DdlOperation::DropIndex {
                table: table.to_string(),
                name: constraint.name,
            },
            ConstraintKind::PrimaryKey => DdlOperation::DropPrimaryKey {
                table: table.to_string(),
            },
        })
        .collect()
}

/// Drops live CHECK constraints the model no longer declares.
#[must_use]
pub fn check_teardown(model: &Model, live_checks: &BTreeSet<String>) -> Vec<DdlOperation> {
    live_checks
        .iter()
        .filter(|name| !model.checks.iter().any(|c| &c.name == *name))
        .map(|name| DdlOperation::DropCheck {
            table: model.name.clone(),
            name: name.clone(),
        })
        .collect()
}

/// Drops every given secondary index.
#[must_use]
pub fn index_teardown(table: &str, indexes: &[String]) -> Vec<DdlOperation> {
    indexes
        .iter()
        .map(|name| DdlOperation::DropIndex {
            table: table.to_string(),
            name: name.clone(),
        })
        .collect()
}

/// Constraint restore phase: the declared primary key (unless the
/// auto-increment phase will establish it), unique constraints and foreign
/// keys, then the declared CHECK constraints missing from the live table.
#[must_use]
pub fn constraint_restore(model: &Model, live_checks: &BTreeSet<String>) -> Vec<DdlOperation> {
    let table = &model.name;
    let mut operations = Vec::new();

    if model.auto_increment_spec().is_none() && !model.primary_key.is_empty() {
        operations.push(DdlOperation::AddPrimaryKey {
            table: table.clone(),
            columns: model.primary_key.clone(),
        });
    }
    operations.extend(model.unique_indexes.iter().map(|index| DdlOperation::AddUnique {
        table: table.clone(),
        index: index.clone(),
    }));
    operations.extend(
        model
            .foreign_keys
            .iter()
            .map(|foreign_key| DdlOperation::AddForeignKey {
                table: table.clone(),
                foreign_key: foreign_key.clone(),
            }),
    );
    operations.extend(
        model
            .checks
            .iter()
            .filter(|check| !live_checks.contains(&check.name))
            .map(|check| DdlOperation::AddCheck {
                table: table.clone(),
                check: check.clone(),
            }),
    );
    operations
}

/// Key index phase: every declared key index, in declaration order.
#[must_use]
pub fn key_index_operations(model: &Model) -> Vec<DdlOperation> {
    model
        .key_indexes
        .iter()
        .map(|index| DdlOperation::AddKeyIndex {
            table: model.name.clone(),
            index: index.clone(),
        })
        .collect()
}

/// Auto-increment phase: promotes the auto-increment column, if any.
#[must_use]
pub fn auto_increment_operation(model: &Model) -> Option<DdlOperation> {
    let ai = model.auto_increment_spec()?;
    let column = model.get_column(&ai.column)?;
    Some(DdlOperation::SetAutoIncrement {
        table: model.name.clone(),
        column: column.clone(),
    })
}
