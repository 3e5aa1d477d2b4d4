#![allow(dead_code)]

use oxide_reconcile::prelude::*;

pub const SCHEMA: &str = "shop";

pub fn dialect() -> MySqlDialect {
    MySqlDialect::new()
}

pub fn id() -> Column {
    Column::new("id", LogicalType::uint(IntWidth::W64)).not_null()
}

/// `#users` with an auto-increment key, a unique email, a foreign key into
/// `#groups`, a check and a key index.
pub fn users() -> Model {
    Model::new("#users")
        .column(id())
        .column(
            Column::new("email", LogicalType::String)
                .length(255)
                .not_null(),
        )
        .column(Column::new("group_id", LogicalType::uint(IntWidth::W64)))
        .column(Column::new("age", LogicalType::uint(IntWidth::W8)))
        .unique("uq_users_email", ["email"])
        .foreign_key(
            ForeignKey::new(
                "fk_users_group",
                vec!["group_id".to_string()],
                "#groups",
                vec!["id".to_string()],
            )
            .on_delete(ForeignKeyAction::SetNull),
        )
        .check("chk_users_age", "age < 200")
        .key_index("idx_users_age", ["age"])
        .auto_increment("id", 1)
}

/// Column `name` of type INT.
pub fn int(name: &str) -> Column {
    Column::new(name, LogicalType::int(IntWidth::W32))
}

pub async fn ensure(executor: &mut MemoryExecutor, model: &Model) -> ReconcileReport {
    let dialect = dialect();
    SchemaReconciler::new(&dialect)
        .ensure_table(executor, model)
        .await
        .unwrap_or_else(|e| panic!("Failed to reconcile {}: {e}", model.name))
}

/// Position of the first statement containing `needle`.
pub fn position(statements: &[String], needle: &str) -> usize {
    statements
        .iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("No statement contains {needle:?}:\n{statements:#?}"))
}
