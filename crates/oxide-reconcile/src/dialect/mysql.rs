//! MySQL dialect.
//!
//! Constraints are always named so that they can be dropped individually.
//! Plain indexes may be declared inline in CREATE TABLE.

use crate::error::{Result, UnsupportedType};
use crate::model::{CheckConstraint, Column, ForeignKey, KeyIndex, Model, UniqueIndex};
use crate::operations::DdlOperation;

use super::types::{TypeTable, MYSQL_TYPES};
use super::{CatalogQueries, Dialect};

const CATALOG: CatalogQueries = CatalogQueries {
    table_exists: "SELECT `TABLE_NAME` FROM `INFORMATION_SCHEMA`.`TABLES` \
                   WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ?",
    columns: "SELECT `COLUMN_NAME` FROM `INFORMATION_SCHEMA`.`COLUMNS` \
              WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? ORDER BY `ORDINAL_POSITION`",
    constraints: "SELECT `CONSTRAINT_NAME`, `CONSTRAINT_TYPE` \
                  FROM `INFORMATION_SCHEMA`.`TABLE_CONSTRAINTS` \
                  WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ?",
    indexes: "SELECT DISTINCT `INDEX_NAME` FROM `INFORMATION_SCHEMA`.`STATISTICS` \
              WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ?",
};

/// Name MySQL gives the constraint in CREATE TABLE; MySQL itself always
/// reports the primary key as `PRIMARY`.
const PRIMARY_KEY_NAME: &str = "pk";

/// MySQL dialect.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    types: TypeTable,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self { types: MYSQL_TYPES }
    }

    /// Creates a MySQL dialect with a custom type table (e.g. for a
    /// MySQL-compatible server with different limits).
    #[must_use]
    pub const fn with_types(types: TypeTable) -> Self {
        Self { types }
    }

    fn alter(&self, table: &str, action: &str) -> String {
        format!("ALTER TABLE {} {}", self.quote_identifier(table), action)
    }

    fn primary_key_clause(&self, columns: &[String]) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(PRIMARY_KEY_NAME),
            self.column_list(columns)
        )
    }

    fn unique_clause(&self, index: &UniqueIndex) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&index.name),
            self.column_list(&index.columns)
        )
    }

    fn foreign_key_clause(&self, fk: &ForeignKey) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.column_list(&fk.references_columns)
        );
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        sql
    }

    fn check_clause(&self, check: &CheckConstraint) -> String {
        format!(
            "CONSTRAINT {} CHECK ({})",
            self.quote_identifier(&check.name),
            check.expression
        )
    }

    fn index_clause(&self, index: &KeyIndex) -> String {
        format!(
            "INDEX {} ({})",
            self.quote_identifier(&index.name),
            self.column_list(&index.columns)
        )
    }

    /// Generates SQL for creating a table.
    fn create_table_sql(&self, model: &Model) -> Result<String> {
        let mut items = Vec::with_capacity(model.columns.len() + 4);
        for column in &model.columns {
            let mut column = column.clone();
            column.auto_increment = model.is_auto_increment(&column.name);
            items.push(self.column_definition(&model.name, &column)?);
        }

        let primary_key = model.effective_primary_key();
        if !primary_key.is_empty() {
            items.push(self.primary_key_clause(&primary_key));
        }
        items.extend(model.unique_indexes.iter().map(|u| self.unique_clause(u)));
        items.extend(
            model
                .foreign_keys
                .iter()
                .map(|fk| self.foreign_key_clause(fk)),
        );
        items.extend(model.checks.iter().map(|c| self.check_clause(c)));
        if self.supports_inline_index() {
            items.extend(model.key_indexes.iter().map(|i| self.index_clause(i)));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.quote_identifier(&model.name),
            items.join(",\n  ")
        );

        if let Some(ai) = model.auto_increment_spec().filter(|ai| ai.start > 1) {
            sql.push_str(&format!(" AUTO_INCREMENT = {}", ai.start));
        }
        Ok(sql)
    }

    /// Generates SQL promoting a column to auto-increment primary key.
    fn set_auto_increment_sql(&self, table: &str, column: &Column) -> Result<String> {
        let mut column = column.clone();
        column.auto_increment = false;
        column.nullable = false;
        let definition = self.column_definition(table, &column)?;
        Ok(self.alter(
            table,
            &format!(
                "MODIFY COLUMN {definition} PRIMARY KEY {}",
                self.auto_increment_keyword()
            ),
        ))
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_pair(&self) -> (&'static str, &'static str) {
        ("`", "`")
    }

    fn limit_sql(&self, limit: u64, offset: u64) -> (String, Vec<u64>) {
        (" LIMIT ? OFFSET ?".to_string(), vec![limit, offset])
    }

    fn supports_last_insert_id(&self) -> bool {
        true
    }

    fn map_type(&self, column: &Column) -> std::result::Result<String, UnsupportedType> {
        self.types.map(column)
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn supports_inline_index(&self) -> bool {
        true
    }

    fn catalog(&self) -> CatalogQueries {
        CATALOG
    }

    fn generate_sql(&self, operation: &DdlOperation) -> Result<String> {
        Ok(match operation {
            DdlOperation::CreateTable { model } => self.create_table_sql(model)?,

            DdlOperation::AddColumn { table, column } => self.alter(
                table,
                &format!("ADD COLUMN {}", self.column_definition(table, column)?),
            ),

            DdlOperation::ModifyColumn { table, column } => self.alter(
                table,
                &format!("MODIFY COLUMN {}", self.column_definition(table, column)?),
            ),

            DdlOperation::DropColumn { table, column_name } => self.alter(
                table,
                &format!("DROP COLUMN {}", self.quote_identifier(column_name)),
            ),

            DdlOperation::DropPrimaryKey { table } => self.alter(table, "DROP PRIMARY KEY"),

            DdlOperation::DropForeignKey { table, name } => self.alter(
                table,
                &format!("DROP FOREIGN KEY {}", self.quote_identifier(name)),
            ),

            DdlOperation::DropIndex { table, name } => self.alter(
                table,
                &format!("DROP INDEX {}", self.quote_identifier(name)),
            ),

            DdlOperation::DropCheck { table, name } => self.alter(
                table,
                &format!("DROP CHECK {}", self.quote_identifier(name)),
            ),

            DdlOperation::AddPrimaryKey { table, columns } => self.alter(
                table,
                &format!("ADD PRIMARY KEY ({})", self.column_list(columns)),
            ),

            DdlOperation::AddUnique { table, index } => {
                self.alter(table, &format!("ADD {}", self.unique_clause(index)))
            }

            DdlOperation::AddForeignKey { table, foreign_key } => {
                self.alter(
                    table,
                    &format!("ADD {}", self.foreign_key_clause(foreign_key)),
                )
            }

            DdlOperation::AddCheck { table, check } => {
                self.alter(table, &format!("ADD {}", self.check_clause(check)))
            }

            DdlOperation::AddKeyIndex { table, index } => {
                self.alter(table, &format!("ADD {}", self.index_clause(index)))
            }

            DdlOperation::SetAutoIncrement { table, column } => {
                self.set_auto_increment_sql(table, column)?
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::model::{ForeignKeyAction, IntWidth, LogicalType};

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    fn id() -> Column {
        Column::new("id", LogicalType::uint(IntWidth::W64)).not_null()
    }

    #[test]
    fn test_capabilities() {
        let d = dialect();
        assert_eq!(d.quote_pair(), ("`", "`"));
        assert_eq!(d.quote_identifier("users"), "`users`");
        assert!(d.supports_last_insert_id());
        assert_eq!(
            d.limit_sql(10, 20),
            (" LIMIT ? OFFSET ?".to_string(), vec![10, 20])
        );
    }

    #[test]
    fn test_column_definition() {
        let d = dialect();
        let col = Column::new("name", LogicalType::String).length(64).not_null();
        assert_eq!(
            d.column_definition("users", &col).unwrap(),
            "`name` VARCHAR(64) NOT NULL"
        );

        let col = Column::new("age", LogicalType::uint(IntWidth::W8)).length(3);
        assert_eq!(
            d.column_definition("users", &col).unwrap(),
            "`age` TINYINT(3) UNSIGNED NULL"
        );

        let col = id().auto_increment();
        assert_eq!(
            d.column_definition("users", &col).unwrap(),
            "`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT"
        );
    }

    #[test]
    fn test_create_table_full() {
        let model = Model::new("users")
            .column(id())
            .column(
                Column::new("email", LogicalType::String)
                    .length(255)
                    .not_null(),
            )
            .column(Column::new("age", LogicalType::uint(IntWidth::W8)))
            .column(Column::new("group_id", LogicalType::uint(IntWidth::W64)))
            .primary_key(["id"])
            .unique("uq_users_email", ["email"])
            .foreign_key(
                ForeignKey::new(
                    "fk_users_group",
                    vec!["group_id".to_string()],
                    "groups",
                    vec!["id".to_string()],
                )
                .on_delete(ForeignKeyAction::Cascade),
            )
            .check("chk_users_age", "age < 200")
            .key_index("idx_users_age", ["age", "email"]);

        let sql = dialect()
            .generate_sql(&DdlOperation::CreateTable { model })
            .unwrap();

        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `users` (\n  \
             `id` BIGINT UNSIGNED NOT NULL,\n  \
             `email` VARCHAR(255) NOT NULL,\n  \
             `age` TINYINT UNSIGNED NULL,\n  \
             `group_id` BIGINT UNSIGNED NULL,\n  \
             CONSTRAINT `pk` PRIMARY KEY (`id`),\n  \
             CONSTRAINT `uq_users_email` UNIQUE (`email`),\n  \
             CONSTRAINT `fk_users_group` FOREIGN KEY (`group_id`) REFERENCES `groups` (`id`) ON DELETE CASCADE,\n  \
             CONSTRAINT `chk_users_age` CHECK (age < 200),\n  \
             INDEX `idx_users_age` (`age`, `email`)\n)"
        );
    }

    #[test]
    fn test_create_table_clause_counts_and_order() {
        let model = Model::new("accounts")
            .column(id())
            .column(Column::new("login", LogicalType::String).length(32))
            .column(Column::new("balance", LogicalType::int(IntWidth::W64)))
            .primary_key(["id"])
            .unique("uq_login", ["login"])
            .check("chk_balance", "balance >= 0");

        let sql = dialect()
            .generate_sql(&DdlOperation::CreateTable { model })
            .unwrap();

        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
        assert_eq!(sql.matches("UNIQUE").count(), 1);
        assert_eq!(sql.matches("CHECK").count(), 1);
        let id = sql.find("`id`").unwrap();
        let login = sql.find("`login`").unwrap();
        let balance = sql.find("`balance`").unwrap();
        assert!(id < login && login < balance);
    }

    #[test]
    fn test_create_table_auto_increment_start() {
        let model = Model::new("tickets")
            .column(id())
            .column(Column::new("title", LogicalType::String).length(80))
            .auto_increment("id", 1000);

        let sql = dialect()
            .generate_sql(&DdlOperation::CreateTable { model })
            .unwrap();

        assert!(sql.contains("`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,"));
        assert!(sql.contains("CONSTRAINT `pk` PRIMARY KEY (`id`)"));
        assert!(sql.ends_with(") AUTO_INCREMENT = 1000"));
    }

    #[test]
    fn test_create_table_auto_increment_start_one_has_no_trailer() {
        let model = Model::new("tickets").column(id()).auto_increment("id", 1);

        let sql = dialect()
            .generate_sql(&DdlOperation::CreateTable { model })
            .unwrap();
        assert!(sql.ends_with("\n)"));
    }

    #[test]
    fn test_create_table_unsupported_type() {
        let model = Model::new("events")
            .column(id())
            .column(Column::new("at", LogicalType::opaque("Time")));

        let err = dialect()
            .generate_sql(&DdlOperation::CreateTable { model })
            .unwrap_err();
        assert!(
            matches!(err, ReconcileError::UnsupportedType { ref column, .. } if column == "at")
        );
    }

    #[test]
    fn test_alter_columns() {
        let d = dialect();
        let column = Column::new("email", LogicalType::String).length(100);

        let add = DdlOperation::AddColumn {
            table: "users".to_string(),
            column: column.clone(),
        };
        assert_eq!(
            d.generate_sql(&add).unwrap(),
            "ALTER TABLE `users` ADD COLUMN `email` VARCHAR(100) NULL"
        );

        let modify = DdlOperation::ModifyColumn {
            table: "users".to_string(),
            column,
        };
        assert_eq!(
            d.generate_sql(&modify).unwrap(),
            "ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(100) NULL"
        );

        let drop = DdlOperation::DropColumn {
            table: "users".to_string(),
            column_name: "legacy".to_string(),
        };
        assert_eq!(
            d.generate_sql(&drop).unwrap(),
            "ALTER TABLE `users` DROP COLUMN `legacy`"
        );
    }

    #[test]
    fn test_drop_constraints() {
        let d = dialect();
        let table = || "users".to_string();

        assert_eq!(
            d.generate_sql(&DdlOperation::DropPrimaryKey { table: table() })
                .unwrap(),
            "ALTER TABLE `users` DROP PRIMARY KEY"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::DropForeignKey {
                table: table(),
                name: "fk_group".to_string()
            })
            .unwrap(),
            "ALTER TABLE `users` DROP FOREIGN KEY `fk_group`"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::DropIndex {
                table: table(),
                name: "uq_email".to_string()
            })
            .unwrap(),
            "ALTER TABLE `users` DROP INDEX `uq_email`"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::DropCheck {
                table: table(),
                name: "chk_age".to_string()
            })
            .unwrap(),
            "ALTER TABLE `users` DROP CHECK `chk_age`"
        );
    }

    #[test]
    fn test_add_constraints() {
        let d = dialect();
        let table = || "users".to_string();

        assert_eq!(
            d.generate_sql(&DdlOperation::AddPrimaryKey {
                table: table(),
                columns: vec!["tenant".to_string(), "id".to_string()],
            })
            .unwrap(),
            "ALTER TABLE `users` ADD PRIMARY KEY (`tenant`, `id`)"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::AddUnique {
                table: table(),
                index: UniqueIndex {
                    name: "uq_email".to_string(),
                    columns: vec!["email".to_string()],
                },
            })
            .unwrap(),
            "ALTER TABLE `users` ADD CONSTRAINT `uq_email` UNIQUE (`email`)"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::AddForeignKey {
                table: table(),
                foreign_key: ForeignKey::new(
                    "fk_group",
                    vec!["group_id".to_string()],
                    "groups",
                    vec!["id".to_string()],
                )
                .on_delete(ForeignKeyAction::SetNull)
                .on_update(ForeignKeyAction::Restrict),
            })
            .unwrap(),
            "ALTER TABLE `users` ADD CONSTRAINT `fk_group` FOREIGN KEY (`group_id`) \
             REFERENCES `groups` (`id`) ON DELETE SET NULL ON UPDATE RESTRICT"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::AddCheck {
                table: table(),
                check: CheckConstraint {
                    name: "chk_age".to_string(),
                    expression: "age >= 0".to_string(),
                },
            })
            .unwrap(),
            "ALTER TABLE `users` ADD CONSTRAINT `chk_age` CHECK (age >= 0)"
        );
        assert_eq!(
            d.generate_sql(&DdlOperation::AddKeyIndex {
                table: table(),
                index: KeyIndex {
                    name: "idx_name".to_string(),
                    columns: vec!["last".to_string(), "first".to_string()],
                },
            })
            .unwrap(),
            "ALTER TABLE `users` ADD INDEX `idx_name` (`last`, `first`)"
        );
    }

    #[test]
    fn test_set_auto_increment_promotes_primary_key() {
        let op = DdlOperation::SetAutoIncrement {
            table: "users".to_string(),
            column: Column::new("id", LogicalType::int(IntWidth::W32)).auto_increment(),
        };

        assert_eq!(
            dialect().generate_sql(&op).unwrap(),
            "ALTER TABLE `users` MODIFY COLUMN `id` INT NOT NULL PRIMARY KEY AUTO_INCREMENT"
        );
    }
}
