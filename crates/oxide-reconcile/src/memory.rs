//! In-memory catalog executor.
//!
//! [`MemoryExecutor`] understands the MySQL DDL produced by
//! [`crate::dialect::MySqlDialect`] and answers the MySQL catalog queries
//! from its own state. It enforces the MySQL rules the reconciler has to
//! respect (duplicate names, a single primary key, a keyed auto-increment
//! column) so that statement sequences can be checked without a server.
//! Every executed statement and query is recorded.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::executor::{CatalogRow, Executor, TablePrefix};

/// Simulated table state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryTable {
    /// Columns in order: name and definition (type and attributes).
    pub columns: Vec<(String, String)>,
    /// Primary key columns.
    pub primary_key: Option<Vec<String>>,
    /// Unique constraints by name.
    pub uniques: BTreeMap<String, Vec<String>>,
    /// Foreign keys by name: columns and the reference clause.
    pub foreign_keys: BTreeMap<String, (Vec<String>, String)>,
    /// CHECK constraints by name.
    pub checks: BTreeMap<String, String>,
    /// Plain indexes (including foreign key backing indexes) by name.
    pub indexes: BTreeMap<String, Vec<String>>,
}

impl MemoryTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    fn has_key_name(&self, name: &str) -> bool {
        self.uniques.contains_key(name) || self.indexes.contains_key(name)
    }

    /// Whether some key starts with `columns`.
    fn is_keyed(&self, columns: &[String]) -> bool {
        self.primary_key
            .iter()
            .chain(self.uniques.values())
            .chain(self.indexes.values())
            .any(|key| key.starts_with(columns))
    }

    fn check_auto_increment(&self) -> Result<(), String> {
        for (name, definition) in &self.columns {
            if definition.contains("AUTO_INCREMENT") && !self.is_keyed(std::slice::from_ref(name)) {
                return Err(format!(
                    "Incorrect table definition; there can be only one auto column \
                     and it must be defined as a key ({name})"
                ));
            }
        }
        Ok(())
    }

    fn drop_column(&mut self, name: &str) {
        self.columns.retain(|(n, _)| n != name);
        let strip = |key: &mut Vec<String>| key.retain(|c| c != name);
        if let Some(pk) = self.primary_key.as_mut() {
            strip(pk);
        }
        if self.primary_key.as_ref().is_some_and(Vec::is_empty) {
            self.primary_key = None;
        }
        self.uniques.values_mut().for_each(strip);
        self.uniques.retain(|_, cols| !cols.is_empty());
        self.indexes.values_mut().for_each(strip);
        self.indexes.retain(|_, cols| !cols.is_empty());
    }

    fn add_constraint(&mut self, name: &str, body: &str) -> Result<(), String> {
        if let Some(rest) = body.strip_prefix("PRIMARY KEY") {
            let (columns, _) = column_list(rest)?;
            return self.set_primary_key(columns);
        }
        let reuses_index = body.starts_with("FOREIGN KEY");
        if (self.has_key_name(name) && !reuses_index) || self.checks.contains_key(name) {
            return Err(format!("Duplicate key name '{name}'"));
        }
        if let Some(rest) = body.strip_prefix("UNIQUE") {
            let (columns, _) = column_list(rest)?;
            self.uniques.insert(name.to_string(), columns);
        } else if let Some(rest) = body.strip_prefix("FOREIGN KEY") {
            if self.foreign_keys.contains_key(name) {
                return Err(format!("Duplicate foreign key constraint name '{name}'"));
            }
            let (columns, reference) = column_list(rest)?;
            // MySQL creates a backing index unless a usable one exists.
            if !self.is_keyed(&columns) && !self.indexes.contains_key(name) {
                self.indexes.insert(name.to_string(), columns.clone());
            }
            self.foreign_keys
                .insert(name.to_string(), (columns, reference.trim().to_string()));
        } else if let Some(rest) = body.strip_prefix("CHECK") {
            self.checks.insert(name.to_string(), rest.trim().to_string());
        } else {
            return Err(format!("Unsupported constraint: {body}"));
        }
        Ok(())
    }

    fn set_primary_key(&mut self, columns: Vec<String>) -> Result<(), String> {
        if self.primary_key.is_some() {
            return Err("Multiple primary key defined".to_string());
        }
        if let Some(missing) = columns.iter().find(|c| self.column_index(c).is_none()) {
            return Err(format!("Key column '{missing}' doesn't exist in table"));
        }
        self.primary_key = Some(columns);
        Ok(())
    }

    fn add_index(&mut self, name: &str, rest: &str) -> Result<(), String> {
        if self.has_key_name(name) {
            return Err(format!("Duplicate key name '{name}'"));
        }
        let (columns, _) = column_list(rest)?;
        if let Some(missing) = columns.iter().find(|c| self.column_index(c).is_none()) {
            return Err(format!("Key column '{missing}' doesn't exist in table"));
        }
        self.indexes.insert(name.to_string(), columns);
        Ok(())
    }

    fn set_column(&mut self, name: String, definition: &str) -> Result<(), String> {
        let mut definition = definition.trim().to_string();
        if definition.contains(" PRIMARY KEY") {
            definition = definition.replace(" PRIMARY KEY", "");
            self.set_primary_key(vec![name.clone()])?;
        }
        match self.column_index(&name) {
            Some(i) => self.columns[i].1 = definition,
            None => self.columns.push((name, definition)),
        }
        Ok(())
    }
}

/// Executor backed by an in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    schema: String,
    prefix: TablePrefix,
    tables: BTreeMap<String, MemoryTable>,
    executed: Vec<String>,
    queries: Vec<(String, Vec<String>)>,
    fail_statements: Option<String>,
    fail_queries: Option<String>,
    dry_run: bool,
}

impl MemoryExecutor {
    /// Creates an empty catalog for `schema`.
    #[must_use]
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Self::default()
        }
    }

    /// Sets the table prefix policy.
    #[must_use]
    pub fn with_prefix(mut self, prefix: TablePrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Enables dry-run mode (statements are recorded but not applied).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Makes every statement containing `pattern` fail.
    #[must_use]
    pub fn fail_statements_matching(mut self, pattern: impl Into<String>) -> Self {
        self.fail_statements = Some(pattern.into());
        self
    }

    /// Makes every query containing `pattern` fail.
    #[must_use]
    pub fn fail_queries_matching(mut self, pattern: impl Into<String>) -> Self {
        self.fail_queries = Some(pattern.into());
        self
    }

    /// Applies a statement without recording it.
    pub fn seed(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.apply(sql).map_err(sqlx::Error::Protocol)
    }

    /// Returns a table's simulated state.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    /// Returns all simulated tables.
    #[must_use]
    pub const fn tables(&self) -> &BTreeMap<String, MemoryTable> {
        &self.tables
    }

    /// Statements executed so far.
    #[must_use]
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Clears and returns the executed statements.
    pub fn take_executed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.executed)
    }

    /// Catalog queries run so far, with their arguments.
    #[must_use]
    pub fn queries(&self) -> &[(String, Vec<String>)] {
        &self.queries
    }

    fn apply(&mut self, sql: &str) -> Result<(), String> {
        let sql = sql.trim();
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let rest = rest.strip_prefix("IF NOT EXISTS ").unwrap_or(rest);
            let (name, rest) = identifier(rest)?;
            if self.tables.contains_key(&name) {
                return Ok(());
            }
            let table = create_table(rest)?;
            self.tables.insert(name, table);
            return Ok(());
        }

        let rest = sql
            .strip_prefix("ALTER TABLE ")
            .ok_or_else(|| format!("Unsupported statement: {sql}"))?;
        let (name, action) = identifier(rest)?;
        let table = self
            .tables
            .get(&name)
            .ok_or_else(|| format!("Table '{}.{name}' doesn't exist", self.schema))?;

        // MySQL applies an ALTER atomically; work on a copy.
        let mut altered = table.clone();
        alter_table(&mut altered, action.trim())?;
        altered.check_auto_increment()?;
        self.tables.insert(name, altered);
        Ok(())
    }

    fn catalog_rows(&self, sql: &str, args: &[&str]) -> Vec<CatalogRow> {
        let [schema, table] = args else {
            return Vec::new();
        };
        if *schema != self.schema {
            return Vec::new();
        }
        let Some(state) = self.tables.get(*table) else {
            return Vec::new();
        };

        if sql.contains("`TABLES`") {
            vec![vec![(*table).to_string()]]
        } else if sql.contains("`COLUMNS`") {
            state.columns.iter().map(|(n, _)| vec![n.clone()]).collect()
        } else if sql.contains("`TABLE_CONSTRAINTS`") {
            let mut rows = Vec::new();
            if state.primary_key.is_some() {
                rows.push(vec!["PRIMARY".to_string(), "PRIMARY KEY".to_string()]);
            }
            for name in state.uniques.keys() {
                rows.push(vec![name.clone(), "UNIQUE".to_string()]);
            }
            for name in state.foreign_keys.keys() {
                rows.push(vec![name.clone(), "FOREIGN KEY".to_string()]);
            }
            for name in state.checks.keys() {
                rows.push(vec![name.clone(), "CHECK".to_string()]);
            }
            rows
        } else if sql.contains("`STATISTICS`") {
            let mut rows = Vec::new();
            if state.primary_key.is_some() {
                rows.push(vec!["PRIMARY".to_string()]);
            }
            rows.extend(state.uniques.keys().map(|n| vec![n.clone()]));
            rows.extend(state.indexes.keys().map(|n| vec![n.clone()]));
            rows
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn query(
        &mut self,
        sql: &str,
        args: &[&str],
    ) -> std::result::Result<Vec<CatalogRow>, sqlx::Error> {
        self.queries.push((
            sql.to_string(),
            args.iter().map(ToString::to_string).collect(),
        ));
        if self.fail_queries.as_deref().is_some_and(|p| sql.contains(p)) {
            return Err(sqlx::Error::Protocol(format!(
                "injected query failure: {sql}"
            )));
        }
        Ok(self.catalog_rows(sql, args))
    }

    async fn exec(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        if self.fail_statements.as_deref().is_some_and(|p| sql.contains(p)) {
            return Err(sqlx::Error::Protocol(format!("injected failure: {sql}")));
        }
        if self.dry_run {
            warn!(sql = %sql, "Dry run, statement not executed");
        } else {
            self.apply(sql).map_err(sqlx::Error::Protocol)?;
        }
        self.executed.push(sql.to_string());
        Ok(0)
    }

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn apply_table_prefix(&self, name: &str) -> String {
        self.prefix.apply(name)
    }
}

fn create_table(body: &str) -> Result<MemoryTable, String> {
    let open = body.find('(').ok_or("CREATE TABLE without column list")?;
    let close = body.rfind(')').ok_or("CREATE TABLE without column list")?;
    let mut table = MemoryTable::default();
    for item in split_top_level(&body[open + 1..close]) {
        if let Some(rest) = item.strip_prefix("CONSTRAINT ") {
            let (name, rest) = identifier(rest)?;
            table.add_constraint(&name, rest.trim())?;
        } else if let Some(rest) = item.strip_prefix("INDEX ") {
            let (name, rest) = identifier(rest)?;
            table.add_index(&name, rest)?;
        } else if let Some(rest) = item.strip_prefix("PRIMARY KEY") {
            let (columns, _) = column_list(rest)?;
            table.set_primary_key(columns)?;
        } else {
            let (name, definition) = identifier(item)?;
            if table.column_index(&name).is_some() {
                return Err(format!("Duplicate column name '{name}'"));
            }
            table.set_column(name, definition)?;
        }
    }
    table.check_auto_increment()?;
    Ok(table)
}

fn alter_table(table: &mut MemoryTable, action: &str) -> Result<(), String> {
    if let Some(rest) = action.strip_prefix("ADD COLUMN ") {
        let (name, definition) = identifier(rest)?;
        if table.column_index(&name).is_some() {
            return Err(format!("Duplicate column name '{name}'"));
        }
        table.set_column(name, definition)
    } else if let Some(rest) = action.strip_prefix("MODIFY COLUMN ") {
        let (name, definition) = identifier(rest)?;
        if table.column_index(&name).is_none() {
            return Err(format!("Unknown column '{name}'"));
        }
        table.set_column(name, definition)
    } else if let Some(rest) = action.strip_prefix("DROP COLUMN ") {
        let (name, _) = identifier(rest)?;
        if table.column_index(&name).is_none() {
            return Err(format!("Can't DROP '{name}'; check that column/key exists"));
        }
        table.drop_column(&name);
        Ok(())
    } else if action == "DROP PRIMARY KEY" {
        table
            .primary_key
            .take()
            .map(|_| ())
            .ok_or_else(|| {
                "Can't DROP 'PRIMARY'; check that column/key exists".to_string()
            })
    } else if let Some(rest) = action.strip_prefix("DROP FOREIGN KEY ") {
        let (name, _) = identifier(rest)?;
        // The backing index survives the constraint.
        table
            .foreign_keys
            .remove(&name)
            .map(|_| ())
            .ok_or_else(|| format!("Can't DROP '{name}'; check that column/key exists"))
    } else if let Some(rest) = action.strip_prefix("DROP INDEX ") {
        let (name, _) = identifier(rest)?;
        if table.uniques.remove(&name).is_none() && table.indexes.remove(&name).is_none() {
            return Err(format!("Can't DROP '{name}'; check that column/key exists"));
        }
        Ok(())
    } else if let Some(rest) = action.strip_prefix("DROP CHECK ") {
        let (name, _) = identifier(rest)?;
        table
            .checks
            .remove(&name)
            .map(|_| ())
            .ok_or_else(|| format!("Check constraint '{name}' is not found in the table"))
    } else if let Some(rest) = action.strip_prefix("ADD PRIMARY KEY") {
        let (columns, _) = column_list(rest)?;
        table.set_primary_key(columns)
    } else if let Some(rest) = action.strip_prefix("ADD CONSTRAINT ") {
        let (name, body) = identifier(rest)?;
        table.add_constraint(&name, body.trim())
    } else if let Some(rest) = action.strip_prefix("ADD INDEX ") {
        let (name, rest) = identifier(rest)?;
        table.add_index(&name, rest)
    } else {
        Err(format!("Unsupported ALTER TABLE action: {action}"))
    }
}

/// Splits on commas outside parentheses and backticks.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '`' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                items.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(body[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Reads a backtick-quoted identifier, returning it and the remaining input.
fn identifier(input: &str) -> Result<(String, &str), String> {
    let input = input.trim_start();
    let rest = input
        .strip_prefix('`')
        .ok_or_else(|| format!("expected identifier at: {input}"))?;
    let end = rest
        .find('`')
        .ok_or_else(|| format!("unterminated identifier at: {input}"))?;
    Ok((rest[..end].to_string(), &rest[end + 1..]))
}

/// Reads a parenthesized identifier list, returning it and the remaining input.
fn column_list(input: &str) -> Result<(Vec<String>, &str), String> {
    let input = input.trim_start();
    let inner = input
        .strip_prefix('(')
        .ok_or_else(|| format!("expected column list at: {input}"))?;
    let end = inner
        .find(')')
        .ok_or_else(|| format!("unterminated column list at: {input}"))?;
    let columns = split_top_level(&inner[..end])
        .into_iter()
        .map(|item| identifier(item).map(|(name, _)| name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((columns, &inner[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryExecutor {
        let mut executor = MemoryExecutor::new("shop");
        executor
            .seed(
                "CREATE TABLE `t` (\n  `id` INT NOT NULL AUTO_INCREMENT,\n  \
                 `price` DOUBLE(10,2) NULL,\n  CONSTRAINT `pk` PRIMARY KEY (`id`)\n)",
            )
            .unwrap();
        executor
    }

    #[test]
    fn test_create_table() {
        let executor = seeded();
        let table = executor.table("t").unwrap();
        assert_eq!(
            table.columns,
            vec![
                ("id".to_string(), "INT NOT NULL AUTO_INCREMENT".to_string()),
                ("price".to_string(), "DOUBLE(10,2) NULL".to_string()),
            ]
        );
        assert_eq!(table.primary_key, Some(vec!["id".to_string()]));
    }

    #[tokio::test]
    async fn test_auto_increment_column_must_stay_keyed() {
        let mut executor = seeded();
        let err = executor
            .exec("ALTER TABLE `t` DROP PRIMARY KEY")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be defined as a key"));
        // The failed ALTER left the table untouched.
        assert!(executor.table("t").unwrap().primary_key.is_some());
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_single_primary_key() {
        let mut executor = seeded();
        let err = executor
            .exec("ALTER TABLE `t` MODIFY COLUMN `price` DOUBLE(10,2) NOT NULL PRIMARY KEY")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Multiple primary key defined"));
    }

    #[tokio::test]
    async fn test_foreign_key_keeps_backing_index() {
        let mut executor = seeded();
        executor
            .exec("ALTER TABLE `t` ADD COLUMN `owner` INT NULL")
            .await
            .unwrap();
        executor
            .exec(
                "ALTER TABLE `t` ADD CONSTRAINT `fk_owner` FOREIGN KEY (`owner`) \
                 REFERENCES `users` (`id`)",
            )
            .await
            .unwrap();
        executor
            .exec("ALTER TABLE `t` DROP FOREIGN KEY `fk_owner`")
            .await
            .unwrap();

        let table = executor.table("t").unwrap();
        assert!(table.foreign_keys.is_empty());
        assert_eq!(table.indexes.get("fk_owner"), Some(&vec!["owner".to_string()]));
    }

    #[tokio::test]
    async fn test_drop_column_shrinks_indexes() {
        let mut executor = seeded();
        executor
            .exec("ALTER TABLE `t` ADD INDEX `idx_price` (`price`)")
            .await
            .unwrap();
        executor
            .exec("ALTER TABLE `t` DROP COLUMN `price`")
            .await
            .unwrap();
        assert!(executor.table("t").unwrap().indexes.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let mut executor = seeded().fail_statements_matching("ADD INDEX");
        let err = executor
            .exec("ALTER TABLE `t` ADD INDEX `idx_price` (`price`)")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("injected failure"));
    }

    #[tokio::test]
    async fn test_dry_run_records_without_applying() {
        let mut executor = seeded().dry_run(true);
        let before = executor.tables().clone();

        let affected = executor
            .exec("ALTER TABLE `t` ADD INDEX `idx_price` (`price`)")
            .await
            .unwrap();

        assert_eq!(affected, 0);
        assert_eq!(executor.tables(), &before);
        assert_eq!(
            executor.executed(),
            ["ALTER TABLE `t` ADD INDEX `idx_price` (`price`)"]
        );
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("`a` DOUBLE(10,2), `b` INT, CHECK (a IN (1, 2))"),
            vec!["`a` DOUBLE(10,2)", "`b` INT", "CHECK (a IN (1, 2))"]
        );
    }
}
