//! Declarative table models.
//!
//! A [`Model`] describes what a table should look like. It is built by the
//! caller (in code or from a JSON model file) and handed to the reconciler,
//! which never mutates it.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{ReconcileError, Result};

/// Width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntWidth {
    /// 8-bit.
    #[serde(rename = "8")]
    W8,
    /// 16-bit.
    #[serde(rename = "16")]
    W16,
    /// 32-bit.
    #[serde(rename = "32")]
    W32,
    /// 64-bit.
    #[serde(rename = "64")]
    W64,
    /// Platform-sized integer, mapped as 64-bit.
    #[serde(rename = "platform")]
    Platform,
}

impl IntWidth {
    fn suffix(self) -> &'static str {
        match self {
            Self::W8 => "8",
            Self::W16 => "16",
            Self::W32 => "32",
            Self::W64 => "64",
            Self::Platform => "size",
        }
    }
}

/// Width of a floating point column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatWidth {
    /// Single precision.
    #[serde(rename = "32")]
    W32,
    /// Double precision.
    #[serde(rename = "64")]
    W64,
}

/// Logical (database independent) type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogicalType {
    /// Boolean.
    Bool,
    /// Signed integer.
    Int {
        /// Integer width.
        width: IntWidth,
    },
    /// Unsigned integer.
    Uint {
        /// Integer width.
        width: IntWidth,
    },
    /// Floating point.
    Float {
        /// Float width.
        width: FloatWidth,
    },
    /// Text.
    String,
    /// Sequence of fixed-width code units (bytes, runes).
    Sequence {
        /// Width of one element in bits.
        element_bits: u8,
    },
    /// Composite value such as a timestamp or nullable wrapper.
    Opaque {
        /// Name of the wrapped type.
        name: String,
    },
}

impl LogicalType {
    /// Signed integer of the given width.
    #[must_use]
    pub const fn int(width: IntWidth) -> Self {
        Self::Int { width }
    }

    /// Unsigned integer of the given width.
    #[must_use]
    pub const fn uint(width: IntWidth) -> Self {
        Self::Uint { width }
    }

    /// Floating point of the given width.
    #[must_use]
    pub const fn float(width: FloatWidth) -> Self {
        Self::Float { width }
    }

    /// Byte sequence.
    #[must_use]
    pub const fn bytes() -> Self {
        Self::Sequence { element_bits: 8 }
    }

    /// Rune (32-bit code point) sequence.
    #[must_use]
    pub const fn runes() -> Self {
        Self::Sequence { element_bits: 32 }
    }

    /// Opaque composite type.
    #[must_use]
    pub fn opaque(name: impl Into<String>) -> Self {
        Self::Opaque { name: name.into() }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int { width } => write!(f, "int{}", width.suffix()),
            Self::Uint { width } => write!(f, "uint{}", width.suffix()),
            Self::Float {
                width: FloatWidth::W32,
            } => f.write_str("float32"),
            Self::Float {
                width: FloatWidth::W64,
            } => f.write_str("float64"),
            Self::String => f.write_str("string"),
            Self::Sequence { element_bits } => write!(f, "sequence<u{element_bits}>"),
            Self::Opaque { name } => write!(f, "opaque({name})"),
        }
    }
}

const fn default_nullable() -> bool {
    true
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    /// Precision, maximum length or display width (0 = unspecified).
    #[serde(default)]
    pub length: u32,
    /// Scale, meaningful for floats only.
    #[serde(default)]
    pub scale: u32,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column auto-increments.
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    /// Creates a new nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            length: 0,
            scale: 0,
            nullable: true,
            auto_increment: false,
        }
    }

    /// Sets the length (precision, max length or display width).
    #[must_use]
    pub const fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    /// Sets the scale.
    #[must_use]
    pub const fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.nullable = false;
        self
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict.
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A named unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIndex {
    /// Constraint name.
    pub name: String,
    /// Columns, in index order.
    pub columns: Vec<String>,
}

/// A named secondary index without constraint semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIndex {
    /// Index name.
    pub name: String,
    /// Columns, in index order.
    pub columns: Vec<String>,
}

/// A named foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns.
    pub references_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKey {
    /// Creates a foreign key without referential actions.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        references_table: impl Into<String>,
        references_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            references_table: references_table.into(),
            references_columns,
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// A named CHECK constraint with a raw SQL predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// SQL predicate.
    pub expression: String,
}

/// Auto-increment assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoIncrement {
    /// The auto-increment column.
    pub column: String,
    /// First value handed out.
    #[serde(default = "AutoIncrement::default_start")]
    pub start: u64,
}

impl AutoIncrement {
    const fn default_start() -> u64 {
        1
    }
}

/// Declarative description of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Table name. May contain the `#` prefix placeholder.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Primary key columns.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Unique constraints.
    #[serde(default)]
    pub unique_indexes: Vec<UniqueIndex>,
    /// Plain secondary indexes.
    #[serde(default)]
    pub key_indexes: Vec<KeyIndex>,
    /// Foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// CHECK constraints.
    #[serde(default)]
    pub checks: Vec<CheckConstraint>,
    /// Auto-increment assignment.
    #[serde(default)]
    pub auto_increment: Option<AutoIncrement>,
}

impl Model {
    /// Creates an empty model for the given table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique_indexes: Vec::new(),
            key_indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            auto_increment: None,
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.unique_indexes.push(UniqueIndex {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a key index.
    #[must_use]
    pub fn key_index<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.key_indexes.push(KeyIndex {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a CHECK constraint.
    #[must_use]
    pub fn check(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.checks.push(CheckConstraint {
            name: name.into(),
            expression: expression.into(),
        });
        self
    }

    /// Assigns auto-increment to a column, starting at `start`.
    #[must_use]
    pub fn auto_increment(mut self, column: impl Into<String>, start: u64) -> Self {
        let column = column.into();
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == column) {
            col.auto_increment = true;
            col.nullable = false;
        }
        self.auto_increment = Some(AutoIncrement { column, start });
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the effective auto-increment assignment.
    ///
    /// A column flagged `auto_increment` without an explicit assignment
    /// counts as one starting at 1.
    #[must_use]
    pub fn auto_increment_spec(&self) -> Option<AutoIncrement> {
        self.auto_increment.clone().or_else(|| {
            self.columns
                .iter()
                .find(|c| c.auto_increment)
                .map(|c| AutoIncrement {
                    column: c.name.clone(),
                    start: 1,
                })
        })
    }

    /// Whether the named column is the auto-increment column.
    #[must_use]
    pub fn is_auto_increment(&self, column: &str) -> bool {
        self.auto_increment_spec()
            .is_some_and(|ai| ai.column == column)
    }

    /// Primary key used when creating the table.
    ///
    /// Falls back to the auto-increment column, which MySQL requires to be
    /// a key.
    #[must_use]
    pub fn effective_primary_key(&self) -> Vec<String> {
        if !self.primary_key.is_empty() {
            return self.primary_key.clone();
        }
        self.auto_increment_spec()
            .map(|ai| vec![ai.column])
            .unwrap_or_default()
    }

    /// Returns a copy with the table name and every referenced table name
    /// passed through `rewrite`.
    #[must_use]
    pub fn with_table_prefix(&self, rewrite: impl Fn(&str) -> String) -> Self {
        let mut model = self.clone();
        model.name = rewrite(&self.name);
        for fk in &mut model.foreign_keys {
            fk.references_table = rewrite(&fk.references_table);
        }
        model
    }

    /// Checks the model's invariants and that every column type maps in
    /// `dialect`. Performs no I/O.
    pub fn validate(&self, dialect: &dyn Dialect) -> Result<()> {
        let table = self.name.as_str();
        if table.is_empty() {
            return Err(ReconcileError::invalid(table, "table name is empty"));
        }
        if self.columns.is_empty() {
            return Err(ReconcileError::invalid(table, "model declares no columns"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ReconcileError::invalid(
                    table,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            dialect
                .map_type(column)
                .map_err(|source| ReconcileError::UnsupportedType {
                    table: table.to_string(),
                    column: column.name.clone(),
                    source,
                })?;
        }

        self.check_columns("primary key", &self.primary_key, true)?;
        let mut names = HashSet::new();
        for index in &self.unique_indexes {
            self.check_columns(&index.name, &index.columns, false)?;
            self.check_name(&mut names, &index.name)?;
        }
        for index in &self.key_indexes {
            self.check_columns(&index.name, &index.columns, false)?;
            self.check_name(&mut names, &index.name)?;
        }
        for fk in &self.foreign_keys {
            self.check_columns(&fk.name, &fk.columns, false)?;
            self.check_name(&mut names, &fk.name)?;
            if fk.references_table.is_empty() {
                return Err(ReconcileError::invalid(
                    table,
                    format!("foreign key '{}' references no table", fk.name),
                ));
            }
            if fk.references_columns.len() != fk.columns.len() {
                return Err(ReconcileError::invalid(
                    table,
                    format!(
                        "foreign key '{}' maps {} columns onto {}",
                        fk.name,
                        fk.columns.len(),
                        fk.references_columns.len()
                    ),
                ));
            }
        }
        for check in &self.checks {
            self.check_name(&mut names, &check.name)?;
            if check.expression.trim().is_empty() {
                return Err(ReconcileError::invalid(
                    table,
                    format!("check '{}' has an empty expression", check.name),
                ));
            }
        }

        self.check_auto_increment()
    }

    fn check_columns(&self, owner: &str, columns: &[String], allow_empty: bool) -> Result<()> {
        if columns.is_empty() && !allow_empty {
            return Err(ReconcileError::invalid(
                &self.name,
                format!("'{owner}' lists no columns"),
            ));
        }
        if let Some(missing) = columns.iter().find(|c| self.get_column(c).is_none()) {
            return Err(ReconcileError::invalid(
                &self.name,
                format!("'{owner}' references unknown column '{missing}'"),
            ));
        }
        Ok(())
    }

    fn check_name<'a>(&self, names: &mut HashSet<&'a str>, name: &'a str) -> Result<()> {
        if name.is_empty() {
            return Err(ReconcileError::invalid(
                &self.name,
                "unnamed index or constraint",
            ));
        }
        if !names.insert(name) {
            return Err(ReconcileError::invalid(
                &self.name,
                format!("index or constraint name '{name}' used twice"),
            ));
        }
        Ok(())
    }

    fn check_auto_increment(&self) -> Result<()> {
        let flagged: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.auto_increment)
            .map(|c| c.name.as_str())
            .collect();
        if flagged.len() > 1 {
            return Err(ReconcileError::invalid(
                &self.name,
                format!(
                    "more than one auto-increment column: {}",
                    flagged.join(", ")
                ),
            ));
        }

        let Some(ai) = self.auto_increment_spec() else {
            return Ok(());
        };
        if self.get_column(&ai.column).is_none() {
            return Err(ReconcileError::invalid(
                &self.name,
                format!("auto-increment references unknown column '{}'", ai.column),
            ));
        }
        if let Some(other) = flagged.iter().find(|c| **c != ai.column) {
            return Err(ReconcileError::invalid(
                &self.name,
                format!(
                    "column '{other}' is flagged auto-increment but '{}' is assigned",
                    ai.column
                ),
            ));
        }
        if !self.primary_key.is_empty() && self.primary_key != [ai.column.as_str()] {
            // The auto-increment column is promoted to the sole primary key.
            return Err(ReconcileError::invalid(
                &self.name,
                format!(
                    "primary key ({}) must be exactly the auto-increment column '{}'",
                    self.primary_key.join(", "),
                    ai.column
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelFile {
    Many(Vec<Model>),
    One(Model),
}

/// Loads the models stored in a JSON file.
///
/// The file holds either a single model object or an array of them.
pub fn load_models(path: impl AsRef<Path>) -> Result<Vec<Model>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let file: ModelFile =
        serde_json::from_str(&contents).map_err(|source| ReconcileError::ModelFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match file {
        ModelFile::Many(models) => models,
        ModelFile::One(model) => vec![model],
    })
}
