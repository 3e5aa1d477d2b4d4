//! Logical type to SQL type mapping.
//!
//! Each dialect supplies a [`TypeTable`]; [`TypeTable::map`] applies the
//! shared rules (display widths, unsigned suffix, the VARCHAR/long text
//! threshold) so that a dialect only overrides tokens and constants.

use crate::error::UnsupportedType;
use crate::model::{Column, IntWidth, LogicalType};

/// SQL type tokens and limits of one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTable {
    /// Boolean type.
    pub boolean: &'static str,
    /// 8-bit integer.
    pub tiny_int: &'static str,
    /// 16-bit integer.
    pub small_int: &'static str,
    /// 32-bit integer.
    pub int: &'static str,
    /// 64-bit integer.
    pub big_int: &'static str,
    /// Suffix appended to unsigned integers.
    pub unsigned_suffix: &'static str,
    /// Floating point type, always emitted with precision and scale.
    pub float: &'static str,
    /// Bounded text type, emitted with the length.
    pub varchar: &'static str,
    /// Unbounded text type.
    pub long_text: &'static str,
    /// Lengths at or above this become `long_text`.
    pub varchar_limit: u32,
}

/// MySQL type table.
pub const MYSQL_TYPES: TypeTable = TypeTable {
    boolean: "BOOLEAN",
    tiny_int: "TINYINT",
    small_int: "SMALLINT",
    int: "INT",
    big_int: "BIGINT",
    unsigned_suffix: " UNSIGNED",
    float: "DOUBLE",
    varchar: "VARCHAR",
    long_text: "LONGTEXT",
    varchar_limit: 65533,
};

impl TypeTable {
    /// Maps a column's logical type to a SQL type token.
    pub fn map(&self, column: &Column) -> Result<String, UnsupportedType> {
        match &column.logical_type {
            LogicalType::Bool => Ok(self.boolean.to_string()),
            LogicalType::Int { width } => Ok(self.integer(*width, column.length, false)),
            LogicalType::Uint { width } => Ok(self.integer(*width, column.length, true)),
            LogicalType::Float { .. } => Ok(format!(
                "{}({},{})",
                self.float, column.length, column.scale
            )),
            LogicalType::String => Ok(self.text(column.length)),
            LogicalType::Sequence { element_bits: 8 | 32 } => Ok(self.text(column.length)),
            ty @ LogicalType::Sequence { .. } => Err(UnsupportedType {
                logical_type: ty.to_string(),
                reason: "only 8-bit and 32-bit element sequences are stored as text",
            }),
            ty @ LogicalType::Opaque { .. } => Err(UnsupportedType {
                logical_type: ty.to_string(),
                reason: "composite types are not mapped yet",
            }),
        }
    }

    fn integer(&self, width: IntWidth, length: u32, unsigned: bool) -> String {
        let mut sql = String::from(match width {
            IntWidth::W8 => self.tiny_int,
            IntWidth::W16 => self.small_int,
            IntWidth::W32 => self.int,
            IntWidth::W64 | IntWidth::Platform => self.big_int,
        });
        if length > 0 {
            sql.push_str(&format!("({length})"));
        }
        if unsigned {
            sql.push_str(self.unsigned_suffix);
        }
        sql
    }

    fn text(&self, length: u32) -> String {
        if length < self.varchar_limit {
            format!("{}({length})", self.varchar)
        } else {
            self.long_text.to_string()
        }
    }
}
