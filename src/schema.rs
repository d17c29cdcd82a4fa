/// Column and table schema definitions for the fixed-width row layout:
/// a 1-byte tombstone flag followed by each column's payload in schema
/// order. `Int` columns are 4-byte little-endian; `Char(n)` columns are
/// `n` bytes, null-padded.
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Char,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Char => "char",
        }
    }

    pub fn type_id(&self) -> u8 {
        match self {
            ColumnType::Int => 0,
            ColumnType::Char => 1,
        }
    }

    pub fn from_type_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(ColumnType::Int),
            1 => Some(ColumnType::Char),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    /// Byte width of the column payload: always 4 for `Int`, the declared
    /// `char(N)` width for `Char`.
    pub size: u32,
    /// Byte offset inside the row slot, starting at 1 (byte 0 is the
    /// tombstone flag).
    pub offset: u32,
    /// Only meaningful for `Int` columns: whether a B+Tree index exists
    /// over this column.
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn row_size(&self) -> u32 {
        1 + self.columns.iter().map(|c| c.size).sum::<u32>()
    }

    pub fn rows_per_page(&self) -> u32 {
        crate::pager::PAGE_SIZE as u32 / self.row_size()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.col_type == ColumnType::Int && c.indexed)
    }
}

/// A parsed, typed row value keyed by column name, produced by parsing
/// command-language tokens against a schema.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Str(_) => None,
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

pub type Row = HashMap<String, Value>;
