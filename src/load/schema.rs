//! Target table schemas as the loader sees them.
//!
//! Declared SQL types are read with MySQL meaning so that range and
//! length checks are well defined on top of SQLite's loose typing.

/// How values for a column are checked and coerced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    /// Integer family with its inclusive range
    Integer { min: i64, max: i64 },

    /// Floating point; FLOAT is single precision
    Real { single_precision: bool },

    /// Character data, length limit in characters
    Text { max_chars: Option<usize> },

    /// Declared type we do not interpret; values are stored as given
    Other,
}

impl ColumnType {
    /// Interpret a declared type such as `VARCHAR(32)` or `INT UNSIGNED`
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        let unsigned = upper.contains("UNSIGNED");

        let (head, args) = match upper.find('(') {
            Some(open) => {
                let close = upper[open..].find(')').map(|i| open + i).unwrap_or(upper.len());
                (&upper[..open], Some(upper[open + 1..close].trim()))
            }
            None => (upper.as_str(), None),
        };
        let length = args
            .and_then(|a| a.split(',').next())
            .and_then(|n| n.trim().parse::<usize>().ok());

        let base = head.split_whitespace().next().unwrap_or("");

        let int = |min: i64, max: i64, umax: i64| {
            if unsigned {
                Self::Integer { min: 0, max: umax }
            } else {
                Self::Integer { min, max }
            }
        };

        match base {
            "TINYINT" | "BOOL" | "BOOLEAN" => int(-128, 127, 255),
            "SMALLINT" => int(-32_768, 32_767, 65_535),
            "MEDIUMINT" => int(-8_388_608, 8_388_607, 16_777_215),
            "INT" | "INTEGER" => int(i32::MIN as i64, i32::MAX as i64, u32::MAX as i64),
            // Unsigned BIGINT is capped at what SQLite can store
            "BIGINT" => int(i64::MIN, i64::MAX, i64::MAX),
            "FLOAT" => Self::Real {
                single_precision: true,
            },
            "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC" | "FIXED" => Self::Real {
                single_precision: false,
            },
            "CHAR" | "CHARACTER" | "NCHAR" => Self::Text {
                max_chars: Some(length.unwrap_or(1)),
            },
            "VARCHAR" | "NVARCHAR" | "VARCHAR2" => Self::Text { max_chars: length },
            "TINYTEXT" => Self::Text {
                max_chars: Some(255),
            },
            "TEXT" => Self::Text {
                max_chars: Some(65_535),
            },
            "MEDIUMTEXT" => Self::Text {
                max_chars: Some(16_777_215),
            },
            "LONGTEXT" | "CLOB" => Self::Text { max_chars: None },
            _ => Self::Other,
        }
    }
}

/// One column of a target table
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,

    /// Type as declared in the DDL
    pub declared: String,

    pub ty: ColumnType,

    pub not_null: bool,

    pub has_default: bool,

    /// INTEGER PRIMARY KEY: filled in by the engine when omitted
    pub auto_increment: bool,
}

impl Column {
    /// Whether the engine can fill this column when a record omits it
    pub fn fills_itself(&self) -> bool {
        self.auto_increment || self.has_default || !self.not_null
    }
}

/// Column layout of a target table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Column by name, ignoring ASCII case like the engine does
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
