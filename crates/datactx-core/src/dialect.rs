//! Relational SQL dialects.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// A relational syntax profile.
///
/// The only syntax that differs between the supported dialects at this layer is
/// the parameter placeholder; statement text is otherwise shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// `@P0, @P1, ...`
    SqlServer,
    /// `$1, $2, ...` (1-based rendering of parameter indices)
    Postgres,
    /// `:P0, :P1, ...`
    Sqlite,
}

impl Dialect {
    /// Resolve a dialect from its numeric configuration code.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Dialect::SqlServer),
            1 => Ok(Dialect::Postgres),
            2 => Ok(Dialect::Sqlite),
            other => Err(Error::UnsupportedDialect(other.to_string())),
        }
    }

    /// Parse the textual form of a configuration code.
    pub fn parse_code(code: &str) -> Result<Self> {
        let parsed = code
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::UnsupportedDialect(code.to_string()))?;
        Self::from_code(parsed)
    }

    /// Numeric configuration code.
    pub const fn code(self) -> i64 {
        match self {
            Dialect::SqlServer => 0,
            Dialect::Postgres => 1,
            Dialect::Sqlite => 2,
        }
    }

    /// Placeholder text for the parameter at `index`.
    ///
    /// The placeholder text doubles as the parameter's name in a
    /// [`ParamSet`](crate::ParamSet).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::SqlServer => format!("@P{}", index),
            Dialect::Postgres => format!("${}", index + 1),
            Dialect::Sqlite => format!(":P{}", index),
        }
    }

    /// Separator between statements of a multi-statement batch.
    pub const fn batch_separator(self) -> &'static str {
        ";"
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::SqlServer => "sqlserver",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}
