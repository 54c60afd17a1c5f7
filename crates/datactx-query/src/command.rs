//! A command ready for execution.

use datactx_core::{Dialect, Error, ParamSet, Result};

/// Command text plus the parameters its placeholders name.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    sql: String,
    params: ParamSet,
}

impl Command {
    pub fn new(sql: impl Into<String>, params: ParamSet) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn dialect(&self) -> Dialect {
        self.params.dialect()
    }

    pub fn into_parts(self) -> (String, ParamSet) {
        (self.sql, self.params)
    }

    /// Join several commands into one multi-statement batch.
    ///
    /// Statements are separated by the dialect's batch separator and the
    /// parameter sets are concatenated. The commands must have been built at
    /// disjoint parameter offsets; a reused placeholder is rejected as
    /// `MalformedCommand`, as is an empty batch.
    pub fn batch(commands: Vec<Command>) -> Result<Command> {
        let mut iter = commands.into_iter();
        let Some(first) = iter.next() else {
            return Err(Error::malformed("batch contains no statements"));
        };

        let separator = first.dialect().batch_separator();
        let (mut sql, mut params) = first.into_parts();
        for command in iter {
            params.append(command.params)?;
            sql.push_str(separator);
            sql.push_str(&command.sql);
        }

        Ok(Command { sql, params })
    }
}
