//! Recognizes the statement shapes produced by `datactx-query`.
//!
//! Anything else is rejected as a malformed command.

use std::sync::OnceLock;

use datactx_core::{Error, ParamSet, Result, Value};
use regex::Regex;

/// A parsed statement with placeholders already resolved to values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        key_column: String,
        key: Value,
    },
    Delete {
        table: String,
        key_column: String,
        keys: Vec<Value>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        filter: Option<(String, Value)>,
    },
}

struct Patterns {
    insert: Regex,
    update: Regex,
    assignment: Regex,
    delete_eq: Regex,
    delete_in: Regex,
    select: Regex,
}

impl Patterns {
    fn compile() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            insert: Regex::new(r"^INSERT INTO ([\w.]+)\(([^)]*)\) VALUES \(([^)]*)\)$")?,
            update: Regex::new(r"^UPDATE ([\w.]+) SET (.+) WHERE (\w+) = (\S+)$")?,
            assignment: Regex::new(r"^(\w+) = (\S+)$")?,
            delete_eq: Regex::new(r"^DELETE FROM ([\w.]+) WHERE (\w+) = (\S+)$")?,
            delete_in: Regex::new(r"^DELETE FROM ([\w.]+) WHERE (\w+) IN \(([^)]*)\)$")?,
            select: Regex::new(r"^SELECT (.+?) FROM ([\w.]+)(?: WHERE (\w+) = (\S+))?$")?,
        })
    }
}

fn patterns() -> Result<&'static Patterns> {
    static PATTERNS: OnceLock<std::result::Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS
        .get_or_init(Patterns::compile)
        .as_ref()
        .map_err(|e| Error::backend(format!("statement patterns failed to compile: {e}")))
}

/// Split a batch on the statement separator.
pub(crate) fn split_batch(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn list(text: &str) -> Vec<&str> {
    text.split(',').map(str::trim).collect()
}

fn bound(params: &ParamSet, placeholder: &str) -> Result<Value> {
    params
        .get(placeholder)
        .cloned()
        .ok_or_else(|| Error::malformed(format!("placeholder {placeholder} is not bound")))
}

impl Statement {
    pub(crate) fn parse(sql: &str, params: &ParamSet) -> Result<Statement> {
        let p = patterns()?;

        if let Some(caps) = p.insert.captures(sql) {
            let columns: Vec<String> = list(&caps[2]).into_iter().map(String::from).collect();
            let values = list(&caps[3])
                .into_iter()
                .map(|ph| bound(params, ph))
                .collect::<Result<Vec<_>>>()?;
            if columns.len() != values.len() {
                return Err(Error::malformed(format!(
                    "INSERT lists {} columns but {} values",
                    columns.len(),
                    values.len()
                )));
            }
            return Ok(Statement::Insert {
                table: caps[1].to_string(),
                columns,
                values,
            });
        }

        if let Some(caps) = p.update.captures(sql) {
            let mut assignments = Vec::new();
            for part in caps[2].split(", ") {
                let assignment = p.assignment.captures(part).ok_or_else(|| {
                    Error::malformed(format!("unrecognized assignment `{part}`"))
                })?;
                assignments.push((assignment[1].to_string(), bound(params, &assignment[2])?));
            }
            return Ok(Statement::Update {
                table: caps[1].to_string(),
                assignments,
                key_column: caps[3].to_string(),
                key: bound(params, &caps[4])?,
            });
        }

        if let Some(caps) = p.delete_in.captures(sql) {
            let keys = list(&caps[3])
                .into_iter()
                .map(|ph| bound(params, ph))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Statement::Delete {
                table: caps[1].to_string(),
                key_column: caps[2].to_string(),
                keys,
            });
        }

        if let Some(caps) = p.delete_eq.captures(sql) {
            return Ok(Statement::Delete {
                table: caps[1].to_string(),
                key_column: caps[2].to_string(),
                keys: vec![bound(params, &caps[3])?],
            });
        }

        if let Some(caps) = p.select.captures(sql) {
            let filter = match (caps.get(3), caps.get(4)) {
                (Some(column), Some(ph)) => {
                    Some((column.as_str().to_string(), bound(params, ph.as_str())?))
                }
                _ => None,
            };
            return Ok(Statement::Select {
                table: caps[2].to_string(),
                columns: list(&caps[1]).into_iter().map(String::from).collect(),
                filter,
            });
        }

        Err(Error::malformed(format!("unrecognized statement `{sql}`")))
    }

    pub(crate) fn is_query(&self) -> bool {
        matches!(self, Statement::Select { .. })
    }
}
