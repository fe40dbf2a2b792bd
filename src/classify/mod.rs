//! Statement classification.
//!
//! Incoming text is matched against a small, ordered set of statement shapes. The first shape
//! that matches wins; anything else is rejected with
//! [`PartiqlDbError::InvalidStatement`] rather than forwarded to the backend.
//!
//! ```rust
//! use partiql_middleware::prelude::*;
//!
//! let parsed = classify(r#"SELECT id, name FROM "users" WHERE id = ?"#)?;
//! assert_eq!(parsed.kind(), StatementKind::Select);
//! assert_eq!(parsed.table_name(), Some("users"));
//! assert_eq!(parsed.selected_columns(), ["id", "name"]);
//! assert_eq!(parsed.placeholder_count(), 1);
//! # Ok::<(), PartiqlDbError>(())
//! ```

mod parsers;
mod scanner;

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::PartiqlDbError;

use parsers::{parse_column_list, trim_terminator, unquote};
use scanner::{count_placeholders, find_top_level_byte, is_balanced, keyword_positions};

/// Pseudo-table answering `DescribeTable` requests.
pub const DESCRIBE_TABLE_PSEUDO_TABLE: &str = "!pqxd_describe_table";
/// Pseudo-table answering `ListTables` requests.
pub const LIST_TABLES_PSEUDO_TABLE: &str = "!pqxd_list_tables";

const COLUMN: &str = r#"(?:"[a-zA-Z0-9_\-\.]{1,255}"|'[a-zA-Z0-9_\-\.]{1,255}'|[a-zA-Z0-9_\-\.]{1,255})"#;
const TABLE: &str = r#""[a-zA-Z0-9_\-\.]{3,255}""#;

fn column_list() -> String {
    format!(r"(?:\*|{COLUMN}(?:\s*,\s*{COLUMN})*)")
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => panic!("statement pattern failed to compile: {err}"),
    }
}

static RE_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?is)^\s*SELECT\s+(?P<columns>{cols})\s+FROM\s+(?P<table>{TABLE})(?:\.(?P<index>{TABLE}))?(?:\s+WHERE\s+(?P<condition>.*?))?\s*;?\s*$",
        cols = column_list()
    ))
});

static RE_RETURNING_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?is)^RETURNING\s+(?P<scope>ALL|MODIFIED)\s+(?P<image>OLD|NEW)\s+(?P<columns>{cols})\s*;?\s*$",
        cols = column_list()
    ))
});

static RE_RETURNING_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)^RETURNING\s+(?:ALL|MODIFIED)\b"));

static RE_INSERT: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?is)^\s*INSERT\s+INTO\s+(?P<table>{TABLE})\s+VALUE\s+(?P<value>\{{.*\}})\s*;?\s*$"
    ))
});

static RE_UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?is)^\s*UPDATE\s+(?P<table>{TABLE})\s+(?P<rest>(?:SET|REMOVE)\s.*)$"
    ))
});

static RE_DELETE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?is)^\s*DELETE\s+FROM\s+(?P<table>{TABLE})\s+WHERE\s+(?P<condition>.+?)\s*;?\s*$"
    ))
});

static RE_DESCRIBE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r#"(?is)^\s*SELECT\s+(?P<columns>{cols})\s+FROM\s+"{table}"\s+WHERE\s+table_name\s*=\s*(?:'(?P<name>[a-zA-Z0-9_\-\.]{{3,255}})'|(?P<placeholder>\?))\s*;?\s*$"#,
        cols = column_list(),
        table = regex::escape(DESCRIBE_TABLE_PSEUDO_TABLE)
    ))
});

static RE_LIST_TABLES: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r#"(?is)^\s*SELECT\s+\*\s+FROM\s+"{table}"\s*;?\s*$"#,
        table = regex::escape(LIST_TABLES_PSEUDO_TABLE)
    ))
});

/// The shape a statement was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    DescribeTable,
    ListTables,
}

impl StatementKind {
    /// True for the administrative pseudo-table queries.
    #[must_use]
    pub fn is_meta(self) -> bool {
        matches!(self, StatementKind::DescribeTable | StatementKind::ListTables)
    }

    /// True for statements that change data.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::DescribeTable => "DESCRIBE TABLE",
            StatementKind::ListTables => "LIST TABLES",
        };
        f.write_str(name)
    }
}

/// `ALL` or `MODIFIED` in a RETURNING clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningScope {
    All,
    Modified,
}

/// `OLD` or `NEW` in a RETURNING clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningImage {
    Old,
    New,
}

/// A parsed `RETURNING {ALL|MODIFIED} {OLD|NEW}` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Returning {
    pub scope: ReturningScope,
    pub image: ReturningImage,
}

impl fmt::Display for Returning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            ReturningScope::All => "ALL",
            ReturningScope::Modified => "MODIFIED",
        };
        let image = match self.image {
            ReturningImage::Old => "OLD",
            ReturningImage::New => "NEW",
        };
        write!(f, "RETURNING {scope} {image}")
    }
}

/// Immutable result of classifying one statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    kind: StatementKind,
    rewritten_text: String,
    selected_columns: Vec<String>,
    table_name: Option<String>,
    index_name: Option<String>,
    placeholder_count: usize,
    returning: Option<Returning>,
}

impl ParsedStatement {
    #[must_use]
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Text to forward to the backend. Differs from the input only when a RETURNING projection
    /// was rewritten to `*`.
    #[must_use]
    pub fn rewritten_text(&self) -> &str {
        &self.rewritten_text
    }

    /// Requested columns in order; empty means every attribute of the returned record.
    #[must_use]
    pub fn selected_columns(&self) -> &[String] {
        &self.selected_columns
    }

    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    #[must_use]
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// Number of positional `?` markers the statement expects to be bound.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholder_count
    }

    #[must_use]
    pub fn returning(&self) -> Option<Returning> {
        self.returning
    }

    /// True when executing the statement produces records for the caller.
    #[must_use]
    pub fn returns_rows(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Select | StatementKind::DescribeTable | StatementKind::ListTables
        ) || self.returning.is_some()
    }
}

/// Classify `sql` into a [`ParsedStatement`].
///
/// # Errors
/// Returns [`PartiqlDbError::InvalidStatement`] when the text matches none of the supported
/// shapes.
pub fn classify(sql: &str) -> Result<ParsedStatement, PartiqlDbError> {
    if let Some(caps) = RE_SELECT.captures(sql) {
        return Ok(select_from_captures(sql, &caps));
    }
    if let Some(parsed) = try_returning(sql)? {
        return Ok(parsed);
    }
    if let Some(parsed) = try_insert(sql)? {
        return Ok(parsed);
    }
    if let Some(parsed) = try_update(sql)? {
        return Ok(parsed);
    }
    if let Some(parsed) = try_delete(sql) {
        return Ok(parsed);
    }
    if let Some(parsed) = try_meta(sql) {
        return Ok(parsed);
    }
    Err(invalid(sql, "no supported statement shape matched"))
}

fn invalid(sql: &str, reason: &str) -> PartiqlDbError {
    PartiqlDbError::InvalidStatement(format!("{reason}: {}", sql.trim()))
}

fn select_from_captures(sql: &str, caps: &Captures<'_>) -> ParsedStatement {
    let condition = caps.name("condition").map_or("", |m| m.as_str());
    ParsedStatement {
        kind: StatementKind::Select,
        rewritten_text: sql.to_string(),
        selected_columns: parse_column_list(&caps["columns"]),
        table_name: Some(unquote(&caps["table"])),
        index_name: caps.name("index").map(|m| unquote(m.as_str())),
        placeholder_count: count_placeholders(condition),
        returning: None,
    }
}

/// A top-level `RETURNING` only opens the clause when a scope keyword follows; otherwise it is
/// an ordinary identifier.
fn try_returning(sql: &str) -> Result<Option<ParsedStatement>, PartiqlDbError> {
    let Some(start) = keyword_positions(sql, "RETURNING")
        .into_iter()
        .rev()
        .find(|&at| RE_RETURNING_SCOPE.is_match(&sql[at..]))
    else {
        return Ok(None);
    };
    let Some(caps) = RE_RETURNING_TAIL.captures(&sql[start..]) else {
        return Err(invalid(sql, "malformed RETURNING clause"));
    };

    let head = sql[..start].trim_end();
    let mut parsed = match try_update(head)? {
        Some(parsed) => parsed,
        None => try_delete(head).ok_or_else(|| {
            invalid(sql, "RETURNING is only supported on UPDATE and DELETE")
        })?,
    };

    let returning = Returning {
        scope: if caps["scope"].eq_ignore_ascii_case("ALL") {
            ReturningScope::All
        } else {
            ReturningScope::Modified
        },
        image: if caps["image"].eq_ignore_ascii_case("OLD") {
            ReturningImage::Old
        } else {
            ReturningImage::New
        },
    };
    parsed.rewritten_text = format!("{} {returning} *", trim_terminator(head));
    parsed.selected_columns = parse_column_list(&caps["columns"]);
    parsed.returning = Some(returning);
    Ok(Some(parsed))
}

fn try_insert(sql: &str) -> Result<Option<ParsedStatement>, PartiqlDbError> {
    let Some(caps) = RE_INSERT.captures(sql) else {
        return Ok(None);
    };
    let value = &caps["value"];
    if !is_balanced(value) {
        return Err(invalid(sql, "unbalanced VALUE literal"));
    }
    Ok(Some(ParsedStatement {
        kind: StatementKind::Insert,
        rewritten_text: sql.to_string(),
        selected_columns: Vec::new(),
        table_name: Some(unquote(&caps["table"])),
        index_name: None,
        placeholder_count: count_placeholders(value),
        returning: None,
    }))
}

fn try_update(sql: &str) -> Result<Option<ParsedStatement>, PartiqlDbError> {
    let Some(caps) = RE_UPDATE.captures(sql) else {
        return Ok(None);
    };
    let rest = caps.name("rest").map_or("", |m| m.as_str());
    let Some(&where_at) = keyword_positions(rest, "WHERE").first() else {
        return Ok(None);
    };
    let set_clause = &rest[..where_at];
    let condition = trim_terminator(&rest[where_at + "WHERE".len()..]);
    if condition.is_empty() {
        return Err(invalid(sql, "UPDATE requires a WHERE condition"));
    }
    validate_update_fragments(set_clause).map_err(|reason| invalid(sql, &reason))?;

    Ok(Some(ParsedStatement {
        kind: StatementKind::Update,
        rewritten_text: sql.to_string(),
        selected_columns: Vec::new(),
        table_name: Some(unquote(&caps["table"])),
        index_name: None,
        placeholder_count: count_placeholders(set_clause) + count_placeholders(condition),
        returning: None,
    }))
}

/// Check every `SET path = value` and `REMOVE path` fragment of an UPDATE.
fn validate_update_fragments(clause: &str) -> Result<(), String> {
    let mut starts: Vec<(usize, bool)> = keyword_positions(clause, "SET")
        .into_iter()
        .map(|at| (at, true))
        .chain(
            keyword_positions(clause, "REMOVE")
                .into_iter()
                .map(|at| (at, false)),
        )
        .collect();
    starts.sort_unstable();

    if starts.first().map(|(at, _)| *at) != Some(clause.len() - clause.trim_start().len()) {
        return Err("UPDATE must start with SET or REMOVE".into());
    }

    for (i, &(at, is_set)) in starts.iter().enumerate() {
        let keyword_len = if is_set { "SET".len() } else { "REMOVE".len() };
        let end = starts.get(i + 1).map_or(clause.len(), |(next, _)| *next);
        let fragment = clause[at + keyword_len..end].trim();
        if fragment.is_empty() {
            return Err("empty SET/REMOVE fragment".into());
        }
        if !is_balanced(fragment) {
            return Err(format!("unbalanced fragment `{fragment}`"));
        }
        match (is_set, find_top_level_byte(fragment, b'=')) {
            (true, Some(eq)) => {
                if fragment[..eq].trim().is_empty() || fragment[eq + 1..].trim().is_empty() {
                    return Err(format!("malformed SET fragment `{fragment}`"));
                }
            }
            (true, None) => return Err(format!("SET fragment without `=`: `{fragment}`")),
            (false, Some(_)) => return Err(format!("REMOVE takes a path only: `{fragment}`")),
            (false, None) => {}
        }
    }
    Ok(())
}

fn try_delete(sql: &str) -> Option<ParsedStatement> {
    let caps = RE_DELETE.captures(sql)?;
    let condition = &caps["condition"];
    Some(ParsedStatement {
        kind: StatementKind::Delete,
        rewritten_text: sql.to_string(),
        selected_columns: Vec::new(),
        table_name: Some(unquote(&caps["table"])),
        index_name: None,
        placeholder_count: count_placeholders(condition),
        returning: None,
    })
}

fn try_meta(sql: &str) -> Option<ParsedStatement> {
    if let Some(caps) = RE_DESCRIBE_TABLE.captures(sql) {
        let placeholder = caps.name("placeholder").is_some();
        return Some(ParsedStatement {
            kind: StatementKind::DescribeTable,
            rewritten_text: sql.to_string(),
            selected_columns: parse_column_list(&caps["columns"]),
            table_name: caps.name("name").map(|m| m.as_str().to_string()),
            index_name: None,
            placeholder_count: usize::from(placeholder),
            returning: None,
        });
    }
    if RE_LIST_TABLES.is_match(sql) {
        return Some(ParsedStatement {
            kind: StatementKind::ListTables,
            rewritten_text: sql.to_string(),
            selected_columns: Vec::new(),
            table_name: None,
            index_name: None,
            placeholder_count: 0,
            returning: None,
        });
    }
    None
}
