//! Read-only statement validator.
//!
//! Turns untrusted model output into a `ValidatedQuery` or a `Rejection`.
//! Checks run on sqlparser tokens for the configured dialect, so keywords
//! inside string literals, quoted identifiers and comments never trip them,
//! and then on the parsed AST. Anything the parser cannot read is rejected.

use crate::db::DatabaseKind;
use crate::sql::extract;
use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::Dialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Token, TokenWithLocation, Tokenizer, Whitespace};
use std::fmt;
use thiserror::Error;

/// Keywords that must not appear anywhere in a read-only statement.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE", "CALL", "MERGE", "UPSERT", "RENAME", "COPY", "INTO",
];

/// Functions with side effects (sleep, file access, locks, sequences) or that
/// run SQL handed to them as a string.
const SIDE_EFFECT_FUNCTIONS: &[&str] = &[
    "pg_sleep",
    "pg_sleep_for",
    "pg_sleep_until",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
    "pg_rotate_logfile",
    "pg_read_file",
    "pg_read_binary_file",
    "pg_ls_dir",
    "pg_stat_file",
    "pg_notify",
    "pg_advisory_lock",
    "pg_advisory_lock_shared",
    "pg_advisory_xact_lock",
    "pg_advisory_xact_lock_shared",
    "pg_try_advisory_lock",
    "pg_try_advisory_lock_shared",
    "pg_try_advisory_xact_lock",
    "pg_try_advisory_xact_lock_shared",
    "query_to_xml",
    "query_to_xmlschema",
    "query_to_xml_and_xmlschema",
    "cursor_to_xml",
    "cursor_to_xmlschema",
    "lo_import",
    "lo_export",
    "lo_unlink",
    "lo_put",
    "lo_create",
    "lo_creat",
    "lo_from_bytea",
    "dblink",
    "dblink_exec",
    "set_config",
    "nextval",
    "setval",
    "sleep",
    "benchmark",
    "load_file",
    "get_lock",
    "release_lock",
    "release_all_locks",
];

/// Why model output was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    NoStatementFound,
    MultipleStatements,
    ForbiddenStatement,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoStatementFound => "no statement found",
            Self::MultipleStatements => "multiple statements",
            Self::ForbiddenStatement => "forbidden statement",
        };
        f.write_str(text)
    }
}

/// Validator verdict for rejected output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct Rejection {
    pub kind: RejectionKind,
    pub detail: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Statement class of an accepted query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
}

/// A single read-only statement, safe to hand to the executor.
///
/// Constructed only by [`SqlValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql_text: String,
    statement_kind: StatementKind,
}

impl ValidatedQuery {
    /// Statement text without trailing semicolon or surrounding whitespace.
    pub fn sql_text(&self) -> &str {
        &self.sql_text
    }

    pub fn statement_kind(&self) -> StatementKind {
        self.statement_kind
    }
}

impl fmt::Display for ValidatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_text)
    }
}

pub type Verdict = std::result::Result<ValidatedQuery, Rejection>;

/// Validator for one SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlValidator {
    database: DatabaseKind,
}

impl SqlValidator {
    pub fn new(database: DatabaseKind) -> Self {
        Self { database }
    }

    pub fn database(&self) -> DatabaseKind {
        self.database
    }

    /// Validate raw model output.
    ///
    /// Pure and deterministic: the same input always yields the same verdict,
    /// and validating an accepted `sql_text` again accepts it unchanged.
    ///
    /// # Arguments
    ///
    /// * `raw` - Untrusted model output
    ///
    /// # Returns
    ///
    /// `ValidatedQuery` holding exactly one SELECT statement
    ///
    /// # Errors
    ///
    /// - `NoStatementFound` if no statement can be located, tokenized or parsed
    /// - `MultipleStatements` if anything beyond one statement follows
    /// - `ForbiddenStatement` if the statement is not a pure read
    pub fn validate(&self, raw: &str) -> Verdict {
        let dialect = self.database.sql_dialect();
        let text = extract::isolate_statement(raw, dialect.as_ref())?;

        let tokens = Tokenizer::new(dialect.as_ref(), text)
            .tokenize_with_location()
            .map_err(|e| {
                Rejection::new(
                    RejectionKind::NoStatementFound,
                    format!("statement could not be tokenized: {e}"),
                )
            })?;

        let terminator = tokens
            .iter()
            .position(|t| matches!(t.token, Token::SemiColon));

        let (statement, sql_end) = match terminator {
            Some(index) => {
                check_trailing(&tokens[index + 1..])?;
                let end = byte_offset(text, &tokens[index].location).unwrap_or(text.len());
                (&tokens[..index], end)
            }
            None => (&tokens[..], text.len()),
        };

        check_leading_verb(statement)?;
        check_tokens(self.database, statement)?;

        let sql_text = text[..sql_end].trim();
        check_parse(dialect.as_ref(), sql_text)?;

        Ok(ValidatedQuery {
            sql_text: sql_text.to_string(),
            statement_kind: StatementKind::Select,
        })
    }
}

/// Only whitespace, empty comments and extra semicolons may follow the
/// terminating semicolon.
fn check_trailing(rest: &[TokenWithLocation]) -> Result<(), Rejection> {
    for t in rest {
        match &t.token {
            Token::Whitespace(Whitespace::SingleLineComment { comment, .. })
            | Token::Whitespace(Whitespace::MultiLineComment(comment)) => {
                if !comment.trim().is_empty() {
                    return Err(Rejection::new(
                        RejectionKind::MultipleStatements,
                        "comment after the terminating semicolon",
                    ));
                }
            }
            Token::Whitespace(_) | Token::SemiColon | Token::EOF => {}
            other => {
                return Err(Rejection::new(
                    RejectionKind::MultipleStatements,
                    format!("further input after the terminating semicolon, starting at `{other}`"),
                ));
            }
        }
    }
    Ok(())
}

fn check_leading_verb(tokens: &[TokenWithLocation]) -> Result<(), Rejection> {
    let leading = tokens
        .iter()
        .map(|t| &t.token)
        .find(|t| !matches!(t, Token::Whitespace(_) | Token::LParen | Token::EOF));

    match leading {
        None => Err(Rejection::new(
            RejectionKind::NoStatementFound,
            "statement is empty",
        )),
        Some(Token::Word(w))
            if w.quote_style.is_none()
                && (w.value.eq_ignore_ascii_case("SELECT")
                    || w.value.eq_ignore_ascii_case("WITH")) =>
        {
            Ok(())
        }
        Some(Token::Word(w)) => Err(Rejection::new(
            RejectionKind::ForbiddenStatement,
            format!(
                "{} statements are not permitted; only SELECT is allowed",
                w.value.to_uppercase()
            ),
        )),
        Some(other) => Err(Rejection::new(
            RejectionKind::ForbiddenStatement,
            format!("statement starts with `{other}`; only SELECT is allowed"),
        )),
    }
}

fn check_tokens(database: DatabaseKind, tokens: &[TokenWithLocation]) -> Result<(), Rejection> {
    for (index, t) in tokens.iter().enumerate() {
        match &t.token {
            // MySQL needs whitespace after `--`; `--;x` is two minus signs
            Token::Whitespace(Whitespace::SingleLineComment { comment, prefix })
                if database == DatabaseKind::MySql
                    && prefix == "--"
                    && !comment.starts_with(char::is_whitespace) =>
            {
                return Err(Rejection::new(
                    RejectionKind::MultipleStatements,
                    "`--` comment without a following space is not a comment in MySQL",
                ));
            }
            Token::Whitespace(Whitespace::SingleLineComment { comment, .. })
            | Token::Whitespace(Whitespace::MultiLineComment(comment))
                if comment.contains(';') =>
            {
                return Err(Rejection::new(
                    RejectionKind::MultipleStatements,
                    "comment inside the statement contains a semicolon",
                ));
            }
            // MySQL runs /*! ... */ bodies as code
            Token::Whitespace(Whitespace::MultiLineComment(body))
                if body.starts_with('!') || body.contains("/*") =>
            {
                return Err(Rejection::new(
                    RejectionKind::ForbiddenStatement,
                    "executable or nested comments are not permitted",
                ));
            }
            Token::Word(w) if w.quote_style.is_none() => {
                let upper = w.value.to_ascii_uppercase();
                if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
                    return Err(Rejection::new(
                        RejectionKind::ForbiddenStatement,
                        format!("keyword {upper} is not permitted in a read-only query"),
                    ));
                }

                let is_side_effect = SIDE_EFFECT_FUNCTIONS
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&w.value));
                if is_side_effect && next_is_call(&tokens[index + 1..]) {
                    return Err(Rejection::new(
                        RejectionKind::ForbiddenStatement,
                        format!("function {} has side effects", w.value),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn next_is_call(rest: &[TokenWithLocation]) -> bool {
    rest.iter()
        .map(|t| &t.token)
        .find(|t| !matches!(t, Token::Whitespace(_)))
        .is_some_and(|t| matches!(t, Token::LParen))
}

fn check_parse(dialect: &dyn Dialect, sql_text: &str) -> Result<(), Rejection> {
    let statements = Parser::parse_sql(dialect, sql_text).map_err(|e| {
        Rejection::new(
            RejectionKind::NoStatementFound,
            format!("statement could not be parsed: {e}"),
        )
    })?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err(Rejection::new(
            RejectionKind::NoStatementFound,
            "statement is empty",
        )),
        [_] => Err(Rejection::new(
            RejectionKind::ForbiddenStatement,
            "only SELECT queries are permitted",
        )),
        _ => Err(Rejection::new(
            RejectionKind::MultipleStatements,
            format!("found {} statements, expected one", statements.len()),
        )),
    }
}

/// Byte offset of a tokenizer location (1-based line and char column).
fn byte_offset(text: &str, location: &Location) -> Option<usize> {
    let mut line = 1u64;
    let mut column = 1u64;

    for (offset, ch) in text.char_indices() {
        if line == location.line && column == location.column {
            return Some(offset);
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    None
}
