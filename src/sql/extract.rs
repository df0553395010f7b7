//! Isolating the statement text inside raw model output.
//!
//! Models wrap SQL in markdown fences, lead-in sentences and trailing
//! explanations. This module only cuts that framing away; it always returns a
//! sub-slice of its input so the accepted statement stays byte-for-byte what
//! the model produced. Classification is left to the validator.

use crate::sql::validator::{Rejection, RejectionKind};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::Dialect;
use sqlparser::keywords::ALL_KEYWORDS;
use sqlparser::parser::Parser;

const FENCE: &str = "```";

/// Words that open a SQL statement when they begin a line.
///
/// Excludes verbs that double as common English sentence openers; those are
/// in [`AMBIGUOUS_VERBS`].
pub(crate) const STATEMENT_VERBS: &[&str] = &[
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE",
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "CALL", "MERGE", "REPLACE", "UPSERT", "EXPLAIN",
    "DESCRIBE", "VACUUM", "COPY", "RENAME", "PREPARE", "DEALLOCATE", "HANDLER", "LOAD",
];

/// Statement verbs that also open English sentences. Recognised only at the
/// very start of the output, or on a lead-in line ending in `;`.
const AMBIGUOUS_VERBS: &[&str] = &[
    "SHOW", "SET", "USE", "TABLE", "DO", "VALUES", "LOCK", "UNLOCK", "BEGIN", "START", "COMMIT",
    "ROLLBACK", "ABORT", "END", "SAVEPOINT", "RELEASE", "LISTEN", "NOTIFY", "UNLISTEN", "DECLARE",
    "FETCH", "CLOSE", "DISCARD", "RESET", "CHECKPOINT", "CLUSTER", "REINDEX", "REFRESH", "COMMENT",
    "SECURITY", "ANALYZE", "OPTIMIZE", "REPAIR", "FLUSH", "KILL", "PURGE", "CHANGE", "INSTALL",
    "UNINSTALL", "IMPORT", "XA", "SHUTDOWN", "RESTART",
];

/// `Query: SELECT ...` on a single line of prose.
static COLON_VERB_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i):\s*((?:select|with|insert|update|delete|drop|alter|create|truncate|grant|revoke|exec|execute|call|merge)\b)",
    )
    .unwrap()
});

/// Cut the statement out of raw model output.
///
/// # Arguments
///
/// * `raw` - Untrusted model output
/// * `dialect` - Dialect used to tell a finished statement from prose
///
/// # Returns
///
/// Slice of `raw` starting at the statement verb, with fences, lead-in and
/// trailing commentary removed
///
/// # Errors
///
/// - `NoStatementFound` if no line or colon-introduced clause opens a statement
/// - `MultipleStatements` if text around the fenced block, a second fenced
///   block, the lead-in or a later paragraph holds another statement
pub fn isolate_statement<'a>(raw: &'a str, dialect: &dyn Dialect) -> Result<&'a str, Rejection> {
    let body = unfence(raw)?;

    let start = locate_start(body)
        .or_else(|| ambiguous_verb_start(body))
        .ok_or_else(|| {
            Rejection::new(
                RejectionKind::NoStatementFound,
                "model output does not contain a SQL statement",
            )
        })?;

    let lead_in = &body[..start];
    if lead_in.lines().any(terminated_ambiguous_statement) {
        return Err(Rejection::new(
            RejectionKind::MultipleStatements,
            "another statement precedes the query",
        ));
    }

    let statement = strip_trailing_prose(&body[start..])?;
    strip_prose_lines(statement, dialect)
}

/// Body of the first fenced block, or the whole text when unfenced.
fn unfence(raw: &str) -> Result<&str, Rejection> {
    let Some(open) = raw.find(FENCE) else {
        return Ok(raw);
    };

    if prose_has_statement(&raw[..open]) {
        return Err(Rejection::new(
            RejectionKind::MultipleStatements,
            "model output has a statement outside the fenced SQL block",
        ));
    }

    let after_open = &raw[open + FENCE.len()..];
    let after_info = &after_open[info_string_len(after_open)..];

    let (body, rest) = match after_info.find(FENCE) {
        Some(close) => (&after_info[..close], &after_info[close + FENCE.len()..]),
        None => (after_info, ""),
    };

    if later_fence_has_statement(rest) {
        return Err(Rejection::new(
            RejectionKind::MultipleStatements,
            "model output contains more than one fenced SQL block",
        ));
    }

    Ok(body)
}

/// Length of a fence info string line (```` ```sql\n ````), 0 when absent.
fn info_string_len(after_open: &str) -> usize {
    let Some(newline) = after_open.find('\n') else {
        return 0;
    };

    let info = after_open[..newline].trim();
    let is_tag = info
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if info.is_empty() || (is_tag && !is_statement_verb(info)) {
        newline + 1
    } else {
        0
    }
}

/// Whether unfenced text holds a statement: a line opening one, a
/// colon-introduced one, or one following a `;`.
fn prose_has_statement(text: &str) -> bool {
    text.lines().any(|line| opens_statement(line) || terminated_ambiguous_statement(line))
        || COLON_VERB_REGEX.is_match(text)
        || text
            .split(';')
            .skip(1)
            .any(|after| after.lines().next().is_some_and(opens_statement))
}

fn later_fence_has_statement(mut rest: &str) -> bool {
    // rest alternates: prose, fence body, prose, ...
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let after_info = &after_open[info_string_len(after_open)..];
        let (body, next) = match after_info.find(FENCE) {
            Some(close) => (&after_info[..close], &after_info[close + FENCE.len()..]),
            None => (after_info, ""),
        };

        if body.lines().any(opens_statement) {
            return true;
        }
        rest = next;
    }
    false
}

/// Byte offset of the first statement verb in `text`.
fn locate_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if opens_statement(trimmed) {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }

    COLON_VERB_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.start())
}

/// Whether a line begins a SQL statement.
///
/// Lead-in lines such as `Select the rows like this:` end with a colon and
/// are treated as prose.
pub(crate) fn opens_statement(line: &str) -> bool {
    let content = line.trim();
    if content.is_empty() || content.ends_with(':') {
        return false;
    }

    if content.starts_with('(') {
        let inner = content.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
        let word = first_word(inner);
        return word.eq_ignore_ascii_case("SELECT") || word.eq_ignore_ascii_case("WITH");
    }

    is_statement_verb(first_word(content))
}

fn is_statement_verb(word: &str) -> bool {
    STATEMENT_VERBS.iter().any(|verb| verb.eq_ignore_ascii_case(word))
}

fn is_ambiguous_verb(word: &str) -> bool {
    AMBIGUOUS_VERBS.iter().any(|verb| verb.eq_ignore_ascii_case(word))
}

/// Start of output that opens with an ambiguous verb (`SHOW TABLES`).
fn ambiguous_verb_start(text: &str) -> Option<usize> {
    let trimmed = text.trim_start();
    let first_line = trimmed.lines().next().unwrap_or_default().trim_end();
    if first_line.ends_with(':') || !is_ambiguous_verb(first_word(trimmed)) {
        return None;
    }
    Some(text.len() - trimmed.len())
}

/// `SET search_path = x;` and the like, as a line of its own.
fn terminated_ambiguous_statement(line: &str) -> bool {
    let content = line.trim();
    content.ends_with(';') && is_ambiguous_verb(first_word(content))
}

fn first_word(text: &str) -> &str {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

/// Drop commentary that follows the statement.
///
/// Paragraphs end at blank lines and after lines ending in `;`. The first
/// paragraph is the statement; later paragraphs continue it unless they read
/// as English (first word is not a SQL keyword and no line opens a
/// statement). Once commentary starts, a later paragraph that opens a
/// statement is rejected.
fn strip_trailing_prose(text: &str) -> Result<&str, Rejection> {
    let paragraphs = paragraphs(text);
    let mut statement_end = text.len();
    let mut in_commentary = false;

    for (index, &(start, end)) in paragraphs.iter().enumerate() {
        let paragraph = &text[start..end];

        if in_commentary {
            if paragraph.lines().any(opens_statement) {
                return Err(Rejection::new(
                    RejectionKind::MultipleStatements,
                    "another statement follows the commentary after the query",
                ));
            }
            continue;
        }

        if index > 0 && is_commentary(paragraph) {
            statement_end = paragraphs[index - 1].1;
            in_commentary = true;
        }
    }

    Ok(&text[..statement_end])
}

/// (start, end) byte ranges of non-blank paragraphs.
fn paragraphs(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim();
        if content.is_empty() {
            if let Some(s) = start.take() {
                ranges.push((s, end));
            }
        } else {
            let s = *start.get_or_insert(offset);
            end = offset + line.trim_end().len();
            if content.ends_with(';') {
                ranges.push((s, end));
                start = None;
            }
        }
        offset += line.len();
    }

    if let Some(s) = start {
        ranges.push((s, end));
    }
    ranges
}

/// Cut an explanation that follows the statement on the very next line.
///
/// A line is explanation when it reads as a sentence, the text before it
/// parses as one statement and the text including it does not parse.
fn strip_prose_lines<'a>(text: &'a str, dialect: &dyn Dialect) -> Result<&'a str, Rejection> {
    if Parser::parse_sql(dialect, text).is_ok() {
        return Ok(text);
    }

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if offset > 0 && is_sentence(line) && parses_as_one(dialect, &text[..offset]) {
            if text[offset..].lines().any(opens_statement) {
                return Err(Rejection::new(
                    RejectionKind::MultipleStatements,
                    "another statement follows the explanation after the query",
                ));
            }
            return Ok(text[..offset].trim_end());
        }
        offset += line.len();
    }
    Ok(text)
}

fn parses_as_one(dialect: &dyn Dialect, text: &str) -> bool {
    Parser::parse_sql(dialect, text).is_ok_and(|statements| statements.len() == 1)
}

/// Sentence-case first word followed by at least two more words.
fn is_sentence(line: &str) -> bool {
    let content = line.trim();
    let word = first_word(content);
    let mut chars = word.chars();
    let sentence_case = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && (word.len() == 1 || chars.any(|c| c.is_ascii_lowercase()));

    sentence_case && content.split_whitespace().count() >= 3 && !opens_statement(content)
}

fn is_commentary(paragraph: &str) -> bool {
    let content = paragraph.trim_start();
    if !content.starts_with(|c: char| c.is_alphabetic()) {
        return false;
    }

    let word = first_word(content).to_ascii_uppercase();
    if ALL_KEYWORDS.binary_search(&word.as_str()).is_ok() {
        return false;
    }

    !paragraph.lines().any(opens_statement)
}
