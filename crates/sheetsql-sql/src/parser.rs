use sheetsql_core::error::SheetSqlError;
use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum ParsedStatement {
    Native(Statement),
    /// DELETE text the parser rejected, re-read as `SELECT *` over the same
    /// source and WHERE clause.
    RewrittenDelete(Box<Query>),
}

pub fn parse_sql(sql: &str) -> Result<Vec<ParsedStatement>, SheetSqlError> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => Ok(statements.into_iter().map(ParsedStatement::Native).collect()),
        // retry statement by statement so a rewrite never spills into its neighbours
        Err(_) => split_statements(sql)
            .into_iter()
            .map(|text| parse_one(&dialect, text))
            .collect(),
    }
}

fn parse_one(dialect: &GenericDialect, text: &str) -> Result<ParsedStatement, SheetSqlError> {
    let err = match Parser::parse_sql(dialect, text) {
        Ok(mut statements) if statements.len() == 1 => {
            return Ok(ParsedStatement::Native(statements.remove(0)))
        }
        Ok(statements) => {
            return Err(SheetSqlError::ParseFailure(format!(
                "expected one statement, found {}",
                statements.len()
            )))
        }
        Err(err) => err,
    };
    let Some(rewritten) = rewrite_delete(text) else {
        return Err(SheetSqlError::ParseFailure(err.to_string()));
    };
    debug!("retrying DELETE as {rewritten}");
    let mut statements = Parser::parse_sql(dialect, &rewritten)
        .map_err(|_| SheetSqlError::ParseFailure(err.to_string()))?;
    match (statements.pop(), statements.is_empty()) {
        (Some(Statement::Query(query)), true) => Ok(ParsedStatement::RewrittenDelete(query)),
        _ => Err(SheetSqlError::ParseFailure(err.to_string())),
    }
}

/// Splits a batch on top-level `;`. Quoted text and `--` comments are
/// skipped; blank pieces are dropped.
fn split_statements(sql: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut chars = sql.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match (quote, in_comment, ch) {
            (_, true, '\n') => in_comment = false,
            (_, true, _) => {}
            (Some(q), _, c) if c == q => quote = None,
            (Some(_), _, _) => {}
            (None, _, '\'' | '"' | '`') => quote = Some(ch),
            (None, _, '-') if matches!(chars.peek(), Some((_, '-'))) => in_comment = true,
            (None, _, ';') => {
                pieces.push(&sql[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    pieces.push(&sql[start..]);
    pieces.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn rewrite_delete(sql: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"(?i)^\s*delete\b\s*\*?").ok())
        .as_ref()?;
    let found = re.find(sql)?;
    Some(format!("SELECT * {}", &sql[found.end()..]))
}

#[cfg(test)]
mod tests {
    use super::{parse_sql, rewrite_delete, split_statements, ParsedStatement};
    use sheetsql_core::error::SheetSqlError;

    #[test]
    fn native_statements_pass_through() {
        let parsed = parse_sql("SELECT * FROM Sheet1; DELETE FROM Sheet1").expect("parse");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|p| matches!(p, ParsedStatement::Native(_))));
    }

    #[test]
    fn rejected_delete_is_rewritten_as_select() {
        assert_eq!(
            rewrite_delete("delete * FROM t WHERE a = 1").as_deref(),
            Some("SELECT *  FROM t WHERE a = 1")
        );
        let parsed = parse_sql("DELETE * FROM Sheet1 WHERE State = 'Ohio'").expect("parse");
        assert!(matches!(parsed.as_slice(), [ParsedStatement::RewrittenDelete(_)]));
    }

    #[test]
    fn other_failures_propagate() {
        let err = parse_sql("SELEC nonsense").expect_err("should fail");
        assert!(matches!(err, SheetSqlError::ParseFailure(_)));
        assert_eq!(rewrite_delete("SELECT 1"), None);
        assert_eq!(rewrite_delete("deleted_rows"), None);
    }

    #[test]
    fn rewrite_applies_only_to_the_delete_in_a_batch() {
        let parsed = parse_sql("DELETE * FROM Sheet1 WHERE State = 'Ohio'; SELECT * FROM Sheet1")
            .expect("parse");
        assert!(matches!(
            parsed.as_slice(),
            [ParsedStatement::RewrittenDelete(_), ParsedStatement::Native(_)]
        ));

        let parsed = parse_sql("DELETE * FROM T; DELETE * FROM U;").expect("parse");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|p| matches!(p, ParsedStatement::RewrittenDelete(_))));

        let err = parse_sql("DELETE * FROM T; SELEC nonsense").expect_err("should fail");
        assert!(matches!(err, SheetSqlError::ParseFailure(_)));
    }

    #[test]
    fn batches_split_outside_quotes_and_comments() {
        assert_eq!(
            split_statements("SELECT ';' FROM \"a;b\"; -- x;y\nSELECT 1;  "),
            vec!["SELECT ';' FROM \"a;b\"", " -- x;y\nSELECT 1"]
        );
        assert_eq!(split_statements("SELECT 'it''s; fine'"), vec!["SELECT 'it''s; fine'"]);
    }
}
