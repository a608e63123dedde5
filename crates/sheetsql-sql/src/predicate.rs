use crate::planner::{BinaryOp, Expr};
use regex::Regex;
use sheetsql_core::types::{Row, ScalarValue};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Evaluates WHERE trees against row mappings. Compiled LIKE patterns are
/// cached for the lifetime of the evaluator.
#[derive(Debug, Default)]
pub struct PredicateEvaluator {
    like_cache: HashMap<String, Option<Regex>>,
}

impl PredicateEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` matches every row. Only a binary expression that evaluates to
    /// `true` matches; any other node never does.
    pub fn matches(&mut self, where_clause: Option<&Expr>, row: &Row) -> bool {
        match where_clause {
            None => true,
            Some(expr @ Expr::Binary { .. }) => self.evaluate(expr, row) == ScalarValue::Boolean(true),
            Some(_) => false,
        }
    }

    pub fn evaluate(&mut self, expr: &Expr, row: &Row) -> ScalarValue {
        match expr {
            Expr::Column(name) => row.get(name).cloned().unwrap_or_default(),
            Expr::Literal(value) => value.clone(),
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left, row);
                let right = self.evaluate(right, row);
                ScalarValue::Boolean(self.apply(*op, &left, &right))
            }
            Expr::Aggregate { .. } | Expr::Unsupported(_) => ScalarValue::Empty,
        }
    }

    fn apply(&mut self, op: BinaryOp, left: &ScalarValue, right: &ScalarValue) -> bool {
        match op {
            BinaryOp::Eq => left.loose_eq(right),
            BinaryOp::NotEq => !left.loose_eq(right),
            BinaryOp::Lt => left.loose_cmp(right) == Some(Ordering::Less),
            BinaryOp::LtEq => matches!(left.loose_cmp(right), Some(Ordering::Less | Ordering::Equal)),
            BinaryOp::Gt => left.loose_cmp(right) == Some(Ordering::Greater),
            BinaryOp::GtEq => matches!(
                left.loose_cmp(right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            BinaryOp::And => left.is_truthy() && right.is_truthy(),
            BinaryOp::Or => left.is_truthy() || right.is_truthy(),
            BinaryOp::Is => left.strict_eq(right),
            BinaryOp::IsNot => !left.strict_eq(right),
            BinaryOp::Like => self.like(left, right) == Some(true),
            BinaryOp::NotLike => self.like(left, right) == Some(false),
        }
    }

    /// `None` when either side is empty: neither LIKE nor NOT LIKE match.
    fn like(&mut self, candidate: &ScalarValue, pattern: &ScalarValue) -> Option<bool> {
        if candidate.is_empty() || pattern.is_empty() {
            return None;
        }
        let pattern = pattern.to_string();
        let re = self
            .like_cache
            .entry(pattern)
            .or_insert_with_key(|p| Regex::new(&like_to_regex(p)).ok())
            .as_ref()?;
        Some(re.is_match(&candidate.to_string()))
    }
}

/// Compiles a LIKE pattern into an anchored regex: `%` is any run of
/// characters, `_` exactly one, `\%` and `\_` are literal. Everything else
/// matches itself.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 6);
    out.push_str("(?s)^");
    let mut chars = pattern.chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if matches!(chars.peek(), Some('%' | '_')) => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut buf)));
                }
            }
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::{like_to_regex, PredicateEvaluator};
    use crate::planner::{BinaryOp, Expr};
    use sheetsql_core::types::{Row, ScalarValue};

    fn row() -> Row {
        [
            ("State", ScalarValue::from("North Carolina")),
            ("Ranking", ScalarValue::from(10)),
            ("Population", ScalarValue::Empty),
        ]
        .into_iter()
        .collect()
    }

    fn col(name: &str) -> Expr {
        Expr::Column(name.into())
    }

    fn lit(value: impl Into<ScalarValue>) -> Expr {
        Expr::Literal(value.into())
    }

    fn like(candidate: &str, pattern: &str) -> bool {
        let mut eval = PredicateEvaluator::new();
        let expr = Expr::binary(BinaryOp::Like, lit(candidate), lit(pattern));
        eval.matches(Some(&expr), &Row::new())
    }

    #[test]
    fn like_percent_matches_any_run() {
        assert!(like("North Carolina", "North%"));
        assert!(like("North", "North%"));
        assert!(!like("South Dakota", "North%"));
        assert!(like("South Dakota", "%Dak%"));
    }

    #[test]
    fn like_underscore_matches_one_char() {
        assert!(like("Iowa", "I_wa"));
        assert!(!like("Iowwa", "I_wa"));
    }

    #[test]
    fn like_escapes_are_literal() {
        assert!(like("%off", r"\%off"));
        assert!(!like("50off", r"\%off"));
        assert!(like("a_b", r"a\_b"));
        assert!(!like("axb", r"a\_b"));
    }

    #[test]
    fn like_is_anchored_and_escapes_regex_metacharacters() {
        assert!(!like("xNorth", "North%"));
        assert!(like("a.b(c)", "a.b(c)"));
        assert!(!like("aXb(c)", "a.b(c)"));
        assert_eq!(like_to_regex("a%"), "(?s)^a.*$");
    }

    #[test]
    fn comparisons_and_logic() {
        let mut eval = PredicateEvaluator::new();
        let r = row();
        let ranking_is_ten = Expr::binary(BinaryOp::Eq, col("Ranking"), lit(10));
        assert!(eval.matches(Some(&ranking_is_ten), &r));
        let ranking_text = Expr::binary(BinaryOp::Eq, col("Ranking"), lit("10"));
        assert!(eval.matches(Some(&ranking_text), &r));
        let both = Expr::binary(
            BinaryOp::And,
            ranking_is_ten.clone(),
            Expr::binary(BinaryOp::Lt, col("State"), lit("O")),
        );
        assert!(eval.matches(Some(&both), &r));
        let either = Expr::binary(
            BinaryOp::Or,
            Expr::binary(BinaryOp::Gt, col("Ranking"), lit(50)),
            Expr::binary(BinaryOp::NotEq, col("State"), lit("Ohio")),
        );
        assert!(eval.matches(Some(&either), &r));
    }

    #[test]
    fn is_distinguishes_empty() {
        let mut eval = PredicateEvaluator::new();
        let r = row();
        let pop_is_null = Expr::binary(BinaryOp::Is, col("Population"), lit(ScalarValue::Empty));
        assert!(eval.matches(Some(&pop_is_null), &r));
        let missing_is_null = Expr::binary(BinaryOp::Is, col("Nope"), lit(ScalarValue::Empty));
        assert!(eval.matches(Some(&missing_is_null), &r));
        let pop_is_zero = Expr::binary(BinaryOp::Is, col("Population"), lit(0));
        assert!(!eval.matches(Some(&pop_is_zero), &r));
        let pop_eq_zero = Expr::binary(BinaryOp::Eq, col("Population"), lit(0));
        assert!(!eval.matches(Some(&pop_eq_zero), &r));
    }

    #[test]
    fn unsupported_nodes_never_match() {
        let mut eval = PredicateEvaluator::new();
        let r = row();
        assert!(eval.matches(None, &r));
        assert!(!eval.matches(Some(&col("Ranking")), &r));
        assert!(!eval.matches(Some(&Expr::Unsupported("Ranking + 1".into())), &r));
        let cmp_unsupported = Expr::binary(BinaryOp::Eq, Expr::Unsupported("x".into()), lit(10));
        assert!(!eval.matches(Some(&cmp_unsupported), &r));
    }

    #[test]
    fn like_against_empty_matches_neither_way() {
        let mut eval = PredicateEvaluator::new();
        let r = row();
        let like = Expr::binary(BinaryOp::Like, col("Population"), lit("%"));
        let not_like = Expr::binary(BinaryOp::NotLike, col("Population"), lit("%"));
        assert!(!eval.matches(Some(&like), &r));
        assert!(!eval.matches(Some(&not_like), &r));
    }
}
