use crate::parser::ParsedStatement;
use sheetsql_core::error::SheetSqlError;
use sheetsql_core::types::ScalarValue;
use sqlparser::ast::{
    BinaryOperator, Expr as SqlExpr, FromTable, Function, FunctionArg, FunctionArgExpr,
    GroupByExpr, ObjectName, Offset, OrderByExpr, Query, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins, UnaryOperator, Value,
};

#[derive(Debug, Clone)]
pub enum Plan {
    Select(SelectPlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Delete(DeletePlan),
    /// Statement kinds the engine does not execute, kept as SQL text.
    Passthrough(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Is,
    IsNot,
    Like,
    NotLike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunc::Count),
            "SUM" => Some(AggregateFunc::Sum),
            "AVG" => Some(AggregateFunc::Avg),
            "MIN" => Some(AggregateFunc::Min),
            "MAX" => Some(AggregateFunc::Max),
            _ => None,
        }
    }
}

/// Closed expression tree evaluated against one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(ScalarValue),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `column` is `None` for `COUNT(*)`.
    Aggregate {
        func: AggregateFunc,
        column: Option<String>,
    },
    /// Anything else the parser produced, kept as SQL text. Evaluates as
    /// empty and never matches as a predicate.
    Unsupported(String),
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    Column {
        name: String,
        alias: Option<String>,
    },
    Aggregate {
        func: AggregateFunc,
        column: Option<String>,
        alias: Option<String>,
    },
}

impl ProjectionItem {
    /// Output key: the alias, else the column name, else `FUNC(column)`.
    pub fn output_name(&self) -> String {
        match self {
            ProjectionItem::Column { name, alias } => alias.clone().unwrap_or_else(|| name.clone()),
            ProjectionItem::Aggregate { func, column, alias } => alias.clone().unwrap_or_else(|| {
                format!("{}({})", func.name(), column.as_deref().unwrap_or("*"))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Items(Vec<ProjectionItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBySpec {
    pub column: String,
    pub asc: bool,
}

/// LIMIT normalized to its two-part `offset, count` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSpec {
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct SelectPlan {
    /// Every relation named in FROM, joins included.
    pub sources: Vec<String>,
    pub projection: Projection,
    pub where_clause: Option<Expr>,
    pub has_group_by: bool,
    pub order_by: Vec<OrderBySpec>,
    pub limit: Option<LimitSpec>,
}

#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub table: String,
    /// Empty when the statement has no column list.
    pub columns: Vec<String>,
    pub values: Vec<Vec<ScalarValue>>,
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub table: String,
    pub assignments: Vec<(String, ScalarValue)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub table: String,
    pub where_clause: Option<Expr>,
}

pub fn plan_statement(parsed: &ParsedStatement) -> Result<Plan, SheetSqlError> {
    let stmt = match parsed {
        ParsedStatement::Native(stmt) => stmt,
        ParsedStatement::RewrittenDelete(query) => return plan_rewritten_delete(query),
    };
    match stmt {
        Statement::Query(query) => plan_select(query).map(Plan::Select),
        Statement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let table = object_name(table_name);
            let columns = columns.iter().map(|c| c.value.clone()).collect();
            let mut values = Vec::new();
            if let Some(source) = source {
                let SetExpr::Values(v) = &*source.body else {
                    return Err(SheetSqlError::NotSupported(
                        "INSERT only supports a VALUES list".into(),
                    ));
                };
                for row in &v.rows {
                    values.push(row.iter().map(literal_value).collect::<Result<Vec<_>, _>>()?);
                }
            }
            Ok(Plan::Insert(InsertPlan {
                table,
                columns,
                values,
            }))
        }
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            if !table.joins.is_empty() {
                return Err(SheetSqlError::MultiTableUnsupported);
            }
            let table = table_factor_name(&table.relation)?;
            let mut assigns = Vec::with_capacity(assignments.len());
            for a in assignments {
                let Some(ident) = a.id.last() else {
                    continue;
                };
                assigns.push((ident.value.clone(), literal_value(&a.value)?));
            }
            Ok(Plan::Update(UpdatePlan {
                table,
                assignments: assigns,
                where_clause: selection.as_ref().map(plan_expr),
            }))
        }
        Statement::Delete { from, selection, .. } => {
            let relations = from_tables(from);
            let table = single_table(relations)?;
            Ok(Plan::Delete(DeletePlan {
                table,
                where_clause: selection.as_ref().map(plan_expr),
            }))
        }
        other => Ok(Plan::Passthrough(other.to_string())),
    }
}

fn plan_select(query: &Query) -> Result<SelectPlan, SheetSqlError> {
    let SetExpr::Select(select) = &*query.body else {
        return Err(SheetSqlError::NotSupported(format!(
            "query form: {}",
            query.body
        )));
    };
    let mut sources = Vec::new();
    for rel in &select.from {
        sources.push(table_factor_name(&rel.relation)?);
        for join in &rel.joins {
            sources.push(table_factor_name(&join.relation)?);
        }
    }
    let has_group_by = match &select.group_by {
        GroupByExpr::All => true,
        GroupByExpr::Expressions(exprs) => !exprs.is_empty(),
    };
    Ok(SelectPlan {
        sources,
        projection: plan_projection(&select.projection)?,
        where_clause: select.selection.as_ref().map(plan_expr),
        has_group_by,
        order_by: plan_order_by(&query.order_by)?,
        limit: plan_limit(query.limit.as_ref(), query.offset.as_ref())?,
    })
}

fn plan_rewritten_delete(query: &Query) -> Result<Plan, SheetSqlError> {
    let SetExpr::Select(select) = &*query.body else {
        return Err(SheetSqlError::ParseFailure(format!(
            "cannot read DELETE from {}",
            query.body
        )));
    };
    let table = single_table(&select.from)?;
    Ok(Plan::Delete(DeletePlan {
        table,
        where_clause: select.selection.as_ref().map(plan_expr),
    }))
}

/// Lowers a parser expression. Never fails: shapes outside the supported
/// set become [`Expr::Unsupported`].
pub fn plan_expr(expr: &SqlExpr) -> Expr {
    match expr {
        SqlExpr::Identifier(ident) => Expr::Column(ident.value.clone()),
        SqlExpr::CompoundIdentifier(parts) => match parts.last() {
            Some(last) => Expr::Column(last.value.clone()),
            None => Expr::Unsupported(expr.to_string()),
        },
        SqlExpr::Value(value) => match scalar_from_value(value) {
            Some(v) => Expr::Literal(v),
            None => Expr::Unsupported(expr.to_string()),
        },
        SqlExpr::Nested(inner) => plan_expr(inner),
        SqlExpr::UnaryOp { op, expr: inner } => match (op, plan_expr(inner)) {
            (UnaryOperator::Minus, Expr::Literal(ScalarValue::Number(n))) => {
                Expr::Literal(ScalarValue::Number(-n))
            }
            (UnaryOperator::Plus, lit @ Expr::Literal(ScalarValue::Number(_))) => lit,
            _ => Expr::Unsupported(expr.to_string()),
        },
        SqlExpr::BinaryOp { left, op, right } => {
            let op = match op {
                BinaryOperator::Eq => BinaryOp::Eq,
                BinaryOperator::NotEq => BinaryOp::NotEq,
                BinaryOperator::Lt => BinaryOp::Lt,
                BinaryOperator::LtEq => BinaryOp::LtEq,
                BinaryOperator::Gt => BinaryOp::Gt,
                BinaryOperator::GtEq => BinaryOp::GtEq,
                BinaryOperator::And => BinaryOp::And,
                BinaryOperator::Or => BinaryOp::Or,
                _ => return Expr::Unsupported(expr.to_string()),
            };
            Expr::binary(op, plan_expr(left), plan_expr(right))
        }
        SqlExpr::Like {
            negated,
            expr: candidate,
            pattern,
            ..
        } => {
            let op = if *negated { BinaryOp::NotLike } else { BinaryOp::Like };
            Expr::binary(op, plan_expr(candidate), plan_expr(pattern))
        }
        SqlExpr::IsNull(inner) => is_test(BinaryOp::Is, inner, ScalarValue::Empty),
        SqlExpr::IsNotNull(inner) => is_test(BinaryOp::IsNot, inner, ScalarValue::Empty),
        SqlExpr::IsTrue(inner) => is_test(BinaryOp::Is, inner, ScalarValue::Boolean(true)),
        SqlExpr::IsNotTrue(inner) => is_test(BinaryOp::IsNot, inner, ScalarValue::Boolean(true)),
        SqlExpr::IsFalse(inner) => is_test(BinaryOp::Is, inner, ScalarValue::Boolean(false)),
        SqlExpr::IsNotFalse(inner) => is_test(BinaryOp::IsNot, inner, ScalarValue::Boolean(false)),
        SqlExpr::Function(func) => match parse_aggregate_func(func) {
            Some((func, column)) => Expr::Aggregate { func, column },
            None => Expr::Unsupported(expr.to_string()),
        },
        _ => Expr::Unsupported(expr.to_string()),
    }
}

fn is_test(op: BinaryOp, inner: &SqlExpr, value: ScalarValue) -> Expr {
    Expr::binary(op, plan_expr(inner), Expr::Literal(value))
}

fn plan_projection(items: &[SelectItem]) -> Result<Projection, SheetSqlError> {
    let is_wildcard = |item: &SelectItem| {
        matches!(
            item,
            SelectItem::Wildcard(_)
                | SelectItem::QualifiedWildcard(_, _)
                | SelectItem::UnnamedExpr(SqlExpr::Wildcard)
        )
    };
    if items.iter().any(is_wildcard) {
        if items.len() == 1 {
            return Ok(Projection::All);
        }
        return Err(SheetSqlError::NotSupported(
            "* mixed with other select items".into(),
        ));
    }
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let (expr, alias) = match item {
            SelectItem::UnnamedExpr(expr) => (expr, None),
            SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
            other => {
                return Err(SheetSqlError::NotSupported(format!("select item: {other}")))
            }
        };
        let proj = match plan_expr(expr) {
            Expr::Column(name) => ProjectionItem::Column { name, alias },
            Expr::Aggregate { func, column } => ProjectionItem::Aggregate {
                func,
                column,
                alias,
            },
            _ => {
                return Err(SheetSqlError::NotSupported(format!(
                    "select expression: {expr}"
                )))
            }
        };
        out.push(proj);
    }
    Ok(Projection::Items(out))
}

fn parse_aggregate_func(func: &Function) -> Option<(AggregateFunc, Option<String>)> {
    let agg = AggregateFunc::from_name(&func.name.0.last()?.value)?;
    let arg = match func.args.first() {
        None => None,
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => None,
        Some(FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(_))) => None,
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))) => match plan_expr(expr) {
            Expr::Column(name) => Some(name),
            _ => return None,
        },
        Some(_) => return None,
    };
    if arg.is_none() && agg != AggregateFunc::Count {
        return None;
    }
    Some((agg, arg))
}

fn plan_order_by(order_by: &[OrderByExpr]) -> Result<Vec<OrderBySpec>, SheetSqlError> {
    let mut out = Vec::with_capacity(order_by.len());
    for oe in order_by {
        let column = match plan_expr(&oe.expr) {
            Expr::Column(name) => name,
            _ => return Err(SheetSqlError::UnsupportedOrderBy(oe.expr.to_string())),
        };
        out.push(OrderBySpec {
            column,
            asc: oe.asc.unwrap_or(true),
        });
    }
    Ok(out)
}

fn plan_limit(
    limit: Option<&SqlExpr>,
    offset: Option<&Offset>,
) -> Result<Option<LimitSpec>, SheetSqlError> {
    match (limit, offset) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(SheetSqlError::InvalidLimit(
            "OFFSET without LIMIT; use LIMIT [offset,] number".into(),
        )),
        (Some(limit), offset) => {
            let count = limit_part(limit)?;
            let offset = match offset {
                Some(off) => limit_part(&off.value)?,
                None => 0,
            };
            Ok(Some(LimitSpec { offset, count }))
        }
    }
}

fn limit_part(expr: &SqlExpr) -> Result<usize, SheetSqlError> {
    match expr {
        SqlExpr::Value(Value::Number(n, _)) => n
            .parse::<usize>()
            .map_err(|_| SheetSqlError::InvalidLimit(n.clone())),
        other => Err(SheetSqlError::InvalidLimit(other.to_string())),
    }
}

fn literal_value(expr: &SqlExpr) -> Result<ScalarValue, SheetSqlError> {
    match plan_expr(expr) {
        Expr::Literal(value) => Ok(value),
        _ => Err(SheetSqlError::NotSupported(format!(
            "only literal values are supported, found {expr}"
        ))),
    }
}

fn scalar_from_value(value: &Value) -> Option<ScalarValue> {
    match value {
        Value::Number(n, _) => n.parse::<f64>().ok().map(ScalarValue::Number),
        Value::SingleQuotedString(s)
        | Value::DoubleQuotedString(s)
        | Value::NationalStringLiteral(s) => Some(ScalarValue::Text(s.clone())),
        Value::Boolean(b) => Some(ScalarValue::Boolean(*b)),
        Value::Null => Some(ScalarValue::Empty),
        _ => None,
    }
}

fn table_factor_name(relation: &TableFactor) -> Result<String, SheetSqlError> {
    match relation {
        TableFactor::Table { name, .. } => Ok(object_name(name)),
        other => Err(SheetSqlError::NotSupported(format!("table source: {other}"))),
    }
}

fn single_table(relations: &[TableWithJoins]) -> Result<String, SheetSqlError> {
    match relations {
        [only] if only.joins.is_empty() => table_factor_name(&only.relation),
        _ => Err(SheetSqlError::MultiTableUnsupported),
    }
}

fn from_tables(from: &FromTable) -> &[TableWithJoins] {
    match from {
        FromTable::WithFromKeyword(relations) => relations,
        FromTable::WithoutKeyword(relations) => relations,
    }
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}
