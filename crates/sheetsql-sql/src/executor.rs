use crate::parser::ParsedStatement;
use crate::planner::{
    plan_statement, DeletePlan, InsertPlan, OrderBySpec, Plan, SelectPlan, UpdatePlan,
};
use crate::predicate::PredicateEvaluator;
use crate::projector::{ProjectedRow, Projector};
use crate::table::{build_row, LogicalTable};
use metrics::counter;
use sheetsql_core::error::SheetSqlError;
use sheetsql_core::types::{ResultSet, Row, ScalarValue};
use sheetsql_grid::Workbook;
use std::cmp::Ordering;
use tracing::{debug, warn};

static EMPTY: ScalarValue = ScalarValue::Empty;

/// Runs one statement at a time against a workbook. Holds no table state
/// between statements; each statement resolves its table afresh.
#[derive(Debug, Default, Clone)]
pub struct SqlExecutor {}

impl SqlExecutor {
    pub fn new() -> Self {
        Self {}
    }

    pub fn execute(
        &self,
        workbook: &mut Workbook,
        stmt: &ParsedStatement,
    ) -> Result<ResultSet, SheetSqlError> {
        let plan = plan_statement(stmt)?;
        self.execute_plan(workbook, plan)
    }

    pub fn execute_plan(&self, workbook: &mut Workbook, plan: Plan) -> Result<ResultSet, SheetSqlError> {
        let kind = match &plan {
            Plan::Select(_) => "select",
            Plan::Insert(_) => "insert",
            Plan::Update(_) => "update",
            Plan::Delete(_) => "delete",
            Plan::Passthrough(_) => "passthrough",
        };
        counter!("sheetsql_statement_total", "kind" => kind).increment(1);
        let result = match plan {
            Plan::Select(plan) => self.exec_select(workbook, plan),
            Plan::Insert(plan) => self.exec_insert(workbook, plan),
            Plan::Update(plan) => self.exec_update(workbook, plan),
            Plan::Delete(plan) => self.exec_delete(workbook, plan),
            Plan::Passthrough(sql) => {
                debug!("passing through unhandled statement: {sql}");
                let row: Row = [("statement", ScalarValue::Text(sql))].into_iter().collect();
                return Ok(ResultSet::new(vec![row]));
            }
        }?;
        if kind != "select" {
            counter!("sheetsql_rows_affected_total", "kind" => kind).increment(result.len() as u64);
        }
        debug!("{kind} returned {} rows", result.len());
        Ok(result)
    }

    fn exec_select(&self, workbook: &mut Workbook, plan: SelectPlan) -> Result<ResultSet, SheetSqlError> {
        let [source] = plan.sources.as_slice() else {
            return Err(SheetSqlError::MultiTableUnsupported);
        };
        if plan.has_group_by {
            warn!("GROUP BY is unsupported and was ignored");
        }
        let table = LogicalTable::open(workbook, source)?;
        let headers = table.headers();
        let mut evaluator = PredicateEvaluator::new();
        let mut projector = Projector::new(&plan.projection);
        for values in table.rows() {
            let row = build_row(&headers, values);
            if evaluator.matches(plan.where_clause.as_ref(), &row) {
                projector.push(row);
            }
        }
        let mut rows = projector.finish();

        if !plan.order_by.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &plan.order_by));
        }

        let rows = rows.into_iter().map(|r| r.output);
        let rows: Vec<Row> = match plan.limit {
            Some(limit) => rows.skip(limit.offset).take(limit.count).collect(),
            None => rows.collect(),
        };
        Ok(ResultSet::new(rows))
    }

    fn exec_update(&self, workbook: &mut Workbook, plan: UpdatePlan) -> Result<ResultSet, SheetSqlError> {
        let mut table = LogicalTable::open(workbook, &plan.table)?;
        let headers = table.headers();
        let assignments = plan
            .assignments
            .iter()
            .map(|(column, value)| column_position(&headers, column).map(|pos| (pos, value)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut evaluator = PredicateEvaluator::new();
        let mut affected = Vec::new();
        for (idx, values) in table.rows().into_iter().enumerate() {
            let row = build_row(&headers, values.clone());
            if !evaluator.matches(plan.where_clause.as_ref(), &row) {
                continue;
            }
            let mut updated = values;
            for (pos, value) in &assignments {
                updated[*pos] = (*value).clone();
            }
            table.update(idx, &updated)?;
            affected.push(row);
        }
        Ok(ResultSet::new(affected))
    }

    fn exec_insert(&self, workbook: &mut Workbook, plan: InsertPlan) -> Result<ResultSet, SheetSqlError> {
        let mut table = LogicalTable::open(workbook, &plan.table)?;
        let headers = table.headers();
        let columns = if plan.columns.is_empty() {
            headers.clone()
        } else {
            plan.columns
        };
        let positions = columns
            .iter()
            .map(|column| column_position(&headers, column))
            .collect::<Result<Vec<_>, _>>()?;

        let mut inserted = Vec::with_capacity(plan.values.len());
        for tuple in plan.values {
            if tuple.len() != columns.len() {
                return Err(SheetSqlError::MalformedTable(format!(
                    "VALUES tuple has {} values for {} columns",
                    tuple.len(),
                    columns.len()
                )));
            }
            let mut full = vec![ScalarValue::Empty; table.width()];
            let mut row = Row::with_capacity(columns.len());
            for ((column, pos), value) in columns.iter().zip(&positions).zip(tuple) {
                full[*pos] = value.clone();
                row.insert(column.clone(), value);
            }
            let height = table.height();
            table.update(height, &full)?;
            inserted.push(row);
        }
        Ok(ResultSet::new(inserted))
    }

    fn exec_delete(&self, workbook: &mut Workbook, plan: DeletePlan) -> Result<ResultSet, SheetSqlError> {
        let mut table = LogicalTable::open(workbook, &plan.table)?;
        let headers = table.headers();
        let mut evaluator = PredicateEvaluator::new();
        let mut affected = Vec::new();
        // indices come from the pre-delete snapshot; shift by rows already removed
        for (idx, values) in table.rows().into_iter().enumerate() {
            let row = build_row(&headers, values);
            if evaluator.matches(plan.where_clause.as_ref(), &row) {
                table.delete(idx - affected.len())?;
                affected.push(row);
            }
        }
        Ok(ResultSet::new(affected))
    }
}

fn column_position(headers: &[String], column: &str) -> Result<usize, SheetSqlError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| SheetSqlError::UnknownColumn(column.to_string()))
}

fn compare_rows(a: &ProjectedRow, b: &ProjectedRow, order_by: &[OrderBySpec]) -> Ordering {
    for spec in order_by {
        let left = a.key(&spec.column).unwrap_or(&EMPTY);
        let right = b.key(&spec.column).unwrap_or(&EMPTY);
        let ord = left.sort_cmp(right);
        if ord != Ordering::Equal {
            return if spec.asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}
