use crate::planner::{AggregateFunc, Projection, ProjectionItem};
use sheetsql_core::types::{Row, ScalarValue};
use std::cmp::Ordering;
use tracing::warn;

/// An output row together with the row it was built from. ORDER BY falls
/// back to the source when a key is not among the output columns.
#[derive(Debug, Clone)]
pub struct ProjectedRow {
    pub output: Row,
    pub source: Option<Row>,
}

impl ProjectedRow {
    pub fn key(&self, column: &str) -> Option<&ScalarValue> {
        self.output
            .get(column)
            .or_else(|| self.source.as_ref().and_then(|s| s.get(column)))
    }
}

#[derive(Debug)]
enum AggState {
    Column(ScalarValue),
    Count(u64),
    Sum(Option<f64>),
    Avg { sum: f64, count: u64 },
    Min(Option<ScalarValue>),
    Max(Option<ScalarValue>),
}

impl AggState {
    fn new(item: &ProjectionItem) -> Self {
        match item {
            ProjectionItem::Column { .. } => AggState::Column(ScalarValue::Empty),
            ProjectionItem::Aggregate { func, .. } => match func {
                AggregateFunc::Count => AggState::Count(0),
                AggregateFunc::Sum => AggState::Sum(None),
                AggregateFunc::Avg => AggState::Avg { sum: 0.0, count: 0 },
                AggregateFunc::Min => AggState::Min(None),
                AggregateFunc::Max => AggState::Max(None),
            },
        }
    }

    fn feed(&mut self, value: Option<&ScalarValue>) {
        let value = value.filter(|v| !v.is_empty());
        match self {
            AggState::Column(last) => *last = value.cloned().unwrap_or_default(),
            AggState::Count(n) => *n += 1,
            AggState::Sum(total) => {
                let add = value.and_then(ScalarValue::as_number).unwrap_or(0.0);
                *total = Some(total.unwrap_or(0.0) + add);
            }
            AggState::Avg { sum, count } => {
                if let Some(n) = value.and_then(ScalarValue::as_number) {
                    *sum += n;
                    *count += 1;
                }
            }
            AggState::Min(best) => keep_extreme(best, value, Ordering::Less),
            AggState::Max(best) => keep_extreme(best, value, Ordering::Greater),
        }
    }

    fn value(&self) -> ScalarValue {
        match self {
            AggState::Column(v) => v.clone(),
            AggState::Count(n) => ScalarValue::Number(*n as f64),
            AggState::Sum(total) => total.map(ScalarValue::Number).unwrap_or_default(),
            AggState::Avg { sum, count } if *count > 0 => ScalarValue::Number(sum / *count as f64),
            AggState::Avg { .. } => ScalarValue::Empty,
            AggState::Min(v) | AggState::Max(v) => v.clone().unwrap_or_default(),
        }
    }
}

fn keep_extreme(best: &mut Option<ScalarValue>, value: Option<&ScalarValue>, want: Ordering) {
    let Some(value) = value else {
        return;
    };
    let replace = match best {
        None => true,
        Some(current) => value.sort_cmp(current) == want,
    };
    if replace {
        *best = Some(value.clone());
    }
}

/// Shapes qualifying rows: `*` passthrough, column projection, or a single
/// accumulator row when any item is an aggregate (there is no GROUP BY).
///
/// In an aggregate query a plain column takes its value from the last row
/// fed in.
#[derive(Debug)]
pub struct Projector<'p> {
    projection: &'p Projection,
    rows: Vec<ProjectedRow>,
    accumulator: Option<Vec<AggState>>,
}

impl<'p> Projector<'p> {
    pub fn new(projection: &'p Projection) -> Self {
        let accumulator = match projection {
            Projection::Items(items)
                if items.iter().any(|i| matches!(i, ProjectionItem::Aggregate { .. })) =>
            {
                if items.iter().any(|i| matches!(i, ProjectionItem::Column { .. })) {
                    warn!("plain columns mixed with aggregates take the last matching row's value");
                }
                Some(items.iter().map(AggState::new).collect())
            }
            _ => None,
        };
        Self {
            projection,
            rows: Vec::new(),
            accumulator,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.accumulator.is_some()
    }

    pub fn push(&mut self, row: Row) {
        let items = match self.projection {
            Projection::All => {
                self.rows.push(ProjectedRow {
                    output: row,
                    source: None,
                });
                return;
            }
            Projection::Items(items) => items,
        };
        if let Some(states) = self.accumulator.as_mut() {
            for (item, state) in items.iter().zip(states.iter_mut()) {
                let value = match item {
                    ProjectionItem::Column { name, .. } => row.get(name),
                    ProjectionItem::Aggregate { column, .. } => {
                        column.as_deref().and_then(|c| row.get(c))
                    }
                };
                state.feed(value);
            }
            return;
        }
        let mut output = Row::with_capacity(items.len());
        for item in items {
            if let ProjectionItem::Column { name, .. } = item {
                output.insert(item.output_name(), row.get(name).cloned().unwrap_or_default());
            }
        }
        self.rows.push(ProjectedRow {
            output,
            source: Some(row),
        });
    }

    /// Collected rows. An aggregate query always yields its one accumulator
    /// row, even when nothing matched.
    pub fn finish(self) -> Vec<ProjectedRow> {
        let (Some(states), Projection::Items(items)) = (self.accumulator, self.projection) else {
            return self.rows;
        };
        let mut output = Row::with_capacity(items.len());
        for (item, state) in items.iter().zip(&states) {
            output.insert(item.output_name(), state.value());
        }
        vec![ProjectedRow {
            output,
            source: None,
        }]
    }
}
